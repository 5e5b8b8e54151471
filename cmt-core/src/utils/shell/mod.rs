//! Interactive operator shell.
//!
//! One command per line over the serial console. Bytes are assembled by
//! [`console::LineBuffer`], split by [`tokenizer`], typed by [`resolver`]
//! and executed on the [`Colorimeter`]. Between keystrokes the shell
//! services the periodic sampling engine: while it is armed, reads run
//! under a deadline and a timeout fires one tick.

pub mod console;
pub mod resolver;
pub mod tokenizer;

use core::fmt;

use embassy_time::{with_timeout, Duration, Instant};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;
use embedded_io_async::Read;

use crate::utils::controllers::optics::LightSensor;
use crate::utils::controllers::Colorimeter;
use crate::utils::storage::NvStore;

use console::LineBuffer;
use resolver::{resolve, Command, InputError};
use tokenizer::tokenize;

static MENU: &str = "\r\n\
=================================================================================\r\n\
                               MAIN MENU\r\n\
=================================================================================\r\n\
rgb [#] [#] [#]              (changes rgb to specified value)\r\n\
rgb off                      (turns off all rgb)\r\n\
light                        (measures light intensity)\r\n\
ramp                         (ramps up each rgb channel)\r\n\
test                         (ramps and measures all rgb values)\r\n\
calibrate                    (finds the saturation duty for each channel)\r\n\
trigger                      (measures one rgb triplet)\r\n\
button                       (uses SW1 to perform trigger function)\r\n\
led x                        (x = on, off, or sample)\r\n\
periodic T                   (T = tenths of a second, or off)\r\n\
delta D                      (D = 0 - 255 or off)\r\n\
match E                      (E = 0 - 255 or off)\r\n\
color N                      (saves current sample at index N)\r\n\
show N                       (displays color N)\r\n\
erase N                      (erases color N)\r\n\
showcolors                   (shows colors saved)\r\n\
prommenu                     (storage maintenance menu)\r\n\
help                         (show main menu)\r\n";

static PROM_MENU: &str = "\r\n\
=================================================================================\r\n\
                               STORAGE MENU\r\n\
=================================================================================\r\n\
promCalibration      - shows calibrated rgb values\r\n\
promShowColors       - lists valid colors in storage\r\n\
promErase            - erases storage to factory default\r\n";

/// Read one byte from the console source. `None` means the source ended.
async fn read_byte<R: Read>(reader: &mut R) -> Option<u8> {
    let mut buf = [0u8; 1];
    match reader.read(&mut buf).await {
        Ok(0) => None,
        Ok(_) => Some(buf[0]),
        Err(error) => {
            tracing::warn!(?error, "console read failed");
            None
        }
    }
}

/// Run the shell until the byte source ends.
///
/// The caller restores persisted state first; the shell prints the menu and
/// enters the command loop. Long-running commands (`ramp`, `test`,
/// `calibrate`, sampling) block the loop for their whole duration.
pub async fn repl<'m, R, W, P, S, D, N, L, B>(
    mut reader: R,
    out: &mut W,
    mut meter: Colorimeter<'m, P, S, D, N, L, B>,
) -> Result<(), fmt::Error>
where
    R: Read,
    W: fmt::Write,
    P: SetDutyCycle,
    S: LightSensor,
    D: DelayNs,
    N: NvStore,
    L: OutputPin,
    B: InputPin,
{
    out.write_str(MENU)?;

    let mut line = LineBuffer::new();
    let mut next_tick: Option<Instant> = None;

    loop {
        write!(out, "\r\nEnter command: ")?;
        line.clear();

        // Assemble one line, servicing the periodic engine between bytes.
        loop {
            let (armed, tenths) = meter
                .monitor()
                .with(|m| (m.periodic_armed, m.period_tenths));
            let period = Duration::from_millis(tenths as u64 * 100);

            if !armed {
                next_tick = None;
            } else if next_tick.is_none() {
                next_tick = Some(Instant::now() + period);
            }

            let byte = match next_tick {
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        meter.service_tick(out)?;
                        next_tick = Some(Instant::now() + period);
                        continue;
                    }
                    match with_timeout(deadline - now, read_byte(&mut reader)).await {
                        Ok(Some(b)) => b,
                        Ok(None) => return Ok(()),
                        Err(_timeout) => continue,
                    }
                }
                None => match read_byte(&mut reader).await {
                    Some(b) => b,
                    None => return Ok(()),
                },
            };

            if line.push(byte) {
                break;
            }
        }

        let text = line.as_str();
        let fields = tokenize(text);
        if fields.is_empty() {
            continue;
        }

        match resolve(text, &fields) {
            Ok(Command::Help) => out.write_str(MENU)?,
            Ok(Command::PromMenu) => out.write_str(PROM_MENU)?,
            Ok(Command::ColorShow { index }) => {
                if meter.show_begin(index, out)? {
                    write!(out, "\r\nPress any key to continue\r\n")?;
                    let _ = read_byte(&mut reader).await;
                    meter.show_end(out)?;
                }
            }
            Ok(command) => meter.execute(command, out)?,
            Err(InputError::Unrecognized) => {
                write!(out, "\r\n*** Unknown command ***\r\n")?;
            }
            Err(InputError::BadNumber { field }) => {
                write!(out, "Status: invalid number in field {}\r\n", field)?;
            }
            Err(InputError::BadLiteral { field }) => {
                write!(out, "Status: invalid argument in field {}\r\n", field)?;
            }
        }
    }
}
