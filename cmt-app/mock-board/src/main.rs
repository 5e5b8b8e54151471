//! Host simulation of the colorimeter board.
//!
//! Wires the core engine to simulated peripherals: a closed-loop optics
//! model whose sensor reading follows the applied duties, an in-memory
//! storage medium with an optional file image, and the terminal as the
//! serial console. Useful for exercising the whole command surface without
//! hardware.

use std::cell::Cell;
use std::convert::Infallible;
use std::io::Read as _;
use std::io::Write as _;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use embassy_executor::Executor;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};
use static_cell::StaticCell;
use tracing::{info, warn};

use cmt_core::mk_static;
use cmt_core::utils::controllers::monitor::MonitorCell;
use cmt_core::utils::controllers::optics::{LightSensor, RgbBench, DUTY_SWEEP};
use cmt_core::utils::controllers::Colorimeter;
use cmt_core::utils::shell::repl;
use cmt_core::utils::storage::{NvStore, CALIBRATION_ADDR, ERASED_WORD};

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// Sensor counts per duty step for the red channel
    #[clap(long, default_value_t = 4)]
    gain_r: u16,
    /// Sensor counts per duty step for the green channel
    #[clap(long, default_value_t = 4)]
    gain_g: u16,
    /// Sensor counts per duty step for the blue channel
    #[clap(long, default_value_t = 4)]
    gain_b: u16,
    /// File image for the storage medium (created on first write)
    #[clap(long)]
    nv: Option<PathBuf>,
    /// Sleep through settle delays instead of skipping them
    #[clap(long)]
    real_delays: bool,
}

/// Bytes fed from the stdin reader thread; `None` marks end of input.
static CONSOLE_BYTES: Channel<CriticalSectionRawMutex, Option<u8>, 256> = Channel::new();

/// Console byte source over the feeder channel.
struct StdinReader {
    done: bool,
}

impl embedded_io_async::ErrorType for StdinReader {
    type Error = Infallible;
}

impl embedded_io_async::Read for StdinReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }
        match CONSOLE_BYTES.receive().await {
            Some(byte) => {
                buf[0] = byte;
                Ok(1)
            }
            None => {
                self.done = true;
                Ok(0)
            }
        }
    }
}

/// Console sink: unbuffered writes to the terminal.
struct StdoutSink;

impl core::fmt::Write for StdoutSink {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let mut stdout = std::io::stdout();
        stdout.write_all(s.as_bytes()).map_err(|_| core::fmt::Error)?;
        stdout.flush().map_err(|_| core::fmt::Error)
    }
}

type DutyCells = Rc<[Cell<u16>; 3]>;

struct SimChannel {
    index: usize,
    duties: DutyCells,
}

impl PwmErrorType for SimChannel {
    type Error = Infallible;
}

impl SetDutyCycle for SimChannel {
    fn max_duty_cycle(&self) -> u16 {
        DUTY_SWEEP - 1
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.duties[self.index].set(duty);
        Ok(())
    }
}

/// Sensor model: each lit channel contributes `duty * gain` counts,
/// saturating at the 12-bit ceiling.
struct SimSensor {
    duties: DutyCells,
    gains: [u16; 3],
}

impl LightSensor for SimSensor {
    type Error = Infallible;

    fn read_raw(&mut self) -> Result<u16, Infallible> {
        let raw: u32 = (0..3)
            .map(|i| self.duties[i].get() as u32 * self.gains[i] as u32)
            .sum();
        Ok(raw.min(4095) as u16)
    }
}

/// Delay source; `--real-delays` makes settle timing wall-clock real.
#[derive(Clone, Copy)]
struct HostDelay {
    real: bool,
}

impl DelayNs for HostDelay {
    fn delay_ns(&mut self, ns: u32) {
        if self.real {
            std::thread::sleep(std::time::Duration::from_nanos(ns as u64));
        }
    }
}

/// Indicator LED that reports level changes on the log.
struct LogPin {
    lit: bool,
}

impl PinErrorType for LogPin {
    type Error = Infallible;
}

impl OutputPin for LogPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        if self.lit {
            info!("indicator off");
        }
        self.lit = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        if !self.lit {
            info!("indicator on");
        }
        self.lit = true;
        Ok(())
    }
}

/// Push button double; the simulated operator presses immediately.
struct AutoButton;

impl PinErrorType for AutoButton {
    type Error = Infallible;
}

impl InputPin for AutoButton {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        info!("button press simulated");
        Ok(true)
    }
}

/// Word-addressed storage with an optional file image.
struct FileStore {
    words: Vec<u32>,
    path: Option<PathBuf>,
}

const STORE_WORDS: usize = CALIBRATION_ADDR as usize + 0x100;

impl FileStore {
    fn open(path: Option<PathBuf>) -> Self {
        let mut words = vec![ERASED_WORD; STORE_WORDS];
        if let Some(p) = path.as_ref() {
            match std::fs::read(p) {
                Ok(bytes) => {
                    for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
                        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    }
                    info!(path = %p.display(), "storage image loaded");
                }
                Err(error) => {
                    warn!(?error, path = %p.display(), "no storage image, starting erased");
                }
            }
        }
        Self { words, path }
    }

    fn flush(&self) -> std::io::Result<()> {
        if let Some(p) = self.path.as_ref() {
            let mut bytes = Vec::with_capacity(self.words.len() * 4);
            for word in &self.words {
                bytes.extend_from_slice(&word.to_le_bytes());
            }
            std::fs::write(p, bytes)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct StoreError(std::io::ErrorKind);

impl NvStore for FileStore {
    type Error = StoreError;

    fn read(&mut self, addr: u32, out: &mut [u32]) -> Result<(), StoreError> {
        let base = addr as usize;
        out.copy_from_slice(&self.words[base..base + out.len()]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u32]) -> Result<(), StoreError> {
        let base = addr as usize;
        self.words[base..base + data.len()].copy_from_slice(data);
        self.flush().map_err(|e| StoreError(e.kind()))
    }

    fn mass_erase(&mut self) -> Result<(), StoreError> {
        self.words.fill(ERASED_WORD);
        self.flush().map_err(|e| StoreError(e.kind()))
    }
}

#[embassy_executor::task]
async fn main_task() {
    let opts: Opts = Opts::parse();

    let duties: DutyCells = Rc::new([Cell::new(0), Cell::new(0), Cell::new(0)]);
    let gains = [opts.gain_r, opts.gain_g, opts.gain_b];
    info!(?gains, "starting board simulation");

    let bench = RgbBench::new(
        SimChannel { index: 0, duties: duties.clone() },
        SimChannel { index: 1, duties: duties.clone() },
        SimChannel { index: 2, duties: duties.clone() },
        SimSensor { duties: duties.clone(), gains },
        HostDelay { real: opts.real_delays },
    );

    let monitor = mk_static!(MonitorCell, MonitorCell::new());
    let mut meter = Colorimeter::new(
        bench,
        FileStore::open(opts.nv),
        LogPin { lit: false },
        AutoButton,
        monitor,
    );

    let mut console = StdoutSink;
    if meter.restore(&mut console).is_err() {
        warn!("console write failed during restore");
    }

    match repl(StdinReader { done: false }, &mut console, meter).await {
        Ok(()) => info!("console input ended"),
        Err(_) => warn!("console write failed"),
    }
    std::process::exit(0);
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Feed terminal bytes into the async console channel.
    std::thread::spawn(|| {
        let stdin = std::io::stdin();
        let mut byte = [0u8; 1];
        let mut handle = stdin.lock();
        loop {
            match handle.read(&mut byte) {
                Ok(0) | Err(_) => {
                    while CONSOLE_BYTES.try_send(None).is_err() {
                        std::thread::sleep(std::time::Duration::from_millis(1));
                    }
                    break;
                }
                Ok(_) => {
                    while CONSOLE_BYTES.try_send(Some(byte[0])).is_err() {
                        std::thread::sleep(std::time::Duration::from_millis(1));
                    }
                }
            }
        }
    });

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task()).unwrap();
    });
}
