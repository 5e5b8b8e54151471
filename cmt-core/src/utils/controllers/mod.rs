//! Measurement controllers for the colorimeter.
//!
//! - `optics`: illumination channels and the light sensor
//! - `calibration`: threshold-crossing calibration and triplet acquisition
//! - `catalog`: the persisted reference color table
//! - `monitor`: state shared with the periodic context, match/delta engines
//! - `indicator`: the status LED
//!
//! [`Colorimeter`] ties them together and forms the command boundary:
//! every resolved command executes here, and every error is converted to a
//! human-readable status line. Nothing below this layer terminates the
//! command loop.

pub mod calibration;
pub mod catalog;
pub mod indicator;
pub mod monitor;
pub mod optics;

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::pwm::SetDutyCycle;

use crate::utils::shell::resolver::{Command, LedMode, Setting};
use crate::utils::storage::{NvStore, CALIBRATION_ADDR, CATALOG_ADDR, ERASED_WORD};

use calibration::{
    acquire, calibrate_sweep, Calibration, MeasureError, CALIBRATION_WORDS,
    SETTLE_BUTTON_US, SETTLE_RAMP_US, SETTLE_STEP_US,
};
use catalog::{CatalogError, ColorCatalog, CATALOG_WORDS};
use indicator::StatusLed;
use monitor::{delta_step, run_match, MonitorCell};
use optics::{BenchError, LightSensor, RgbBench, DUTY_SWEEP};

/// The assembled instrument: optical bench, store, indicator, button, the
/// in-memory calibration/catalog mirrors and the shared monitor cell.
pub struct Colorimeter<'m, P, S, D, N, L, B> {
    bench: RgbBench<P, S, D>,
    store: N,
    indicator: StatusLed<L>,
    button: B,
    calibration: Calibration,
    catalog: ColorCatalog,
    monitor: &'m MonitorCell,
}

fn report_bench_error<W, PE, SE>(
    out: &mut W,
    error: &BenchError<PE, SE>,
) -> fmt::Result
where
    W: fmt::Write,
    PE: fmt::Debug,
    SE: fmt::Debug,
{
    tracing::error!(?error, "optics fault");
    write!(out, "Status: hardware fault: {:?}\r\n", error)
}

fn report_measure_error<W, PE, SE>(
    out: &mut W,
    error: &MeasureError<PE, SE>,
) -> fmt::Result
where
    W: fmt::Write,
    PE: fmt::Debug,
    SE: fmt::Debug,
{
    match error {
        MeasureError::NotCalibrated => {
            write!(out, "\r\n*** Incomplete calibration ***\r\n")
        }
        MeasureError::CalibrationFailed => {
            write!(out, "\r\nStatus: error calibrating\r\n")
        }
        MeasureError::Bench(e) => report_bench_error(out, e),
    }
}

impl<'m, P, S, D, N, L, B> Colorimeter<'m, P, S, D, N, L, B>
where
    P: SetDutyCycle,
    S: LightSensor,
    D: DelayNs,
    N: NvStore,
    L: OutputPin,
    B: InputPin,
{
    pub fn new(
        bench: RgbBench<P, S, D>,
        store: N,
        indicator_pin: L,
        button: B,
        monitor: &'m MonitorCell,
    ) -> Self {
        Self {
            bench,
            store,
            indicator: StatusLed::new(indicator_pin),
            button,
            calibration: Calibration::none(),
            catalog: ColorCatalog::empty(),
            monitor,
        }
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn catalog(&self) -> &ColorCatalog {
        &self.catalog
    }

    pub fn monitor(&self) -> &'m MonitorCell {
        self.monitor
    }

    /// Load both records from the store and report what came back.
    /// A read failure keeps the in-memory defaults; they stay
    /// authoritative for the session.
    pub fn restore<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        let mut catalog_words = [ERASED_WORD; CATALOG_WORDS];
        match self.store.read(CATALOG_ADDR, &mut catalog_words) {
            Ok(()) => self.catalog = ColorCatalog::decode(&catalog_words),
            Err(error) => {
                tracing::warn!(?error, "catalog restore failed");
                write!(out, "Status: storage read failed: {:?}\r\n", error)?;
            }
        }

        let mut calibration_words = [ERASED_WORD; CALIBRATION_WORDS];
        match self.store.read(CALIBRATION_ADDR, &mut calibration_words) {
            Ok(()) => {
                self.calibration = Calibration::from_words(&calibration_words)
            }
            Err(error) => {
                tracing::warn!(?error, "calibration restore failed");
                write!(out, "Status: storage read failed: {:?}\r\n", error)?;
            }
        }

        if self.calibration.is_calibrated() {
            let (r, g, b) = self.calibration.as_tuple();
            write!(out, "Status: Calibration restored; ({}, {}, {})\r\n", r, g, b)?;
        } else {
            write!(out, "Status: not yet calibrated\r\n")?;
        }
        write!(out, "Status: restored {} colors.\r\n", self.catalog.count())
    }

    /// Execute one resolved command. `Help`, `PromMenu` and `ColorShow`
    /// are interactive and handled by the shell.
    pub fn execute<W: fmt::Write>(
        &mut self,
        command: Command,
        out: &mut W,
    ) -> fmt::Result {
        match command {
            Command::RgbSet { r, g, b } => {
                if let Err(e) = self.bench.set_rgb(r, g, b) {
                    report_bench_error(out, &e)?;
                }
                Ok(())
            }
            Command::RgbOff => {
                if let Err(e) = self.bench.all_off() {
                    report_bench_error(out, &e)?;
                }
                Ok(())
            }
            Command::Light => self.cmd_light(out),
            Command::Ramp => self.cmd_ramp(out),
            Command::Test => self.cmd_test(out),
            Command::Calibrate => self.cmd_calibrate(out),
            Command::Trigger => self.cmd_trigger(out),
            Command::Button => self.cmd_button(out),
            Command::Periodic(setting) => self.cmd_periodic(setting, out),
            Command::Led(mode) => self.cmd_led(mode, out),
            Command::ColorSave { index } => self.cmd_color_save(index, out),
            Command::ColorErase { index } => self.cmd_color_erase(index, out),
            Command::ColorList => self.cmd_color_list(out),
            Command::Match(setting) => {
                self.monitor.with(|m| match setting {
                    Setting::Off => m.disarm_match(),
                    Setting::Value(e) => m.arm_match(e),
                });
                Ok(())
            }
            Command::Delta(setting) => {
                self.monitor.with(|m| match setting {
                    Setting::Off => m.disarm_delta(),
                    Setting::Value(d) => m.arm_delta(d),
                });
                Ok(())
            }
            Command::PromErase => self.cmd_prom_erase(out),
            Command::PromShowColors => self.cmd_prom_show_colors(out),
            Command::PromShowCalibration => self.cmd_prom_show_calibration(out),
            // Interactive commands; the shell drives these directly.
            Command::Help | Command::PromMenu | Command::ColorShow { .. } => Ok(()),
        }
    }

    fn cmd_light<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        match self.bench.read_raw() {
            Ok(raw) => write!(out, "ADC:  {}\r\n", raw),
            Err(e) => report_bench_error(out, &e),
        }
    }

    fn cmd_ramp<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        for channel in 0..3 {
            for duty in 0..DUTY_SWEEP {
                if let Err(e) = self.bench.solo(channel, duty) {
                    return report_bench_error(out, &e);
                }
                self.bench.delay_mut().delay_us(SETTLE_RAMP_US);
            }
        }
        if let Err(e) = self.bench.all_off() {
            report_bench_error(out, &e)?;
        }
        Ok(())
    }

    fn cmd_test<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        for channel in 0..3 {
            for duty in 0..DUTY_SWEEP {
                if let Err(e) = self.bench.solo(channel, duty) {
                    return report_bench_error(out, &e);
                }
                match self.bench.settle_and_read(SETTLE_STEP_US) {
                    Ok(raw) => {
                        let mut rgb = [0u16; 3];
                        rgb[channel] = duty;
                        write!(out, "{}, {}, {}, {}\r\n", rgb[0], rgb[1], rgb[2], raw)?;
                    }
                    Err(e) => return report_bench_error(out, &e),
                }
            }
        }
        if let Err(e) = self.bench.all_off() {
            report_bench_error(out, &e)?;
        }
        Ok(())
    }

    fn cmd_calibrate<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        match calibrate_sweep(&mut self.bench) {
            Ok(calibration) => {
                self.calibration = calibration;
                self.persist_calibration(out)?;
                let (r, g, b) = self.calibration.as_tuple();
                write!(out, "({}, {}, {})\r\n", r, g, b)
            }
            // A failed sweep leaves the previous calibration untouched.
            Err(e) => report_measure_error(out, &e),
        }
    }

    /// One-shot acquisition with the periodic source paused for the
    /// duration.
    fn acquire_paused(
        &mut self,
        first_settle_us: u32,
    ) -> Result<optics::Triplet, MeasureError<P::Error, S::Error>> {
        let _pause = self.monitor.pause();
        let raw = acquire(&mut self.bench, &self.calibration, first_settle_us)?;
        self.monitor.with(|m| m.last = raw.normalized());
        Ok(raw)
    }

    fn cmd_trigger<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        match self.acquire_paused(SETTLE_STEP_US) {
            Ok(raw) => write!(out, "({}, {}, {})\r\n", raw.r, raw.g, raw.b),
            Err(e) => report_measure_error(out, &e),
        }
    }

    fn cmd_button<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        if !self.calibration.is_calibrated() {
            return write!(out, "\r\n*** Incomplete calibration ***\r\n");
        }
        write!(out, "Press SW1 to measure\r\n")?;
        loop {
            match self.button.is_low() {
                Ok(true) => break,
                Ok(false) => continue,
                Err(error) => {
                    tracing::error!(?error, "button read fault");
                    return write!(out, "Status: hardware fault: {:?}\r\n", error);
                }
            }
        }
        match self.acquire_paused(SETTLE_BUTTON_US) {
            Ok(raw) => write!(out, "({}, {}, {})\r\n", raw.r, raw.g, raw.b),
            Err(e) => report_measure_error(out, &e),
        }
    }

    fn cmd_periodic<W: fmt::Write>(
        &mut self,
        setting: Setting,
        out: &mut W,
    ) -> fmt::Result {
        if !self.calibration.is_calibrated() {
            return write!(out, "\r\n*** Incomplete calibration ***\r\n");
        }
        match setting {
            Setting::Off => {
                self.monitor.with(|m| m.periodic_armed = false);
                tracing::info!("periodic sampling disarmed");
                write!(out, "Status: periodic mode off\r\n")
            }
            Setting::Value(tenths) => {
                self.monitor.with(|m| {
                    m.period_tenths = tenths;
                    m.periodic_armed = true;
                });
                tracing::info!(tenths, "periodic sampling armed");
                write!(out, "Status: periodic mode on\r\n")
            }
        }
    }

    fn cmd_led<W: fmt::Write>(
        &mut self,
        mode: LedMode,
        out: &mut W,
    ) -> fmt::Result {
        match mode {
            LedMode::On => {
                if let Err(error) = self.indicator.on() {
                    tracing::error!(?error, "indicator fault");
                    return write!(out, "Status: hardware fault: {:?}\r\n", error);
                }
                write!(out, "Status: led on\r\n")
            }
            LedMode::Off => {
                self.monitor.with(|m| m.led_sample = false);
                if let Err(error) = self.indicator.off() {
                    tracing::error!(?error, "indicator fault");
                    return write!(out, "Status: hardware fault: {:?}\r\n", error);
                }
                write!(out, "Status: led off\r\n")
            }
            LedMode::Sample => {
                self.monitor.with(|m| m.led_sample = true);
                write!(out, "Status: led sample on\r\n")
            }
        }
    }

    fn cmd_color_save<W: fmt::Write>(
        &mut self,
        index: u16,
        out: &mut W,
    ) -> fmt::Result {
        // Bounds are checked before any channel lights up.
        if index as usize >= catalog::CATALOG_SLOTS {
            return write!(out, "Status: color index {} out of range\r\n", index);
        }
        let sample = match self.acquire_paused(SETTLE_STEP_US) {
            Ok(raw) => raw.normalized(),
            Err(e) => return report_measure_error(out, &e),
        };
        if self.catalog.save(index, sample).is_err() {
            return write!(out, "Status: color index {} out of range\r\n", index);
        }
        self.persist_catalog(out)?;
        write!(
            out,
            "Status: saved ({}, {}, {}) at index {}\r\n",
            sample.r, sample.g, sample.b, index
        )
    }

    fn cmd_color_erase<W: fmt::Write>(
        &mut self,
        index: u16,
        out: &mut W,
    ) -> fmt::Result {
        match self.catalog.erase(index) {
            Ok(_) => self.persist_catalog(out),
            Err(CatalogError::IndexOutOfRange(i)) => {
                write!(out, "Status: color index {} out of range\r\n", i)
            }
        }
    }

    fn cmd_color_list<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        write!(out, "Current saved colors:\r\n")?;
        let mut count = 0;
        for (index, rgb) in self.catalog.entries() {
            count += 1;
            write!(
                out,
                "Color {:2}:  ({:3}, {:3}, {:3})\r\n",
                index, rgb.r, rgb.g, rgb.b
            )?;
        }
        if count == 0 {
            write!(out, "Status: no colors indexed\r\n")?;
        }
        Ok(())
    }

    /// Light the stored color for operator inspection. Returns whether a
    /// color is being shown; the shell waits for a key and then calls
    /// [`show_end`](Self::show_end).
    pub fn show_begin<W: fmt::Write>(
        &mut self,
        index: u16,
        out: &mut W,
    ) -> Result<bool, fmt::Error> {
        match self.catalog.get(index) {
            Err(CatalogError::IndexOutOfRange(i)) => {
                write!(out, "Status: color index {} out of range\r\n", i)?;
                Ok(false)
            }
            Ok(None) => {
                write!(out, "Status: no color at index {}\r\n", index)?;
                Ok(false)
            }
            Ok(Some(rgb)) => match self.bench.set_rgb(rgb.r, rgb.g, rgb.b) {
                Ok(()) => Ok(true),
                Err(e) => {
                    report_bench_error(out, &e)?;
                    Ok(false)
                }
            },
        }
    }

    pub fn show_end<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        if let Err(e) = self.bench.all_off() {
            report_bench_error(out, &e)?;
        }
        Ok(())
    }

    fn cmd_prom_erase<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        match self.store.mass_erase() {
            Ok(()) => write!(out, "Status: storage erased\r\n"),
            Err(error) => {
                tracing::warn!(?error, "mass erase failed");
                write!(out, "Status: error code - {:?}\r\n", error)
            }
        }
    }

    /// List colors straight from the store, bypassing the in-memory
    /// mirror, so persisted and live state can be compared.
    fn cmd_prom_show_colors<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        let mut words = [ERASED_WORD; CATALOG_WORDS];
        if let Err(error) = self.store.read(CATALOG_ADDR, &mut words) {
            tracing::warn!(?error, "catalog read failed");
            return write!(out, "Status: storage read failed: {:?}\r\n", error);
        }
        let stored = ColorCatalog::decode(&words);
        let mut count = 0;
        for (index, rgb) in stored.entries() {
            count += 1;
            write!(
                out,
                "Color {:2}: ({:3}, {:3}, {:3})\r\n",
                index, rgb.r, rgb.g, rgb.b
            )?;
        }
        if count == 0 {
            write!(out, "Status: no colors saved\r\n")?;
        }
        Ok(())
    }

    fn cmd_prom_show_calibration<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        let mut words = [ERASED_WORD; CALIBRATION_WORDS];
        if let Err(error) = self.store.read(CALIBRATION_ADDR, &mut words) {
            tracing::warn!(?error, "calibration read failed");
            return write!(out, "Status: storage read failed: {:?}\r\n", error);
        }
        let stored = Calibration::from_words(&words);
        if stored.is_calibrated() {
            let (r, g, b) = stored.as_tuple();
            write!(out, "Calibration: ({}, {}, {})\r\n", r, g, b)
        } else {
            write!(out, "Status: no calibration saved in storage\r\n")
        }
    }

    /// One periodic sample: optional indicator flash, one acquisition
    /// updating the running triplet, then exactly one of plain report,
    /// match or delta.
    pub fn service_tick<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        let (led_sample, match_armed, delta_armed) = self
            .monitor
            .with(|m| (m.led_sample, m.match_armed, m.delta_armed));

        if led_sample {
            if let Err(error) = self.indicator.flash(self.bench.delay_mut()) {
                tracing::error!(?error, "indicator fault");
            }
        }

        match acquire(&mut self.bench, &self.calibration, SETTLE_STEP_US) {
            Ok(raw) => {
                let sample = raw.normalized();
                self.monitor.with(|m| m.last = sample);

                if delta_armed {
                    let report = self.monitor.with(|m| delta_step(m, sample));
                    if let Some(t) = report {
                        write!(out, "({}, {}, {})\r\n", t.r, t.g, t.b)?;
                    }
                    Ok(())
                } else if match_armed {
                    let threshold = self.monitor.with(|m| m.match_threshold);
                    run_match(&self.catalog, sample, threshold, out)
                } else {
                    write!(out, "\r\n({}, {}, {})\r\n", sample.r, sample.g, sample.b)
                }
            }
            Err(MeasureError::NotCalibrated) => {
                // Calibration disappeared while armed; disarm rather than
                // sampling with stale zeros.
                self.monitor.with(|m| m.periodic_armed = false);
                write!(out, "\r\n*** Incomplete calibration ***\r\n")?;
                write!(out, "Status: periodic mode off\r\n")
            }
            Err(e) => report_measure_error(out, &e),
        }
    }

    fn persist_calibration<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        if let Err(error) = self
            .store
            .write(CALIBRATION_ADDR, &self.calibration.encode())
        {
            tracing::warn!(?error, "calibration write failed");
            write!(out, "Status: failed to save calibration to storage\r\n")?;
        }
        Ok(())
    }

    fn persist_catalog<W: fmt::Write>(
        &mut self,
        out: &mut W,
    ) -> fmt::Result {
        if let Err(error) = self.store.write(CATALOG_ADDR, &self.catalog.encode()) {
            tracing::warn!(?error, "catalog write failed");
            write!(out, "Status: failed to save color to storage\r\n")?;
        }
        Ok(())
    }
}
