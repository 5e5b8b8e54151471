//! Shared measurement state and the match/delta engines.
//!
//! The periodic sampling context and the foreground command loop both touch
//! the running triplet, the IIR state and the mode flags, so all of it
//! lives behind a critical-section mutex. Foreground sequences that must
//! not interleave with a periodic sample take a scoped [`PausedPeriodic`]
//! guard: the periodic source is disarmed on acquisition and the previous
//! state restored on drop.

use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use super::catalog::ColorCatalog;
use super::optics::Triplet;
use crate::utils::math::filter;

/// State shared with the periodic context.
///
/// Match and delta are mutually exclusive by construction: arming one
/// disarms the other, so a tick runs exactly one reporter.
#[derive(Debug, Clone, Copy)]
pub struct Monitor {
    /// Most recent normalized sample triplet.
    pub last: Triplet,
    /// Exponentially weighted magnitude of past samples.
    pub iir: f32,
    pub match_armed: bool,
    pub match_threshold: u16,
    pub delta_armed: bool,
    pub delta_threshold: u16,
    /// Flash the indicator on every periodic sample.
    pub led_sample: bool,
    pub periodic_armed: bool,
    /// Periodic interval in tenths of a second.
    pub period_tenths: u16,
}

impl Monitor {
    pub const fn new() -> Self {
        Self {
            last: Triplet::new(0, 0, 0),
            iir: 0.0,
            match_armed: false,
            match_threshold: 0,
            delta_armed: false,
            delta_threshold: 0,
            led_sample: false,
            periodic_armed: false,
            period_tenths: 0,
        }
    }

    pub fn arm_match(
        &mut self,
        threshold: u16,
    ) {
        self.match_armed = true;
        self.match_threshold = threshold;
        self.delta_armed = false;
    }

    /// Disarming keeps the last threshold value.
    pub fn disarm_match(&mut self) {
        self.match_armed = false;
    }

    /// Arming delta resets the running magnitude; it never resets merely
    /// because a sample is taken.
    pub fn arm_delta(
        &mut self,
        threshold: u16,
    ) {
        self.delta_armed = true;
        self.delta_threshold = threshold;
        self.iir = 0.0;
        self.match_armed = false;
    }

    pub fn disarm_delta(&mut self) {
        self.delta_armed = false;
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared cell. Every access runs as a short closure under the lock,
/// which masks the periodic source for the duration on single-core
/// interrupt-driven targets.
pub struct MonitorCell(Mutex<CriticalSectionRawMutex, RefCell<Monitor>>);

impl MonitorCell {
    pub const fn new() -> Self {
        Self(Mutex::new(RefCell::new(Monitor::new())))
    }

    pub fn with<R>(
        &self,
        f: impl FnOnce(&mut Monitor) -> R,
    ) -> R {
        self.0.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Disarm the periodic source for the scope of the returned guard.
    pub fn pause(&self) -> PausedPeriodic<'_> {
        let was_armed = self.with(|m| core::mem::replace(&mut m.periodic_armed, false));
        PausedPeriodic {
            cell: self,
            was_armed,
        }
    }
}

impl Default for MonitorCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped periodic pause; restores the previous armed state on drop.
pub struct PausedPeriodic<'a> {
    cell: &'a MonitorCell,
    was_armed: bool,
}

impl Drop for PausedPeriodic<'_> {
    fn drop(&mut self) {
        let was_armed = self.was_armed;
        self.cell.with(|m| m.periodic_armed = was_armed);
    }
}

/// Match engine: report every valid catalog index whose Euclidean distance
/// to `sample` is strictly below `threshold`, in catalog order. No early
/// exit and no tie-break; multiple indices may be reported.
pub fn run_match<W: fmt::Write>(
    catalog: &ColorCatalog,
    sample: Triplet,
    threshold: u16,
    out: &mut W,
) -> fmt::Result {
    for (index, stored) in catalog.entries() {
        let distance = filter::distance3(sample.as_tuple(), stored.as_tuple());
        if distance < threshold as f32 {
            write!(out, "Color {}\r\n", index)?;
        }
    }
    Ok(())
}

/// Delta engine: advance the running magnitude with `sample` and return
/// the triplet when the instantaneous deviation exceeds the armed
/// threshold.
pub fn delta_step(
    monitor: &mut Monitor,
    sample: Triplet,
) -> Option<Triplet> {
    let v = filter::magnitude3(sample.r, sample.g, sample.b);
    monitor.iir = filter::iir_step(monitor.iir, v, filter::IIR_ALPHA);
    let deviation = libm::fabsf(v - monitor.iir);
    (deviation > monitor.delta_threshold as f32).then_some(sample)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;

    #[test]
    fn arming_is_mutually_exclusive() {
        let mut m = Monitor::new();
        m.arm_match(5);
        m.arm_delta(7);
        assert!(m.delta_armed && !m.match_armed);
        m.arm_match(5);
        assert!(m.match_armed && !m.delta_armed);
    }

    #[test]
    fn disarming_keeps_thresholds() {
        let mut m = Monitor::new();
        m.arm_match(9);
        m.disarm_match();
        assert_eq!(m.match_threshold, 9);
        m.arm_delta(4);
        m.disarm_delta();
        assert_eq!(m.delta_threshold, 4);
    }

    #[test]
    fn arming_delta_resets_the_iir() {
        let mut m = Monitor::new();
        m.iir = 123.0;
        m.arm_delta(1);
        assert_eq!(m.iir, 0.0);
    }

    #[test]
    fn pause_guard_restores_armed_state() {
        let cell = MonitorCell::new();
        cell.with(|m| m.periodic_armed = true);
        {
            let _pause = cell.pause();
            assert!(!cell.with(|m| m.periodic_armed));
        }
        assert!(cell.with(|m| m.periodic_armed));

        cell.with(|m| m.periodic_armed = false);
        {
            let _pause = cell.pause();
        }
        assert!(!cell.with(|m| m.periodic_armed));
    }

    #[test]
    fn match_threshold_is_exclusive() {
        let mut catalog = ColorCatalog::empty();
        catalog.save(3, Triplet::new(10, 10, 10)).unwrap();
        let sample = Triplet::new(10, 10, 11); // distance 1

        let mut out = String::new();
        run_match(&catalog, sample, 2, &mut out).unwrap();
        assert_eq!(out, "Color 3\r\n");

        out.clear();
        run_match(&catalog, sample, 1, &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn match_reports_all_qualifying_indices_in_order() {
        let mut catalog = ColorCatalog::empty();
        catalog.save(7, Triplet::new(1, 1, 1)).unwrap();
        catalog.save(2, Triplet::new(0, 0, 0)).unwrap();
        let mut out = String::new();
        run_match(&catalog, Triplet::new(0, 0, 0), 100, &mut out).unwrap();
        assert_eq!(out, "Color 2\r\nColor 7\r\n");
    }

    #[test]
    fn delta_reports_only_above_threshold() {
        let mut m = Monitor::new();
        m.arm_delta(50);

        // First sample: iir was 0, v = 100, deviation = 90 > 50.
        let sample = Triplet::new(100, 0, 0);
        assert!(delta_step(&mut m, sample).is_some());

        // Converging toward a constant input silences the reports.
        let mut reported = true;
        for _ in 0..64 {
            reported = delta_step(&mut m, sample).is_some();
        }
        assert!(!reported);
        assert!((m.iir - 100.0).abs() < 1.0);
    }
}
