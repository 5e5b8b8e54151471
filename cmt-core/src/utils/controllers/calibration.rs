//! Calibration engine and sample triplet acquisition.
//!
//! Calibration sweeps each illumination channel from zero duty upward until
//! the sensed intensity crosses the saturation threshold, and records the
//! duty just before the crossing. Acquisition replays the calibrated duties
//! one channel at a time — never more than one channel lit while sampling,
//! so the channels cannot optically interfere.

use super::optics::{BenchError, LightSensor, RgbBench, Triplet, DUTY_SWEEP};
use crate::utils::storage::ERASED_WORD;
use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;

/// Saturation threshold for the calibration sweep: `(2^11) - 1` for the
/// 11-bit usable sensor range.
pub const SATURATION_THRESHOLD: u16 = 2047;

/// Settle delay between a duty change and the following sample.
pub const SETTLE_STEP_US: u32 = 10_000;

/// Settle delay per `ramp` step (no sampling).
pub const SETTLE_RAMP_US: u32 = 5_000;

/// Longer settle before the first sample of a button-initiated measurement.
pub const SETTLE_BUTTON_US: u32 = 50_000;

/// Size of the persisted calibration record in words.
pub const CALIBRATION_WORDS: usize = 3;

/// Per-channel calibrated duties plus an explicit calibration flag.
///
/// The flag keeps a legitimately all-zero calibration distinguishable from
/// "never calibrated" in memory; only the persisted record uses the
/// all-zero form as its uncalibrated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    duties: [u16; 3],
    calibrated: bool,
}

impl Calibration {
    pub const fn none() -> Self {
        Self {
            duties: [0; 3],
            calibrated: false,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn duty(
        &self,
        channel: usize,
    ) -> u16 {
        self.duties[channel]
    }

    pub fn as_tuple(&self) -> (u16, u16, u16) {
        (self.duties[0], self.duties[1], self.duties[2])
    }

    /// Word image for the persisted record.
    pub fn encode(&self) -> [u32; CALIBRATION_WORDS] {
        [
            self.duties[0] as u32,
            self.duties[1] as u32,
            self.duties[2] as u32,
        ]
    }

    /// Rebuild from a persisted record. The erased pattern and the all-zero
    /// record both normalize to "never calibrated".
    pub fn from_words(words: &[u32; CALIBRATION_WORDS]) -> Self {
        let erased = words.iter().all(|&w| w == ERASED_WORD);
        let zeroed = words.iter().all(|&w| w == 0);
        if erased || zeroed {
            return Self::none();
        }
        Self {
            duties: [words[0] as u16, words[1] as u16, words[2] as u16],
            calibrated: true,
        }
    }
}

/// Errors from the measurement paths.
#[derive(Debug)]
pub enum MeasureError<PE, SE> {
    Bench(BenchError<PE, SE>),
    /// Measurement requested before a successful calibration.
    NotCalibrated,
    /// A sweep exhausted the duty range without crossing the threshold.
    CalibrationFailed,
}

impl<PE, SE> From<BenchError<PE, SE>> for MeasureError<PE, SE> {
    fn from(e: BenchError<PE, SE>) -> Self {
        MeasureError::Bench(e)
    }
}

/// Run the calibration sweep over all three channels.
///
/// Each channel ramps from duty 0; the first duty whose sample exceeds the
/// threshold stops that channel's sweep and `duty - 1` is recorded. The
/// channels are always left off, and a failed sweep commits nothing — the
/// caller keeps its previous calibration.
pub fn calibrate_sweep<P, S, D>(
    bench: &mut RgbBench<P, S, D>,
) -> Result<Calibration, MeasureError<P::Error, S::Error>>
where
    P: SetDutyCycle,
    S: LightSensor,
    D: DelayNs,
{
    let mut duties = [0u16; 3];

    for channel in 0..3 {
        let mut crossed = None;
        for duty in 0..DUTY_SWEEP {
            bench.solo(channel, duty)?;
            let raw = bench.settle_and_read(SETTLE_STEP_US)?;
            if raw > SATURATION_THRESHOLD {
                crossed = Some(duty.saturating_sub(1));
                break;
            }
        }
        match crossed {
            Some(duty) => duties[channel] = duty,
            None => {
                bench.all_off()?;
                tracing::warn!(channel, "calibration sweep never saturated");
                return Err(MeasureError::CalibrationFailed);
            }
        }
    }
    bench.all_off()?;

    Ok(Calibration {
        duties,
        calibrated: true,
    })
}

/// One-shot sample triplet acquisition at the calibrated duties.
///
/// Fails before touching any channel when not calibrated. Channels are lit
/// strictly one at a time and everything is off on return.
pub fn acquire<P, S, D>(
    bench: &mut RgbBench<P, S, D>,
    calibration: &Calibration,
    first_settle_us: u32,
) -> Result<Triplet, MeasureError<P::Error, S::Error>>
where
    P: SetDutyCycle,
    S: LightSensor,
    D: DelayNs,
{
    if !calibration.is_calibrated() {
        return Err(MeasureError::NotCalibrated);
    }

    let mut samples = [0u16; 3];
    for channel in 0..3 {
        bench.solo(channel, calibration.duty(channel))?;
        let settle = if channel == 0 {
            first_settle_us
        } else {
            SETTLE_STEP_US
        };
        samples[channel] = bench.settle_and_read(settle)?;
    }
    bench.all_off()?;

    Ok(Triplet::new(samples[0], samples[1], samples[2]))
}
