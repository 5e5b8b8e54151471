//! Scalar filtering and distance helpers for the measurement engines.
//!
//! The match engine classifies a live triplet by Euclidean distance against
//! stored references; the delta engine tracks an exponentially weighted
//! magnitude of recent samples and flags sudden deviation from it.
//!
//! # Example
//! ```rust
//! use cmt_core::utils::math::filter;
//! let d = filter::distance3((10, 10, 11), (10, 10, 10));
//! assert!((d - 1.0).abs() < 1e-6);
//! ```

use libm;

/// Smoothing factor for the running magnitude. Close to 1.0, so the
/// estimate moves slowly and a sudden sample stands out against it.
pub const IIR_ALPHA: f32 = 0.9;

/// Magnitude of an (r, g, b) sample treated as a 3-vector.
pub fn magnitude3(
    r: u16,
    g: u16,
    b: u16,
) -> f32 {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    libm::sqrtf(r * r + g * g + b * b)
}

/// Euclidean distance between two (r, g, b) triplets.
pub fn distance3(
    a: (u16, u16, u16),
    b: (u16, u16, u16),
) -> f32 {
    let dr = a.0 as f32 - b.0 as f32;
    let dg = a.1 as f32 - b.1 as f32;
    let db = a.2 as f32 - b.2 as f32;
    libm::sqrtf(dr * dr + dg * dg + db * db)
}

/// One step of the exponentially weighted running value.
pub fn iir_step(
    iir: f32,
    sample: f32,
    alpha: f32,
) -> f32 {
    alpha * iir + (1.0 - alpha) * sample
}
