//! Filter tap design.
//!
//! This module designs the coefficient sets used by the [`fir`](super::fir)
//! filters:
//! - [`low_pass`]: Windowed-sinc low-pass filter with a Blackman window
//! - [`band_pass_complex`]: Complex band-pass obtained by modulating a low-pass
//! - [`root_raised_cosine`]: Pulse shaping filter for the RDS waveform
//!
//! Filter lengths are derived from the requested transition width with
//! [`estimate_tap_count`], so every design is specified the same way:
//! cutoff, transition and sample rate, all in Hz.
//!
//! # Example
//!
//! ```
//! use mpxdsp::dsp::taps;
//!
//! // Audio filter: 15 kHz cutoff, 4 kHz transition at 128 kHz
//! let lp = taps::low_pass(15_000.0, 4_000.0, 128_000.0).unwrap();
//! assert_eq!(lp.len() % 2, 1);
//! ```

use num_complex::Complex;
use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Estimate the number of taps needed for a given transition width.
///
/// Uses the `3.8 × rate / transition` rule of thumb and forces the result
/// odd, so that the group delay `(N - 1) / 2` is a whole number of samples.
///
/// # Arguments
///
/// * `transition` - Transition bandwidth in Hz
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
///
/// Odd tap count, at least 3.
pub fn estimate_tap_count(transition: f64, sample_rate: f64) -> usize {
    let count = (3.8 * sample_rate / transition).round() as usize;
    count.max(3) | 1
}

/// Design a low-pass FIR filter.
///
/// Designs a windowed-sinc FIR filter with a Blackman window, normalised to
/// unity gain at DC. The filter has linear phase (symmetric impulse
/// response) with a group delay of `(N - 1) / 2` samples.
///
/// # Arguments
///
/// * `cutoff` - Cutoff frequency in Hz
/// * `transition` - Transition bandwidth in Hz
/// * `sample_rate` - Sample rate in Hz
///
/// # Errors
///
/// Returns [`Error::FilterDesign`] if the sample rate or transition is not
/// positive, or if the cutoff is not strictly inside `(0, sample_rate / 2)`.
///
/// # Example
///
/// ```
/// use mpxdsp::dsp::taps::low_pass;
///
/// let taps = low_pass(61_000.0, 1_500.0, 384_000.0).unwrap();
/// let dc: f32 = taps.iter().sum();
/// assert!((dc - 1.0).abs() < 1e-4);
/// ```
pub fn low_pass(cutoff: f64, transition: f64, sample_rate: f64) -> Result<Vec<f32>> {
    if sample_rate <= 0.0 {
        return Err(Error::filter_design("sample rate must be greater than 0"));
    }
    if transition <= 0.0 {
        return Err(Error::filter_design("transition width must be greater than 0"));
    }
    if cutoff <= 0.0 || cutoff >= sample_rate / 2.0 {
        return Err(Error::filter_design(format!(
            "cutoff {} Hz outside (0, {}) Hz",
            cutoff,
            sample_rate / 2.0
        )));
    }

    let taps = estimate_tap_count(transition, sample_rate);
    let mid = (taps / 2) as isize;
    let norm_cutoff = cutoff / (sample_rate / 2.0);
    let span = (taps - 1) as f64;

    let mut fir: Vec<f64> = (0..taps)
        .map(|n| {
            let x = n as isize - mid;

            // sinc(x) = sin(πx) / (πx), with sinc(0) = 1
            let sinc = if x == 0 {
                norm_cutoff
            } else {
                (norm_cutoff * PI * x as f64).sin() / (PI * x as f64)
            };

            // Blackman window: w(n) = 0.42 - 0.5*cos(2πn/N) + 0.08*cos(4πn/N)
            let window = 0.42 - 0.5 * ((2.0 * PI * n as f64) / span).cos()
                + 0.08 * ((4.0 * PI * n as f64) / span).cos();

            sinc * window
        })
        .collect();

    let norm: f64 = fir.iter().sum();
    for v in fir.iter_mut() {
        *v /= norm;
    }

    Ok(fir.into_iter().map(|v| v as f32).collect())
}

/// Design a complex band-pass FIR filter passing `[low, high]` Hz.
///
/// The filter is a low-pass of half-width `(high - low) / 2` shifted to the
/// centre frequency. The modulation is referenced to the centre tap, so a
/// signal inside the passband only sees a pure delay of `(N - 1) / 2`
/// samples. Negative frequencies are rejected, which makes this filter
/// suitable for turning a real signal into an analytic one around a tone.
///
/// # Arguments
///
/// * `low` - Lower edge of the passband in Hz (may be 0 or negative)
/// * `high` - Upper edge of the passband in Hz
/// * `transition` - Transition bandwidth in Hz
/// * `sample_rate` - Sample rate in Hz
///
/// # Errors
///
/// Returns [`Error::FilterDesign`] if `high <= low` or the underlying
/// low-pass design fails.
pub fn band_pass_complex(
    low: f64,
    high: f64,
    transition: f64,
    sample_rate: f64,
) -> Result<Vec<Complex<f32>>> {
    if high <= low {
        return Err(Error::filter_design(format!(
            "band-pass upper edge {} Hz must be above lower edge {} Hz",
            high, low
        )));
    }

    let center = (low + high) / 2.0;
    let prototype = low_pass((high - low) / 2.0, transition, sample_rate)?;
    let mid = (prototype.len() / 2) as f64;

    Ok(prototype
        .iter()
        .enumerate()
        .map(|(n, &h)| {
            let phase = 2.0 * PI * center * (n as f64 - mid) / sample_rate;
            Complex::new((h as f64 * phase.cos()) as f32, (h as f64 * phase.sin()) as f32)
        })
        .collect())
}

/// Design a root-raised-cosine pulse shaping filter.
///
/// The impulse response is sampled at `n` points centred on `n / 2`, with
/// the usual special cases at `t = 0` and `t = ±Ts / (4α)`.
///
/// # Arguments
///
/// * `n` - Number of taps
/// * `alpha` - Roll-off factor (0..=1)
/// * `symbol_period` - Symbol period `Ts` in seconds
/// * `sample_rate` - Sample rate in Hz
pub fn root_raised_cosine(n: usize, alpha: f64, symbol_period: f64, sample_rate: f64) -> Vec<f32> {
    let dt = 1.0 / sample_rate;
    let ts = symbol_period;
    let edge = if alpha != 0.0 {
        (alpha / 2f64.sqrt())
            * ((1.0 + 2.0 / PI) * (PI / (4.0 * alpha)).sin()
                + (1.0 - 2.0 / PI) * (PI / (4.0 * alpha)).cos())
    } else {
        0.0
    };

    (0..n)
        .map(|x| {
            let t = (x as f64 - n as f64 / 2.0) * dt;
            let h = if t == 0.0 {
                1.0 - alpha + 4.0 * alpha / PI
            } else if alpha != 0.0 && (t.abs() - ts / (4.0 * alpha)).abs() < dt * 1e-9 {
                edge
            } else {
                let ratio = 4.0 * alpha * t / ts;
                ((PI * t * (1.0 - alpha) / ts).sin()
                    + 4.0 * alpha * (t / ts) * (PI * t * (1.0 + alpha) / ts).cos())
                    / (PI * t * (1.0 - ratio * ratio) / ts)
            };
            h as f32
        })
        .collect()
}
