/// Digital Signal Processing (DSP) stages.
///
/// This module provides the building blocks of an FM composite (MPX)
/// processing chain. Each stage is a small owned object with persistent
/// state, driven block by block through [`DspBlock`].
///
/// # Overview
///
/// A typical receive chain for the composite signal looks like:
///
/// ```text
/// IQ → FIR (baseband) → FM demod → FIR + decimate (composite) → stereo / RDS
///                                        │
///                                        └→ Rotate → Resampler → AGC → Costas → ...
/// ```
///
/// # Modules
///
/// ## Filtering
/// - [`taps`]: Filter design (low-pass, complex band-pass, root-raised-cosine)
/// - [`fir`]: Stateful and decimating FIR filters, delay lines
/// - [`resampler`]: Rational polyphase and sinc streaming resamplers
///
/// ## Synchronisation
/// - [`nco`]: Numerically controlled oscillator with a second-order loop filter
/// - [`pll`]: Phase-locked loop and two-phase Costas loop built on [`nco`]
/// - [`agc`]: Fast automatic gain control
/// - [`clock_recovery`]: Mueller-Muller symbol timing recovery and slicing
///
/// ## Signal manipulation
/// - [`rotate`]: Frequency translation of complex samples
///
/// # Thread Safety
///
/// Stages maintain internal state and are **not** meant to be shared between
/// threads. Each processing thread owns its own instances.
use num_complex::Complex;
use std::f64::consts::PI;

pub mod agc;
pub mod clock_recovery;
pub mod fir;
pub mod nco;
pub mod pll;
pub mod resampler;
pub mod rotate;
pub mod taps;

/// Trait for streaming DSP stages.
///
/// A stage consumes a block of input samples and produces a block of output
/// samples, mutating only its own state. The output length may differ from
/// the input length (decimation, resampling, symbol recovery).
///
/// # Examples
///
/// ```
/// use mpxdsp::dsp::{DspBlock, rotate::Rotate};
/// use num_complex::Complex;
///
/// let mut rotator = Rotate::new(0.1);
/// let input = vec![Complex::new(1.0, 0.0); 10];
/// let output = rotator.process(&input);
/// assert_eq!(output.len(), 10);
/// ```
pub trait DspBlock<I, O = I> {
    /// Process a block of samples.
    ///
    /// # Arguments
    ///
    /// * `data` - Input samples, in stream order
    ///
    /// # Returns
    ///
    /// A vector of processed samples
    fn process(&mut self, data: &[I]) -> Vec<O>;
}

/// Convert a real signal to complex with a zero imaginary part.
pub fn real_to_complex(data: &[f32]) -> Vec<Complex<f32>> {
    data.iter().map(|&x| Complex::new(x, 0.0)).collect()
}

/// Keep the real part of a complex signal.
pub fn complex_to_real(data: &[Complex<f32>]) -> Vec<f32> {
    data.iter().map(|c| c.re).collect()
}

/// Convert a frequency in Hz into radians per sample.
pub fn hz_to_rads(freq: f64, sample_rate: f64) -> f64 {
    2.0 * PI * freq / sample_rate
}

/// Wrap a phase into [-π, π].
pub fn wrap_phase(mut phase: f64) -> f64 {
    while phase > PI {
        phase -= 2.0 * PI;
    }
    while phase < -PI {
        phase += 2.0 * PI;
    }
    phase
}

/// Convert a level in dB into a linear amplitude factor.
pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
