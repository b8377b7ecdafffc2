//! FM demodulation blocks.
//!
//! This module provides the two single-sample recursions of the receive path:
//! - [`FmDemodulator`]: Quadrature demodulator turning IQ samples into the MPX signal
//! - [`Deemphasis`]: Single-pole de-emphasis applied to the decoded audio
//!
//! # Example
//!
//! ```
//! use mpxdsp::dsp::DspBlock;
//! use mpxradio::fm::{Deemphasis, FmDemodulator};
//! use num_complex::Complex;
//!
//! let mut demod = FmDemodulator::new(384_000.0, 85_000.0);
//! let mut deemphasis = Deemphasis::new(64_000.0, 75.0);
//!
//! let iq_samples = vec![Complex::new(0.5, 0.5); 100];
//! let mpx = demod.process(&iq_samples);
//! let audio = deemphasis.process(&mpx);
//! assert_eq!(audio.len(), 100);
//! ```

use std::f64::consts::PI;

use mpxdsp::dsp::DspBlock;
use num_complex::Complex;

/// Quadrature FM demodulator.
///
/// For each sample, computes the phase step from the previous sample as
/// `arg(x[n] · conj(x[n-1]))`, then scales it so that a carrier deviating
/// by the nominal peak deviation produces ±1.0.
///
/// # Example
///
/// ```
/// use mpxdsp::dsp::DspBlock;
/// use mpxradio::fm::FmDemodulator;
/// use num_complex::Complex;
///
/// let mut demod = FmDemodulator::new(384_000.0, 85_000.0);
/// let samples = vec![
///     Complex::new(1.0, 0.0),
///     Complex::new(0.707, 0.707),
///     Complex::new(0.0, 1.0),
/// ];
/// let mpx = demod.process(&samples);
/// assert_eq!(mpx.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct FmDemodulator {
    /// Last complex sample for phase difference calculation
    last: Complex<f32>,
    /// Radians per sample to output units
    gain: f32,
}

impl FmDemodulator {
    /// Create a new FM demodulator.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Rate of the IQ samples in Hz
    /// * `deviation` - Peak FM deviation in Hz (75 kHz nominal, 85 kHz with RDS
    ///   and pilot headroom)
    pub fn new(sample_rate: f64, deviation: f64) -> Self {
        Self {
            last: Complex::new(1.0, 0.0),
            gain: (sample_rate / (2.0 * PI * deviation)) as f32,
        }
    }

    /// Gain applied to the phase difference.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Reset the internal state.
    pub fn reset(&mut self) {
        self.last = Complex::new(1.0, 0.0);
    }
}

impl DspBlock<Complex<f32>, f32> for FmDemodulator {
    fn process(&mut self, samples: &[Complex<f32>]) -> Vec<f32> {
        let mut out = Vec::with_capacity(samples.len());
        for &sample in samples {
            out.push((sample * self.last.conj()).arg() * self.gain);
            self.last = sample;
        }
        out
    }
}

/// De-emphasis filter for FM broadcast audio.
///
/// Broadcasters boost high frequencies before transmission. This filter
/// applies the matching first-order low-pass:
///
/// `state += α·(x − state)`, with `α = 1 − exp(−1 / (rate·τ))`
///
/// Common time constants:
/// - North America, South Korea: 75 µs
/// - Europe, rest of world: 50 µs
///
/// A time constant of 0 gives `α = 0` and disables the filter.
#[derive(Debug, Clone)]
pub struct Deemphasis {
    alpha: f32,
    state: f32,
}

impl Deemphasis {
    /// Create a new de-emphasis filter.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `tau_us` - Time constant in microseconds (0 disables)
    pub fn new(sample_rate: f64, tau_us: f64) -> Self {
        let alpha = if tau_us > 0.0 {
            1.0 - (-1.0 / (sample_rate * tau_us * 1e-6)).exp()
        } else {
            0.0
        };
        Self {
            alpha: alpha as f32,
            state: 0.0,
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_enabled(&self) -> bool {
        self.alpha != 0.0
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

impl DspBlock<f32> for Deemphasis {
    fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        if !self.is_enabled() {
            return samples.to_vec();
        }
        samples
            .iter()
            .map(|&x| {
                self.state += self.alpha * (x - self.state);
                self.state
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn fm_tone(offset_hz: f64, rate: f64, n: usize) -> Vec<Complex<f32>> {
        (0..n)
            .map(|i| {
                let phase = 2.0 * PI * offset_hz * i as f64 / rate;
                Complex::new(phase.cos() as f32, phase.sin() as f32)
            })
            .collect()
    }

    #[test]
    fn test_demodulator_constant_signal() {
        let mut demod = FmDemodulator::new(384_000.0, 85_000.0);
        let out = demod.process(&vec![Complex::new(1.0, 0.0); 10]);
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|p| p.abs() < 1e-6));
    }

    #[test]
    fn test_demodulator_full_deviation() {
        let rate = 384_000.0;
        let mut demod = FmDemodulator::new(rate, 85_000.0);

        let out = demod.process(&fm_tone(85_000.0, rate, 100));
        for &v in &out[1..] {
            assert_relative_eq!(v, 1.0, epsilon = 1e-4);
        }

        demod.reset();
        let out = demod.process(&fm_tone(-42_500.0, rate, 100));
        for &v in &out[1..] {
            assert_relative_eq!(v, -0.5, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_demodulator_block_continuity() {
        let rate = 384_000.0;
        let tone = fm_tone(10_000.0, rate, 200);
        let mut demod = FmDemodulator::new(rate, 85_000.0);
        let first = demod.process(&tone[..100]);
        let second = demod.process(&tone[100..]);
        assert_relative_eq!(first[99], second[0], epsilon = 1e-4);
    }

    #[test]
    fn test_deemphasis_alpha() {
        let filter = Deemphasis::new(64_000.0, 75.0);
        let expected = 1.0 - (-1.0f64 / (64_000.0 * 75e-6)).exp();
        assert_relative_eq!(filter.alpha(), expected as f32, epsilon = 1e-6);
    }

    #[test]
    fn test_deemphasis_dc_settles() {
        let mut filter = Deemphasis::new(64_000.0, 75.0);
        let out = filter.process(&vec![0.5; 2_000]);
        assert!(out[0] < 0.5);
        assert_relative_eq!(out[1_999], 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_deemphasis_disabled() {
        let mut filter = Deemphasis::new(64_000.0, 0.0);
        assert!(!filter.is_enabled());
        assert_eq!(filter.process(&[0.1, -0.2, 0.3]), vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_deemphasis_reset() {
        let mut filter = Deemphasis::new(48_000.0, 50.0);
        let _ = filter.process(&[1.0; 100]);
        filter.reset();
        let out = filter.process(&[0.0]);
        assert_eq!(out[0], 0.0);
    }
}
