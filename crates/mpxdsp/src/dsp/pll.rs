//! Carrier tracking loops.
//!
//! - [`Pll`]: Locks onto a (filtered, analytic) tone and outputs a clean
//!   unit phasor following it. Used to regenerate the 38 kHz stereo
//!   subcarrier from the 19 kHz pilot.
//! - [`Costas`]: Two-phase Costas loop. Removes the carrier phase and
//!   frequency offset from a suppressed-carrier BPSK signal.
//!
//! Both are driven by an [`Nco`] with a second-order loop filter.

use num_complex::Complex;

use super::{DspBlock, nco::Nco, wrap_phase};

/// Phase-locked loop producing a unit phasor locked to the input tone.
///
/// The phase detector compares the argument of each input sample with the
/// oscillator prediction. The output for sample `n` is the phasor of the
/// estimate locked on sample `n - 1`, so the loop adds exactly one sample
/// of latency to whatever path feeds it.
///
/// # Example
///
/// ```
/// use mpxdsp::dsp::{DspBlock, hz_to_rads, pll::Pll};
/// use num_complex::Complex;
///
/// let rate = 128_000.0;
/// let mut pll = Pll::new(
///     25_000.0 / rate,
///     hz_to_rads(19_000.0, rate),
///     hz_to_rads(18_750.0, rate),
///     hz_to_rads(19_250.0, rate),
/// );
/// let out = pll.process(&[Complex::new(1.0, 0.0); 16]);
/// assert_eq!(out.len(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct Pll {
    nco: Nco,
}

impl Pll {
    /// Create a new PLL.
    ///
    /// # Arguments
    ///
    /// * `bandwidth` - Normalised loop bandwidth
    /// * `frequency` - Initial frequency in radians per sample
    /// * `min_frequency` - Lowest frequency in radians per sample
    /// * `max_frequency` - Highest frequency in radians per sample
    pub fn new(bandwidth: f64, frequency: f64, min_frequency: f64, max_frequency: f64) -> Self {
        let mut nco = Nco::new(frequency, min_frequency, max_frequency);
        nco.set_loop_bandwidth(bandwidth);
        Self { nco }
    }

    /// Current frequency estimate in radians per sample.
    pub fn frequency(&self) -> f64 {
        self.nco.frequency()
    }

    /// Current phase estimate in radians.
    pub fn phase(&self) -> f64 {
        self.nco.phase()
    }

    fn step(&mut self, sample: Complex<f32>) -> Complex<f32> {
        let out = self.nco.phasor();
        let predicted = self.nco.phase() + self.nco.frequency();
        let error = wrap_phase(sample.arg() as f64 - predicted);
        self.nco.advance(error);
        out
    }
}

impl DspBlock<Complex<f32>> for Pll {
    fn process(&mut self, data: &[Complex<f32>]) -> Vec<Complex<f32>> {
        data.iter().map(|&s| self.step(s)).collect()
    }
}

/// Two-phase (BPSK) Costas loop.
///
/// Each sample is de-rotated by the oscillator phase, the decision-directed
/// error `re(y)·im(y)` (clamped to ±1) is fed back, and the de-rotated
/// sample is returned. Starting the oscillator at a non-zero frequency
/// makes the loop translate that frequency down to 0 Hz while tracking it.
///
/// ```text
/// input → [×exp(-jθ)] → output
///              ↑           ↓
///             NCO ← loop filter ← re·im
/// ```
#[derive(Debug, Clone)]
pub struct Costas {
    nco: Nco,
    last_error: f64,
}

impl Costas {
    /// Create a new Costas loop.
    ///
    /// # Arguments
    ///
    /// * `bandwidth` - Normalised loop bandwidth
    /// * `frequency` - Initial frequency in radians per sample
    /// * `min_frequency` - Lowest frequency in radians per sample
    /// * `max_frequency` - Highest frequency in radians per sample
    pub fn new(bandwidth: f64, frequency: f64, min_frequency: f64, max_frequency: f64) -> Self {
        let mut nco = Nco::new(frequency, min_frequency, max_frequency);
        nco.set_loop_bandwidth(bandwidth);
        Self {
            nco,
            last_error: 0.0,
        }
    }

    /// Costas loop centred on 0 Hz, free to move over the whole band.
    pub fn baseband(bandwidth: f64) -> Self {
        use std::f64::consts::PI;
        Self::new(bandwidth, 0.0, -PI, PI)
    }

    /// Current frequency estimate in radians per sample.
    pub fn frequency(&self) -> f64 {
        self.nco.frequency()
    }

    /// Last phase detector output.
    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    fn step(&mut self, sample: Complex<f32>) -> Complex<f32> {
        let y = sample * self.nco.phasor().conj();
        let error = (y.re as f64 * y.im as f64).clamp(-1.0, 1.0);
        self.last_error = error;
        self.nco.advance(error);
        y
    }
}

impl DspBlock<Complex<f32>> for Costas {
    fn process(&mut self, data: &[Complex<f32>]) -> Vec<Complex<f32>> {
        data.iter().map(|&s| self.step(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::hz_to_rads;
    use approx::assert_relative_eq;

    fn tone(freq: f64, rate: f64, phase0: f64, n: usize) -> Vec<Complex<f32>> {
        (0..n)
            .map(|i| {
                let p = phase0 + hz_to_rads(freq, rate) * i as f64;
                Complex::new(p.cos() as f32, p.sin() as f32)
            })
            .collect()
    }

    #[test]
    fn test_pll_locks_to_pilot() {
        let rate = 128_000.0;
        let mut pll = Pll::new(
            25_000.0 / rate,
            hz_to_rads(19_000.0, rate),
            hz_to_rads(18_750.0, rate),
            hz_to_rads(19_250.0, rate),
        );

        let input = tone(19_050.0, rate, 1.0, 20_000);
        let out = pll.process(&input);

        assert_relative_eq!(pll.frequency(), hz_to_rads(19_050.0, rate), epsilon = 1e-4);

        // Output lags the input by exactly one sample once locked
        for n in 19_000..20_000 {
            let err = (out[n] * input[n - 1].conj()).arg();
            assert!(err.abs() < 0.01, "phase error {} at {}", err, n);
        }
    }

    #[test]
    fn test_pll_frequency_limits() {
        let rate = 128_000.0;
        let mut pll = Pll::new(
            25_000.0 / rate,
            hz_to_rads(19_000.0, rate),
            hz_to_rads(18_750.0, rate),
            hz_to_rads(19_250.0, rate),
        );
        let _ = pll.process(&tone(21_000.0, rate, 0.0, 10_000));
        assert!(pll.frequency() <= hz_to_rads(19_250.0, rate) + 1e-12);
    }

    #[test]
    fn test_costas_removes_phase_offset() {
        let mut costas = Costas::baseband(0.05);

        // BPSK symbols rotated by 0.6 rad
        let rot = Complex::new(0.6f32.cos(), 0.6f32.sin());
        let input: Vec<Complex<f32>> = (0..4000)
            .map(|i| if (i / 7) % 2 == 0 { rot } else { -rot })
            .collect();
        let out = costas.process(&input);

        for s in &out[3000..] {
            assert!(s.im.abs() < 0.05, "residual quadrature {}", s.im);
            assert_relative_eq!(s.re.abs(), 1.0, epsilon = 0.05);
        }
    }

    #[test]
    fn test_costas_tracks_tone() {
        let rate = 5_000.0;
        let center = hz_to_rads(1_187.5, rate);
        let mut costas = Costas::new(0.01, center, center * 0.9, center * 1.1);

        let input = tone(1_190.0, rate, 0.3, 20_000);
        let _ = costas.process(&input);
        assert_relative_eq!(costas.frequency(), hz_to_rads(1_190.0, rate), epsilon = 1e-4);
        assert!(costas.frequency() <= center * 1.1);
        assert!(costas.last_error().abs() < 0.05);
    }
}
