/// Frequency translator for complex baseband.
///
/// Multiplies each sample by a running unit phasor advanced by a fixed
/// step, shifting the spectrum by that step. The phasor is renormalised
/// once per block to keep its magnitude at one.
///
/// # Example
/// ```
/// use num_complex::Complex;
/// use mpxdsp::dsp::{DspBlock, rotate::Rotate};
///
/// // Bring a 57 kHz subcarrier down to 0 Hz at 128 kHz
/// let mut xlator = Rotate::from_frequency(-57_000.0, 128_000.0);
/// let input = vec![Complex::new(1.0, 0.0); 4];
/// let output = xlator.process(&input);
/// assert_eq!(output.len(), 4);
/// ```
use num_complex::Complex;

use super::{DspBlock, hz_to_rads};

#[derive(Debug, Clone)]
pub struct Rotate {
    phasor: Complex<f32>,
    step: Complex<f32>,
}

impl Rotate {
    /// Translator advancing `angle` radians per sample
    pub fn new(angle: f32) -> Self {
        Self {
            phasor: Complex::new(1.0, 0.0),
            step: Complex::from_polar(1.0, angle),
        }
    }

    /// Create a frequency translator shifting by `offset_hz` at `sample_rate`
    pub fn from_frequency(offset_hz: f64, sample_rate: f64) -> Self {
        Self::new(hz_to_rads(offset_hz, sample_rate) as f32)
    }
}

impl DspBlock<Complex<f32>> for Rotate {
    fn process(&mut self, data: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let out = data
            .iter()
            .map(|&s| {
                let shifted = s * self.phasor;
                self.phasor *= self.step;
                shifted
            })
            .collect();
        let norm = self.phasor.norm();
        if norm > 0.0 {
            self.phasor /= norm;
        }
        out
    }
}
