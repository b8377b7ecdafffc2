//! Automatic Gain Control (AGC)
//!
//! This module provides the fast AGC used ahead of the RDS carrier loops.
//!
//! # Overview
//!
//! The AGC tracks the input envelope and applies the gain that brings it
//! to a target amplitude. Peaks are followed instantly (fast attack), while
//! the envelope decays towards quieter input with an exponential moving
//! average. The gain is capped so that silence is not amplified into noise
//! without bound.
//!
//! # Example
//!
//! ```
//! use mpxdsp::dsp::{DspBlock, agc::Agc};
//! use num_complex::Complex;
//!
//! // Target 1.0, max gain 1e6, rate 0.1
//! let mut agc = Agc::new(1.0, 1e6, 0.1);
//! let out = agc.process(&vec![Complex::new(0.01, 0.0); 100]);
//! assert!((out[99].norm() - 1.0).abs() < 1e-3);
//! ```

use num_complex::Complex;

use super::DspBlock;

/// Fast attack, exponential decay AGC for complex signals.
#[derive(Debug, Clone)]
pub struct Agc {
    /// Target output amplitude
    target: f32,

    /// Maximum gain (to prevent noise amplification)
    max_gain: f32,

    /// Envelope decay rate [0, 1]
    rate: f32,

    /// Envelope estimate, 0 until the first sample
    envelope: f32,
}

impl Agc {
    /// Create a new AGC.
    ///
    /// # Arguments
    ///
    /// * `target` - Target output amplitude
    /// * `max_gain` - Maximum gain applied
    /// * `rate` - Envelope decay rate [0, 1]. Lower values hold the gain
    ///   steadier through quiet passages.
    pub fn new(target: f32, max_gain: f32, rate: f32) -> Self {
        Self {
            target,
            max_gain,
            rate: rate.clamp(0.0, 1.0),
            envelope: 0.0,
        }
    }

    /// Get the current gain value.
    pub fn gain(&self) -> f32 {
        if self.envelope > 0.0 {
            (self.target / self.envelope).min(self.max_gain)
        } else {
            self.max_gain
        }
    }

    /// Get the current envelope estimate.
    pub fn envelope(&self) -> f32 {
        self.envelope
    }

    /// Reset the AGC state.
    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    /// Process a single complex sample.
    pub fn execute(&mut self, sample: Complex<f32>) -> Complex<f32> {
        let mag = sample.norm();
        if mag > self.envelope {
            self.envelope = mag;
        } else {
            self.envelope += self.rate * (mag - self.envelope);
        }
        sample * self.gain()
    }
}

impl Default for Agc {
    fn default() -> Self {
        Self::new(1.0, 1e6, 0.1)
    }
}

impl DspBlock<Complex<f32>> for Agc {
    fn process(&mut self, data: &[Complex<f32>]) -> Vec<Complex<f32>> {
        data.iter().map(|&s| self.execute(s)).collect()
    }
}
