//! Numerically Controlled Oscillator (NCO) with a second-order loop filter
//!
//! This module provides the oscillator shared by the carrier tracking loops
//! in [`pll`](super::pll).
//!
//! # Overview
//!
//! The NCO generates a complex phasor at a programmable frequency. Fed with
//! a phase error, its proportional-integral loop filter pulls both the
//! phase and the frequency towards the incoming carrier.
//!
//! # Design
//!
//! - Phase is in radians, wrapped into [-π, π]
//! - Frequency is in radians per sample, clamped into `[min, max]`
//! - Loop gains derive from a normalised loop bandwidth with damping 1/√2:
//!   `ωn = bw / (ζ + 1/(4ζ))`, `α = 2ζωn` (phase), `β = ωn²` (frequency)
//!
//! # Example
//!
//! ```
//! use mpxdsp::dsp::{hz_to_rads, nco::Nco};
//!
//! // Oscillator at 19 kHz, allowed to wander ±250 Hz
//! let rate = 128_000.0;
//! let mut nco = Nco::new(
//!     hz_to_rads(19_000.0, rate),
//!     hz_to_rads(18_750.0, rate),
//!     hz_to_rads(19_250.0, rate),
//! );
//! nco.set_loop_bandwidth(25_000.0 / rate);
//!
//! // Typical loop iteration: compare, then advance
//! let phase_error = 0.01;
//! nco.advance(phase_error);
//! ```

use num_complex::Complex;
use std::f64::consts::FRAC_1_SQRT_2;

use super::wrap_phase;

/// Numerically Controlled Oscillator with integrated loop filter.
#[derive(Debug, Clone)]
pub struct Nco {
    /// Current phase in radians [-π, π]
    phase: f64,

    /// Frequency in radians per sample
    frequency: f64,

    /// Lower frequency limit (radians per sample)
    min_frequency: f64,

    /// Upper frequency limit (radians per sample)
    max_frequency: f64,

    /// Phase (proportional) gain
    alpha: f64,

    /// Frequency (integral) gain
    beta: f64,
}

impl Nco {
    /// Create a new NCO.
    ///
    /// # Arguments
    ///
    /// * `frequency` - Initial frequency in radians per sample
    /// * `min_frequency` - Lowest frequency the loop may reach
    /// * `max_frequency` - Highest frequency the loop may reach
    pub fn new(frequency: f64, min_frequency: f64, max_frequency: f64) -> Self {
        let mut nco = Self {
            phase: 0.0,
            frequency: frequency.clamp(min_frequency, max_frequency),
            min_frequency,
            max_frequency,
            alpha: 0.0,
            beta: 0.0,
        };
        nco.set_loop_bandwidth(0.01);
        nco
    }

    /// Set the normalised loop bandwidth.
    ///
    /// Higher bandwidth locks faster but lets more noise through to the
    /// phase estimate.
    pub fn set_loop_bandwidth(&mut self, bandwidth: f64) {
        let damping = FRAC_1_SQRT_2;
        let omega_n = bandwidth / (damping + 1.0 / (4.0 * damping));
        self.alpha = 2.0 * damping * omega_n;
        self.beta = omega_n * omega_n;
    }

    /// Set the loop gains directly (advanced).
    pub fn set_loop_gains(&mut self, alpha: f64, beta: f64) {
        self.alpha = alpha;
        self.beta = beta;
    }

    /// Current loop gains as `(alpha, beta)`.
    pub fn loop_gains(&self) -> (f64, f64) {
        (self.alpha, self.beta)
    }

    /// Current phase in radians.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Set the phase in radians.
    pub fn set_phase(&mut self, phase: f64) {
        self.phase = wrap_phase(phase);
    }

    /// Current frequency in radians per sample.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Current frequency in Hz.
    pub fn frequency_hz(&self, sample_rate: f64) -> f64 {
        self.frequency * sample_rate / (2.0 * std::f64::consts::PI)
    }

    /// Unit phasor `exp(j·phase)`.
    pub fn phasor(&self) -> Complex<f32> {
        Complex::new(self.phase.cos() as f32, self.phase.sin() as f32)
    }

    /// Advance one sample without correction.
    pub fn step(&mut self) {
        self.phase = wrap_phase(self.phase + self.frequency);
    }

    /// Advance one sample, correcting with a phase error in radians.
    ///
    /// The frequency integrator is updated first, then the phase moves by
    /// the new frequency plus the proportional correction.
    pub fn advance(&mut self, phase_error: f64) {
        self.frequency = (self.frequency + self.beta * phase_error)
            .clamp(self.min_frequency, self.max_frequency);
        self.phase = wrap_phase(self.phase + self.frequency + self.alpha * phase_error);
    }

    /// Reset the phase to 0, keeping the frequency.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}
