//! Mueller & Müller symbol clock recovery.
//!
//! Recovers one sample per symbol from an oversampled real baseband
//! (BPSK/PAM) signal. The sampling instant is found by linear interpolation
//! between input samples, and the symbol period `ω` is refined by the timing
//! error detector:
//!
//! ```text
//! e[k] = sgn(y[k-1]) · y[k] - sgn(y[k]) · y[k-1]
//! ω   ← clamp(ω + g_ω · e, ω₀(1 ± limit))
//! μ   ← μ + ω + g_μ · e
//! ```
//!
//! Input samples that have not been consumed yet are carried over to the
//! next call, so the output does not depend on the block size.
//!
//! # Example
//!
//! ```
//! use mpxdsp::dsp::{DspBlock, clock_recovery::{ClockRecovery, binary_slice}};
//!
//! // RDS biphase symbols at 5 kHz: 5000 / 1187.5 samples per symbol
//! let mut recov = ClockRecovery::new(5_000.0 / 1_187.5, 1e-6, 0.01, 0.01);
//! let symbols = recov.process(&vec![1.0f32; 1000]);
//! let bits = binary_slice(&symbols);
//! assert!(bits.iter().all(|&b| b == 1));
//! ```

use super::DspBlock;

/// Mueller & Müller clock recovery for real samples.
#[derive(Debug, Clone)]
pub struct ClockRecovery {
    /// Nominal samples per symbol
    omega_mid: f64,
    /// Current samples per symbol estimate
    omega: f64,
    omega_min: f64,
    omega_max: f64,
    omega_gain: f64,
    mu_gain: f64,
    /// Fractional sampling offset in [0, 1)
    mu: f64,
    last_output: f32,
    /// Pending input samples
    buffer: Vec<f32>,
    /// Index in `buffer` of the next sampling instant
    offset: usize,
}

impl ClockRecovery {
    /// Create a new clock recovery block.
    ///
    /// # Arguments
    ///
    /// * `omega` - Nominal samples per symbol
    /// * `omega_gain` - Symbol period loop gain
    /// * `mu_gain` - Sampling phase loop gain
    /// * `omega_relative_limit` - Maximum relative deviation of `ω`
    ///
    /// # Panics
    ///
    /// Panics if `omega` is not greater than 1.
    pub fn new(omega: f64, omega_gain: f64, mu_gain: f64, omega_relative_limit: f64) -> Self {
        assert!(omega > 1.0, "Samples per symbol must be greater than 1");
        Self {
            omega_mid: omega,
            omega,
            omega_min: omega * (1.0 - omega_relative_limit),
            omega_max: omega * (1.0 + omega_relative_limit),
            omega_gain,
            mu_gain,
            mu: 0.0,
            last_output: 0.0,
            buffer: Vec::new(),
            offset: 0,
        }
    }

    /// Current samples per symbol estimate.
    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// Current fractional sampling offset.
    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Number of input samples waiting for the next call.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.omega = self.omega_mid;
        self.mu = 0.0;
        self.last_output = 0.0;
        self.buffer.clear();
        self.offset = 0;
    }
}

fn step(x: f32) -> f32 {
    if x > 0.0 { 1.0 } else { -1.0 }
}

impl DspBlock<f32> for ClockRecovery {
    fn process(&mut self, data: &[f32]) -> Vec<f32> {
        self.buffer.extend_from_slice(data);
        let mut out = Vec::with_capacity((data.len() as f64 / self.omega) as usize + 1);

        while self.offset + 1 < self.buffer.len() {
            let mu = self.mu as f32;
            let sample = self.buffer[self.offset] * (1.0 - mu) + self.buffer[self.offset + 1] * mu;

            let error = (step(self.last_output) * sample - step(sample) * self.last_output)
                .clamp(-1.0, 1.0) as f64;
            self.last_output = sample;

            self.omega = (self.omega + self.omega_gain * error).clamp(self.omega_min, self.omega_max);
            self.mu += self.omega + self.mu_gain * error;
            let advance = self.mu.floor();
            self.offset += advance as usize;
            self.mu -= advance;

            out.push(sample);
        }

        let consumed = self.offset.min(self.buffer.len());
        self.buffer.drain(..consumed);
        self.offset -= consumed;

        out
    }
}

/// Slice soft symbols into bits: 1 when the symbol is positive, else 0.
pub fn binary_slice(symbols: &[f32]) -> Vec<u8> {
    symbols.iter().map(|&s| u8::from(s > 0.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const OMEGA: f64 = 5_000.0 / 1_187.5;

    /// Alternating ±1 symbols, with sampling instants at symbol centres.
    fn alternating(n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| {
                let symbol = ((i as f64 + OMEGA / 2.0) / OMEGA).floor() as usize;
                if symbol % 2 == 0 { 1.0 } else { -1.0 }
            })
            .collect()
    }

    #[test]
    fn test_symbol_rate() {
        let mut recov = ClockRecovery::new(OMEGA, 1e-6, 0.01, 0.01);
        let out = recov.process(&vec![0.5f32; 10_000]);
        let expected = 10_000.0 / OMEGA;
        assert!(
            (out.len() as f64 - expected).abs() < expected * 0.02,
            "got {} symbols, expected about {}",
            out.len(),
            expected
        );
    }

    #[test]
    fn test_alternating_symbols() {
        let mut recov = ClockRecovery::new(OMEGA, 1e-6, 0.01, 0.01);
        let out = recov.process(&alternating(20_000));

        let settled = &out[100..];
        let flips = settled.windows(2).filter(|w| w[0].signum() != w[1].signum()).count();
        assert!(flips as f64 >= 0.95 * (settled.len() - 1) as f64);
        assert!(settled.iter().all(|s| s.abs() > 0.5));
    }

    #[test]
    fn test_block_size_independence() {
        let input = alternating(5_000);

        let mut whole = ClockRecovery::new(OMEGA, 1e-6, 0.01, 0.01);
        let expected = whole.process(&input);

        let mut chunked = ClockRecovery::new(OMEGA, 1e-6, 0.01, 0.01);
        let mut got = Vec::new();
        for chunk in input.chunks(97) {
            got.extend(chunked.process(chunk));
        }

        assert_eq!(expected.len(), got.len());
        for (a, b) in expected.iter().zip(got.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_omega_limits() {
        let mut recov = ClockRecovery::new(OMEGA, 0.5, 0.01, 0.01);
        let _ = recov.process(&alternating(2_000));
        assert!(recov.omega() >= OMEGA * 0.99 - 1e-12);
        assert!(recov.omega() <= OMEGA * 1.01 + 1e-12);
    }

    #[test]
    fn test_binary_slice() {
        assert_eq!(binary_slice(&[0.3, -0.1, 0.0, 2.0]), vec![1, 0, 0, 1]);
    }
}
