//! Stateful FIR filters and delay lines.
//!
//! - [`Fir`]: FIR filter with persistent history, optionally decimating
//! - [`Delay`]: Fixed integer-sample delay line
//!
//! Both keep their state across [`DspBlock::process`] calls, so a stream
//! can be processed in arbitrary block sizes with the same result as one
//! long block.
//!
//! # Example
//!
//! ```
//! use mpxdsp::dsp::{DspBlock, fir::Fir, taps};
//!
//! // Composite filter: 61 kHz low-pass, decimate 384 kHz down to 128 kHz
//! let taps = taps::low_pass(61_000.0, 1_500.0, 384_000.0).unwrap();
//! let mut fir: Fir<f32> = Fir::decimating(taps, 3);
//!
//! let out = fir.process(&vec![0.0f32; 3000]);
//! assert_eq!(out.len(), 1000);
//! ```

use std::collections::VecDeque;
use std::ops::{AddAssign, Mul};

use num_complex::Complex;

use super::DspBlock;

/// FIR filter with a ring-buffer history and optional decimation.
///
/// `S` is the sample type and `K` the tap type. The supported pairs are
/// real samples with real taps, complex samples with real taps and complex
/// samples with complex taps.
///
/// The history is stored twice back to back, so that the last `N` samples
/// are always contiguous and the convolution is a plain dot product.
///
/// With a decimation factor `R`, one output is produced for every `R`
/// inputs. The decimation phase is kept across calls: a fresh filter fed a
/// block of `B` samples returns `ceil(B / R)` outputs.
#[derive(Debug, Clone)]
pub struct Fir<S, K = f32> {
    /// Taps in reverse order (newest sample first after reversal)
    reversed: Vec<K>,
    /// Doubled history buffer (2 * taps)
    history: Vec<S>,
    /// Next write position in [0, taps)
    pos: usize,
    decimation: usize,
    /// Input samples left before the next output
    phase: usize,
}

impl<S, K> Fir<S, K>
where
    S: Copy + Default + AddAssign + Mul<K, Output = S>,
    K: Copy,
{
    /// Create a non-decimating FIR filter.
    ///
    /// # Panics
    ///
    /// Panics if `taps` is empty.
    pub fn new(taps: Vec<K>) -> Self {
        Self::decimating(taps, 1)
    }

    /// Create a decimating FIR filter.
    ///
    /// # Arguments
    ///
    /// * `taps` - Filter coefficients, `taps[0]` applied to the newest sample
    /// * `decimation` - Decimation factor (1 = no decimation)
    ///
    /// # Panics
    ///
    /// Panics if `taps` is empty or `decimation` is 0.
    pub fn decimating(taps: Vec<K>, decimation: usize) -> Self {
        assert!(!taps.is_empty(), "Number of taps must be greater than 0");
        assert!(decimation > 0, "Decimation factor must be greater than 0");

        let n = taps.len();
        let mut reversed = taps;
        reversed.reverse();

        Self {
            reversed,
            history: vec![S::default(); 2 * n],
            pos: 0,
            decimation,
            phase: 0,
        }
    }

    /// Push one sample; returns a filtered sample when the decimator fires.
    pub fn push(&mut self, sample: S) -> Option<S> {
        let n = self.reversed.len();
        self.history[self.pos] = sample;
        self.history[self.pos + n] = sample;
        let window_start = self.pos + 1;
        self.pos = (self.pos + 1) % n;

        let fire = self.phase == 0;
        self.phase = (self.phase + 1) % self.decimation;
        if !fire {
            return None;
        }

        let mut acc = S::default();
        for (&x, &h) in self.history[window_start..window_start + n]
            .iter()
            .zip(self.reversed.iter())
        {
            acc += x * h;
        }
        Some(acc)
    }

    /// Number of filter taps.
    pub fn taps(&self) -> usize {
        self.reversed.len()
    }

    /// Decimation factor.
    pub fn decimation(&self) -> usize {
        self.decimation
    }

    /// Group delay in input samples, `(N - 1) / 2`.
    pub fn group_delay(&self) -> usize {
        (self.reversed.len() - 1) / 2
    }

    /// Clear the history and the decimation phase.
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|v| *v = S::default());
        self.pos = 0;
        self.phase = 0;
    }
}

impl<S, K> DspBlock<S> for Fir<S, K>
where
    S: Copy + Default + AddAssign + Mul<K, Output = S>,
    K: Copy,
{
    fn process(&mut self, data: &[S]) -> Vec<S> {
        let mut out = Vec::with_capacity(data.len() / self.decimation + 1);
        for &x in data {
            if let Some(y) = self.push(x) {
                out.push(y);
            }
        }
        out
    }
}

/// Real-valued FIR with real taps.
pub type RealFir = Fir<f32, f32>;

/// Complex-valued FIR with real taps.
pub type ComplexFir = Fir<Complex<f32>, f32>;

/// Complex-valued FIR with complex taps (band-pass around a carrier).
pub type ComplexBandPass = Fir<Complex<f32>, Complex<f32>>;

/// Fixed delay line.
///
/// Outputs `x[n - D]`, with zeros before the start of the stream.
#[derive(Debug, Clone)]
pub struct Delay<T> {
    line: VecDeque<T>,
}

impl<T: Copy + Default> Delay<T> {
    /// Create a delay line of `delay` samples.
    pub fn new(delay: usize) -> Self {
        Self {
            line: std::iter::repeat_n(T::default(), delay).collect(),
        }
    }

    /// Delay in samples.
    pub fn delay(&self) -> usize {
        self.line.len()
    }
}

impl<T: Copy + Default> DspBlock<T> for Delay<T> {
    fn process(&mut self, data: &[T]) -> Vec<T> {
        if self.line.is_empty() {
            return data.to_vec();
        }
        data.iter()
            .map(|&x| {
                self.line.push_back(x);
                self.line.pop_front().unwrap_or_default()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::taps;
    use approx::assert_relative_eq;

    #[test]
    fn test_impulse_response_matches_taps() {
        let coeffs = vec![0.1f32, 0.2, 0.4, 0.2, 0.1];
        let mut fir: Fir<f32> = Fir::new(coeffs.clone());

        let mut input = vec![0.0f32; 10];
        input[0] = 1.0;
        let out = fir.process(&input);

        assert_eq!(out.len(), 10);
        for (i, &c) in coeffs.iter().enumerate() {
            assert_relative_eq!(out[i], c, epsilon = 1e-7);
        }
        assert!(out[5..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_block_size_independence() {
        let coeffs = taps::low_pass(10_000.0, 2_000.0, 48_000.0).unwrap();
        let input: Vec<f32> = (0..1000).map(|i| ((i * 7919) % 97) as f32 / 97.0 - 0.5).collect();

        let mut whole: Fir<f32> = Fir::decimating(coeffs.clone(), 3);
        let expected = whole.process(&input);

        let mut chunked: Fir<f32> = Fir::decimating(coeffs, 3);
        let mut got = Vec::new();
        for chunk in input.chunks(37) {
            got.extend(chunked.process(chunk));
        }

        assert_eq!(expected.len(), got.len());
        for (a, b) in expected.iter().zip(got.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_decimation_output_count() {
        let coeffs = taps::low_pass(61_000.0, 1_500.0, 384_000.0).unwrap();
        let len = coeffs.len();
        for (block, factor) in [(len, 3), (len * 2 + 1, 3), (4096, 2), (4097, 4)] {
            let mut fir: Fir<f32> = Fir::decimating(coeffs.clone(), factor);
            let out = fir.process(&vec![0.5f32; block]);
            let expected = block / factor;
            assert!(
                out.len() == expected || out.len() == expected + 1,
                "block {} / {} gave {}",
                block,
                factor,
                out.len()
            );
        }
    }

    #[test]
    fn test_complex_samples_real_taps_dc_gain() {
        let coeffs = taps::low_pass(125_000.0, 15_000.0, 384_000.0).unwrap();
        let mut fir: Fir<Complex<f32>> = Fir::new(coeffs);
        let out = fir.process(&vec![Complex::new(0.5, -0.25); 400]);
        let last = out[out.len() - 1];
        assert_relative_eq!(last.re, 0.5, epsilon = 1e-4);
        assert_relative_eq!(last.im, -0.25, epsilon = 1e-4);
    }

    #[test]
    fn test_group_delay() {
        let fir: Fir<f32> = Fir::new(vec![0.0; 163]);
        assert_eq!(fir.group_delay(), 81);
        assert_eq!(fir.taps(), 163);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut fir: Fir<f32> = Fir::new(vec![0.5, 0.5]);
        let _ = fir.process(&[1.0, 1.0]);
        fir.reset();
        let out = fir.process(&[0.0]);
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    #[should_panic(expected = "Decimation factor must be greater than 0")]
    fn test_zero_decimation() {
        let _: Fir<f32> = Fir::decimating(vec![1.0], 0);
    }

    #[test]
    fn test_delay_line() {
        let mut delay: Delay<f32> = Delay::new(3);
        let out = delay.process(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 2.0]);
        let out = delay.process(&[6.0]);
        assert_eq!(out, vec![3.0]);
        assert_eq!(delay.delay(), 3);
    }

    #[test]
    fn test_zero_delay_passthrough() {
        let mut delay: Delay<f32> = Delay::new(0);
        assert_eq!(delay.process(&[1.0, 2.0]), vec![1.0, 2.0]);
    }
}
