//! Sample rate conversion.
//!
//! - [`RationalResampler`]: Polyphase FIR resampler for an exact `L/M` ratio
//!   between two integer sample rates. Used to bring the composite signal
//!   down to the RDS processing rate.
//! - [`StreamResampler`]: Sinc interpolation resampler built on `rubato`,
//!   used to bring a generated waveform up to the composite rate.
//!
//! Both carry unconsumed input across calls, so they can be fed blocks of
//! any size.

use std::ops::{AddAssign, Mul};

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::warn;

use super::taps;
use crate::error::{Error, Result};

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn integer_rate(rate: f64) -> Result<u64> {
    if rate <= 0.0 || rate.fract() != 0.0 {
        return Err(Error::resampler(format!(
            "sample rate {} must be a positive integer",
            rate
        )));
    }
    Ok(rate as u64)
}

/// Polyphase rational resampler.
///
/// The rate ratio is reduced to `L/M` with the greatest common divisor of
/// both rates. An anti-aliasing low-pass is designed at the intermediate
/// rate `in × L` with a cutoff of half the lower rate, then split into `L`
/// polyphase branches so that only the taps contributing to each output are
/// evaluated.
///
/// # Example
///
/// ```
/// use mpxdsp::dsp::{DspBlock, resampler::RationalResampler};
/// use num_complex::Complex;
///
/// let mut resamp: RationalResampler<Complex<f32>> =
///     RationalResampler::new(190_000.0, 5_000.0).unwrap();
/// let out = resamp.process(&vec![Complex::new(1.0, 0.0); 3800]);
/// assert_eq!(out.len(), 100);
/// ```
#[derive(Debug, Clone)]
pub struct RationalResampler<S> {
    interpolation: usize,
    decimation: usize,
    /// `phases[p][j]` is tap `p + j·L` of the prototype filter
    phases: Vec<Vec<f32>>,
    /// Past and pending input samples
    buffer: Vec<S>,
    /// Index in `buffer` of the input sample aligned with the next output
    offset: usize,
    /// Polyphase branch of the next output
    phase: usize,
}

impl<S> RationalResampler<S>
where
    S: Copy + Default + AddAssign + Mul<f32, Output = S>,
{
    /// Create a resampler from `in_rate` to `out_rate`, both in Hz.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resampler`] if a rate is not a positive integer, or
    /// [`Error::FilterDesign`] if the anti-aliasing filter cannot be designed.
    pub fn new(in_rate: f64, out_rate: f64) -> Result<Self> {
        let input = integer_rate(in_rate)?;
        let output = integer_rate(out_rate)?;
        let divisor = gcd(input, output);
        let interpolation = (output / divisor) as usize;
        let decimation = (input / divisor) as usize;

        let prototype = if interpolation == 1 && decimation == 1 {
            vec![1.0]
        } else {
            let bandwidth = in_rate.min(out_rate) / 2.0;
            let mut lp = taps::low_pass(
                bandwidth,
                bandwidth * 0.1,
                in_rate * interpolation as f64,
            )?;
            // Compensate the energy lost to zero stuffing
            lp.iter_mut().for_each(|t| *t *= interpolation as f32);
            lp
        };

        let per_phase = prototype.len().div_ceil(interpolation);
        let phases: Vec<Vec<f32>> = (0..interpolation)
            .map(|p| {
                (0..per_phase)
                    .map(|j| prototype.get(p + j * interpolation).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        Ok(Self {
            interpolation,
            decimation,
            buffer: vec![S::default(); per_phase - 1],
            offset: per_phase - 1,
            phases,
            phase: 0,
        })
    }

    /// Interpolation factor `L`.
    pub fn interpolation(&self) -> usize {
        self.interpolation
    }

    /// Decimation factor `M`.
    pub fn decimation(&self) -> usize {
        self.decimation
    }

    /// Taps per polyphase branch.
    pub fn taps_per_phase(&self) -> usize {
        self.phases[0].len()
    }
}

impl<S> super::DspBlock<S> for RationalResampler<S>
where
    S: Copy + Default + AddAssign + Mul<f32, Output = S>,
{
    fn process(&mut self, data: &[S]) -> Vec<S> {
        self.buffer.extend_from_slice(data);
        let history = self.taps_per_phase() - 1;
        let mut out = Vec::with_capacity(
            data.len() * self.interpolation / self.decimation + 1,
        );

        while self.offset < self.buffer.len() {
            let branch = &self.phases[self.phase];
            let mut acc = S::default();
            for (j, &h) in branch.iter().enumerate() {
                acc += self.buffer[self.offset - j] * h;
            }
            out.push(acc);

            self.phase += self.decimation;
            self.offset += self.phase / self.interpolation;
            self.phase %= self.interpolation;
        }

        let drop = (self.offset - history).min(self.buffer.len());
        self.buffer.drain(..drop);
        self.offset -= drop;

        out
    }
}

/// Streaming sinc resampler for a mono real signal.
///
/// Wraps `rubato::SincFixedIn`, buffering input until a full chunk is
/// available. When both rates are equal, samples pass through untouched.
pub struct StreamResampler {
    resampler: Option<SincFixedIn<f32>>,
    ratio: f64,
    leftover: Vec<f32>,
}

impl StreamResampler {
    /// Create a resampler from `in_rate` to `out_rate`.
    ///
    /// # Arguments
    ///
    /// * `in_rate` - Input sample rate in Hz
    /// * `out_rate` - Output sample rate in Hz
    /// * `chunk_size` - Input frames handed to the sinc interpolator at once
    ///
    /// # Errors
    ///
    /// Returns [`Error::Resampler`] if a rate is not positive or `rubato`
    /// rejects the parameters.
    pub fn new(in_rate: f64, out_rate: f64, chunk_size: usize) -> Result<Self> {
        if in_rate <= 0.0 || out_rate <= 0.0 {
            return Err(Error::resampler(format!(
                "invalid rates {} Hz -> {} Hz",
                in_rate, out_rate
            )));
        }

        let ratio = out_rate / in_rate;
        if ratio == 1.0 {
            return Ok(Self {
                resampler: None,
                ratio,
                leftover: Vec::new(),
            });
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 160,
            window: WindowFunction::BlackmanHarris2,
        };
        let resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, chunk_size, 1)?;

        Ok(Self {
            resampler: Some(resampler),
            ratio,
            leftover: Vec::new(),
        })
    }

    /// Resampling ratio (output rate / input rate).
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// True when input is returned unchanged.
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Number of input samples waiting for a full chunk.
    pub fn leftover_samples(&self) -> usize {
        self.leftover.len()
    }

    /// Resample a block of samples.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return input.to_vec();
        };

        self.leftover.extend_from_slice(input);
        let mut output = Vec::with_capacity((input.len() as f64 * self.ratio) as usize + 1);

        loop {
            let needed = resampler.input_frames_next();
            if self.leftover.len() < needed {
                break;
            }
            let chunk = vec![self.leftover.drain(..needed).collect::<Vec<f32>>()];

            match resampler.process(&chunk, None) {
                Ok(blocks) => output.extend_from_slice(&blocks[0]),
                Err(e) => {
                    warn!("[RESAMPLER] dropping chunk: {}", e);
                    break;
                }
            }
        }

        output
    }
}
