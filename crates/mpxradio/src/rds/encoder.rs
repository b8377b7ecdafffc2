//! RDS biphase waveform generator.
//!
//! Each bit is rendered as a pulse-shaped biphase symbol: a positive and a
//! negative impulse half a bit apart, convolved with a root-raised-cosine
//! filter. The shaped symbol spans 7 bit periods on each side of its centre,
//! so consecutive symbols overlap. [`RdsEncoder::push`] overlap-adds the
//! symbol of each new bit into a circular working buffer and hands out the
//! oldest block that can no longer receive contributions.

use mpxdsp::dsp::taps;
use tracing::debug;

use super::RDS_BIT_RATE;
use crate::error::{Error, Result};

/// RDS symbol rate (biphase half-symbols per second)
pub const RDS_SYMBOL_RATE: u32 = 2_375;

/// Bit periods kept on each side of the symbol centre
const WAVEFORM_SPAN: usize = 7;

/// Position of the symbol centre as a fraction of the convolution length
const CENTER_FRACTION: f64 = 0.41326808;

/// Peak scaling so that overlapping symbols do not clip
const WAVEFORM_SCALE: f32 = 2.5;

fn convolve(h: &[f32], x: &[f32]) -> Vec<f32> {
    let mut y = vec![0.0f32; h.len() + x.len() - 1];
    for (i, &hv) in h.iter().enumerate() {
        for (j, &xv) in x.iter().enumerate() {
            y[i + j] += hv * xv;
        }
    }
    y
}

/// Build the shaped waveform of a 0 bit at `sample_rate`.
fn generate_waveform(sample_rate: u32) -> Result<Vec<f32>> {
    if sample_rate == 0 || (sample_rate as u64 * 2) % RDS_SYMBOL_RATE as u64 != 0 {
        return Err(Error::config(format!(
            "RDS encoder rate {} Hz is not a multiple of the RDS bit rate",
            sample_rate
        )));
    }

    let half_bit = (sample_rate as f64 / RDS_BIT_RATE) as usize / 2;
    let mut impulses = vec![0.0f32; WAVEFORM_SPAN * half_bit];
    impulses[half_bit] = 1.0;
    impulses[2 * half_bit] = -1.0;

    let shaping = taps::root_raised_cosine(
        half_bit * 16,
        1.0,
        1.0 / (2.0 * RDS_BIT_RATE),
        sample_rate as f64,
    );
    let shaped = convolve(&impulses, &shaping);

    let offset = (shaped.len() as f64 * CENTER_FRACTION) as usize + 1;
    let span = half_bit * WAVEFORM_SPAN;
    if offset <= span || offset + span >= shaped.len() {
        return Err(Error::config(format!(
            "RDS waveform window does not fit at {} Hz",
            sample_rate
        )));
    }

    Ok(shaped[offset - span..offset + span]
        .iter()
        .map(|v| v / WAVEFORM_SCALE)
        .collect())
}

/// Overlap-add RDS waveform encoder.
///
/// # Example
///
/// ```
/// use mpxradio::rds::RdsEncoder;
///
/// let mut encoder = RdsEncoder::new(190_000).unwrap();
/// let block = encoder.push(1);
/// assert_eq!(block.len(), encoder.samples_per_bit());
///
/// // 44.1 kHz cannot carry a whole number of samples per symbol
/// assert!(RdsEncoder::new(44_100).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RdsEncoder {
    /// Shaped symbol for bit 0 and bit 1
    waveforms: [Vec<f32>; 2],
    samples_per_bit: usize,
    /// Blocks in the working buffer
    working_bits: usize,
    working: Vec<f32>,
    current_bit: usize,
    sample_rate: u32,
}

impl RdsEncoder {
    /// Create an encoder producing samples at `sample_rate` Hz.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] unless `2 × sample_rate` is a multiple of
    /// the 2375 Hz symbol rate.
    pub fn new(sample_rate: u32) -> Result<Self> {
        let zero = generate_waveform(sample_rate)?;
        let one: Vec<f32> = zero.iter().map(|v| -v).collect();

        let filter_size = zero.len();
        let samples_per_bit = filter_size / WAVEFORM_SPAN;
        let bits_per_filter = filter_size / samples_per_bit;
        let working_bits = bits_per_filter + 1;

        debug!(
            "[RDS] encoder at {} Hz: waveform {} samples, {} samples/bit",
            sample_rate, filter_size, samples_per_bit
        );

        Ok(Self {
            waveforms: [zero, one],
            samples_per_bit,
            working_bits,
            working: vec![0.0; working_bits * samples_per_bit],
            current_bit: 0,
            sample_rate,
        })
    }

    /// Samples produced by each call to [`push`](Self::push).
    pub fn samples_per_bit(&self) -> usize {
        self.samples_per_bit
    }

    /// Length of the shaped symbol.
    pub fn filter_size(&self) -> usize {
        self.waveforms[0].len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shaped symbol used for `bit`.
    pub fn waveform(&self, bit: u8) -> &[f32] {
        &self.waveforms[usize::from(bit != 0)]
    }

    /// Clear the working buffer.
    pub fn reset(&mut self) {
        self.working.iter_mut().for_each(|v| *v = 0.0);
        self.current_bit = 0;
    }

    /// Encode one bit and return the next `samples_per_bit` output samples.
    pub fn push(&mut self, bit: u8) -> Vec<f32> {
        let size = self.working.len();
        let spb = self.samples_per_bit;

        let write = self.current_bit * spb;
        for (i, &v) in self.waveforms[usize::from(bit != 0)].iter().enumerate() {
            self.working[(write + i) % size] += v;
        }

        // The block just before the one written to is complete
        let read_bit = (self.current_bit + self.working_bits - 1) % self.working_bits;
        let read = read_bit * spb;
        let block = self.working[read..read + spb].to_vec();
        self.working[read..read + spb].iter_mut().for_each(|v| *v = 0.0);

        self.current_bit = (self.current_bit + 1) % self.working_bits;
        block
    }
}
