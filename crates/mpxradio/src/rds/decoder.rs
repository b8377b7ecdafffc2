//! RDS subcarrier demodulator.
//!
//! Turns the composite signal into the raw RDS bit stream:
//!
//! ```text
//! mpx → complex → ×e^(-j2π·57k·t) → resample 5 kHz → AGC → Costas
//!     → band-pass 0..2375 Hz → Costas @ 1187.5 Hz → real → M&M → slicer
//! ```
//!
//! The first Costas loop removes the 57 kHz carrier phase, the second one
//! turns the biphase symbols into plain BPSK at 1187.5 baud. Bits are not
//! differentially decoded.

use mpxdsp::dsp::{
    DspBlock,
    agc::Agc,
    clock_recovery::{ClockRecovery, binary_slice},
    complex_to_real,
    fir::ComplexBandPass,
    hz_to_rads,
    pll::Costas,
    real_to_complex,
    resampler::RationalResampler,
    rotate::Rotate,
    taps,
};
use num_complex::Complex;
use tracing::debug;

use super::{RDS_BIT_RATE, RDS_SUBCARRIER};
use crate::error::Result;

/// Working rate of the symbol recovery loops in Hz
pub const RDS_DECODE_RATE: f64 = 5_000.0;

/// RDS bit stream decoder.
///
/// # Example
///
/// ```
/// use mpxdsp::dsp::DspBlock;
/// use mpxradio::rds::RdsDecoder;
///
/// let mut decoder = RdsDecoder::new(128_000.0).unwrap();
/// let bits = decoder.process(&vec![0.0f32; 128_000]);
/// assert!(bits.len() > 1_100 && bits.len() < 1_250);
/// ```
pub struct RdsDecoder {
    xlator: Rotate,
    resampler: RationalResampler<Complex<f32>>,
    agc: Agc,
    costas: Costas,
    filter: ComplexBandPass,
    costas2: Costas,
    recovery: ClockRecovery,
}

impl RdsDecoder {
    /// Create a decoder for a composite signal at `sample_rate` Hz.
    ///
    /// # Errors
    ///
    /// Fails if `sample_rate` is not an integer number of Hz or the filters
    /// cannot be designed.
    pub fn new(sample_rate: f64) -> Result<Self> {
        let resampler = RationalResampler::new(sample_rate, RDS_DECODE_RATE)?;
        let filter_taps = taps::band_pass_complex(0.0, 2.0 * RDS_BIT_RATE, 100.0, RDS_DECODE_RATE)?;
        let baud = hz_to_rads(RDS_BIT_RATE, RDS_DECODE_RATE);

        debug!(
            "[RDS] decoder at {} Hz: resampler {}/{} ({} taps/phase), band-pass {} taps",
            sample_rate,
            resampler.interpolation(),
            resampler.decimation(),
            resampler.taps_per_phase(),
            filter_taps.len()
        );

        Ok(Self {
            xlator: Rotate::from_frequency(-RDS_SUBCARRIER, sample_rate),
            resampler,
            agc: Agc::new(1.0, 1e6, 0.1),
            costas: Costas::baseband(0.005),
            filter: ComplexBandPass::new(filter_taps),
            costas2: Costas::new(0.01, baud, baud * 0.9, baud * 1.1),
            recovery: ClockRecovery::new(RDS_DECODE_RATE / RDS_BIT_RATE, 1e-6, 0.01, 0.01),
        })
    }

    /// Current symbol clock frequency estimate in Hz.
    pub fn bit_clock(&self) -> f64 {
        self.costas2.frequency() * RDS_DECODE_RATE / (2.0 * std::f64::consts::PI)
    }
}

impl DspBlock<f32, u8> for RdsDecoder {
    /// Decode a composite block into raw bits (0 or 1).
    fn process(&mut self, mpx: &[f32]) -> Vec<u8> {
        let x = self.xlator.process(&real_to_complex(mpx));
        let x = self.resampler.process(&x);
        let x = self.agc.process(&x);
        let x = self.costas.process(&x);
        let x = self.filter.process(&x);
        let x = self.costas2.process(&x);
        let symbols = self.recovery.process(&complex_to_real(&x));
        binary_slice(&symbols)
    }
}
