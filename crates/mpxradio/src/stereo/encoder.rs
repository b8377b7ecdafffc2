//! Stereo composite generator.
//!
//! Rebuilds a composite signal from L+R and L−R, typically the buffers
//! exposed by [`StereoDecoder`](super::StereoDecoder), with a freshly
//! synthesized 19 kHz pilot.

use std::f64::consts::PI;

use mpxdsp::dsp::{DspBlock, fir::RealFir, taps, wrap_phase};
use tracing::debug;

use super::PILOT_FREQUENCY;
use crate::error::Result;
use crate::settings::FilterSettings;

/// Stereo encoder writing `(L+R) + p·sin(φ) + (L−R)·sin(2φ)`.
pub struct StereoEncoder {
    lpr_filter: RealFir,
    lmr_filter: RealFir,
    pilot_level: f32,
    pilot_phase: f64,
    pilot_increment: f64,
}

impl StereoEncoder {
    /// Create a new stereo encoder.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Composite sample rate in Hz
    /// * `pilot_level` - Linear amplitude of the pilot tone
    /// * `audio_filter` - Low-pass applied to both L+R and L−R
    pub fn new(sample_rate: f64, pilot_level: f32, audio_filter: FilterSettings) -> Result<Self> {
        let audio_taps =
            taps::low_pass(audio_filter.cutoff_hz, audio_filter.transition_hz, sample_rate)?;
        debug!(
            "[STEREO-GEN] audio filter {} taps, pilot level {:.4}",
            audio_taps.len(),
            pilot_level
        );

        Ok(Self {
            lpr_filter: RealFir::new(audio_taps.clone()),
            lmr_filter: RealFir::new(audio_taps),
            pilot_level,
            pilot_phase: 0.0,
            pilot_increment: 2.0 * PI * PILOT_FREQUENCY / sample_rate,
        })
    }

    pub fn pilot_level(&self) -> f32 {
        self.pilot_level
    }

    /// Generate a composite block, overwriting `mpx_out`.
    ///
    /// Processes `min(lpr.len(), lmr.len(), mpx_out.len())` samples and
    /// returns that count.
    pub fn process(&mut self, lpr: &[f32], lmr: &[f32], mpx_out: &mut [f32]) -> usize {
        let count = lpr.len().min(lmr.len()).min(mpx_out.len());
        let lpr = self.lpr_filter.process(&lpr[..count]);
        let lmr = self.lmr_filter.process(&lmr[..count]);

        for ((out, &sum), &diff) in mpx_out.iter_mut().zip(&lpr).zip(&lmr) {
            let pilot = self.pilot_phase.sin() as f32;
            let subcarrier = (2.0 * self.pilot_phase).sin() as f32;
            self.pilot_phase = wrap_phase(self.pilot_phase + self.pilot_increment);

            *out = sum + pilot * self.pilot_level + subcarrier * diff;
        }
        count
    }
}
