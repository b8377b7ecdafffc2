//! Pilot-locked stereo decoder.
//!
//! The decoder isolates the 19 kHz pilot with a complex band-pass filter,
//! locks a PLL onto it and squares the conjugated PLL output to get a
//! 38 kHz local oscillator. The raw composite is delayed by the band-pass
//! group delay plus the PLL latency so that L+R and the demodulated L−R
//! line up sample for sample.
//!
//! ```text
//! mpx ──┬──────────────────── delay ──┬─────────── L+R ──┐
//!       │                             │                  ├→ L, R → LPF ↓R → deemphasis
//!       └→ band-pass 19k → PLL → conj²┴→ ×2·Im ── L−R ───┘
//! ```

use mpxdsp::dsp::{
    DspBlock, hz_to_rads,
    fir::{ComplexBandPass, Delay, RealFir},
    pll::Pll,
    real_to_complex, taps,
};
use num_complex::Complex;
use tracing::debug;

use super::{PILOT_CAPTURE_RANGE, PILOT_FREQUENCY};
use crate::error::Result;
use crate::fm::Deemphasis;
use crate::settings::FilterSettings;

/// Transition width of the pilot band-pass filter in Hz
const PILOT_FILTER_TRANSITION: f64 = 3_000.0;

/// Stereo decoder producing interleaved left/right audio.
///
/// # Example
///
/// ```
/// use mpxdsp::dsp::DspBlock;
/// use mpxradio::settings::FilterSettings;
/// use mpxradio::stereo::StereoDecoder;
///
/// let mut decoder =
///     StereoDecoder::new(128_000.0, 2, FilterSettings::new(15_000.0, 4_000.0), 75.0).unwrap();
/// let audio = decoder.process(&vec![0.0f32; 4096]);
/// assert_eq!(audio.len(), 2 * 2048);
/// ```
pub struct StereoDecoder {
    pilot_filter: ComplexBandPass,
    pilot_pll: Pll,
    delay: Delay<f32>,
    audio_filter_l: RealFir,
    audio_filter_r: RealFir,
    deemphasis_l: Deemphasis,
    deemphasis_r: Deemphasis,
    /// Delayed composite (L+R plus everything else) of the last block
    lpr: Vec<f32>,
    /// Demodulated L−R of the last block
    lmr: Vec<f32>,
    sample_rate: f64,
    audio_decimation: usize,
}

impl StereoDecoder {
    /// Create a new stereo decoder.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Composite sample rate in Hz
    /// * `audio_decimation` - Composite to audio rate ratio
    /// * `audio_filter` - Audio low-pass cutoff and transition
    /// * `deemphasis_us` - Deemphasis time constant in µs (0 disables)
    ///
    /// # Errors
    ///
    /// Fails if the pilot or audio filter cannot be designed at this rate.
    pub fn new(
        sample_rate: f64,
        audio_decimation: usize,
        audio_filter: FilterSettings,
        deemphasis_us: f64,
    ) -> Result<Self> {
        let pilot_taps = taps::band_pass_complex(
            PILOT_FREQUENCY - PILOT_CAPTURE_RANGE,
            PILOT_FREQUENCY + PILOT_CAPTURE_RANGE,
            PILOT_FILTER_TRANSITION,
            sample_rate,
        )?;
        let delay = (pilot_taps.len() - 1) / 2 + 1;
        let audio_taps =
            taps::low_pass(audio_filter.cutoff_hz, audio_filter.transition_hz, sample_rate)?;
        let audio_rate = sample_rate / audio_decimation as f64;

        debug!(
            "[STEREO] pilot filter {} taps (delay {}), audio filter {} taps, audio rate {} Hz",
            pilot_taps.len(),
            delay,
            audio_taps.len(),
            audio_rate
        );

        Ok(Self {
            pilot_filter: ComplexBandPass::new(pilot_taps),
            pilot_pll: Pll::new(
                25_000.0 / sample_rate,
                hz_to_rads(PILOT_FREQUENCY, sample_rate),
                hz_to_rads(PILOT_FREQUENCY - PILOT_CAPTURE_RANGE, sample_rate),
                hz_to_rads(PILOT_FREQUENCY + PILOT_CAPTURE_RANGE, sample_rate),
            ),
            delay: Delay::new(delay),
            audio_filter_l: RealFir::decimating(audio_taps.clone(), audio_decimation),
            audio_filter_r: RealFir::decimating(audio_taps, audio_decimation),
            deemphasis_l: Deemphasis::new(audio_rate, deemphasis_us),
            deemphasis_r: Deemphasis::new(audio_rate, deemphasis_us),
            lpr: Vec::new(),
            lmr: Vec::new(),
            sample_rate,
            audio_decimation,
        })
    }

    /// L+R of the last processed block, at the composite rate.
    ///
    /// This is the delayed composite itself, still carrying the pilot and
    /// subcarriers; the stereo encoder low-passes it before use.
    pub fn lpr(&self) -> &[f32] {
        &self.lpr
    }

    /// L−R of the last processed block, at the composite rate.
    pub fn lmr(&self) -> &[f32] {
        &self.lmr
    }

    /// Samples by which L+R is delayed to match the recovered pilot.
    pub fn delay(&self) -> usize {
        self.delay.delay()
    }

    /// Current pilot frequency estimate in Hz.
    pub fn pilot_frequency(&self) -> f64 {
        self.pilot_pll.frequency() * self.sample_rate / (2.0 * std::f64::consts::PI)
    }

    pub fn audio_rate(&self) -> f64 {
        self.sample_rate / self.audio_decimation as f64
    }
}

impl DspBlock<f32> for StereoDecoder {
    /// Decode a composite block into interleaved `[L, R, L, R, ...]` audio.
    fn process(&mut self, mpx: &[f32]) -> Vec<f32> {
        let pilot = self.pilot_filter.process(&real_to_complex(mpx));
        let pilot = self.pilot_pll.process(&pilot);
        self.lpr = self.delay.process(mpx);

        // Pilot locks at φ − π/2, so Im(conj(p)²) = sin(2φ)
        self.lmr = self
            .lpr
            .iter()
            .zip(pilot.iter())
            .map(|(&x, p)| {
                let lo: Complex<f32> = p.conj() * p.conj();
                2.0 * x * lo.im
            })
            .collect();

        let left: Vec<f32> = self.lpr.iter().zip(&self.lmr).map(|(s, d)| s + d).collect();
        let right: Vec<f32> = self.lpr.iter().zip(&self.lmr).map(|(s, d)| s - d).collect();

        let left = self.deemphasis_l.process(&self.audio_filter_l.process(&left));
        let right = self.deemphasis_r.process(&self.audio_filter_r.process(&right));

        let mut out = Vec::with_capacity(left.len() * 2);
        for (l, r) in left.into_iter().zip(right) {
            out.push(l);
            out.push(r);
        }
        out
    }
}
