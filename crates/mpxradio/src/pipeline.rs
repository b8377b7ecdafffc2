//! Per-block radio processing chain.
//!
//! ```text
//! queue → baseband LPF → FM demod → composite LPF ↓D ─┬→ RDS decoder → skew buffer
//!                                                     ├→ stereo decoder → audio sink
//!                                                     └→ MPX working buffer
//!                                                          ← stereo encoder (overwrite)
//!                                                          ← RDS subcarrier (additive)
//!                                                          → MPX sink
//! ```
//!
//! Every stage runs on the calling thread. Only the RDS statistics, the
//! capture drop counter and the sink states are visible to other threads.

use mpxdsp::dsp::{
    DspBlock, db_to_linear,
    fir::{ComplexFir, RealFir},
    taps,
};
use num_complex::Complex;
use tracing::{debug, info};

use crate::capture::SampleQueue;
use crate::error::Result;
use crate::fm::FmDemodulator;
use crate::rds::{RdsDecoder, RdsSkewBuffer, RdsStats, RdsStatsHandle};
use crate::settings::RadioSettings;
use crate::sink::SampleSink;
use crate::status::{StatusInterval, StatusSnapshot};
use crate::stereo::{StereoDecoder, StereoEncoder};

/// RDS decode and re-encode stages, present together or not at all.
struct RdsChain {
    decoder: RdsDecoder,
    skew: RdsSkewBuffer,
}

/// FM MPX processing pipeline.
///
/// # Example
///
/// ```
/// use mpxradio::capture::SampleQueue;
/// use mpxradio::pipeline::RadioPipeline;
/// use mpxradio::settings::RadioSettings;
/// use num_complex::Complex;
///
/// let settings = RadioSettings::default();
/// let queue = SampleQueue::new(4 * settings.block_size);
/// let mut pipeline = RadioPipeline::new(settings, queue.clone(), None, None).unwrap();
///
/// queue.write(&vec![Complex::new(1.0, 0.0); 3_000]);
/// queue.close();
/// while pipeline.work().unwrap() {}
/// ```
pub struct RadioPipeline {
    settings: RadioSettings,
    queue: SampleQueue,
    input: Vec<Complex<f32>>,

    baseband_filter: ComplexFir,
    demodulator: FmDemodulator,
    composite_filter: RealFir,
    stereo_decoder: Option<StereoDecoder>,
    stereo_encoder: Option<StereoEncoder>,
    rds: Option<RdsChain>,
    rds_stats: Option<RdsStatsHandle>,

    /// MPX block sent to the MPX sink
    mpx: Vec<f32>,
    /// Interleaved stereo block sent to the audio sink
    audio: Vec<f32>,
    mpx_sink: Option<Box<dyn SampleSink>>,
    audio_sink: Option<Box<dyn SampleSink>>,

    status_interval: Option<StatusInterval>,
    last_status: Option<StatusSnapshot>,
}

impl RadioPipeline {
    /// Build the pipeline.
    ///
    /// # Arguments
    ///
    /// * `settings` - Rates, filters and feature switches
    /// * `queue` - Capture queue the pipeline reads from
    /// * `mpx_sink` - Destination of the composite signal
    /// * `audio_sink` - Destination of the interleaved stereo audio
    ///
    /// # Errors
    ///
    /// Fails on inconsistent settings or when a stage cannot be built at
    /// the configured rates.
    pub fn new(
        settings: RadioSettings,
        queue: SampleQueue,
        mpx_sink: Option<Box<dyn SampleSink>>,
        audio_sink: Option<Box<dyn SampleSink>>,
    ) -> Result<Self> {
        settings.validate()?;

        let capture_rate = settings.capture_rate as f64;
        let composite_rate = settings.composite_rate();

        let baseband_taps = taps::low_pass(
            settings.baseband_filter.cutoff_hz,
            settings.baseband_filter.transition_hz,
            capture_rate,
        )?;
        let composite_taps = taps::low_pass(
            settings.composite_filter.cutoff_hz,
            settings.composite_filter.transition_hz,
            capture_rate,
        )?;
        debug!(
            "[PIPELINE] capture {} Hz, composite {} Hz, audio {} Hz",
            capture_rate,
            composite_rate,
            settings.audio_rate()
        );
        debug!(
            "[PIPELINE] baseband filter {} taps, composite filter {} taps (decimation {})",
            baseband_taps.len(),
            composite_taps.len(),
            settings.decimation
        );

        let stereo_decoder = if audio_sink.is_some() || settings.stereo_generator_enable {
            Some(StereoDecoder::new(
                composite_rate,
                settings.audio_decimation as usize,
                settings.audio_filter,
                settings.deemphasis_us,
            )?)
        } else {
            None
        };

        let stereo_encoder = if settings.stereo_generator_enable {
            Some(StereoEncoder::new(
                composite_rate,
                db_to_linear(settings.stereo_generator_level_db),
                settings.audio_filter,
            )?)
        } else {
            None
        };

        let rds = if settings.rds_enable {
            Some(RdsChain {
                decoder: RdsDecoder::new(composite_rate)?,
                skew: RdsSkewBuffer::new(
                    composite_rate,
                    settings.rds_max_skew_seconds,
                    db_to_linear(settings.rds_level_db),
                )?,
            })
        } else {
            None
        };
        let rds_stats = rds.as_ref().map(|chain| chain.skew.stats_handle());

        let status_interval = settings
            .status_reporting_enable
            .then(|| StatusInterval::new(settings.capture_rate as u64));

        Ok(Self {
            input: vec![Complex::default(); settings.block_size],
            baseband_filter: ComplexFir::new(baseband_taps),
            demodulator: FmDemodulator::new(capture_rate, settings.fm_deviation_hz),
            composite_filter: RealFir::decimating(composite_taps, settings.decimation as usize),
            stereo_decoder,
            stereo_encoder,
            rds,
            rds_stats,
            mpx: Vec::new(),
            audio: Vec::new(),
            mpx_sink,
            audio_sink,
            status_interval,
            last_status: None,
            settings,
            queue,
        })
    }

    pub fn settings(&self) -> &RadioSettings {
        &self.settings
    }

    /// Composite sample rate in Hz.
    pub fn composite_rate(&self) -> f64 {
        self.settings.composite_rate()
    }

    /// Audio sample rate in Hz.
    pub fn audio_rate(&self) -> f64 {
        self.settings.audio_rate()
    }

    /// RDS statistics, if RDS is enabled.
    pub fn rds_stats(&self) -> Option<RdsStats> {
        self.rds_stats.as_ref().map(RdsStatsHandle::snapshot)
    }

    /// Handle for reading RDS statistics from another thread.
    pub fn rds_stats_handle(&self) -> Option<RdsStatsHandle> {
        self.rds_stats.clone()
    }

    /// MPX block produced by the last call to [`work`](Self::work).
    pub fn last_mpx(&self) -> &[f32] {
        &self.mpx
    }

    /// Interleaved audio produced by the last call to [`work`](Self::work).
    pub fn last_audio(&self) -> &[f32] {
        &self.audio
    }

    /// Current status.
    pub fn status(&self) -> StatusSnapshot {
        let rds = self.rds_stats().unwrap_or_default();
        StatusSnapshot {
            mpx_sink: self.mpx_sink.as_ref().map(|s| s.status()),
            audio_sink: self.audio_sink.as_ref().map(|s| s.status()),
            rds_has_sync: rds.has_sync,
            rds_overruns: rds.overruns,
            rds_underruns: rds.underruns,
            captured_dropped_samples: self.queue.dropped_samples(),
        }
    }

    /// Output samples the MPX and audio sinks have discarded so far.
    pub fn sink_dropped_samples(&self) -> u64 {
        self.mpx_sink
            .iter()
            .chain(self.audio_sink.iter())
            .map(|s| s.dropped_samples())
            .sum()
    }

    /// Last periodic status report, if status reporting is enabled.
    pub fn last_status(&self) -> Option<StatusSnapshot> {
        self.last_status
    }

    /// Process one block from the capture queue.
    ///
    /// Blocks until samples are available. Returns `Ok(false)` once the
    /// queue is closed and drained.
    pub fn work(&mut self) -> Result<bool> {
        let count = self.queue.read(&mut self.input);
        if count == 0 {
            debug!("[PIPELINE] end of stream");
            return Ok(false);
        }

        let iq = self.baseband_filter.process(&self.input[..count]);
        let demodulated = self.demodulator.process(&iq);
        let composite = self.composite_filter.process(&demodulated);

        if let Some(rds) = self.rds.as_mut() {
            let bits = rds.decoder.process(&composite);
            rds.skew.push_in(&bits);
        }

        self.mpx.clear();
        self.mpx.extend_from_slice(&composite);

        self.audio.clear();
        if let Some(decoder) = self.stereo_decoder.as_mut() {
            self.audio = decoder.process(&composite);
            if let Some(encoder) = self.stereo_encoder.as_mut() {
                encoder.process(decoder.lpr(), decoder.lmr(), &mut self.mpx);
            }
        }

        if let Some(rds) = self.rds.as_mut() {
            // A regenerated composite carries no RDS to strip
            let strip = self.stereo_encoder.is_none();
            rds.skew.process(&composite, &mut self.mpx, strip);
        }

        if let Some(sink) = self.mpx_sink.as_mut() {
            sink.push(&self.mpx);
        }
        if let Some(sink) = self.audio_sink.as_mut() {
            sink.push(&self.audio);
        }

        let report = self
            .status_interval
            .as_mut()
            .is_some_and(|interval| interval.tick(count));
        if report {
            let status = self.status();
            info!("[STATUS] {}", status);
            self.last_status = Some(status);
        }

        Ok(true)
    }
}
