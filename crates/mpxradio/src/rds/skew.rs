//! RDS skew buffer and subcarrier re-insertion.
//!
//! Decoded bits arrive at the pace of the incoming station's RDS clock,
//! while the re-encoder consumes them at the pace of the local sample
//! clock. The two drift apart, so bits go through a FIFO holding up to
//! `max_skew` seconds of data.
//!
//! The FIFO uses hysteresis around half its capacity:
//!
//! ```text
//!             full                          occupancy < C/2
//!   Normal ─────────→ Overflow (drop input) ─────────────────→ Normal
//!   Normal ─────────→ Underflow (emit 0)    ─────────────────→ Normal
//!             empty                         occupancy > C/2
//! ```
//!
//! A fresh buffer starts in `Underflow` so that the encoder waits for half
//! a buffer of data before it starts sending real bits.

use std::f64::consts::PI;
use std::sync::{Arc, Mutex, PoisonError};

use mpxdsp::dsp::{DspBlock, fir::RealFir, resampler::StreamResampler, taps, wrap_phase};
use tracing::{debug, warn};

use super::{RDS_BIT_RATE, RDS_SAMPLE_RATE, RDS_SUBCARRIER, RdsEncoder};
use crate::error::{Error, Result};

/// Cutoff of the low-pass removing an incoming RDS subcarrier (38 kHz + 17.2 kHz)
const STRIP_FILTER_CUTOFF: f64 = 55_200.0;
const STRIP_FILTER_TRANSITION: f64 = 500.0;

/// Synchronisation state of the skew buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkewState {
    /// Waiting for the buffer to fill past half capacity
    Underflow,
    Normal,
    /// Dropping input until the buffer drains below half capacity
    Overflow,
}

/// RDS synchronisation statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RdsStats {
    /// Number of underflow episodes
    pub underruns: u64,
    /// Number of times the buffer filled up
    pub overruns: u64,
    /// True while bits flow through the buffer normally
    pub has_sync: bool,
}

/// Shareable read access to the statistics of an [`RdsSkewBuffer`].
#[derive(Debug, Clone, Default)]
pub struct RdsStatsHandle {
    inner: Arc<Mutex<RdsStats>>,
}

impl RdsStatsHandle {
    /// Copy of the current statistics.
    pub fn snapshot(&self) -> RdsStats {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, add_underruns: u64, add_overruns: u64, has_sync: bool) {
        let mut stats = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        stats.underruns += add_underruns;
        stats.overruns += add_overruns;
        stats.has_sync = has_sync;
    }
}

/// Bit FIFO between the RDS decoder and encoder, with 57 kHz re-insertion.
pub struct RdsSkewBuffer {
    bits: Vec<u8>,
    write: usize,
    read: usize,
    used: usize,
    overflow: bool,
    underflow: bool,
    /// Whether the current underflow episode was already counted
    underrun_counted: bool,
    stats: RdsStatsHandle,

    encoder: RdsEncoder,
    resampler: StreamResampler,
    /// Mixed subcarrier samples waiting to be added to the output
    pending: Vec<f32>,
    pending_read: usize,
    osc_phase: f64,
    osc_increment: f64,
    scale: f32,
    strip_filter: Option<RealFir>,
}

impl RdsSkewBuffer {
    /// Create a skew buffer feeding a composite signal at `output_rate` Hz.
    ///
    /// # Arguments
    ///
    /// * `output_rate` - Composite sample rate in Hz, at most [`RDS_SAMPLE_RATE`]
    /// * `max_skew_seconds` - Buffer length in seconds of RDS data
    /// * `scale` - Linear amplitude of the regenerated subcarrier
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the buffer would hold fewer than two
    /// bits or the output rate is above the generator rate.
    pub fn new(output_rate: f64, max_skew_seconds: f64, scale: f32) -> Result<Self> {
        let capacity = (RDS_BIT_RATE * max_skew_seconds) as usize;
        if capacity < 2 {
            return Err(Error::config(format!(
                "RDS max skew {} s is too short",
                max_skew_seconds
            )));
        }
        if output_rate > RDS_SAMPLE_RATE {
            return Err(Error::config(format!(
                "output rate {} Hz above RDS generator rate {} Hz",
                output_rate, RDS_SAMPLE_RATE
            )));
        }

        let encoder = RdsEncoder::new(RDS_SAMPLE_RATE as u32)?;
        let resampler =
            StreamResampler::new(RDS_SAMPLE_RATE, output_rate, encoder.samples_per_bit())?;

        let strip_filter = if STRIP_FILTER_CUTOFF < output_rate / 2.0 {
            let taps = taps::low_pass(STRIP_FILTER_CUTOFF, STRIP_FILTER_TRANSITION, output_rate)?;
            debug!("[RDS] re-encode strip filter {} taps", taps.len());
            Some(RealFir::new(taps))
        } else {
            None
        };

        debug!(
            "[RDS] skew buffer {} bits ({} s), output {} Hz",
            capacity, max_skew_seconds, output_rate
        );

        Ok(Self {
            bits: vec![0; capacity],
            write: 0,
            read: 0,
            used: 0,
            overflow: false,
            underflow: true,
            underrun_counted: false,
            stats: RdsStatsHandle::default(),
            encoder,
            resampler,
            pending: Vec::new(),
            pending_read: 0,
            osc_phase: 0.0,
            osc_increment: 2.0 * PI * RDS_SUBCARRIER / output_rate,
            scale,
            strip_filter,
        })
    }

    /// Buffer capacity in bits.
    pub fn capacity(&self) -> usize {
        self.bits.len()
    }

    /// Bits currently buffered.
    pub fn occupancy(&self) -> usize {
        self.used
    }

    pub fn state(&self) -> SkewState {
        if self.overflow {
            SkewState::Overflow
        } else if self.underflow {
            SkewState::Underflow
        } else {
            SkewState::Normal
        }
    }

    pub fn has_sync(&self) -> bool {
        !self.overflow && !self.underflow
    }

    /// Copy of the current statistics.
    pub fn stats(&self) -> RdsStats {
        self.stats.snapshot()
    }

    /// Handle for reading the statistics from another thread.
    pub fn stats_handle(&self) -> RdsStatsHandle {
        self.stats.clone()
    }

    fn update_stats(&self, add_underruns: u64, add_overruns: u64) {
        self.stats.update(add_underruns, add_overruns, self.has_sync());
    }

    /// Queue decoded bits.
    ///
    /// While overflowing, input is dropped until occupancy falls below half
    /// capacity. Filling the buffer enters the overflow state and drops the
    /// rest of `bits`.
    pub fn push_in(&mut self, bits: &[u8]) {
        if self.overflow {
            if self.used >= self.capacity() / 2 {
                return;
            }
            self.overflow = false;
            self.update_stats(0, 0);
            debug!("[RDS] skew buffer overflow cleared at {} bits", self.used);
        }

        let capacity = self.capacity();
        for &bit in bits {
            self.bits[self.write] = bit;
            self.write = (self.write + 1) % capacity;
            self.used += 1;

            if self.used == capacity {
                self.overflow = true;
                self.update_stats(0, 1);
                warn!("[RDS] skew buffer overrun, dropping input");
                return;
            }
        }
    }

    /// Take the next bit for the encoder.
    ///
    /// Returns 0 while underflowing. Running out of bits enters the
    /// underflow state.
    pub fn pop_out(&mut self) -> u8 {
        if self.underflow {
            if self.used <= self.capacity() / 2 {
                if !self.underrun_counted {
                    self.underrun_counted = true;
                    self.update_stats(1, 0);
                }
                return 0;
            }
            self.underflow = false;
            self.underrun_counted = false;
            self.update_stats(0, 0);
            debug!("[RDS] skew buffer underflow cleared at {} bits", self.used);
        }

        if self.used == 0 {
            self.underflow = true;
            self.underrun_counted = true;
            self.update_stats(1, 0);
            warn!("[RDS] skew buffer underrun");
            return 0;
        }

        let bit = self.bits[self.read];
        self.read = (self.read + 1) % self.capacity();
        self.used -= 1;
        bit
    }

    /// Add the regenerated RDS subcarrier onto `mpx_out`.
    ///
    /// With `filter` set, `mpx_out` is first overwritten with `mpx_in`
    /// low-passed below the RDS band, which removes an incoming subcarrier.
    /// Otherwise `mpx_in` is not used and the subcarrier is added to the
    /// current content of `mpx_out`.
    pub fn process(&mut self, mpx_in: &[f32], mpx_out: &mut [f32], filter: bool) {
        if filter {
            let n = mpx_in.len().min(mpx_out.len());
            match self.strip_filter.as_mut() {
                Some(strip) => {
                    let stripped = strip.process(&mpx_in[..n]);
                    mpx_out[..n].copy_from_slice(&stripped);
                }
                None => mpx_out[..n].copy_from_slice(&mpx_in[..n]),
            }
        }

        let count = mpx_out.len();
        let mut written = 0;
        while written < count {
            let available = (self.pending.len() - self.pending_read).min(count - written);
            for (out, &rds) in mpx_out[written..written + available]
                .iter_mut()
                .zip(&self.pending[self.pending_read..self.pending_read + available])
            {
                *out += rds;
            }
            written += available;
            self.pending_read += available;

            if self.pending_read == self.pending.len() {
                let bit = self.pop_out();
                let block = self.encoder.push(bit);
                let mut block = self.resampler.process(&block);
                for sample in block.iter_mut() {
                    *sample *= self.osc_phase.sin() as f32 * self.scale;
                    self.osc_phase = wrap_phase(self.osc_phase + self.osc_increment);
                }
                self.pending = block;
                self.pending_read = 0;
            }
        }
    }
}
