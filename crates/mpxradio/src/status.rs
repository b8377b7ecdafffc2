//! Periodic pipeline status.

use std::fmt;

use crate::sink::SinkStatus;

/// Point-in-time view of the pipeline health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// `None` when no MPX sink is attached
    pub mpx_sink: Option<SinkStatus>,
    /// `None` when no audio sink is attached
    pub audio_sink: Option<SinkStatus>,
    pub rds_has_sync: bool,
    pub rds_overruns: u64,
    pub rds_underruns: u64,
    pub captured_dropped_samples: u64,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn sink(status: Option<SinkStatus>) -> String {
            status.map_or_else(|| "none".to_string(), |s| s.to_string())
        }
        write!(
            f,
            "mpx={} audio={} rds_sync={} rds_overruns={} rds_underruns={} dropped={}",
            sink(self.mpx_sink),
            sink(self.audio_sink),
            self.rds_has_sync,
            self.rds_overruns,
            self.rds_underruns,
            self.captured_dropped_samples
        )
    }
}

/// Counts processed samples and fires once per `interval` samples.
#[derive(Debug, Clone)]
pub struct StatusInterval {
    interval: u64,
    counted: u64,
}

impl StatusInterval {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            counted: 0,
        }
    }

    /// Account for `samples` more samples; true when a report is due.
    pub fn tick(&mut self, samples: usize) -> bool {
        self.counted += samples as u64;
        if self.counted >= self.interval {
            self.counted %= self.interval;
            true
        } else {
            false
        }
    }
}
