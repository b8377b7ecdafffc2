//! Output sinks for MPX and audio samples.
//!
//! The pipeline pushes float samples in [-1, 1] into a [`SampleSink`].
//! [`ChannelSink`] hands blocks to a writer thread over a bounded
//! `crossbeam` channel. For live input it drops and counts whatever does not
//! fit; for offline replay it can wait for the writer instead. [`PcmWriter`]
//! is the matching consumer that writes 16-bit little-endian PCM to a file
//! or stdout.

use std::fmt;
use std::io::Write;

use crossbeam::channel::{self, Receiver, SendError, Sender, TrySendError};
use tracing::{debug, warn};

use crate::error::Result;

/// Connection state of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for SinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SinkStatus::Disconnected => "disconnected",
            SinkStatus::Connecting => "connecting",
            SinkStatus::Connected => "connected",
        };
        f.write_str(s)
    }
}

/// Destination for a stream of float samples.
pub trait SampleSink: Send {
    /// Queue samples for output. Must not block indefinitely.
    fn push(&mut self, samples: &[f32]);

    fn status(&self) -> SinkStatus;

    /// Samples discarded because of backpressure or disconnection.
    fn dropped_samples(&self) -> u64;
}

/// Sink forwarding sample blocks over a bounded channel.
///
/// The status is `Connecting` until the first block is accepted and
/// `Disconnected` once the receiving side is gone.
pub struct ChannelSink {
    sender: Sender<Vec<f32>>,
    status: SinkStatus,
    dropped: u64,
    blocking: bool,
}

impl ChannelSink {
    /// Create a sink and the receiver its blocks are delivered to.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of blocks in flight
    pub fn bounded(capacity: usize) -> (Self, Receiver<Vec<f32>>) {
        let (sender, receiver) = channel::bounded(capacity);
        let sink = Self {
            sender,
            status: SinkStatus::Connecting,
            dropped: 0,
            blocking: false,
        };
        (sink, receiver)
    }

    /// Wait for room in the channel instead of dropping.
    ///
    /// Only a disconnected consumer loses samples. The wait is bounded by
    /// the writer's progress, so use this when input is not real time.
    pub fn with_blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    fn disconnected(&mut self, lost: usize) {
        if self.status != SinkStatus::Disconnected {
            warn!("[SINK] consumer disconnected");
        }
        self.status = SinkStatus::Disconnected;
        self.dropped += lost as u64;
    }
}

impl SampleSink for ChannelSink {
    fn push(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        if self.blocking {
            match self.sender.send(samples.to_vec()) {
                Ok(()) => self.status = SinkStatus::Connected,
                Err(SendError(block)) => self.disconnected(block.len()),
            }
            return;
        }
        match self.sender.try_send(samples.to_vec()) {
            Ok(()) => self.status = SinkStatus::Connected,
            Err(TrySendError::Full(block)) => {
                self.dropped += block.len() as u64;
                debug!("[SINK] channel full, dropped {} samples", block.len());
            }
            Err(TrySendError::Disconnected(block)) => self.disconnected(block.len()),
        }
    }

    fn status(&self) -> SinkStatus {
        self.status
    }

    fn dropped_samples(&self) -> u64 {
        self.dropped
    }
}

/// Sink discarding everything it receives.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl SampleSink for NullSink {
    fn push(&mut self, _samples: &[f32]) {}

    fn status(&self) -> SinkStatus {
        SinkStatus::Connected
    }

    fn dropped_samples(&self) -> u64 {
        0
    }
}

/// Convert a float sample in [-1, 1] to signed 16-bit, clipping outside.
pub fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Writer of s16le PCM.
pub struct PcmWriter<W: Write> {
    writer: W,
    written: u64,
    buffer: Vec<u8>,
}

impl<W: Write> PcmWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            buffer: Vec::new(),
        }
    }

    /// Samples written so far.
    pub fn samples_written(&self) -> u64 {
        self.written
    }

    pub fn write_samples(&mut self, samples: &[f32]) -> Result<()> {
        self.buffer.clear();
        self.buffer.reserve(samples.len() * 2);
        for &s in samples {
            self.buffer.extend_from_slice(&to_pcm16(s).to_le_bytes());
        }
        self.writer.write_all(&self.buffer)?;
        self.written += samples.len() as u64;
        Ok(())
    }

    /// Write every block from `receiver` until all senders are gone.
    ///
    /// Returns the number of samples written.
    pub fn run(mut self, receiver: Receiver<Vec<f32>>) -> Result<u64> {
        for block in receiver.iter() {
            self.write_samples(&block)?;
        }
        self.writer.flush()?;
        Ok(self.written)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
