//! Capture input: IQ sample sources and the blocking sample queue.
//!
//! A [`CaptureDevice`] runs on its own thread and writes complex baseband
//! samples into a [`SampleQueue`]. The pipeline thread reads from the same
//! queue. Writes never block: when the queue is full the device counts the
//! rejected samples as dropped and moves on.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use num_complex::Complex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/**
 * I/Q Data Format
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IqFormat {
    /// Complex unsigned 8-bit (Cu8)
    Cu8,
    /// Complex signed 8-bit (Cs8)
    Cs8,
    /// Complex signed 16-bit little-endian (Cs16)
    Cs16,
    /// Complex 32-bit little-endian float (Cf32)
    Cf32,
}

impl IqFormat {
    /// Size of one complex sample in bytes.
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            IqFormat::Cu8 | IqFormat::Cs8 => 2,
            IqFormat::Cs16 => 4,
            IqFormat::Cf32 => 8,
        }
    }
}

impl FromStr for IqFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cu8" => Ok(IqFormat::Cu8),
            "cs8" => Ok(IqFormat::Cs8),
            "cs16" => Ok(IqFormat::Cs16),
            "cf32" => Ok(IqFormat::Cf32),
            other => Err(Error::config(format!("unknown IQ format '{}'", other))),
        }
    }
}

/// Convert raw interleaved IQ bytes into complex samples.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn convert_bytes_to_complex(format: IqFormat, buffer: &[u8]) -> Vec<Complex<f32>> {
    match format {
        IqFormat::Cu8 => buffer
            .chunks_exact(2)
            .map(|c| Complex::new((c[0] as f32 - 127.5) / 128.0, (c[1] as f32 - 127.5) / 128.0))
            .collect(),
        IqFormat::Cs8 => buffer
            .chunks_exact(2)
            .map(|c| Complex::new((c[0] as i8) as f32 / 128.0, (c[1] as i8) as f32 / 128.0))
            .collect(),
        IqFormat::Cs16 => buffer
            .chunks_exact(4)
            .map(|c| {
                Complex::new(
                    i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0,
                    i16::from_le_bytes([c[2], c[3]]) as f32 / 32768.0,
                )
            })
            .collect(),
        IqFormat::Cf32 => buffer
            .chunks_exact(8)
            .map(|c| {
                Complex::new(
                    f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                    f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                )
            })
            .collect(),
    }
}

#[derive(Debug)]
struct QueueState {
    samples: VecDeque<Complex<f32>>,
    capacity: usize,
    closed: bool,
    /// Samples rejected by `write` since creation
    dropped: u64,
}

/// Bounded FIFO of complex samples shared between a capture thread and
/// the pipeline thread.
///
/// Cloning the queue yields another handle on the same buffer.
#[derive(Debug, Clone)]
pub struct SampleQueue {
    inner: Arc<(Mutex<QueueState>, Condvar)>,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(QueueState {
                    samples: VecDeque::with_capacity(capacity),
                    capacity,
                    closed: false,
                    dropped: 0,
                }),
                Condvar::new(),
            )),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append as many samples as fit and return how many were accepted.
    ///
    /// Never blocks. A closed queue accepts nothing.
    pub fn write(&self, samples: &[Complex<f32>]) -> usize {
        let mut state = self.state();
        if state.closed {
            return 0;
        }
        let free = state.capacity - state.samples.len();
        let accepted = free.min(samples.len());
        state.samples.extend(&samples[..accepted]);
        state.dropped += (samples.len() - accepted) as u64;
        drop(state);

        if accepted > 0 {
            self.inner.1.notify_all();
        }
        accepted
    }

    /// Append all samples, waiting for readers to make room.
    ///
    /// Returns early with the count written so far if the queue is closed.
    pub fn write_all(&self, samples: &[Complex<f32>]) -> usize {
        let mut written = 0;
        let mut state = self.state();
        while written < samples.len() {
            while state.samples.len() == state.capacity && !state.closed {
                state = self
                    .inner
                    .1
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if state.closed {
                break;
            }
            let free = state.capacity - state.samples.len();
            let count = free.min(samples.len() - written);
            state.samples.extend(&samples[written..written + count]);
            written += count;
            self.inner.1.notify_all();
        }
        written
    }

    /// Move up to `buffer.len()` samples into `buffer`.
    ///
    /// Blocks until at least one sample is available. Returns 0 only once
    /// the queue is closed and drained.
    pub fn read(&self, buffer: &mut [Complex<f32>]) -> usize {
        if buffer.is_empty() {
            return 0;
        }
        let mut state = self.state();
        while state.samples.is_empty() && !state.closed {
            state = self
                .inner
                .1
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let count = state.samples.len().min(buffer.len());
        for (slot, sample) in buffer.iter_mut().zip(state.samples.drain(..count)) {
            *slot = sample;
        }
        drop(state);

        // Wake up a writer waiting for room
        if count > 0 {
            self.inner.1.notify_all();
        }
        count
    }

    /// Mark the end of the stream and wake up blocked readers.
    pub fn close(&self) {
        self.state().closed = true;
        self.inner.1.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn len(&self) -> usize {
        self.state().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.state().capacity
    }

    /// Samples rejected by [`write`](Self::write) because the queue was
    /// full. Not cleared by [`reset`](Self::reset).
    pub fn dropped_samples(&self) -> u64 {
        self.state().dropped
    }

    /// Discard queued samples and reopen the queue.
    pub fn reset(&self) {
        let mut state = self.state();
        state.samples.clear();
        state.closed = false;
    }
}

/// Source of complex baseband samples running on its own thread.
pub trait CaptureDevice: Send {
    /// Start streaming into `queue`.
    fn start(&mut self, queue: SampleQueue) -> Result<()>;

    /// Samples lost because the queue was full. Monotonic.
    fn dropped_samples(&self) -> u64;
}

/// Where an [`IqFileDevice`] reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IqInput {
    File(PathBuf),
    Stdin,
}

impl FromStr for IqInput {
    type Err = Error;

    /// `-` selects standard input, anything else is a file path.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" => Err(Error::config("empty input path")),
            "-" => Ok(IqInput::Stdin),
            path => Ok(IqInput::File(PathBuf::from(path))),
        }
    }
}

/// Capture device streaming a recorded IQ file (or stdin).
///
/// By default the reader thread waits for room in the queue, so a
/// recording is replayed without loss as fast as the pipeline consumes it.
/// With real-time pacing enabled it behaves like a radio front end instead:
/// samples are delivered at `sample_rate` and whatever the queue cannot
/// take is dropped and counted by the queue.
pub struct IqFileDevice {
    input: IqInput,
    format: IqFormat,
    sample_rate: u32,
    chunk_size: usize,
    realtime: bool,
    queue: Option<SampleQueue>,
    handle: Option<JoinHandle<()>>,
}

impl IqFileDevice {
    pub fn new(input: IqInput, format: IqFormat, sample_rate: u32, chunk_size: usize) -> Self {
        Self {
            input,
            format,
            sample_rate,
            chunk_size: chunk_size.max(1),
            realtime: false,
            queue: None,
            handle: None,
        }
    }

    /// Pace the reader to the capture sample rate.
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Wait for the reader thread to reach the end of the input.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("[CAPTURE] reader thread panicked");
            }
        }
    }

    fn open(&self) -> Result<Box<dyn Read + Send>> {
        match &self.input {
            IqInput::File(path) => {
                let file = File::open(path)?;
                Ok(Box::new(BufReader::new(file)))
            }
            IqInput::Stdin => Ok(Box::new(BufReader::new(std::io::stdin()))),
        }
    }
}

/// Fill `buffer` as far as possible, stopping early only at end of input.
fn read_full<R: Read + ?Sized>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl CaptureDevice for IqFileDevice {
    fn start(&mut self, queue: SampleQueue) -> Result<()> {
        if self.handle.is_some() {
            return Err(Error::config("capture device already started"));
        }
        let mut reader = self.open()?;
        let format = self.format;
        let chunk_bytes = self.chunk_size * format.bytes_per_sample();
        let sample_rate = self.sample_rate as f64;
        let realtime = self.realtime && sample_rate > 0.0;
        self.queue = Some(queue.clone());

        debug!(
            "[CAPTURE] reading {:?} as {:?}, {} samples per read, realtime {}",
            self.input, format, self.chunk_size, realtime
        );

        let handle = std::thread::Builder::new()
            .name("iq-capture".into())
            .spawn(move || {
                let mut buffer = vec![0u8; chunk_bytes];
                let started = Instant::now();
                let mut total: u64 = 0;

                loop {
                    let filled = match read_full(reader.as_mut(), &mut buffer) {
                        Ok(n) => n,
                        Err(e) => {
                            warn!("[CAPTURE] read error: {}", e);
                            break;
                        }
                    };
                    let samples = convert_bytes_to_complex(format, &buffer[..filled]);
                    if samples.is_empty() {
                        break;
                    }

                    let accepted = if realtime {
                        queue.write(&samples)
                    } else {
                        queue.write_all(&samples)
                    };
                    if queue.is_closed() && accepted < samples.len() {
                        debug!("[CAPTURE] queue closed by consumer");
                        break;
                    }
                    if accepted < samples.len() {
                        debug!(
                            "[CAPTURE] queue full, dropped {} samples",
                            samples.len() - accepted
                        );
                    }
                    total += samples.len() as u64;

                    if realtime {
                        let due = Duration::from_secs_f64(total as f64 / sample_rate);
                        if let Some(wait) = due.checked_sub(started.elapsed()) {
                            std::thread::sleep(wait);
                        }
                    }

                    if filled < buffer.len() {
                        break;
                    }
                }

                info!("[CAPTURE] end of input after {} samples", total);
                queue.close();
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    fn dropped_samples(&self) -> u64 {
        self.queue.as_ref().map_or(0, SampleQueue::dropped_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_format_from_str() {
        assert_eq!("cu8".parse::<IqFormat>().unwrap(), IqFormat::Cu8);
        assert_eq!("CS16".parse::<IqFormat>().unwrap(), IqFormat::Cs16);
        assert_eq!("cf32".parse::<IqFormat>().unwrap().bytes_per_sample(), 8);
        assert!("s16".parse::<IqFormat>().is_err());
    }

    #[test]
    fn test_convert_cu8() {
        let samples = convert_bytes_to_complex(IqFormat::Cu8, &[255, 0, 128, 127, 1]);
        assert_eq!(samples.len(), 2);
        assert_relative_eq!(samples[0].re, 127.5 / 128.0);
        assert_relative_eq!(samples[0].im, -127.5 / 128.0);
        assert_relative_eq!(samples[1].re, 0.5 / 128.0);
    }

    #[test]
    fn test_convert_cs16() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&16_384i16.to_le_bytes());
        bytes.extend_from_slice(&(-32_768i16).to_le_bytes());
        let samples = convert_bytes_to_complex(IqFormat::Cs16, &bytes);
        assert_relative_eq!(samples[0].re, 0.5);
        assert_relative_eq!(samples[0].im, -1.0);
    }

    #[test]
    fn test_input_from_str() {
        assert_eq!("-".parse::<IqInput>().unwrap(), IqInput::Stdin);
        assert_eq!(
            "capture.cu8".parse::<IqInput>().unwrap(),
            IqInput::File(PathBuf::from("capture.cu8"))
        );
    }

    #[test]
    fn test_queue_write_is_bounded() {
        let queue = SampleQueue::new(4);
        let samples = vec![Complex::new(1.0, 0.0); 6];
        assert_eq!(queue.write(&samples), 4);
        assert_eq!(queue.write(&samples), 0);
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.dropped_samples(), 8);
    }

    #[test]
    fn test_queue_fifo_order() {
        let queue = SampleQueue::new(8);
        let samples: Vec<_> = (0..5).map(|i| Complex::new(i as f32, 0.0)).collect();
        queue.write(&samples);

        let mut out = vec![Complex::default(); 3];
        assert_eq!(queue.read(&mut out), 3);
        assert_eq!(out[2].re, 2.0);
        assert_eq!(queue.read(&mut out), 2);
        assert_eq!(out[0].re, 3.0);
    }

    #[test]
    fn test_queue_read_returns_zero_when_closed_and_drained() {
        let queue = SampleQueue::new(8);
        queue.write(&[Complex::new(1.0, 1.0)]);
        queue.close();

        let mut out = vec![Complex::default(); 4];
        assert_eq!(queue.read(&mut out), 1);
        assert_eq!(queue.read(&mut out), 0);
        assert_eq!(queue.write(&[Complex::new(1.0, 1.0)]), 0);

        queue.reset();
        assert!(!queue.is_closed());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_read_blocks_until_write() {
        let queue = SampleQueue::new(8);
        let producer = queue.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.write(&[Complex::new(0.25, 0.0); 3])
        });

        let mut out = vec![Complex::default(); 8];
        let n = queue.read(&mut out);
        assert_eq!(handle.join().unwrap(), 3);
        assert!(n >= 1 && n <= 3);
        assert_relative_eq!(out[0].re, 0.25);
    }

    #[test]
    fn test_file_device_streams_and_closes() {
        let path = std::env::temp_dir().join(format!("mpxradio-capture-{}.cs8", std::process::id()));
        std::fs::write(&path, vec![64u8; 2 * 1_000]).unwrap();

        let queue = SampleQueue::new(10_000);
        let mut device = IqFileDevice::new(IqInput::File(path.clone()), IqFormat::Cs8, 1_000, 256);
        device.start(queue.clone()).unwrap();
        device.join();

        let mut out = vec![Complex::default(); 2_000];
        let mut total = 0;
        loop {
            let n = queue.read(&mut out);
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 1_000);
        assert_eq!(device.dropped_samples(), 0);
        assert_relative_eq!(out[0].re, 0.5);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_file_device_counts_drops() {
        let path = std::env::temp_dir().join(format!("mpxradio-drops-{}.cu8", std::process::id()));
        std::fs::write(&path, vec![128u8; 2 * 500]).unwrap();

        // Paced far faster than the test runs, with nobody reading
        let queue = SampleQueue::new(100);
        let mut device =
            IqFileDevice::new(IqInput::File(path.clone()), IqFormat::Cu8, 1_000_000_000, 50)
                .with_realtime(true);
        device.start(queue.clone()).unwrap();
        device.join();

        assert_eq!(queue.len(), 100);
        assert_eq!(device.dropped_samples(), 400);
        assert_eq!(queue.dropped_samples(), device.dropped_samples());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_file_device_waits_for_room() {
        let path = std::env::temp_dir().join(format!("mpxradio-replay-{}.cu8", std::process::id()));
        std::fs::write(&path, vec![200u8; 2 * 5_000]).unwrap();

        let queue = SampleQueue::new(64);
        let mut device = IqFileDevice::new(IqInput::File(path.clone()), IqFormat::Cu8, 1_000, 100);
        device.start(queue.clone()).unwrap();

        let mut out = vec![Complex::default(); 32];
        let mut total = 0;
        loop {
            let n = queue.read(&mut out);
            if n == 0 {
                break;
            }
            total += n;
        }
        device.join();
        assert_eq!(total, 5_000);
        assert_eq!(device.dropped_samples(), 0);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file_fails_at_start() {
        let mut device = IqFileDevice::new(
            IqInput::File(PathBuf::from("/nonexistent/capture.cu8")),
            IqFormat::Cu8,
            1_000,
            64,
        );
        assert!(matches!(device.start(SampleQueue::new(16)), Err(Error::Io(_))));
    }
}
