//! FM MPX monitor for recorded or piped IQ captures
//!
//! Demodulates an FM broadcast channel, and writes the composite (MPX)
//! signal and/or the decoded stereo audio as signed 16-bit PCM:
//! - MPX at the composite rate (mono)
//! - Audio at the audio rate (interleaved L/R)
//!
//! # Usage Examples
//!
//! ## MPX to stdout, with RDS regenerated
//! ```bash
//! mpxradio --input capture.cu8 --rate 384k --rds --mpx-out - | redsea -r 128000
//! ```
//!
//! ## Stereo audio to a file, from a real-time stream
//! ```bash
//! rtl_sdr -f 105.1M -s 384k - | mpxradio --input - --realtime --audio-out audio.raw -v
//! ```
//!
//! ## Settings file with command-line overrides
//! ```bash
//! mpxradio --input capture.cs16 --format cs16 --settings station.json --deemphasis 50
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread::JoinHandle;

use clap::{ArgAction, Parser};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mpxradio::{
    CaptureDevice, ChannelSink, Error, IqFileDevice, IqFormat, IqInput, PcmWriter, RadioPipeline,
    RadioSettings, Result, SampleQueue, SampleSink,
};

/// Capture queue length in blocks
const QUEUE_BLOCKS: usize = 16;

/// Blocks in flight towards each output writer
const SINK_BLOCKS: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Rate(u32);

impl FromStr for Rate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(stripped) = s.strip_suffix('M') {
            let val: f64 = stripped.trim().parse().map_err(|_| "Invalid MHz value")?;
            Ok(Rate((val * 1_000_000.0) as u32))
        } else if let Some(stripped) = s.strip_suffix('k') {
            let val: f64 = stripped.trim().parse().map_err(|_| "Invalid kHz value")?;
            Ok(Rate((val * 1_000.0) as u32))
        } else {
            let val: u32 = s.parse().map_err(|_| "Invalid Hz value")?;
            Ok(Rate(val))
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "FM MPX monitor: stereo decode and RDS re-encode from IQ captures", long_about = None)]
struct Args {
    /// Input IQ file, or - for stdin
    #[arg(short, long)]
    input: String,

    /// IQ format (cu8, cs8, cs16, cf32)
    #[arg(long, default_value = "cu8")]
    format: String,

    /// JSON settings file; command-line options override its values
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Capture sample rate in Hz (accepts k/M suffix, e.g. 384k)
    #[arg(short, long, value_parser = Rate::from_str)]
    rate: Option<Rate>,

    /// Capture to composite decimation ratio
    #[arg(long)]
    decimation: Option<u32>,

    /// Composite to audio decimation ratio
    #[arg(long)]
    audio_decimation: Option<u32>,

    /// Samples read from the capture queue per block
    #[arg(long)]
    block_size: Option<usize>,

    /// FM peak deviation in Hz
    #[arg(long)]
    deviation: Option<f64>,

    /// Deemphasis time constant in µs (0 disables)
    #[arg(long)]
    deemphasis: Option<f64>,

    /// Baseband filter cutoff in Hz
    #[arg(long)]
    bb_filter_cutoff: Option<f64>,

    /// Baseband filter transition width in Hz
    #[arg(long)]
    bb_filter_transition: Option<f64>,

    /// Composite filter cutoff in Hz
    #[arg(long)]
    composite_filter_cutoff: Option<f64>,

    /// Composite filter transition width in Hz
    #[arg(long)]
    composite_filter_transition: Option<f64>,

    /// Audio filter cutoff in Hz
    #[arg(long)]
    audio_filter_cutoff: Option<f64>,

    /// Audio filter transition width in Hz
    #[arg(long)]
    audio_filter_transition: Option<f64>,

    /// Decode the incoming RDS and re-insert a clean subcarrier
    #[arg(long, default_value_t = false)]
    rds: bool,

    /// RDS skew buffer length in seconds
    #[arg(long)]
    rds_max_skew: Option<f64>,

    /// Level of the re-inserted RDS subcarrier in dB
    #[arg(long, allow_hyphen_values = true)]
    rds_level: Option<f32>,

    /// Regenerate the stereo composite with a fresh pilot
    #[arg(long, default_value_t = false)]
    stereo_gen: bool,

    /// Pilot level of the regenerated composite in dB
    #[arg(long, allow_hyphen_values = true)]
    stereo_gen_level: Option<f32>,

    /// Log a status line once per second of input
    #[arg(long, default_value_t = false)]
    status: bool,

    /// Write MPX as s16le PCM to this file, or - for stdout
    #[arg(long)]
    mpx_out: Option<String>,

    /// Write interleaved stereo audio as s16le PCM to this file, or - for stdout
    #[arg(long)]
    audio_out: Option<String>,

    /// Pace file input to the capture rate and drop samples on overload
    #[arg(long, default_value_t = false)]
    realtime: bool,

    /// Verbosity level (-v=info, -vv=debug, -vvv=trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Apply command-line overrides on top of `settings`.
    fn apply(&self, settings: &mut RadioSettings) {
        if let Some(Rate(rate)) = self.rate {
            settings.capture_rate = rate;
        }
        if let Some(v) = self.decimation {
            settings.decimation = v;
        }
        if let Some(v) = self.audio_decimation {
            settings.audio_decimation = v;
        }
        if let Some(v) = self.block_size {
            settings.block_size = v;
        }
        if let Some(v) = self.deviation {
            settings.fm_deviation_hz = v;
        }
        if let Some(v) = self.deemphasis {
            settings.deemphasis_us = v;
        }
        if let Some(v) = self.bb_filter_cutoff {
            settings.baseband_filter.cutoff_hz = v;
        }
        if let Some(v) = self.bb_filter_transition {
            settings.baseband_filter.transition_hz = v;
        }
        if let Some(v) = self.composite_filter_cutoff {
            settings.composite_filter.cutoff_hz = v;
        }
        if let Some(v) = self.composite_filter_transition {
            settings.composite_filter.transition_hz = v;
        }
        if let Some(v) = self.audio_filter_cutoff {
            settings.audio_filter.cutoff_hz = v;
        }
        if let Some(v) = self.audio_filter_transition {
            settings.audio_filter.transition_hz = v;
        }
        if let Some(v) = self.rds_max_skew {
            settings.rds_max_skew_seconds = v;
        }
        if let Some(v) = self.rds_level {
            settings.rds_level_db = v;
        }
        if let Some(v) = self.stereo_gen_level {
            settings.stereo_generator_level_db = v;
        }
        settings.rds_enable |= self.rds;
        settings.stereo_generator_enable |= self.stereo_gen;
        settings.status_reporting_enable |= self.status;
    }
}

type WriterHandle = JoinHandle<Result<u64>>;

/// Create a channel sink and the thread writing its blocks to `target`.
///
/// Unless `realtime` is set the sink waits for the writer, so offline
/// replay produces complete output.
fn open_output(
    target: &str,
    name: &str,
    realtime: bool,
) -> Result<(Box<dyn SampleSink>, WriterHandle)> {
    let out: Box<dyn Write + Send> = if target == "-" {
        Box::new(std::io::stdout())
    } else {
        Box::new(File::create(Path::new(target))?)
    };

    let (sink, receiver) = ChannelSink::bounded(SINK_BLOCKS);
    let sink = sink.with_blocking(!realtime);
    let handle = std::thread::Builder::new()
        .name(format!("{}-writer", name))
        .spawn(move || PcmWriter::new(BufWriter::new(out)).run(receiver))?;

    debug!("[OUTPUT] {} to {}", name, target);
    Ok((Box::new(sink), handle))
}

/// Verbosity count to level: 0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE
fn log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG takes precedence over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(args.verbose).as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut settings = match &args.settings {
        Some(path) => RadioSettings::from_json_file(path)?,
        None => RadioSettings::default(),
    };
    args.apply(&mut settings);
    settings.validate()?;

    let format = IqFormat::from_str(&args.format)?;
    let input: IqInput = args.input.parse()?;

    if args.mpx_out.as_deref() == Some("-") && args.audio_out.as_deref() == Some("-") {
        return Err(Error::config("MPX and audio cannot both be written to stdout"));
    }
    if args.mpx_out.is_none() && args.audio_out.is_none() {
        warn!("no --mpx-out or --audio-out given, output is discarded");
    }

    let mut writers = Vec::new();
    let mpx_sink = match args.mpx_out.as_deref() {
        Some(target) => {
            let (sink, handle) = open_output(target, "mpx", args.realtime)?;
            writers.push(handle);
            Some(sink)
        }
        None => None,
    };
    let audio_sink = match args.audio_out.as_deref() {
        Some(target) => {
            let (sink, handle) = open_output(target, "audio", args.realtime)?;
            writers.push(handle);
            Some(sink)
        }
        None => None,
    };

    let queue = SampleQueue::new(QUEUE_BLOCKS * settings.block_size);
    let mut pipeline = RadioPipeline::new(settings.clone(), queue.clone(), mpx_sink, audio_sink)?;
    info!(
        "Processing {} Hz capture: composite {} Hz, audio {} Hz, RDS {}, stereo generator {}",
        settings.capture_rate,
        pipeline.composite_rate(),
        pipeline.audio_rate(),
        settings.rds_enable,
        settings.stereo_generator_enable
    );

    let mut device = IqFileDevice::new(input, format, settings.capture_rate, settings.block_size)
        .with_realtime(args.realtime);
    device.start(queue.clone())?;

    while pipeline.work()? {}

    device.join();
    if let Some(stats) = pipeline.rds_stats() {
        info!(
            "RDS: {} overruns, {} underruns, sync {}",
            stats.overruns, stats.underruns, stats.has_sync
        );
    }
    if device.dropped_samples() > 0 {
        warn!("{} capture samples dropped", device.dropped_samples());
    }
    if pipeline.sink_dropped_samples() > 0 {
        warn!("{} output samples dropped", pipeline.sink_dropped_samples());
    }

    // Dropping the pipeline closes the sink channels
    drop(pipeline);
    for handle in writers {
        match handle.join() {
            Ok(result) => {
                let written = result?;
                debug!("[OUTPUT] {} samples written", written);
            }
            Err(_) => warn!("output writer thread panicked"),
        }
    }

    Ok(())
}
