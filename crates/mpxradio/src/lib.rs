//! FM broadcast MPX processing library.
//!
//! Turns a stream of complex baseband samples into the composite (MPX)
//! signal and stereo audio:
//! - FM demodulation and deemphasis
//! - Pilot-locked stereo decoding, and optional stereo re-generation
//! - RDS bit recovery and clean re-insertion through a skew buffer
//! - Capture queue, sample sinks and periodic status reporting

pub mod capture;
pub mod error;
pub mod fm;
pub mod pipeline;
pub mod rds;
pub mod settings;
pub mod sink;
pub mod status;
pub mod stereo;

// Re-export main types for convenience
pub use capture::{CaptureDevice, IqFileDevice, IqFormat, IqInput, SampleQueue};
pub use error::{Error, Result};
pub use fm::{Deemphasis, FmDemodulator};
pub use pipeline::RadioPipeline;
pub use rds::{RdsDecoder, RdsEncoder, RdsSkewBuffer, RdsStats, SkewState};
pub use settings::{FilterSettings, RadioSettings};
pub use sink::{ChannelSink, NullSink, PcmWriter, SampleSink, SinkStatus};
pub use status::StatusSnapshot;
pub use stereo::{StereoDecoder, StereoEncoder};
