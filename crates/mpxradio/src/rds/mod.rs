//! RDS (Radio Data System) subcarrier handling.
//!
//! The RDS path does not parse groups. It recovers the raw bit stream from
//! the incoming composite and regenerates a clean 57 kHz subcarrier from it:
//!
//! - [`RdsDecoder`]: composite → raw bits
//! - [`RdsEncoder`]: bits → shaped baseband waveform
//! - [`RdsSkewBuffer`]: bit FIFO between the two clocks, subcarrier mixing
//!   and synchronisation statistics

pub mod decoder;
pub mod encoder;
pub mod skew;

pub use decoder::RdsDecoder;
pub use encoder::RdsEncoder;
pub use skew::{RdsSkewBuffer, RdsStats, RdsStatsHandle, SkewState};

/// RDS subcarrier frequency in Hz (3 × pilot)
pub const RDS_SUBCARRIER: f64 = 57_000.0;

/// RDS data rate in bits per second
pub const RDS_BIT_RATE: f64 = 1_187.5;

/// Rate the RDS waveform is generated at before resampling to the
/// composite rate. A multiple of the symbol rate, and at least every
/// supported composite rate.
pub const RDS_SAMPLE_RATE: f64 = 190_000.0;
