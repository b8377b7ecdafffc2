//! FM stereo multiplex.
//!
//! - [`StereoDecoder`]: Recovers left/right audio from the composite signal
//! - [`StereoEncoder`]: Builds a composite signal from L+R and L−R
//!
//! The composite layout handled here is the broadcast one:
//!
//! ```text
//! mpx = (L+R) + p·sin(φ) + (L−R)·sin(2φ)       φ = 2π·19 kHz·t
//! ```

pub mod decoder;
pub mod encoder;

pub use decoder::StereoDecoder;
pub use encoder::StereoEncoder;

/// Stereo pilot tone frequency in Hz
pub const PILOT_FREQUENCY: f64 = 19_000.0;

/// Half-width of the pilot capture range in Hz
pub const PILOT_CAPTURE_RANGE: f64 = 250.0;
