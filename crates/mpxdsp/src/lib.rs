//! Streaming DSP stages for FM composite (MPX) processing.
//!
//! Every stage owns its state (delay lines, loop phase, resampler history)
//! and is driven block by block through the [`dsp::DspBlock`] trait. State
//! persists across calls, so a continuous stream can be fed in arbitrary
//! block sizes.

pub mod dsp;
pub mod error;

pub use error::{Error, Result};
