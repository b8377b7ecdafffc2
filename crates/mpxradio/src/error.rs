//! Error handling for the mpxradio library
//!
//! Every fallible operation happens while building the pipeline or wiring
//! its inputs and outputs. Once running, stream anomalies (dropped samples,
//! RDS sync loss, sink backpressure) are counted instead of returned.

use std::io;

use thiserror::Error;

/// A specialized Result type for mpxradio operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mpxradio operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid settings or sample rate relationship
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (input files, output writers)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// DSP stage construction error
    #[error(transparent)]
    Dsp(#[from] mpxdsp::Error),

    /// Settings file parsing error
    #[error("Settings error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sample sink error
    #[error("Sink error: {0}")]
    Sink(String),
}

impl Error {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Create a sink error with a custom message
    pub fn sink<S: Into<String>>(msg: S) -> Self {
        Error::Sink(msg.into())
    }
}
