//! Error types for DSP stage construction.

use thiserror::Error;

/// Result type for DSP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building a DSP stage.
///
/// Stages never fail while processing samples; every error here is a
/// configuration problem detected at construction time.
#[derive(Debug, Error)]
pub enum Error {
    /// Filter parameters cannot produce a valid design.
    #[error("filter design error: {0}")]
    FilterDesign(String),

    /// Resampler rates or construction parameters are invalid.
    #[error("resampler error: {0}")]
    Resampler(String),
}

impl Error {
    /// Create a filter design error with a custom message
    pub fn filter_design<S: Into<String>>(msg: S) -> Self {
        Error::FilterDesign(msg.into())
    }

    /// Create a resampler error with a custom message
    pub fn resampler<S: Into<String>>(msg: S) -> Self {
        Error::Resampler(msg.into())
    }
}

impl From<rubato::ResamplerConstructionError> for Error {
    fn from(err: rubato::ResamplerConstructionError) -> Self {
        Error::Resampler(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_design_display() {
        let err = Error::filter_design("cutoff above Nyquist");
        assert!(matches!(err, Error::FilterDesign(_)));
        assert_eq!(err.to_string(), "filter design error: cutoff above Nyquist");
    }

    #[test]
    fn test_resampler_display() {
        let err = Error::resampler("zero rate");
        assert!(err.to_string().contains("resampler error"));
    }
}
