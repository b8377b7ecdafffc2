//! Radio pipeline settings.
//!
//! [`RadioSettings`] is fixed once the pipeline is built. Settings are read
//! from a JSON file, where every missing field takes its default value, and
//! can then be overridden from the command line.
//!
//! # Example
//!
//! ```
//! use mpxradio::settings::RadioSettings;
//!
//! let settings = RadioSettings::from_json_str(r#"{ "rds_enable": true, "deemphasis_us": 50 }"#)
//!     .unwrap();
//! assert!(settings.rds_enable);
//! assert_eq!(settings.composite_rate(), 128_000.0);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::rds::RDS_SAMPLE_RATE;

/// Cutoff and transition width of a low-pass filter, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    pub cutoff_hz: f64,
    pub transition_hz: f64,
}

impl FilterSettings {
    pub const fn new(cutoff_hz: f64, transition_hz: f64) -> Self {
        Self {
            cutoff_hz,
            transition_hz,
        }
    }

    fn check(&self, name: &str, sample_rate: f64) -> Result<()> {
        if self.transition_hz <= 0.0 {
            return Err(Error::config(format!(
                "{} filter transition must be positive, got {} Hz",
                name, self.transition_hz
            )));
        }
        if self.cutoff_hz <= 0.0 || self.cutoff_hz >= sample_rate / 2.0 {
            return Err(Error::config(format!(
                "{} filter cutoff {} Hz outside (0, {}) Hz",
                name,
                self.cutoff_hz,
                sample_rate / 2.0
            )));
        }
        Ok(())
    }
}

/// Configuration of the MPX pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioSettings {
    /// IQ capture sample rate in Hz
    pub capture_rate: u32,
    /// Capture rate to composite rate ratio
    pub decimation: u32,
    /// Composite rate to audio rate ratio
    pub audio_decimation: u32,
    /// Maximum samples handled per `work()` call
    pub block_size: usize,
    /// Peak FM deviation in Hz
    pub fm_deviation_hz: f64,
    /// Deemphasis time constant in µs, 0 disables deemphasis
    pub deemphasis_us: f64,
    pub baseband_filter: FilterSettings,
    pub composite_filter: FilterSettings,
    pub audio_filter: FilterSettings,
    pub rds_enable: bool,
    pub rds_max_skew_seconds: f64,
    pub rds_level_db: f32,
    pub stereo_generator_enable: bool,
    pub stereo_generator_level_db: f32,
    pub status_reporting_enable: bool,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            capture_rate: 384_000,
            decimation: 3,
            audio_decimation: 2,
            block_size: 16_384,
            fm_deviation_hz: 85_000.0,
            deemphasis_us: 75.0,
            baseband_filter: FilterSettings::new(125_000.0, 15_000.0),
            composite_filter: FilterSettings::new(61_000.0, 1_500.0),
            audio_filter: FilterSettings::new(15_000.0, 4_000.0),
            rds_enable: false,
            rds_max_skew_seconds: 1.0,
            rds_level_db: -20.0,
            stereo_generator_enable: false,
            stereo_generator_level_db: -26.0,
            status_reporting_enable: false,
        }
    }
}

impl RadioSettings {
    /// Parse settings from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read settings from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Composite (MPX) sample rate in Hz.
    pub fn composite_rate(&self) -> f64 {
        self.capture_rate as f64 / self.decimation.max(1) as f64
    }

    /// Audio sample rate in Hz.
    pub fn audio_rate(&self) -> f64 {
        self.composite_rate() / self.audio_decimation.max(1) as f64
    }

    /// Check that the settings describe a consistent pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.capture_rate == 0 || self.decimation == 0 || self.audio_decimation == 0 {
            return Err(Error::config(
                "capture rate and decimation ratios must be greater than 0",
            ));
        }
        if self.block_size == 0 {
            return Err(Error::config("block size must be greater than 0"));
        }
        if self.capture_rate % self.decimation != 0 {
            return Err(Error::config(format!(
                "capture rate {} Hz is not divisible by decimation {}",
                self.capture_rate, self.decimation
            )));
        }
        let composite = self.capture_rate / self.decimation;
        if composite % self.audio_decimation != 0 {
            return Err(Error::config(format!(
                "composite rate {} Hz is not divisible by audio decimation {}",
                composite, self.audio_decimation
            )));
        }
        if self.fm_deviation_hz <= 0.0 {
            return Err(Error::config("FM deviation must be positive"));
        }
        if self.deemphasis_us < 0.0 {
            return Err(Error::config("deemphasis time constant cannot be negative"));
        }

        let capture = self.capture_rate as f64;
        self.baseband_filter.check("baseband", capture)?;
        self.composite_filter.check("composite", capture)?;
        self.audio_filter.check("audio", self.composite_rate())?;

        if self.rds_enable {
            if self.composite_rate() > RDS_SAMPLE_RATE {
                return Err(Error::config(format!(
                    "composite rate {} Hz above RDS generator rate {} Hz",
                    self.composite_rate(),
                    RDS_SAMPLE_RATE
                )));
            }
            if self.rds_max_skew_seconds <= 0.0 {
                return Err(Error::config("RDS max skew must be positive"));
            }
        }
        Ok(())
    }
}
