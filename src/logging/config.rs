//! Logging configuration
//!
//! Per-component log levels, output destinations and file rotation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Hourly,
    Daily,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for JSON log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs
    pub include_file_location: bool,

    /// Level for feature extraction, matching and model fitting
    pub engine_level: String,

    /// Level for volume alignment, candidate search and the crop workflow
    pub pipeline_level: String,

    pub rotation: RotationPolicy,
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            engine_level: "warn".to_string(),
            pipeline_level: "info".to_string(),
            rotation: RotationPolicy::Daily,
        }
    }
}

impl LoggingConfig {
    /// Verbose configuration for debugging a single alignment.
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            engine_level: "debug".to_string(),
            pipeline_level: "debug".to_string(),
            rotation: RotationPolicy::Never,
        }
    }

    /// Maps a `-v` count onto the pipeline level, keeping the rest of the config.
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        let level = match verbose {
            0 => return self,
            1 => "debug",
            _ => "trace",
        };
        self.global_level = level.to_string();
        self.pipeline_level = level.to_string();
        if verbose > 2 {
            self.engine_level = level.to_string();
        }
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, level) in [
            ("global_level", &self.global_level),
            ("engine_level", &self.engine_level),
            ("pipeline_level", &self.pipeline_level),
        ] {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    name, level, VALID_LEVELS
                ));
            }
        }
        Ok(())
    }

    /// Filter directives for `tracing_subscriber::EnvFilter`.
    pub fn directives(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        format!(
            "{krate}={global},{krate}::algorithms={engine},{krate}::utils={engine},{krate}::pipeline={pipeline}",
            krate = krate,
            global = self.global_level,
            engine = self.engine_level,
            pipeline = self.pipeline_level,
        )
    }
}
