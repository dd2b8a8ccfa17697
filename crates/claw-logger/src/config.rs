//! Output configuration for stream sinks.
//!
//! Settings come from code, from any serde source, or from the `LOG_LEVEL`
//! and `LOG` environment variables:
//!
//! ```text
//! LOG_LEVEL=info LOG='*@error,database@timer' ./server
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{LoggerError, Result};
use crate::filter::{parse_priority, VerbosityRules, WILDCARD};

/// Environment variable holding the default level.
pub const LEVEL_ENV: &str = "LOG_LEVEL";

/// Environment variable holding the filter specification.
pub const FILTER_ENV: &str = "LOG";

/// How a stream sink renders records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty when the target is a terminal, JSON otherwise.
    #[default]
    Auto,
    /// Colored human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(LoggerError::InvalidConfig(format!(
                "unknown output format: {other}"
            ))),
        }
    }
}

/// Configuration for a stream sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default level for filter items without `@level`.
    pub level: String,
    /// Filter specification, e.g. `*@error,database@timer`.
    pub filter: String,
    /// Output format.
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            level: String::new(),
            filter: WILDCARD.to_string(),
            format: OutputFormat::Auto,
        }
    }
}

impl OutputConfig {
    /// Creates the default configuration: every source, every level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default level.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Sets the filter specification.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Overlays `LOG_LEVEL` and `LOG` from the process environment.
    #[must_use]
    pub fn from_env(self) -> Self {
        self.overlay(
            std::env::var(LEVEL_ENV).ok().as_deref(),
            std::env::var(FILTER_ENV).ok().as_deref(),
        )
    }

    /// Overlays explicit level and filter values. Empty values are ignored.
    #[must_use]
    pub fn overlay(mut self, level: Option<&str>, filter: Option<&str>) -> Self {
        if let Some(level) = level.filter(|l| !l.is_empty()) {
            self.level = level.to_string();
        }
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            self.filter = filter.to_string();
        }
        if self.filter.trim().is_empty() {
            self.filter = WILDCARD.to_string();
        }
        self
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builds the verbosity rules described by this configuration.
    #[must_use]
    pub fn rules(&self) -> VerbosityRules {
        VerbosityRules::parse(&self.filter, parse_priority(&self.level))
    }
}
