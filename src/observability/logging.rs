//! Structured logging configuration.

use crate::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Default filter when neither `TALEPRINT_LOG` nor `RUST_LOG` is set.
const DEFAULT_FILTER: &str = "taleprint=info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directives, e.g. `taleprint=debug,warn`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Reads `TALEPRINT_LOG` (then `RUST_LOG`) and `TALEPRINT_LOG_FORMAT`.
    ///
    /// `verbose` raises the default filter to `debug` when no filter
    /// variable is set.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        let filter = std::env::var("TALEPRINT_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| {
                if verbose {
                    "taleprint=debug".to_string()
                } else {
                    DEFAULT_FILTER.to_string()
                }
            });
        let format = std::env::var("TALEPRINT_LOG_FORMAT")
            .ok()
            .and_then(|f| LogFormat::parse(&f))
            .unwrap_or_default();

        Self { format, filter }
    }

    /// Builder method to set the format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Builder method to set the filter directives.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Parses the filter directives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for malformed directives.
    pub fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.filter)
            .map_err(|e| Error::InvalidConfig(format!("log filter '{}': {e}", self.filter)))
    }
}
