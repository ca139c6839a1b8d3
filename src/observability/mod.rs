//! Observability bootstrap.
//!
//! The library only emits `tracing` events and `metrics` samples; hosts call
//! [`init`] once to install a subscriber and, optionally, a Prometheus
//! recorder.

mod logging;
mod metrics;

pub use logging::{LogFormat, LoggingConfig};
pub use metrics::{MetricsConfig, MetricsHandle, install_prometheus};

use crate::{Error, Result};
use std::sync::{Mutex, PoisonError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Full observability configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl ObservabilityConfig {
    /// Builds the configuration from environment variables.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        Self {
            logging: LoggingConfig::from_env(verbose),
            metrics: MetricsConfig::from_env(),
        }
    }
}

/// Handle for installed observability components.
#[derive(Debug)]
pub struct ObservabilityHandle {
    metrics: Option<MetricsHandle>,
}

impl ObservabilityHandle {
    /// Renders current metrics, if a recorder was installed.
    #[must_use]
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.as_ref().map(MetricsHandle::render)
    }
}

/// Set only once both the recorder and the subscriber are installed.
static OBSERVABILITY_INIT: Mutex<bool> = Mutex::new(false);

/// Installs the tracing subscriber and, if enabled, the metrics recorder.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if observability was already
/// initialized or a global subscriber/recorder is already set, and
/// [`Error::InvalidConfig`] for malformed log filter directives.
pub fn init(config: ObservabilityConfig) -> Result<ObservabilityHandle> {
    let filter = config.logging.env_filter()?;

    let mut initialized = OBSERVABILITY_INIT
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if *initialized {
        return Err(Error::operation(
            "observability_init",
            "observability already initialized",
        ));
    }

    let metrics = metrics::install_prometheus(&config.metrics)?;

    match config.logging.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .with(filter)
            .try_init()
            .map_err(init_error)?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .with(filter)
            .try_init()
            .map_err(init_error)?,
    }

    *initialized = true;
    Ok(ObservabilityHandle { metrics })
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::operation("observability_init", e)
}
