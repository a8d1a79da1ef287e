//! # ragchat-telemetry
//!
//! Structured logging setup and per-query usage/cost telemetry.
//!
//! ## Overview
//!
//! - [`init_logging`] installs a `tracing` subscriber writing to stderr,
//!   filtered by `RUST_LOG` when set
//! - [`TelemetrySink`] derives a [`TelemetryRecord`] from each finished query
//!   and writes it through a [`Tracker`] without blocking the caller
//! - Trackers: [`NullTracker`], [`InMemoryTracker`], [`JsonlTracker`], and
//!   `MlflowTracker` (feature `mlflow`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragchat_telemetry::{TelemetrySink, TrackingConfig};
//!
//! let sink = TrackingConfig::default().build_sink()?;
//! sink.record(context, result);
//! // ... at exit
//! let report = sink.shutdown(std::time::Duration::from_secs(2)).await;
//! ```

pub mod config;
pub mod error;
#[cfg(feature = "mlflow")]
pub mod mlflow;
pub mod record;
pub mod sink;
pub mod tracker;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

pub use config::{DEFAULT_SHUTDOWN_GRACE, TrackerBackend, TrackingConfig};
pub use error::{Result, TelemetryError};
#[cfg(feature = "mlflow")]
pub use mlflow::MlflowTracker;
pub use record::{CostTable, NO_DOCUMENT_SOURCE, RunContext, TelemetryRecord};
pub use sink::{ShutdownReport, TelemetrySink};
pub use tracker::{InMemoryTracker, JsonlTracker, NullTracker, Tracker};

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive`. Output goes to
/// stderr so that answers printed on stdout stay clean. Fails if a global
/// subscriber is already installed.
pub fn init_logging(format: LogFormat, default_directive: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| TelemetryError::Init(e.to_string()))
}

