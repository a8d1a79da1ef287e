//! Tracking configuration and tracker construction.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TelemetryError};
use crate::record::CostTable;
use crate::sink::TelemetrySink;
use crate::tracker::{JsonlTracker, NullTracker, Tracker};

/// Default time in-flight writes get when the process shuts down.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Which backend receives telemetry records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerBackend {
    /// Records are discarded.
    #[default]
    None,
    /// One JSON line per record in a local file.
    Jsonl,
    /// An MLflow tracking server.
    Mlflow,
}

/// The `tracking` section of the application config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Experiment every run is grouped under.
    pub experiment_name: String,
    pub backend: TrackerBackend,
    /// Output directory for the `jsonl` backend.
    pub directory: PathBuf,
    /// Server URI for the `mlflow` backend.
    pub tracking_uri: Option<String>,
    /// Time in-flight writes get at shutdown, in milliseconds.
    pub shutdown_grace_ms: u64,
    /// Token prices used for the cost metrics.
    pub costs: CostTable,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            experiment_name: "rag-chat".to_string(),
            backend: TrackerBackend::None,
            directory: PathBuf::from("telemetry"),
            tracking_uri: None,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE.as_millis() as u64,
            costs: CostTable::default(),
        }
    }
}

impl TrackingConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Build the tracker named by `backend`.
    pub fn build_tracker(&self) -> Result<Arc<dyn Tracker>> {
        match self.backend {
            TrackerBackend::None => Ok(Arc::new(NullTracker)),
            TrackerBackend::Jsonl => Ok(Arc::new(JsonlTracker::new(self.directory.clone()))),
            TrackerBackend::Mlflow => self.build_mlflow(),
        }
    }

    /// Build a sink writing to the configured backend.
    pub fn build_sink(&self) -> Result<TelemetrySink> {
        Ok(TelemetrySink::with_cost_table(
            self.build_tracker()?,
            self.experiment_name.clone(),
            self.costs,
        ))
    }

    #[cfg(feature = "mlflow")]
    fn build_mlflow(&self) -> Result<Arc<dyn Tracker>> {
        let uri = self.tracking_uri.as_deref().filter(|u| !u.trim().is_empty()).ok_or_else(|| {
            TelemetryError::Init("tracking_uri is required for the mlflow backend".into())
        })?;
        Ok(Arc::new(crate::mlflow::MlflowTracker::new(uri, self.experiment_name.clone())))
    }

    #[cfg(not(feature = "mlflow"))]
    fn build_mlflow(&self) -> Result<Arc<dyn Tracker>> {
        Err(TelemetryError::Init("built without the `mlflow` feature".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TrackingConfig::default();
        assert_eq!(config.backend, TrackerBackend::None);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(2));
        assert_eq!(config.build_tracker().unwrap().name(), "none");
    }

    #[test]
    fn partial_section_fills_defaults() {
        let config: TrackingConfig =
            serde_json::from_str(r#"{"backend": "jsonl", "directory": "/tmp/runs"}"#).unwrap();
        assert_eq!(config.backend, TrackerBackend::Jsonl);
        assert_eq!(config.experiment_name, "rag-chat");
        assert_eq!(config.build_tracker().unwrap().name(), "jsonl");
    }

    #[cfg(feature = "mlflow")]
    #[test]
    fn mlflow_requires_uri() {
        let mut config = TrackingConfig { backend: TrackerBackend::Mlflow, ..Default::default() };
        assert!(matches!(config.build_tracker(), Err(TelemetryError::Init(_))));
        config.tracking_uri = Some("http://localhost:5000".into());
        assert_eq!(config.build_tracker().unwrap().name(), "mlflow");
    }
}
