//! MLflow tracking-server backend using the REST API.
//!
//! This module is only available when the `mlflow` feature is enabled.
//!
//! Each record becomes one MLflow run: the run is created inside the
//! configured experiment, parameters/metrics/tags are sent in a single
//! `log-batch` call, and the run is closed with a status derived from the
//! record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument};

use crate::error::{Result, TelemetryError};
use crate::record::TelemetryRecord;
use crate::tracker::Tracker;
use ragchat_core::QueryStatus;

/// MLflow rejects parameter values longer than this.
const MAX_PARAM_LEN: usize = 6000;

/// A [`Tracker`] that writes to an MLflow tracking server.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat_telemetry::mlflow::MlflowTracker;
///
/// let tracker = MlflowTracker::new("http://localhost:5000", "rag-chat");
/// ```
pub struct MlflowTracker {
    client: reqwest::Client,
    base_url: String,
    experiment_name: String,
    experiment_id: OnceCell<String>,
}

impl MlflowTracker {
    pub fn new(tracking_uri: impl Into<String>, experiment_name: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: tracking_uri.into().trim_end_matches('/').to_string(),
            experiment_name: experiment_name.into(),
            experiment_id: OnceCell::new(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{endpoint}", self.base_url)
    }

    async fn experiment_id(&self) -> Result<&str> {
        self.experiment_id
            .get_or_try_init(|| self.resolve_experiment())
            .await
            .map(String::as_str)
    }

    /// Look the experiment up by name, creating it when it does not exist.
    async fn resolve_experiment(&self) -> Result<String> {
        let response = self
            .client
            .get(self.url("experiments/get-by-name"))
            .query(&[("experiment_name", self.experiment_name.as_str())])
            .send()
            .await
            .map_err(request_error)?;

        if response.status().is_success() {
            let found: GetExperimentResponse = response.json().await.map_err(request_error)?;
            return Ok(found.experiment.experiment_id);
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(status_error(response).await);
        }

        debug!(experiment = %self.experiment_name, "creating MLflow experiment");
        let created: CreateExperimentResponse =
            self.post("experiments/create", &json!({ "name": self.experiment_name })).await?;
        Ok(created.experiment_id)
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response =
            self.client.post(self.url(endpoint)).json(body).send().await.map_err(request_error)?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        response.json().await.map_err(request_error)
    }
}

#[async_trait]
impl Tracker for MlflowTracker {
    fn name(&self) -> &str {
        "mlflow"
    }

    #[instrument(skip_all, fields(run.id = %record.run_id))]
    async fn log_run(&self, record: &TelemetryRecord) -> Result<()> {
        let experiment_id = self.experiment_id().await?;
        let now = chrono::Utc::now().timestamp_millis();

        let created: CreateRunResponse = self
            .post(
                "runs/create",
                &json!({
                    "experiment_id": experiment_id,
                    "run_name": record.run_id.to_string(),
                    "start_time": now,
                    "tags": [{ "key": "query_id", "value": record.run_id.to_string() }],
                }),
            )
            .await?;
        let run_id = created.run.info.run_id;

        let batch = LogBatch::from_record(&run_id, record, now);
        let _: serde_json::Value = self.post("runs/log-batch", &serde_json::to_value(&batch)?).await?;

        let _: serde_json::Value = self
            .post(
                "runs/update",
                &json!({
                    "run_id": run_id,
                    "status": run_status(record),
                    "end_time": chrono::Utc::now().timestamp_millis(),
                }),
            )
            .await?;

        debug!(mlflow.run_id = %run_id, "logged run to MLflow");
        Ok(())
    }
}

fn run_status(record: &TelemetryRecord) -> &'static str {
    match (record.status, record.completed) {
        (QueryStatus::Failed, _) => "FAILED",
        (_, false) => "KILLED",
        _ => "FINISHED",
    }
}

fn request_error(e: reqwest::Error) -> TelemetryError {
    error!(error = %e, "MLflow request failed");
    TelemetryError::Tracker { backend: "mlflow".into(), message: format!("request failed: {e}") }
}

async fn status_error(response: reqwest::Response) -> TelemetryError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.message).unwrap_or(body);
    error!(%status, "MLflow API error");
    TelemetryError::Tracker {
        backend: "mlflow".into(),
        message: format!("API returned {status}: {detail}"),
    }
}

// ── MLflow REST request/response types ─────────────────────────────

#[derive(Deserialize)]
struct GetExperimentResponse {
    experiment: Experiment,
}

#[derive(Deserialize)]
struct Experiment {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateRunResponse {
    run: Run,
}

#[derive(Deserialize)]
struct Run {
    info: RunInfo,
}

#[derive(Deserialize)]
struct RunInfo {
    run_id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug, Serialize)]
struct Param {
    key: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct Metric {
    key: &'static str,
    value: f64,
    timestamp: i64,
    step: i64,
}

#[derive(Debug, Serialize)]
struct LogBatch {
    run_id: String,
    params: Vec<Param>,
    metrics: Vec<Metric>,
    tags: Vec<Param>,
}

impl LogBatch {
    fn from_record(run_id: &str, record: &TelemetryRecord, timestamp: i64) -> Self {
        let param = |key, value: &str| Param { key, value: truncate(value, MAX_PARAM_LEN) };
        let metric = |key, value: f64| Metric { key, value, timestamp, step: 0 };
        let mut tags = vec![
            param("date_time", &record.created_at),
            param("completed", if record.completed { "true" } else { "false" }),
        ];
        if let Some(error) = &record.error {
            tags.push(param("error", error));
        }

        Self {
            run_id: run_id.to_string(),
            params: vec![
                param("model_used", &record.model),
                param("user_prompt", &record.query),
                param("retrieved_doc_name", &record.retrieved_source),
                param("llm_response", &record.response),
                param("status", record.status.as_str()),
            ],
            metrics: vec![
                metric("cosine_similarity", f64::from(record.similarity)),
                metric("processing_time_ns", record.processing_time_ns as f64),
                metric("prompt_tokens", record.prompt_tokens as f64),
                metric("generated_tokens", record.generated_tokens as f64),
                metric("input_cost_usd", record.input_cost_usd),
                metric("output_cost_usd", record.output_cost_usd),
                metric("total_cost_usd", record.total_cost_usd),
                metric("llm_response_length", record.response_length as f64),
            ],
            tags,
        }
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
