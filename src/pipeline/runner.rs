use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::aggregate::{load_queries, run_aggregations};
use super::check::{ValidationResult, validate_raw};
use super::raw_store::save_raw;
use super::stages::{StageOutput, all_stages};
use crate::clients::AnilistClient;
use crate::config::Config;
use crate::db::{StageCheckInput, Store};
use crate::models::RawPayload;
use crate::publisher::{JsonlPublisher, RecordPublisher, publish_raw};

/// Stage name the raw payload check is recorded under.
pub const RAW_STAGE: &str = "raw_anilist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    pub stage: String,
    pub passed: bool,
    pub row_count: usize,
    pub dropped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&StageOutput> for StageSummary {
    fn from(output: &StageOutput) -> Self {
        Self {
            stage: output.name.to_string(),
            passed: output.check.passed,
            row_count: output.check.row_count,
            dropped: output.dropped,
            error: output.check.error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub raw: ValidationResult,
    pub stages: Vec<StageSummary>,
    pub aggregations: Vec<(String, u64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<(usize, usize)>,
}

impl RunReport {
    /// One-line reason for a failed run, stored with the run record.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        if self.status == RunStatus::Succeeded {
            return None;
        }
        if !self.raw.passed {
            return self.raw.error.clone();
        }
        let failed: Vec<_> = self
            .stages
            .iter()
            .filter(|s| !s.passed)
            .map(|s| format!("{}: {}", s.stage, s.error.as_deref().unwrap_or("failed")))
            .collect();
        Some(failed.join("; "))
    }
}

/// One full ingest: fetch, raw gate, persist, publish, table stages,
/// aggregations. Every run and each of its checks is recorded in the store.
pub struct Pipeline {
    config: Config,
    client: AnilistClient,
    store: Store,
    publisher: Option<Arc<dyn RecordPublisher>>,
}

impl Pipeline {
    pub async fn new(config: Config) -> Result<Self> {
        let client = AnilistClient::new(&config.anilist)?;
        let store = Store::from_config(&config.storage).await?;
        let publisher: Option<Arc<dyn RecordPublisher>> = if config.publisher.enabled {
            Some(Arc::new(JsonlPublisher::new(&config.publisher.output_path)))
        } else {
            None
        };

        Ok(Self::with_parts(config, client, store, publisher))
    }

    #[must_use]
    pub fn with_parts(
        config: Config,
        client: AnilistClient,
        store: Store,
        publisher: Option<Arc<dyn RecordPublisher>>,
    ) -> Self {
        Self {
            config,
            client,
            store,
            publisher,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    /// Runs the pipeline once. Gate failures produce a `Failed` report;
    /// fetch, storage and publishing errors are returned after the run is
    /// marked failed.
    pub async fn run_once(&self) -> Result<RunReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();

        self.store
            .start_run(&run_id, self.client.user_name())
            .await?;
        info!(run_id = %run_id, user = self.client.user_name(), "Pipeline run started");

        let result = self.execute(&run_id).await;
        metrics::histogram!("pipeline_run_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(report) => {
                self.store
                    .finish_run(&run_id, report.status.as_str(), report.message())
                    .await?;
                metrics::counter!("pipeline_runs_total", "outcome" => report.status.as_str())
                    .increment(1);
                info!(
                    run_id = %run_id,
                    status = report.status.as_str(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "Pipeline run finished"
                );
                Ok(report)
            }
            Err(e) => {
                error!(run_id = %run_id, "Pipeline run aborted: {:#}", e);
                if let Err(finish_err) = self
                    .store
                    .finish_run(&run_id, RunStatus::Failed.as_str(), Some(format!("{e:#}")))
                    .await
                {
                    warn!("Failed to mark run {} as failed: {}", run_id, finish_err);
                }
                metrics::counter!("pipeline_runs_total", "outcome" => "error").increment(1);
                Err(e)
            }
        }
    }

    async fn execute(&self, run_id: &str) -> Result<RunReport> {
        let raw = self.client.query(&self.config.anilist.query_file).await?;

        let validation = validate_raw(&raw);
        let payload = RawPayload::from_value(&raw).ok();
        self.store
            .record_check(
                run_id,
                StageCheckInput {
                    stage: RAW_STAGE,
                    passed: validation.passed,
                    row_count: payload.as_ref().map_or(0, RawPayload::entry_count),
                    message: validation.error.clone(),
                    metadata: serde_json::to_value(&validation).ok(),
                },
            )
            .await?;

        let mut report = RunReport {
            run_id: run_id.to_string(),
            status: RunStatus::Failed,
            raw: validation,
            stages: Vec::new(),
            aggregations: Vec::new(),
            published: None,
        };

        let Some(payload) = payload.filter(|_| report.raw.passed) else {
            warn!(run_id, "Raw payload rejected, skipping downstream stages");
            return Ok(report);
        };

        save_raw(Path::new(&self.config.general.data_path), &raw).await?;

        if let Some(publisher) = &self.publisher {
            let published = publish_raw(
                publisher.as_ref(),
                &payload,
                &self.config.publisher.user_topic,
                &self.config.publisher.media_topic,
            )
            .await
            .context("Failed to publish raw records")?;
            report.published = Some(published);
        }

        for output in all_stages(&raw) {
            self.store
                .record_check(
                    run_id,
                    StageCheckInput {
                        stage: output.name,
                        passed: output.check.passed,
                        row_count: output.check.row_count,
                        message: output.check.error.clone(),
                        metadata: Some(output.metadata()),
                    },
                )
                .await?;

            if output.check.passed {
                let table_name = self.config.storage.table_name(output.name);
                let written = self.store.replace_table(&table_name, &output.table).await?;
                info!(table = %table_name, rows = written, "Table written");
            }

            report.stages.push(StageSummary::from(&output));
        }

        if report.stages.iter().all(|s| s.passed) {
            let queries = load_queries(&self.config.storage).await?;
            report.aggregations = run_aggregations(&self.store, &queries).await?;
            report.status = RunStatus::Succeeded;
        } else {
            warn!(run_id, "A table check failed, skipping aggregations");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(stage: &str, passed: bool, error: Option<&str>) -> StageSummary {
        StageSummary {
            stage: stage.to_string(),
            passed,
            row_count: usize::from(passed),
            dropped: 0,
            error: error.map(ToString::to_string),
        }
    }

    fn report(status: RunStatus, raw_passed: bool, stages: Vec<StageSummary>) -> RunReport {
        RunReport {
            run_id: "run".to_string(),
            status,
            raw: ValidationResult {
                passed: raw_passed,
                error: (!raw_passed).then(|| "raw_anilist validation failed".to_string()),
                error_detail: None,
                size_bytes: None,
            },
            stages,
            aggregations: Vec::new(),
            published: None,
        }
    }

    #[test]
    fn test_succeeded_run_has_no_message() {
        let report = report(
            RunStatus::Succeeded,
            true,
            vec![summary("fact_anime", true, None)],
        );
        assert_eq!(report.message(), None);
    }

    #[test]
    fn test_message_names_raw_failure() {
        let report = report(RunStatus::Failed, false, Vec::new());
        assert_eq!(
            report.message().as_deref(),
            Some("raw_anilist validation failed")
        );
    }

    #[test]
    fn test_message_lists_failed_stages() {
        let report = report(
            RunStatus::Failed,
            true,
            vec![
                summary("fact_anime", true, None),
                summary("dimension_user", false, Some("no rows processed")),
            ],
        );
        assert_eq!(
            report.message().as_deref(),
            Some("dimension_user: no rows processed")
        );
    }
}
