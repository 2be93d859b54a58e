use crate::entities::{pipeline_runs, prelude::*, stage_checks};
use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

pub struct RunRepository {
    conn: DatabaseConnection,
}

/// A stage outcome as it is written to `stage_checks`.
#[derive(Debug, Clone)]
pub struct StageCheckInput<'a> {
    pub stage: &'a str,
    pub passed: bool,
    pub row_count: usize,
    pub message: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl RunRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn start(&self, run_id: &str, user_name: &str) -> Result<()> {
        let active_model = pipeline_runs::ActiveModel {
            id: Set(run_id.to_string()),
            user_name: Set(user_name.to_string()),
            status: Set("running".to_string()),
            message: Set(None),
            started_at: Set(chrono::Utc::now().to_rfc3339()),
            finished_at: Set(None),
        };

        PipelineRuns::insert(active_model)
            .exec(&self.conn)
            .await
            .context("Failed to insert pipeline run")?;
        Ok(())
    }

    pub async fn finish(&self, run_id: &str, status: &str, message: Option<String>) -> Result<()> {
        let run = PipelineRuns::find_by_id(run_id.to_string())
            .one(&self.conn)
            .await?
            .with_context(|| format!("Pipeline run {run_id} not found"))?;

        let mut active_model: pipeline_runs::ActiveModel = run.into();
        active_model.status = Set(status.to_string());
        active_model.message = Set(message);
        active_model.finished_at = Set(Some(chrono::Utc::now().to_rfc3339()));
        active_model.update(&self.conn).await?;
        Ok(())
    }

    pub async fn record_check(&self, run_id: &str, check: StageCheckInput<'_>) -> Result<()> {
        let active_model = stage_checks::ActiveModel {
            run_id: Set(run_id.to_string()),
            stage: Set(check.stage.to_string()),
            passed: Set(check.passed),
            row_count: Set(i64::try_from(check.row_count).unwrap_or(i64::MAX)),
            message: Set(check.message),
            metadata: Set(check.metadata.map(|m| m.to_string())),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        StageChecks::insert(active_model).exec(&self.conn).await?;
        Ok(())
    }

    pub async fn recent(&self, limit: u64) -> Result<Vec<pipeline_runs::Model>> {
        let runs = PipelineRuns::find()
            .order_by_desc(pipeline_runs::Column::StartedAt)
            .limit(limit)
            .all(&self.conn)
            .await?;
        Ok(runs)
    }

    pub async fn checks_for(&self, run_id: &str) -> Result<Vec<stage_checks::Model>> {
        let checks = StageChecks::find()
            .filter(stage_checks::Column::RunId.eq(run_id))
            .order_by_asc(stage_checks::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(checks)
    }
}
