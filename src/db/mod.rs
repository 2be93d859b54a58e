use crate::config::StorageConfig;
use crate::pipeline::Table;
use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::pipeline_runs::Model as PipelineRun;
pub use crate::entities::stage_checks::Model as StageCheck;
pub use repositories::runs::StageCheckInput;

/// The analytical store: pipeline tables, aggregations and run history.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::with_pool_options(
            &config.database_path,
            config.max_db_connections,
            config.min_db_connections,
        )
        .await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    fn run_repo(&self) -> repositories::runs::RunRepository {
        repositories::runs::RunRepository::new(self.conn.clone())
    }

    fn table_repo(&self) -> repositories::tables::TableRepository {
        repositories::tables::TableRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Pipeline tables
    // ========================================================================

    pub async fn replace_table(&self, name: &str, table: &Table) -> Result<usize> {
        self.table_repo().replace(name, table).await
    }

    pub async fn run_aggregation(&self, name: &str, sql: &str) -> Result<u64> {
        self.table_repo().create_as(name, sql).await
    }

    pub async fn count_rows(&self, name: &str) -> Result<u64> {
        self.table_repo().count(name).await
    }

    pub async fn fetch_rows(&self, name: &str, columns: &[&str]) -> Result<Vec<serde_json::Value>> {
        self.table_repo().fetch_json(name, columns).await
    }

    // ========================================================================
    // Run history
    // ========================================================================

    pub async fn start_run(&self, run_id: &str, user_name: &str) -> Result<()> {
        self.run_repo().start(run_id, user_name).await
    }

    pub async fn finish_run(&self, run_id: &str, status: &str, message: Option<String>) -> Result<()> {
        self.run_repo().finish(run_id, status, message).await
    }

    pub async fn record_check(&self, run_id: &str, check: StageCheckInput<'_>) -> Result<()> {
        self.run_repo().record_check(run_id, check).await
    }

    pub async fn recent_runs(&self, limit: u64) -> Result<Vec<PipelineRun>> {
        self.run_repo().recent(limit).await
    }

    pub async fn stage_checks(&self, run_id: &str) -> Result<Vec<StageCheck>> {
        self.run_repo().checks_for(run_id).await
    }
}
