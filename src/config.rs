use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const APP_DIR: &str = "anime-data-pipeline";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub anilist: AnilistConfig,

    pub storage: StorageConfig,

    pub publisher: PublisherConfig,

    pub scheduler: SchedulerConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,

    /// "text" or "json"
    pub log_format: String,

    /// Directory the raw payload of each run is written to.
    pub data_path: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            data_path: "data".to_string(),
            worker_threads: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnilistConfig {
    pub endpoint: String,

    pub user_name: String,

    /// Directory holding the GraphQL documents.
    pub query_path: String,

    pub query_file: String,

    pub request_timeout_seconds: u64,
}

impl Default for AnilistConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://graphql.anilist.co".to_string(),
            user_name: String::new(),
            query_path: "queries".to_string(),
            query_file: "anilist.graphql".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: String,

    /// Prefix of every table the pipeline writes, e.g. `anilist_fact_anime`.
    pub schema: String,

    /// Directory of `*.sql` aggregation queries. Each file becomes a table
    /// named after its stem.
    pub aggregations_path: String,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/anime.db".to_string(),
            schema: "anilist".to_string(),
            aggregations_path: "queries/aggregations".to_string(),
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub fn table_name(&self, table: &str) -> String {
        if self.schema.is_empty() {
            table.to_string()
        } else {
            format!("{}_{}", self.schema, table)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub enabled: bool,

    /// Directory holding one `<topic>.jsonl` file per topic.
    pub output_path: String,

    pub user_topic: String,

    pub media_topic: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_path: "data/topics".to_string(),
            user_topic: "raw_user".to_string(),
            media_topic: "raw_media".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,

    pub cron_expression: Option<String>,

    /// Used when no cron expression is set.
    pub interval_minutes: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron_expression: Some("0 */30 * * * *".to_string()),
            interval_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_port: Some(9464),
        }
    }
}

impl Config {
    /// Loads the first config file found, then applies environment
    /// overrides. Also returns the file used, if any, so it can be logged
    /// once tracing is up.
    pub fn load() -> Result<(Self, Option<PathBuf>)> {
        Self::load_first(&Self::config_paths())
    }

    fn load_first(paths: &[PathBuf]) -> Result<(Self, Option<PathBuf>)> {
        let source = paths.iter().find(|p| p.exists()).cloned();

        let mut config = match &source {
            Some(path) => Self::load_from_path(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok((config, source))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Deployment overrides, read once at load time. Nothing below the config
    /// layer looks at the environment.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("USER_NAME") {
            self.anilist.user_name = v;
        }
        if let Some(v) = var("QUERY_PATH") {
            self.anilist.query_path = v;
        }
        if let Some(v) = var("DATA_PATH") {
            self.general.data_path = v;
        }
        if let Some(v) = var("DATABASE_URL") {
            self.storage.database_path = v;
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_DIR).join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(format!(".{APP_DIR}")).join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.anilist.user_name.trim().is_empty() {
            anyhow::bail!("anilist.user_name must be set (or USER_NAME in the environment)");
        }

        url::Url::parse(&self.anilist.endpoint)
            .with_context(|| format!("Invalid AniList endpoint: {}", self.anilist.endpoint))?;

        if self.scheduler.enabled
            && self.scheduler.interval_minutes == 0
            && self.scheduler.cron_expression.is_none()
        {
            anyhow::bail!("Scheduler interval must be > 0 or cron expression must be set");
        }

        if !matches!(self.general.log_format.as_str(), "text" | "json") {
            anyhow::bail!(
                "general.log_format must be \"text\" or \"json\", got \"{}\"",
                self.general.log_format
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.anilist.endpoint, "https://graphql.anilist.co");
        assert_eq!(config.publisher.user_topic, "raw_user");
        assert_eq!(config.publisher.media_topic, "raw_media");
        assert_eq!(
            config.scheduler.cron_expression.as_deref(),
            Some("0 */30 * * * *")
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[anilist]"));
        assert!(toml_str.contains("[storage]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [anilist]
            user_name = "someone"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.anilist.user_name, "someone");

        assert_eq!(config.storage.schema, "anilist");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env_overrides(|key| match key {
            "USER_NAME" => Some("from_env".to_string()),
            "DATABASE_URL" => Some("sqlite:/tmp/x.db".to_string()),
            _ => None,
        });
        assert_eq!(config.anilist.user_name, "from_env");
        assert_eq!(config.storage.database_path, "sqlite:/tmp/x.db");
        assert_eq!(config.general.data_path, "data");
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.anilist.user_name = "someone".to_string();
        assert!(config.validate().is_ok());

        config.anilist.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_first_reports_the_file_used() {
        let dir = std::env::temp_dir().join(format!("adp-config-test-{}", uuid::Uuid::new_v4()));
        let missing = dir.join("missing.toml");
        let present = dir.join("config.toml");
        let mut written = Config::default();
        written.general.log_level = "debug".to_string();
        written.save_to_path(&present).unwrap();

        let (config, source) =
            Config::load_first(&[missing.clone(), present.clone()]).unwrap();
        assert_eq!(source.as_deref(), Some(present.as_path()));
        assert_eq!(config.general.log_level, "debug");

        let (config, source) = Config::load_first(&[missing]).unwrap();
        assert_eq!(source, None);
        assert_eq!(config.general.log_level, "info");

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_table_name() {
        let mut storage = StorageConfig::default();
        assert_eq!(storage.table_name("fact_anime"), "anilist_fact_anime");
        storage.schema.clear();
        assert_eq!(storage.table_name("fact_anime"), "fact_anime");
    }
}
