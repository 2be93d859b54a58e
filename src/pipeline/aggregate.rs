//! Aggregations are plain SQL files. The core does not generate SQL; it reads
//! each file, substitutes `{schema}` and materializes the result as a table
//! named after the file stem.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::config::StorageConfig;
use crate::db::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationQuery {
    pub name: String,
    pub sql: String,
}

/// Loads every `*.sql` file of the aggregation directory, sorted by file
/// name. A missing directory means no aggregations.
pub async fn load_queries(storage: &StorageConfig) -> Result<Vec<AggregationQuery>> {
    let dir = Path::new(&storage.aggregations_path);
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        info!("No aggregation directory at {}", dir.display());
        return Ok(Vec::new());
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "sql") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut queries = Vec::with_capacity(paths.len());
    for path in paths {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .with_context(|| format!("Unusable file name: {}", path.display()))?;
        let sql = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        queries.push(AggregationQuery {
            name: storage.table_name(stem),
            sql: sql
                .trim()
                .trim_end_matches(';')
                .replace("{schema}", &storage.schema),
        });
    }
    Ok(queries)
}

/// Runs every query in order and returns `(table, rows)` per aggregation.
pub async fn run_aggregations(
    store: &Store,
    queries: &[AggregationQuery],
) -> Result<Vec<(String, u64)>> {
    let mut results = Vec::with_capacity(queries.len());
    for query in queries {
        let rows = store.run_aggregation(&query.name, &query.sql).await?;
        info!(table = %query.name, rows, "Aggregation materialized");
        results.push((query.name.clone(), rows));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_queries_substitutes_schema() {
        let dir = std::env::temp_dir().join(format!("adp-agg-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("b_scores.sql"),
            "SELECT AVG(score) AS avg_score FROM {schema}_fact_anime;\n",
        )
        .unwrap();
        std::fs::write(dir.join("a_counts.sql"), "SELECT 1 AS n").unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let storage = StorageConfig {
            aggregations_path: dir.display().to_string(),
            ..StorageConfig::default()
        };
        let queries = load_queries(&storage).await.unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].name, "anilist_a_counts");
        assert_eq!(queries[1].name, "anilist_b_scores");
        assert_eq!(
            queries[1].sql,
            "SELECT AVG(score) AS avg_score FROM anilist_fact_anime"
        );

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let storage = StorageConfig {
            aggregations_path: "/nonexistent/adp-aggregations".to_string(),
            ..StorageConfig::default()
        };
        assert!(load_queries(&storage).await.unwrap().is_empty());
    }
}
