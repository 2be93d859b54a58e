use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const RAW_FILE_NAME: &str = "raw_anilist.json";

/// Writes the raw payload of a run to `<data_path>/raw_anilist.json`,
/// overwriting the previous run's file.
pub async fn save_raw(data_path: &Path, raw: &serde_json::Value) -> Result<PathBuf> {
    tokio::fs::create_dir_all(data_path)
        .await
        .with_context(|| format!("Failed to create data directory {}", data_path.display()))?;

    let path = data_path.join(RAW_FILE_NAME);
    let bytes = serde_json::to_vec(raw)?;
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    debug!(path = %path.display(), bytes = bytes.len(), "Raw payload saved");
    Ok(path)
}

pub async fn load_raw(path: &Path) -> Result<serde_json::Value> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = std::env::temp_dir().join(format!("adp-raw-test-{}", uuid::Uuid::new_v4()));
        let raw = serde_json::json!({"data": {"User": {"id": 1}}});

        let path = save_raw(&dir, &raw).await.unwrap();
        assert!(path.ends_with(RAW_FILE_NAME));
        assert_eq!(load_raw(&path).await.unwrap(), raw);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_json() {
        let dir = std::env::temp_dir().join(format!("adp-raw-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(load_raw(&path).await.is_err());

        std::fs::remove_dir_all(dir).ok();
    }
}
