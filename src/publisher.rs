//! Record publisher sink.
//!
//! The pipeline emits one message per user and one per list entry, then
//! flushes. [`JsonlPublisher`] is the bundled implementation: one
//! `<topic>.jsonl` file per topic, one message per line.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub key: Option<String>,
    pub value: serde_json::Value,
    pub published_at: String,
}

#[async_trait::async_trait]
pub trait RecordPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        key: Option<String>,
        value: serde_json::Value,
    ) -> Result<()>;

    /// Makes every message published so far durable.
    async fn flush(&self) -> Result<()>;
}

pub struct JsonlPublisher {
    output_path: PathBuf,
    pending: Mutex<BTreeMap<String, Vec<Message>>>,
}

impl JsonlPublisher {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn topic_path(&self, topic: &str) -> PathBuf {
        topic_path(&self.output_path, topic)
    }
}

fn topic_path(dir: &Path, topic: &str) -> PathBuf {
    dir.join(format!("{topic}.jsonl"))
}

#[async_trait::async_trait]
impl RecordPublisher for JsonlPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: Option<String>,
        value: serde_json::Value,
    ) -> Result<()> {
        let message = Message {
            key,
            value,
            published_at: chrono::Utc::now().to_rfc3339(),
        };
        self.pending
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.pending.lock().await);
        if pending.is_empty() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.output_path)
            .await
            .with_context(|| format!("Failed to create {}", self.output_path.display()))?;

        for (topic, messages) in pending {
            let path = self.topic_path(&topic);
            let mut buf = Vec::new();
            for message in &messages {
                serde_json::to_writer(&mut buf, message)?;
                buf.push(b'\n');
            }

            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .with_context(|| format!("Failed to open topic file {}", path.display()))?;
            file.write_all(&buf).await?;
            file.flush().await?;

            debug!(topic, count = messages.len(), "Flushed messages");
        }

        Ok(())
    }
}

/// Reads back every message of `topic` under `dir`. A topic that was never
/// written has no messages.
pub async fn read_topic(dir: &Path, topic: &str) -> Result<Vec<Message>> {
    let path = topic_path(dir, topic);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid message", path.display(), i + 1))
        })
        .collect()
}

/// Publishes the user and every raw list entry of a validated payload, then
/// flushes. Returns `(users, entries)` published.
pub async fn publish_raw(
    publisher: &dyn RecordPublisher,
    raw: &crate::models::RawPayload,
    user_topic: &str,
    media_topic: &str,
) -> Result<(usize, usize)> {
    let user = serde_json::Value::Object(raw.data.user.clone());
    let user_key = user.get("id").map(ToString::to_string);
    publisher.publish(user_topic, user_key, user).await?;

    let mut entries = 0;
    for (_, entry) in raw.entries() {
        let key = entry.get("id").map(ToString::to_string);
        publisher.publish(media_topic, key, entry.clone()).await?;
        entries += 1;
    }

    publisher.flush().await?;
    info!(
        user_topic,
        media_topic, entries, "Published raw user and entries"
    );
    Ok((1, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("adp-publisher-test-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_messages_only_land_on_flush() {
        let dir = temp_dir();
        let publisher = JsonlPublisher::new(&dir);

        publisher
            .publish("raw_user", Some("42".into()), json!({"id": 42}))
            .await
            .unwrap();
        assert!(read_topic(&dir, "raw_user").await.unwrap().is_empty());

        publisher.flush().await.unwrap();
        let messages = read_topic(&dir, "raw_user").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].key.as_deref(), Some("42"));
        assert_eq!(messages[0].value, json!({"id": 42}));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_publish_raw_one_message_per_record() {
        let dir = temp_dir();
        let publisher = JsonlPublisher::new(&dir);
        let raw = crate::models::RawPayload::from_value(&json!({
            "data": {
                "MediaListCollection": {"lists": [
                    {"name": "a", "status": "CURRENT", "entries": [{"id": 1}, {"id": 2}]},
                    {"name": "b", "status": "PAUSED", "entries": [{"id": 3}]}
                ]},
                "User": {"id": 42}
            }
        }))
        .unwrap();

        let counts = publish_raw(&publisher, &raw, "raw_user", "raw_media")
            .await
            .unwrap();
        assert_eq!(counts, (1, 3));

        let media = read_topic(&dir, "raw_media").await.unwrap();
        let keys: Vec<_> = media.iter().filter_map(|m| m.key.clone()).collect();
        assert_eq!(keys, vec!["1", "2", "3"]);

        std::fs::remove_dir_all(dir).ok();
    }
}
