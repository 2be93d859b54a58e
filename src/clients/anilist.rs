use crate::config::AnilistConfig;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
    variables: Variables<'a>,
}

#[derive(Serialize)]
struct Variables<'a> {
    #[serde(rename = "userName")]
    user_name: &'a str,
}

#[derive(Deserialize)]
struct GraphQLError {
    message: String,
}

/// Fetches a user's watch list from the AniList GraphQL endpoint.
///
/// The response body is returned untouched; shape checks belong to the
/// pipeline, not to the client.
#[derive(Clone)]
pub struct AnilistClient {
    client: Client,
    endpoint: String,
    user_name: String,
    query_path: PathBuf,
}

impl AnilistClient {
    pub fn new(config: &AnilistConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("anime-data-pipeline/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to build AniList HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            user_name: config.user_name.clone(),
            query_path: PathBuf::from(&config.query_path),
        })
    }

    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Runs the GraphQL document stored at `<query_path>/<query_filename>`.
    ///
    /// Network failures and non-2xx responses are errors. A 2xx body carrying
    /// GraphQL `errors` is returned as-is after logging them.
    pub async fn query(&self, query_filename: &str) -> Result<serde_json::Value> {
        let query = read_query(&self.query_path.join(query_filename)).await?;

        info!(
            "Loading raw AniList data for user {} from {}",
            self.user_name, self.endpoint
        );

        let request_body = GraphQLRequest {
            query: &query,
            variables: Variables {
                user_name: &self.user_name,
            },
        };

        let data: serde_json::Value = self
            .client
            .post(&self.endpoint)
            .json(&request_body)
            .send()
            .await
            .context("AniList request failed")?
            .error_for_status()
            .context("AniList returned an error status")?
            .json()
            .await
            .context("AniList response was not JSON")?;

        if let Some(errors) = data.get("errors") {
            let errors: Vec<GraphQLError> =
                serde_json::from_value(errors.clone()).unwrap_or_default();
            for e in errors {
                warn!("AniList GraphQL error: {}", e.message);
            }
        }

        Ok(data)
    }
}

async fn read_query(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read query file: {}", path.display()))
}
