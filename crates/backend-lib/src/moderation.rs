// ============================
// crates/backend-lib/src/moderation.rs
// ============================
//! Content moderation collaborator.
//!
//! User-generated text is classified by a remote API. Classification failures
//! never block a submission: [`moderate_content`] treats them as "not flagged".
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::ModerationSettings;
use crate::metrics::MODERATION_FAIL_OPEN;

/// Failures talking to the moderation API
#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("Moderation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Moderation API returned status {0}")]
    Status(u16),

    #[error("Malformed moderation response: {0}")]
    MalformedResponse(String),
}

/// Raw classifier output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub flagged: bool,
    pub categories: BTreeMap<String, bool>,
    pub scores: BTreeMap<String, f64>,
}

/// Caller-facing result of moderating a text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationVerdict {
    pub safe: bool,
    pub categories: BTreeMap<String, bool>,
}

impl ModerationVerdict {
    pub fn safe() -> Self {
        Self {
            safe: true,
            categories: BTreeMap::new(),
        }
    }

    /// Categories the classifier flagged, for error messages
    pub fn flagged_categories(&self) -> Vec<&str> {
        self.categories
            .iter()
            .filter(|(_, flagged)| **flagged)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl From<Classification> for ModerationVerdict {
    fn from(classification: Classification) -> Self {
        Self {
            safe: !classification.flagged,
            categories: classification.categories,
        }
    }
}

#[async_trait]
pub trait Moderator: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, ModerationError>;
}

/// Classify `text`, failing open on any collaborator error
pub async fn moderate_content(moderator: &dyn Moderator, text: &str) -> ModerationVerdict {
    match moderator.classify(text).await {
        Ok(classification) => classification.into(),
        Err(e) => {
            counter!(MODERATION_FAIL_OPEN).increment(1);
            tracing::warn!(error = %e, "moderation unavailable, accepting content");
            ModerationVerdict::safe()
        },
    }
}

/// Used when no API key is configured: everything is allowed
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledModerator;

#[async_trait]
impl Moderator for DisabledModerator {
    async fn classify(&self, _text: &str) -> Result<Classification, ModerationError> {
        Ok(Classification::default())
    }
}

/// Moderation-API response (`results[0]` is the only one used)
#[derive(Debug, Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Debug, Deserialize)]
struct ModerationResult {
    flagged: bool,
    #[serde(default)]
    categories: BTreeMap<String, bool>,
    #[serde(default)]
    category_scores: BTreeMap<String, f64>,
}

/// Client for an OpenAI-compatible moderation endpoint
pub struct HttpModerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpModerator {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Moderator for HttpModerator {
    async fn classify(&self, text: &str) -> Result<Classification, ModerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({ "input": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModerationError::Status(status.as_u16()));
        }

        let body: ModerationResponse = response.json().await?;
        let result = body
            .results
            .into_iter()
            .next()
            .ok_or_else(|| ModerationError::MalformedResponse("empty results".to_string()))?;

        Ok(Classification {
            flagged: result.flagged,
            categories: result.categories,
            scores: result.category_scores,
        })
    }
}

/// Pick the moderator implied by configuration
pub fn from_settings(settings: &ModerationSettings) -> Arc<dyn Moderator> {
    match settings.api_key.as_deref().filter(|key| !key.is_empty()) {
        Some(key) => {
            tracing::info!(endpoint = %settings.endpoint, "content moderation enabled");
            Arc::new(HttpModerator::new(
                settings.endpoint.clone(),
                key,
                Duration::from_secs(settings.timeout_secs),
            ))
        },
        None => {
            tracing::info!("content moderation disabled: no API key configured");
            Arc::new(DisabledModerator)
        },
    }
}
