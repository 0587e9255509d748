//! Push gateway clients
//!
//! Delivery itself belongs to an external multicast service. Rideway posts one
//! payload per broadcast and records what the gateway reports back.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Push gateway request failed: {0}")]
    Request(String),

    #[error("Push gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Multicast payload sent to the gateway
#[derive(Debug, Serialize, Clone)]
pub struct PushMessage {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenFailure {
    pub token: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Per-call outcome reported by the gateway
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PushReport {
    pub success_count: usize,
    #[serde(default)]
    pub failures: Vec<TokenFailure>,
}

#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<PushReport, PushError>;
}

/// Posts to `PUSH_GATEWAY_URL` with the configured key as a bearer token
pub struct HttpPushGateway {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpPushGateway {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            url,
            api_key,
        }
    }
}

#[async_trait]
impl PushGateway for HttpPushGateway {
    async fn send(&self, message: &PushMessage) -> Result<PushReport, PushError> {
        let mut request = self.client.post(&self.url).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PushError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        // Gateways that return no report accepted every token
        let report = response.json::<PushReport>().await.unwrap_or(PushReport {
            success_count: message.tokens.len(),
            failures: Vec::new(),
        });

        Ok(report)
    }
}

/// Used when no gateway is configured; logs and reports success
pub struct LogPushGateway;

#[async_trait]
impl PushGateway for LogPushGateway {
    async fn send(&self, message: &PushMessage) -> Result<PushReport, PushError> {
        tracing::info!(
            recipients = message.tokens.len(),
            title = %message.title,
            "Push gateway not configured, dropping notification"
        );
        Ok(PushReport {
            success_count: message.tokens.len(),
            failures: Vec::new(),
        })
    }
}
