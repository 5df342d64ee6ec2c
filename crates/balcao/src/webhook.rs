//! Manual webhook trigger used to test automation integrations.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use url::Url;

use crate::config::WebhookConfig;

pub const WEBHOOK_SOURCE: &str = "balcao_dos_funis";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("enter the webhook URL")]
    MissingUrl,
    #[error("'{url}' is not a valid http(s) URL")]
    InvalidUrl { url: String },
    #[error("'{url}' is not an allowed webhook address")]
    DisallowedUrl { url: String },
    #[error("webhook could not be dispatched: {0}")]
    Transport(String),
}

/// Record of a dispatched webhook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookReceipt {
    pub url: String,
    pub dispatched_at: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub struct WebhookTrigger {
    client: reqwest::Client,
    origin: String,
    allowed_prefix: Option<String>,
    timeout: Duration,
}

impl WebhookTrigger {
    pub fn new(client: reqwest::Client, origin: impl Into<String>, config: &WebhookConfig) -> Self {
        Self {
            client,
            origin: origin.into(),
            allowed_prefix: config.allowed_prefix.clone(),
            timeout: config.timeout,
        }
    }

    pub fn validate(&self, raw: &str) -> Result<Url, WebhookError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(WebhookError::MissingUrl);
        }
        let url = Url::parse(raw)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| WebhookError::InvalidUrl {
                url: raw.to_string(),
            })?;
        if let Some(prefix) = &self.allowed_prefix {
            if !url.as_str().contains(prefix.as_str()) {
                return Err(WebhookError::DisallowedUrl {
                    url: raw.to_string(),
                });
            }
        }
        Ok(url)
    }

    /// Standard envelope with the caller's keys laid over it.
    pub fn payload(&self, overrides: Map<String, Value>, now: DateTime<Utc>) -> Value {
        let mut body = Map::new();
        body.insert(
            "timestamp".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        body.insert(
            "triggered_from".to_string(),
            Value::String(self.origin.clone()),
        );
        body.insert(
            "source".to_string(),
            Value::String(WEBHOOK_SOURCE.to_string()),
        );
        body.extend(overrides);
        Value::Object(body)
    }

    /// Fire the webhook. Success means the request went out; whatever the
    /// remote answers is ignored.
    pub async fn trigger(
        &self,
        url: &str,
        overrides: Map<String, Value>,
    ) -> Result<WebhookReceipt, WebhookError> {
        let url = self.validate(url)?;
        let dispatched_at = Utc::now();
        let payload = self.payload(overrides, dispatched_at);

        let request = self
            .client
            .post(url.clone())
            .timeout(self.timeout)
            .json(&payload);
        match request.send().await {
            Ok(response) => {
                info!(url = %url, remote_status = response.status().as_u16(), "webhook dispatched");
                Ok(WebhookReceipt {
                    url: url.to_string(),
                    dispatched_at,
                    payload,
                })
            }
            Err(err) => {
                warn!(url = %url, error = %err, "webhook dispatch failed");
                Err(WebhookError::Transport(err.to_string()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub url: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

/// Router exposing the manual webhook trigger.
pub fn webhook_router(trigger: Arc<WebhookTrigger>) -> Router {
    Router::new()
        .route("/api/v1/webhooks/trigger", post(trigger_handler))
        .with_state(trigger)
}

pub(crate) async fn trigger_handler(
    State(trigger): State<Arc<WebhookTrigger>>,
    Json(request): Json<TriggerRequest>,
) -> Response {
    match trigger.trigger(&request.url, request.payload).await {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(err @ WebhookError::Transport(_)) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
