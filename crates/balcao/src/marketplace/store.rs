use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::json;
use tracing::debug;
use url::Url;

use super::listing::PublicOpportunity;
use crate::config::DataServiceConfig;
use crate::workflows::application::ApplicationRecord;

const OPPORTUNITIES_TABLE: &str = "balcao_opportunities";
const PUBLIC_LISTING_PROCEDURE: &str = "get_public_opportunities";

/// Remote data service holding opportunities. Row-level security lives on
/// the service side; this client only sees what the public key allows.
#[async_trait]
pub trait OpportunityStore: Send + Sync {
    async fn insert(&self, record: &ApplicationRecord) -> Result<(), StoreError>;
    async fn list_public(&self) -> Result<Vec<PublicOpportunity>, StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("data service unreachable: {0}")]
    Transport(String),
    #[error("data service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("data service returned an unreadable payload: {0}")]
    Decode(String),
}

/// PostgREST-style client: table inserts under `/rest/v1/<table>` and
/// procedures under `/rest/v1/rpc/<name>`. A request that outlives `timeout`
/// fails as [`StoreError::Transport`].
#[derive(Debug, Clone)]
pub struct RestOpportunityStore {
    client: reqwest::Client,
    base_url: Url,
    public_key: String,
    timeout: Duration,
}

impl RestOpportunityStore {
    pub fn new(client: reqwest::Client, config: &DataServiceConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            public_key: config.public_key.clone(),
            timeout: config.timeout,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/rest/v1/{path}",
            self.base_url.as_str().trim_end_matches('/')
        )
    }

    fn auth_headers(&self) -> Result<HeaderMap, StoreError> {
        let key = HeaderValue::from_str(&self.public_key)
            .map_err(|_| StoreError::Transport("public key is not a valid header value".into()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.public_key))
            .map_err(|_| StoreError::Transport("public key is not a valid header value".into()))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|err| format!("<unreadable body: {err}>"));
        Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

#[async_trait]
impl OpportunityStore for RestOpportunityStore {
    async fn insert(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.endpoint(OPPORTUNITIES_TABLE))
            .headers(self.auth_headers()?)
            .header("Prefer", "return=minimal")
            .timeout(self.timeout)
            .json(record)
            .send()
            .await
            .map_err(transport)?;
        Self::ensure_success(response).await?;
        debug!(owner = %record.user_id, "opportunity stored");
        Ok(())
    }

    async fn list_public(&self) -> Result<Vec<PublicOpportunity>, StoreError> {
        let response = self
            .client
            .post(self.endpoint(&format!("rpc/{PUBLIC_LISTING_PROCEDURE}")))
            .headers(self.auth_headers()?)
            .timeout(self.timeout)
            .json(&json!({}))
            .send()
            .await
            .map_err(transport)?;
        let response = Self::ensure_success(response).await?;
        let body = response.bytes().await.map_err(transport)?;
        let opportunities: Vec<PublicOpportunity> =
            serde_json::from_slice(&body).map_err(|err| StoreError::Decode(err.to_string()))?;
        debug!(count = opportunities.len(), "public opportunities fetched");
        Ok(opportunities)
    }
}
