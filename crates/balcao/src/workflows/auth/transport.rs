use async_trait::async_trait;
use serde::Serialize;

use super::endpoint::{classify_response, EndpointOutcome, VerificationEndpoint};

/// Body posted to every verification endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationRequest<'a> {
    pub identity: &'a str,
}

/// Consults one endpoint. Implementations never fail: transport problems are
/// reported as [`EndpointOutcome::NetworkError`].
#[async_trait]
pub trait VerificationTransport: Send + Sync {
    async fn check(&self, endpoint: &VerificationEndpoint, identity: &str) -> EndpointOutcome;
}

/// JSON-over-HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpVerificationTransport {
    client: reqwest::Client,
}

impl HttpVerificationTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VerificationTransport for HttpVerificationTransport {
    async fn check(&self, endpoint: &VerificationEndpoint, identity: &str) -> EndpointOutcome {
        let response = match self
            .client
            .post(endpoint.url.clone())
            .json(&VerificationRequest { identity })
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                return EndpointOutcome::NetworkError {
                    detail: err.to_string(),
                }
            }
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => classify_response(status, &body),
            Err(err) => EndpointOutcome::NetworkError {
                detail: err.to_string(),
            },
        }
    }
}
