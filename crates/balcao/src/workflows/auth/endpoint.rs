use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Response field carrying the verification verdict.
pub const AFFIRMATIVE_FIELD: &str = "status";
/// The only value of [`AFFIRMATIVE_FIELD`] treated as a confirmed member.
pub const AFFIRMATIVE_VALUE: &str = "true";

/// An independent service consulted for a yes/no membership decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEndpoint {
    pub name: String,
    pub url: Url,
}

impl VerificationEndpoint {
    pub fn new(name: impl Into<String>, url: Url) -> Self {
        Self {
            name: name.into(),
            url,
        }
    }
}

/// Result of consulting a single endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointOutcome {
    Pending,
    Success,
    Denied { reason: String },
    NetworkError { detail: String },
}

impl EndpointOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, EndpointOutcome::Success)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EndpointOutcome::Pending)
    }

    pub fn label(&self) -> &'static str {
        match self {
            EndpointOutcome::Pending => "pending",
            EndpointOutcome::Success => "success",
            EndpointOutcome::Denied { .. } => "denied",
            EndpointOutcome::NetworkError { .. } => "network_error",
        }
    }
}

/// Classify a response that arrived intact. Only a 2xx response whose JSON
/// body carries the affirmative marker is a success; everything else is a
/// denial.
pub fn classify_response(status: u16, body: &[u8]) -> EndpointOutcome {
    if !(200..300).contains(&status) {
        return EndpointOutcome::Denied {
            reason: format!("http status {status}"),
        };
    }

    let parsed: Value = match serde_json::from_slice(body) {
        Ok(parsed) => parsed,
        Err(err) => {
            return EndpointOutcome::Denied {
                reason: format!("malformed body: {err}"),
            }
        }
    };

    match parsed.get(AFFIRMATIVE_FIELD) {
        Some(Value::String(marker)) if marker == AFFIRMATIVE_VALUE => EndpointOutcome::Success,
        Some(other) => EndpointOutcome::Denied {
            reason: format!("{AFFIRMATIVE_FIELD} was {other}"),
        },
        None => EndpointOutcome::Denied {
            reason: format!("{AFFIRMATIVE_FIELD} missing"),
        },
    }
}
