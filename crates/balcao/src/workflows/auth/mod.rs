//! Member verification against redundant endpoints and the session routes
//! built on top of it.

mod endpoint;
pub mod router;
mod transport;
mod verifier;

pub use endpoint::{
    classify_response, EndpointOutcome, VerificationEndpoint, AFFIRMATIVE_FIELD, AFFIRMATIVE_VALUE,
};
pub use router::session_router;
pub use transport::{HttpVerificationTransport, VerificationRequest, VerificationTransport};
pub use verifier::{AuthAttempt, AuthDecision, AuthVerifier, LoginError, VerifierError};
