use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, info, warn};

use super::endpoint::{EndpointOutcome, VerificationEndpoint};
use super::transport::VerificationTransport;
use crate::session::SessionHandle;

/// Reduced decision for one verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Undetermined,
    Granted,
    Denied,
}

/// Everything observed while verifying one identity. `outcomes[i]` belongs to
/// `endpoints[i]`; endpoints still in flight when a success arrived remain
/// `Pending`.
#[derive(Debug, Clone)]
pub struct AuthAttempt {
    pub identity: String,
    pub endpoints: Vec<VerificationEndpoint>,
    pub outcomes: Vec<EndpointOutcome>,
    pub decision: AuthDecision,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("at least one verification endpoint is required")]
    NoEndpoints,
}

/// User-facing login failures. Denial never says whether an endpoint was
/// unreachable or answered negatively.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("enter the email registered with your membership")]
    BlankIdentity,
    #[error("access denied: this email is not linked to an active membership")]
    Denied,
}

pub struct AuthVerifier<T> {
    transport: Arc<T>,
    endpoints: Vec<VerificationEndpoint>,
    timeout: Duration,
    session: SessionHandle,
}

impl<T> AuthVerifier<T>
where
    T: VerificationTransport + 'static,
{
    pub fn new(
        transport: Arc<T>,
        endpoints: Vec<VerificationEndpoint>,
        timeout: Duration,
        session: SessionHandle,
    ) -> Result<Self, VerifierError> {
        if endpoints.is_empty() {
            return Err(VerifierError::NoEndpoints);
        }
        Ok(Self {
            transport,
            endpoints,
            timeout,
            session,
        })
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn endpoints(&self) -> &[VerificationEndpoint] {
        &self.endpoints
    }

    /// Consult every endpoint concurrently and reduce to one decision. The
    /// first success wins; otherwise the attempt is denied once every endpoint
    /// has settled or the deadline passes. A granted identity is written to
    /// the session.
    pub async fn verify(&self, identity: &str) -> AuthAttempt {
        let mut outcomes = vec![EndpointOutcome::Pending; self.endpoints.len()];
        let mut in_flight: FuturesUnordered<_> = self
            .endpoints
            .iter()
            .enumerate()
            .map(|(index, endpoint)| async move {
                (index, self.transport.check(endpoint, identity).await)
            })
            .collect();

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut decision = AuthDecision::Undetermined;
        while decision == AuthDecision::Undetermined {
            tokio::select! {
                settled = in_flight.next() => match settled {
                    Some((index, outcome)) => {
                        log_outcome(&self.endpoints[index], &outcome);
                        if outcome.is_success() {
                            decision = AuthDecision::Granted;
                        }
                        outcomes[index] = outcome;
                    }
                    None => decision = AuthDecision::Denied,
                },
                () = &mut deadline => {
                    for (endpoint, outcome) in self.endpoints.iter().zip(outcomes.iter_mut()) {
                        if outcome.is_pending() {
                            warn!(endpoint = %endpoint.name, timeout_ms = self.timeout.as_millis() as u64, "verification endpoint timed out");
                            *outcome = EndpointOutcome::NetworkError {
                                detail: format!("timed out after {}ms", self.timeout.as_millis()),
                            };
                        }
                    }
                    decision = AuthDecision::Denied;
                }
            }
        }
        // Anything still in flight is dropped; late replies cannot change the decision.
        drop(in_flight);

        if decision == AuthDecision::Granted {
            if let Err(err) = self.session.set(identity) {
                warn!(error = %err, "session could not be persisted; keeping it in memory");
            }
            info!("membership verified");
        } else {
            info!(endpoints = self.endpoints.len(), "membership verification denied");
        }

        AuthAttempt {
            identity: identity.to_string(),
            endpoints: self.endpoints.clone(),
            outcomes,
            decision,
        }
    }

    /// Verify a login form submission and return the signed-in identity.
    pub async fn login(&self, identity: &str) -> Result<String, LoginError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(LoginError::BlankIdentity);
        }

        match self.verify(identity).await.decision {
            AuthDecision::Granted => Ok(identity.to_string()),
            _ => Err(LoginError::Denied),
        }
    }

    pub fn logout(&self) {
        if let Err(err) = self.session.clear() {
            warn!(error = %err, "stored session could not be removed");
        }
        info!("signed out");
    }
}

fn log_outcome(endpoint: &VerificationEndpoint, outcome: &EndpointOutcome) {
    match outcome {
        EndpointOutcome::NetworkError { detail } => {
            warn!(endpoint = %endpoint.name, %detail, "verification endpoint unreachable")
        }
        EndpointOutcome::Denied { reason } => {
            debug!(endpoint = %endpoint.name, %reason, "verification endpoint denied")
        }
        other => debug!(endpoint = %endpoint.name, outcome = other.label(), "verification endpoint settled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemorySessionStorage, SessionStore};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Scripted transport: each endpoint answers after its own delay.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: HashMap<String, (Duration, EndpointOutcome)>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn reply(mut self, name: &str, delay_ms: u64, outcome: EndpointOutcome) -> Self {
            self.replies
                .insert(name.to_string(), (Duration::from_millis(delay_ms), outcome));
            self
        }
    }

    #[async_trait]
    impl VerificationTransport for ScriptedTransport {
        async fn check(&self, endpoint: &VerificationEndpoint, _identity: &str) -> EndpointOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, outcome) = self
                .replies
                .get(&endpoint.name)
                .cloned()
                .expect("scripted endpoint");
            tokio::time::sleep(delay).await;
            outcome
        }
    }

    fn endpoints(names: &[&str]) -> Vec<VerificationEndpoint> {
        names
            .iter()
            .map(|name| {
                let url = Url::parse(&format!("https://{name}.example.test/verify"))
                    .expect("valid url");
                VerificationEndpoint::new(*name, url)
            })
            .collect()
    }

    fn denied() -> EndpointOutcome {
        EndpointOutcome::Denied {
            reason: "http status 500".to_string(),
        }
    }

    fn offline() -> EndpointOutcome {
        EndpointOutcome::NetworkError {
            detail: "connection refused".to_string(),
        }
    }

    fn verifier(transport: ScriptedTransport, timeout_ms: u64) -> AuthVerifier<ScriptedTransport> {
        AuthVerifier::new(
            Arc::new(transport),
            endpoints(&["a", "b"]),
            Duration::from_millis(timeout_ms),
            SessionStore::restore(MemorySessionStorage::default()),
        )
        .expect("endpoints present")
    }

    #[tokio::test]
    async fn success_wins_regardless_of_arrival_order() {
        for (a_delay, b_delay) in [(5, 40), (40, 5)] {
            let transport = ScriptedTransport::default()
                .reply("a", a_delay, denied())
                .reply("b", b_delay, EndpointOutcome::Success);
            let verifier = verifier(transport, 1_000);

            let attempt = verifier.verify("ana@funnels.dev").await;
            assert_eq!(attempt.decision, AuthDecision::Granted);
            assert_eq!(
                verifier.session().identity().as_deref(),
                Some("ana@funnels.dev")
            );
        }
    }

    #[tokio::test]
    async fn early_success_leaves_slow_endpoints_pending() {
        let transport = ScriptedTransport::default()
            .reply("a", 1, EndpointOutcome::Success)
            .reply("b", 500, denied());
        let verifier = verifier(transport, 2_000);

        let attempt = verifier.verify("ana@funnels.dev").await;
        assert_eq!(attempt.decision, AuthDecision::Granted);
        assert_eq!(attempt.outcomes[0], EndpointOutcome::Success);
        assert_eq!(attempt.outcomes[1], EndpointOutcome::Pending);
    }

    #[tokio::test]
    async fn all_network_errors_deny_without_escaping() {
        let transport = ScriptedTransport::default()
            .reply("a", 1, offline())
            .reply("b", 2, offline());
        let verifier = verifier(transport, 1_000);

        let attempt = verifier.verify("ana@funnels.dev").await;
        assert_eq!(attempt.decision, AuthDecision::Denied);
        assert!(attempt
            .outcomes
            .iter()
            .all(|outcome| matches!(outcome, EndpointOutcome::NetworkError { .. })));
        assert!(!verifier.session().is_authenticated());
        assert_eq!(verifier.transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn deadline_turns_hanging_endpoints_into_network_errors() {
        let transport = ScriptedTransport::default()
            .reply("a", 1, denied())
            .reply("b", 5_000, EndpointOutcome::Success);
        let verifier = verifier(transport, 50);

        let attempt = verifier.verify("ana@funnels.dev").await;
        assert_eq!(attempt.decision, AuthDecision::Denied);
        assert!(matches!(attempt.outcomes[0], EndpointOutcome::Denied { .. }));
        assert!(matches!(
            attempt.outcomes[1],
            EndpointOutcome::NetworkError { .. }
        ));
    }

    #[tokio::test]
    async fn login_hides_failure_detail_and_rejects_blank_identity() {
        let transport = ScriptedTransport::default()
            .reply("a", 1, offline())
            .reply("b", 1, denied());
        let verifier = verifier(transport, 1_000);

        assert_eq!(verifier.login("   ").await, Err(LoginError::BlankIdentity));
        assert_eq!(verifier.transport.calls.load(Ordering::SeqCst), 0);

        assert_eq!(verifier.login("ana@funnels.dev").await, Err(LoginError::Denied));
    }

    #[tokio::test]
    async fn login_trims_identity_and_logout_clears_session() {
        let transport = ScriptedTransport::default()
            .reply("a", 1, EndpointOutcome::Success)
            .reply("b", 1, EndpointOutcome::Success);
        let verifier = verifier(transport, 1_000);

        let identity = verifier
            .login("  ana@funnels.dev ")
            .await
            .expect("granted");
        assert_eq!(identity, "ana@funnels.dev");
        assert_eq!(
            verifier.session().identity().as_deref(),
            Some("ana@funnels.dev")
        );

        verifier.logout();
        assert!(!verifier.session().is_authenticated());
    }

    #[test]
    fn rejects_empty_endpoint_list() {
        let result = AuthVerifier::new(
            Arc::new(ScriptedTransport::default()),
            Vec::new(),
            Duration::from_secs(1),
            SessionStore::restore(MemorySessionStorage::default()),
        );
        assert!(matches!(result, Err(VerifierError::NoEndpoints)));
    }
}
