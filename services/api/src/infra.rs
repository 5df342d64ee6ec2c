use balcao::config::AppConfig;
use balcao::error::AppError;
use balcao::marketplace::RestOpportunityStore;
use balcao::session::SessionHandle;
use balcao::webhook::WebhookTrigger;
use balcao::workflows::application::{WizardBlueprint, WizardRegistry};
use balcao::workflows::auth::{AuthVerifier, HttpVerificationTransport};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

const USER_AGENT: &str = concat!("balcao-api/", env!("CARGO_PKG_VERSION"));
/// Per-request deadlines are set by each adapter from config.
const CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Workflow services sharing one session and one HTTP client.
pub(crate) struct Services {
    pub(crate) verifier: Arc<AuthVerifier<HttpVerificationTransport>>,
    pub(crate) store: Arc<RestOpportunityStore>,
    pub(crate) wizards: Arc<WizardRegistry<RestOpportunityStore>>,
    pub(crate) webhooks: Arc<WebhookTrigger>,
}

impl Services {
    pub(crate) fn build(config: &AppConfig, session: SessionHandle) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        let verifier = AuthVerifier::new(
            Arc::new(HttpVerificationTransport::new(client.clone())),
            config.verification.endpoints.clone(),
            config.verification.timeout,
            session.clone(),
        )?;
        let store = Arc::new(RestOpportunityStore::new(
            client.clone(),
            &config.data_service,
        ));
        let wizards = WizardRegistry::new(WizardBlueprint::standard(), store.clone(), session);
        let webhooks = WebhookTrigger::new(client, config.server.origin(), &config.webhook);

        Ok(Self {
            verifier: Arc::new(verifier),
            store,
            wizards: Arc::new(wizards),
            webhooks: Arc::new(webhooks),
        })
    }
}
