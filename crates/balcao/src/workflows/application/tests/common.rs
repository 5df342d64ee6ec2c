use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::marketplace::listing::PublicOpportunity;
use crate::marketplace::store::{OpportunityStore, StoreError};
use crate::session::{MemorySessionStorage, SessionHandle, SessionStore};
use crate::workflows::application::domain::{
    ApplicationFields, ApplicationRecord, FieldName, WizardBlueprint,
};
use crate::workflows::application::{Transition, WizardController};

/// Store that accepts every insert and remembers the payloads.
#[derive(Default)]
pub(super) struct MemoryStore {
    inserted: Mutex<Vec<ApplicationRecord>>,
}

impl MemoryStore {
    pub(super) fn inserted(&self) -> Vec<ApplicationRecord> {
        self.inserted
            .lock()
            .expect("memory store mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl OpportunityStore for MemoryStore {
    async fn insert(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
        self.inserted
            .lock()
            .expect("memory store mutex poisoned")
            .push(record.clone());
        Ok(())
    }

    async fn list_public(&self) -> Result<Vec<PublicOpportunity>, StoreError> {
        Ok(Vec::new())
    }
}

/// Store that holds every insert for `delay` before accepting it.
pub(super) struct SlowStore {
    delay: Duration,
    inner: MemoryStore,
}

impl SlowStore {
    pub(super) fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            inner: MemoryStore::default(),
        }
    }

    pub(super) fn inserted(&self) -> Vec<ApplicationRecord> {
        self.inner.inserted()
    }
}

#[async_trait]
impl OpportunityStore for SlowStore {
    async fn insert(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert(record).await
    }

    async fn list_public(&self) -> Result<Vec<PublicOpportunity>, StoreError> {
        self.inner.list_public().await
    }
}

/// Store whose first `failures` inserts are rejected. Every attempt is
/// recorded, successful or not.
pub(super) struct FlakyStore {
    failures: Mutex<usize>,
    attempts: Mutex<Vec<ApplicationRecord>>,
}

impl FlakyStore {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            failures: Mutex::new(failures),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn attempts(&self) -> Vec<ApplicationRecord> {
        self.attempts
            .lock()
            .expect("flaky store mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl OpportunityStore for FlakyStore {
    async fn insert(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
        self.attempts
            .lock()
            .expect("flaky store mutex poisoned")
            .push(record.clone());
        let mut failures = self.failures.lock().expect("flaky store mutex poisoned");
        if *failures > 0 {
            *failures -= 1;
            return Err(StoreError::Rejected {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn list_public(&self) -> Result<Vec<PublicOpportunity>, StoreError> {
        Err(StoreError::Transport("connection reset".to_string()))
    }
}

pub(super) fn signed_in(identity: &str) -> SessionHandle {
    SessionStore::restore(MemorySessionStorage::with_identity(identity))
}

pub(super) fn signed_out() -> SessionHandle {
    SessionStore::restore(MemorySessionStorage::default())
}

pub(super) fn controller<S>(store: Arc<S>) -> WizardController<S>
where
    S: OpportunityStore + 'static,
{
    WizardController::new(Arc::new(WizardBlueprint::standard()), store)
}

pub(super) fn complete_fields() -> ApplicationFields {
    ApplicationFields {
        name: "Ana Ribeiro".to_string(),
        niche: "Tech".to_string(),
        instagram: "@ana.funnels".to_string(),
        whatsapp: "+55 11 91234-5678".to_string(),
        email: "ana@funnels.dev".to_string(),
        revenue: "R$ 30.000,00".to_string(),
        how_to_help: "Build the webinar launch funnel".to_string(),
        why_choose: "Warm audience and a proven offer".to_string(),
    }
}

pub(super) fn fill<S>(wizard: &mut WizardController<S>, fields: &ApplicationFields)
where
    S: OpportunityStore + 'static,
{
    for field in FieldName::ordered() {
        wizard.set_field(field, fields.get(field));
    }
}

/// Fill every field and walk the wizard to its final step.
pub(super) async fn at_final_step<S>(store: Arc<S>) -> WizardController<S>
where
    S: OpportunityStore + 'static,
{
    let mut wizard = controller(store);
    fill(&mut wizard, &complete_fields());
    while wizard.step_index() < wizard.blueprint().last_index() {
        let transition = wizard.advance().await;
        assert!(
            matches!(transition, Transition::Advanced { .. }),
            "complete fields should advance, got {transition:?}"
        );
    }
    wizard
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
