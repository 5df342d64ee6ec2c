use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;
use uuid::Uuid;

use super::controller::{SubmitOutcome, Transition, WizardController, WizardView};
use super::domain::WizardBlueprint;
use crate::marketplace::store::OpportunityStore;
use crate::session::SessionHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WizardId(pub Uuid);

impl WizardId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WizardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardRegistryError {
    #[error("wizard {0} does not exist")]
    NotFound(WizardId),
    #[error("no member is signed in")]
    SignedOut,
    #[error("wizard task stopped unexpectedly: {0}")]
    Interrupted(String),
}

type SharedWizard<S> = Arc<AsyncMutex<WizardController<S>>>;

struct Entry<S> {
    owner: String,
    wizard: SharedWizard<S>,
}

/// Live wizards, one per open intake form. Each wizard sits behind an async
/// mutex so overlapping requests for the same form queue instead of
/// interleaving. A wizard belongs to the identity that opened it and is
/// invisible to any other session.
pub struct WizardRegistry<S> {
    blueprint: Arc<WizardBlueprint>,
    store: Arc<S>,
    session: SessionHandle,
    wizards: Mutex<HashMap<WizardId, Entry<S>>>,
}

impl<S> WizardRegistry<S>
where
    S: OpportunityStore + 'static,
{
    pub fn new(blueprint: WizardBlueprint, store: Arc<S>, session: SessionHandle) -> Self {
        Self {
            blueprint: Arc::new(blueprint),
            store,
            session,
            wizards: Mutex::new(HashMap::new()),
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn len(&self) -> usize {
        self.wizards.lock().expect("wizard registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a wizard for the signed-in member. Wizards left behind by any
    /// other identity are retired first.
    pub fn create(&self) -> Result<(WizardId, WizardView), WizardRegistryError> {
        let owner = self
            .session
            .identity()
            .ok_or(WizardRegistryError::SignedOut)?;
        let id = WizardId::generate();
        let controller = WizardController::new(self.blueprint.clone(), self.store.clone())
            .with_session(self.session.clone());
        let view = controller.snapshot();

        let mut wizards = self.wizards.lock().expect("wizard registry poisoned");
        let before = wizards.len();
        wizards.retain(|_, entry| entry.owner == owner);
        let retired = before - wizards.len();
        if retired > 0 {
            debug!(retired, "retired wizards from a previous session");
        }
        wizards.insert(
            id,
            Entry {
                owner,
                wizard: Arc::new(AsyncMutex::new(controller)),
            },
        );
        debug!(wizard = %id, "wizard opened");
        Ok((id, view))
    }

    fn get(&self, id: WizardId) -> Result<SharedWizard<S>, WizardRegistryError> {
        let owner = self.session.identity();
        self.wizards
            .lock()
            .expect("wizard registry poisoned")
            .get(&id)
            .filter(|entry| owner.as_deref() == Some(entry.owner.as_str()))
            .map(|entry| entry.wizard.clone())
            .ok_or(WizardRegistryError::NotFound(id))
    }

    /// Drop a wizard owned by the current session, e.g. when the member
    /// navigates away.
    pub fn remove(&self, id: WizardId) -> bool {
        let owner = self.session.identity();
        let mut wizards = self.wizards.lock().expect("wizard registry poisoned");
        let owned = wizards
            .get(&id)
            .is_some_and(|entry| owner.as_deref() == Some(entry.owner.as_str()));
        if owned {
            wizards.remove(&id);
            debug!(wizard = %id, "wizard closed");
        }
        owned
    }

    pub async fn view(&self, id: WizardId) -> Result<WizardView, WizardRegistryError> {
        let wizard = self.get(id)?;
        let view = wizard.lock().await.snapshot();
        Ok(view)
    }

    pub async fn update<F>(&self, id: WizardId, edit: F) -> Result<WizardView, WizardRegistryError>
    where
        F: FnOnce(&mut WizardController<S>),
    {
        let wizard = self.get(id)?;
        let mut guard = wizard.lock().await;
        edit(&mut guard);
        Ok(guard.snapshot())
    }

    pub async fn retreat(&self, id: WizardId) -> Result<WizardView, WizardRegistryError> {
        self.update(id, |wizard| {
            wizard.retreat();
        })
        .await
    }

    /// Advance a wizard. The transition runs on its own task so that a
    /// dropped request cannot abandon a submission half-way; a successful
    /// submission retires the wizard.
    pub async fn advance(
        &self,
        id: WizardId,
    ) -> Result<(Transition, WizardView), WizardRegistryError> {
        let wizard = self.get(id)?;
        let (transition, view) = tokio::spawn(async move {
            let mut guard = wizard.lock().await;
            let transition = guard.advance().await;
            (transition, guard.snapshot())
        })
        .await
        .map_err(|err| WizardRegistryError::Interrupted(err.to_string()))?;

        if matches!(
            transition,
            Transition::Submission {
                outcome: SubmitOutcome::Submitted
            }
        ) {
            self.wizards
                .lock()
                .expect("wizard registry poisoned")
                .remove(&id);
            debug!(wizard = %id, "wizard retired after submission");
        }
        Ok((transition, view))
    }
}
