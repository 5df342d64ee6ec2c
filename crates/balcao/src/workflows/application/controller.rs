use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{ApplicationFields, ApplicationRecord, FieldName, WizardBlueprint};
use super::gate::{can_advance, GateResult};
use super::progress::{derive_progress, ProgressState};
use crate::marketplace::store::OpportunityStore;
use crate::session::SessionHandle;

/// Message shown when the data service refuses or cannot take the
/// submission. The form keeps its data so the member can simply retry.
pub const RETRY_PROMPT: &str = "We could not send your application. Please try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Submitted,
    Blocked { errors: BTreeMap<FieldName, String> },
    NotAtFinalStep { step_index: usize },
    Failed { message: String },
    /// The wizard already submitted successfully; nothing more to do.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum Transition {
    Blocked { errors: BTreeMap<FieldName, String> },
    Advanced { step_index: usize },
    Submission { outcome: SubmitOutcome },
    Closed,
}

/// Serializable snapshot consumed by the form UI.
#[derive(Debug, Clone, Serialize)]
pub struct WizardView {
    pub step_index: usize,
    pub step_label: String,
    pub fields: ApplicationFields,
    pub errors: BTreeMap<FieldName, String>,
    pub status: SubmissionStatus,
    pub progress: ProgressState,
}

/// Owns one wizard instance: position, field values, displayed errors, and
/// the submission lifecycle. Transitions take `&mut self`, so two of them can
/// never be in flight on the same instance.
pub struct WizardController<S> {
    blueprint: Arc<WizardBlueprint>,
    store: Arc<S>,
    session: Option<SessionHandle>,
    step_index: usize,
    fields: ApplicationFields,
    errors: BTreeMap<FieldName, String>,
    status: SubmissionStatus,
}

impl<S> WizardController<S>
where
    S: OpportunityStore + 'static,
{
    pub fn new(blueprint: Arc<WizardBlueprint>, store: Arc<S>) -> Self {
        Self {
            blueprint,
            store,
            session: None,
            step_index: 0,
            fields: ApplicationFields::default(),
            errors: BTreeMap::new(),
            status: SubmissionStatus::Idle,
        }
    }

    /// Attribute submissions to the signed-in member instead of the email
    /// typed into the form.
    pub fn with_session(mut self, session: SessionHandle) -> Self {
        self.session = Some(session);
        self
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn fields(&self) -> &ApplicationFields {
        &self.fields
    }

    pub fn errors(&self) -> &BTreeMap<FieldName, String> {
        &self.errors
    }

    pub fn status(&self) -> SubmissionStatus {
        self.status
    }

    pub fn blueprint(&self) -> &WizardBlueprint {
        &self.blueprint
    }

    fn is_last_step(&self) -> bool {
        self.step_index == self.blueprint.last_index()
    }

    /// Replace a value. Validation waits for the next transition.
    pub fn set_field(&mut self, field: FieldName, value: impl Into<String>) {
        self.fields.set(field, value);
        self.errors.remove(&field);
    }

    pub async fn advance(&mut self) -> Transition {
        if self.status == SubmissionStatus::Succeeded {
            return Transition::Closed;
        }
        if self.is_last_step() {
            return Transition::Submission {
                outcome: self.submit().await,
            };
        }

        let step = &self.blueprint.steps()[self.step_index];
        match can_advance(step, &self.fields) {
            GateResult::Blocked { errors } => {
                debug!(step = self.step_index, failing = errors.len(), "step gate blocked");
                self.errors = errors.clone();
                Transition::Blocked { errors }
            }
            GateResult::Passed => {
                self.errors.clear();
                self.status = SubmissionStatus::Idle;
                self.step_index = (self.step_index + 1).min(self.blueprint.last_index());
                debug!(step = self.step_index, "wizard advanced");
                Transition::Advanced {
                    step_index: self.step_index,
                }
            }
        }
    }

    /// Step back without validating. No-op on the first step.
    pub fn retreat(&mut self) -> usize {
        if self.status == SubmissionStatus::Succeeded {
            return self.step_index;
        }
        self.step_index = self.step_index.saturating_sub(1);
        if self.status == SubmissionStatus::Failed {
            self.status = SubmissionStatus::Idle;
        }
        self.step_index
    }

    /// Record handed to the data service. Deterministic for unchanged
    /// fields, so a retry after failure sends an identical payload.
    pub fn submission_record(&self) -> ApplicationRecord {
        let user_id = self
            .session
            .as_ref()
            .and_then(|session| session.identity())
            .unwrap_or_else(|| self.fields.email.trim().to_string());
        ApplicationRecord {
            user_id,
            fields: self.fields.clone(),
        }
    }

    pub async fn submit(&mut self) -> SubmitOutcome {
        if self.status == SubmissionStatus::Succeeded {
            return SubmitOutcome::Closed;
        }
        if !self.is_last_step() {
            return SubmitOutcome::NotAtFinalStep {
                step_index: self.step_index,
            };
        }

        self.status = SubmissionStatus::Validating;
        let step = &self.blueprint.steps()[self.step_index];
        if let GateResult::Blocked { errors } = can_advance(step, &self.fields) {
            self.errors = errors.clone();
            self.status = SubmissionStatus::Idle;
            return SubmitOutcome::Blocked { errors };
        }
        self.errors.clear();

        let record = self.submission_record();
        self.status = SubmissionStatus::Submitting;
        match self.store.insert(&record).await {
            Ok(()) => {
                info!(owner = %record.user_id, "application submitted");
                self.fields.clear();
                self.step_index = 0;
                self.status = SubmissionStatus::Succeeded;
                SubmitOutcome::Submitted
            }
            Err(err) => {
                warn!(error = %err, "application submission failed; form data kept for retry");
                self.status = SubmissionStatus::Failed;
                SubmitOutcome::Failed {
                    message: RETRY_PROMPT.to_string(),
                }
            }
        }
    }

    pub fn progress(&self) -> ProgressState {
        derive_progress(self.step_index, &self.blueprint.labels())
    }

    pub fn snapshot(&self) -> WizardView {
        WizardView {
            step_index: self.step_index,
            step_label: self.blueprint.steps()[self.step_index].label.clone(),
            fields: self.fields.clone(),
            errors: self.errors.clone(),
            status: self.status,
            progress: self.progress(),
        }
    }
}
