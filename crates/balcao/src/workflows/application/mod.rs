//! Contractor intake wizard: step definitions, the gate that decides whether a
//! step may be left, progress rendering, and the controller that owns one
//! wizard instance through to submission.

pub mod controller;
pub mod domain;
pub mod gate;
pub mod progress;
pub mod registry;
pub mod router;

#[cfg(test)]
mod tests;

pub use controller::{
    SubmissionStatus, SubmitOutcome, Transition, WizardController, WizardView, RETRY_PROMPT,
};
pub use domain::{
    ApplicationFields, ApplicationRecord, BlueprintError, FieldCheck, FieldName, StepDefinition,
    Validator, WizardBlueprint,
};
pub use gate::{can_advance, GateResult};
pub use progress::{derive_progress, ProgressState, StepMarker, StepState};
pub use registry::{WizardId, WizardRegistry, WizardRegistryError};
pub use router::application_router;
