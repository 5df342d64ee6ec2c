use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use super::controller::{SubmitOutcome, Transition};
use super::domain::FieldName;
use super::registry::{WizardId, WizardRegistry, WizardRegistryError};
use crate::marketplace::store::OpportunityStore;
use crate::workflows::auth::router::sign_in_required;

/// Router exposing the intake wizard. Every route requires a signed-in member.
pub fn application_router<S>(registry: Arc<WizardRegistry<S>>) -> Router
where
    S: OpportunityStore + 'static,
{
    Router::new()
        .route("/api/v1/applications/wizards", post(create_handler::<S>))
        .route(
            "/api/v1/applications/wizards/:wizard_id",
            get(view_handler::<S>).delete(close_handler::<S>),
        )
        .route(
            "/api/v1/applications/wizards/:wizard_id/fields",
            patch(fields_handler::<S>),
        )
        .route(
            "/api/v1/applications/wizards/:wizard_id/advance",
            post(advance_handler::<S>),
        )
        .route(
            "/api/v1/applications/wizards/:wizard_id/retreat",
            post(retreat_handler::<S>),
        )
        .with_state(registry)
}

fn parse_id(raw: &str) -> Option<WizardId> {
    Uuid::parse_str(raw).ok().map(WizardId)
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "wizard not found" })),
    )
        .into_response()
}

fn registry_failure(err: WizardRegistryError) -> Response {
    match err {
        WizardRegistryError::NotFound(_) => not_found(),
        WizardRegistryError::SignedOut => sign_in_required(),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": other.to_string() })),
        )
            .into_response(),
    }
}

pub(crate) async fn create_handler<S>(State(registry): State<Arc<WizardRegistry<S>>>) -> Response
where
    S: OpportunityStore + 'static,
{
    match registry.create() {
        Ok((id, view)) => (
            StatusCode::CREATED,
            Json(json!({ "wizard_id": id, "wizard": view })),
        )
            .into_response(),
        Err(err) => registry_failure(err),
    }
}

pub(crate) async fn view_handler<S>(
    State(registry): State<Arc<WizardRegistry<S>>>,
    Path(wizard_id): Path<String>,
) -> Response
where
    S: OpportunityStore + 'static,
{
    if !registry.session().is_authenticated() {
        return sign_in_required();
    }
    let Some(id) = parse_id(&wizard_id) else {
        return not_found();
    };
    match registry.view(id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => registry_failure(err),
    }
}

pub(crate) async fn fields_handler<S>(
    State(registry): State<Arc<WizardRegistry<S>>>,
    Path(wizard_id): Path<String>,
    Json(values): Json<BTreeMap<String, String>>,
) -> Response
where
    S: OpportunityStore + 'static,
{
    if !registry.session().is_authenticated() {
        return sign_in_required();
    }
    let Some(id) = parse_id(&wizard_id) else {
        return not_found();
    };

    let mut updates = Vec::with_capacity(values.len());
    for (key, value) in values {
        match FieldName::from_key(&key) {
            Some(field) => updates.push((field, value)),
            None => {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({ "error": format!("unknown field '{key}'") })),
                )
                    .into_response()
            }
        }
    }

    let result = registry
        .update(id, move |wizard| {
            for (field, value) in updates {
                wizard.set_field(field, value);
            }
        })
        .await;
    match result {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => registry_failure(err),
    }
}

pub(crate) async fn advance_handler<S>(
    State(registry): State<Arc<WizardRegistry<S>>>,
    Path(wizard_id): Path<String>,
) -> Response
where
    S: OpportunityStore + 'static,
{
    if !registry.session().is_authenticated() {
        return sign_in_required();
    }
    let Some(id) = parse_id(&wizard_id) else {
        return not_found();
    };

    let (transition, view) = match registry.advance(id).await {
        Ok(result) => result,
        Err(err) => return registry_failure(err),
    };
    let status = match &transition {
        Transition::Advanced { .. } => StatusCode::OK,
        Transition::Blocked { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Transition::Closed => StatusCode::CONFLICT,
        Transition::Submission { outcome } => match outcome {
            SubmitOutcome::Submitted => StatusCode::CREATED,
            SubmitOutcome::Blocked { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SubmitOutcome::Failed { .. } => StatusCode::BAD_GATEWAY,
            SubmitOutcome::NotAtFinalStep { .. } | SubmitOutcome::Closed => StatusCode::CONFLICT,
        },
    };
    (
        status,
        Json(json!({ "transition": transition, "wizard": view })),
    )
        .into_response()
}

pub(crate) async fn retreat_handler<S>(
    State(registry): State<Arc<WizardRegistry<S>>>,
    Path(wizard_id): Path<String>,
) -> Response
where
    S: OpportunityStore + 'static,
{
    if !registry.session().is_authenticated() {
        return sign_in_required();
    }
    let Some(id) = parse_id(&wizard_id) else {
        return not_found();
    };
    match registry.retreat(id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => registry_failure(err),
    }
}

pub(crate) async fn close_handler<S>(
    State(registry): State<Arc<WizardRegistry<S>>>,
    Path(wizard_id): Path<String>,
) -> Response
where
    S: OpportunityStore + 'static,
{
    if !registry.session().is_authenticated() {
        return sign_in_required();
    }
    match parse_id(&wizard_id) {
        Some(id) if registry.remove(id) => StatusCode::NO_CONTENT.into_response(),
        _ => not_found(),
    }
}
