use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::transport::VerificationTransport;
use super::verifier::{AuthVerifier, LoginError};
use crate::session::{display_name, SessionStore};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub identity: String,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub identity: Option<String>,
    pub display_name: Option<String>,
}

impl SessionView {
    pub fn of(session: &SessionStore) -> Self {
        let identity = session.identity();
        Self {
            display_name: identity.as_deref().map(display_name),
            identity,
        }
    }
}

/// Router exposing login, logout, and the current session.
pub fn session_router<T>(verifier: Arc<AuthVerifier<T>>) -> Router
where
    T: VerificationTransport + 'static,
{
    Router::new()
        .route(
            "/api/v1/session",
            post(login_handler::<T>)
                .get(current_handler::<T>)
                .delete(logout_handler::<T>),
        )
        .with_state(verifier)
}

pub(crate) async fn login_handler<T>(
    State(verifier): State<Arc<AuthVerifier<T>>>,
    Json(request): Json<LoginRequest>,
) -> Response
where
    T: VerificationTransport + 'static,
{
    match verifier.login(&request.identity).await {
        Ok(_) => (StatusCode::OK, Json(SessionView::of(verifier.session()))).into_response(),
        Err(err @ LoginError::BlankIdentity) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err @ LoginError::Denied) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

pub(crate) async fn current_handler<T>(State(verifier): State<Arc<AuthVerifier<T>>>) -> Response
where
    T: VerificationTransport + 'static,
{
    (StatusCode::OK, Json(SessionView::of(verifier.session()))).into_response()
}

pub(crate) async fn logout_handler<T>(State(verifier): State<Arc<AuthVerifier<T>>>) -> Response
where
    T: VerificationTransport + 'static,
{
    verifier.logout();
    StatusCode::NO_CONTENT.into_response()
}

/// Response for routes that need a signed-in member.
pub fn sign_in_required() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "sign in to continue" })),
    )
        .into_response()
}
