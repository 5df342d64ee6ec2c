use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::listing::{
    available_niches, relative_age, results_summary, NicheFilter, OpportunityFilter,
    PublicOpportunity,
};
use super::store::OpportunityStore;
use crate::session::SessionHandle;
use crate::workflows::auth::router::sign_in_required;

pub struct MarketplaceState<S> {
    store: Arc<S>,
    session: SessionHandle,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub search: String,
    pub niche: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListingEntry<'a> {
    #[serde(flatten)]
    pub opportunity: &'a PublicOpportunity,
    pub age: String,
}

#[derive(Debug, Serialize)]
pub struct ListingPage<'a> {
    pub total: usize,
    pub summary: String,
    pub niches: Vec<String>,
    pub opportunities: Vec<ListingEntry<'a>>,
}

/// Router exposing the public opportunity board to signed-in members.
pub fn marketplace_router<S>(store: Arc<S>, session: SessionHandle) -> Router
where
    S: OpportunityStore + 'static,
{
    Router::new()
        .route("/api/v1/opportunities", get(listing_handler::<S>))
        .with_state(Arc::new(MarketplaceState { store, session }))
}

pub(crate) async fn listing_handler<S>(
    State(state): State<Arc<MarketplaceState<S>>>,
    Query(query): Query<ListingQuery>,
) -> Response
where
    S: OpportunityStore + 'static,
{
    if !state.session.is_authenticated() {
        return sign_in_required();
    }

    let catalog = match state.store.list_public().await {
        Ok(catalog) => catalog,
        Err(err) => {
            warn!(error = %err, "opportunity listing unavailable");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "opportunities are unavailable right now" })),
            )
                .into_response();
        }
    };

    let filter = OpportunityFilter {
        search: query.search,
        niche: NicheFilter::parse(query.niche.as_deref()),
    };
    let now = Utc::now();
    let matches = filter.apply(&catalog);
    let page = ListingPage {
        total: matches.len(),
        summary: results_summary(matches.len(), &filter.niche),
        niches: available_niches(&catalog),
        opportunities: matches
            .into_iter()
            .map(|opportunity| ListingEntry {
                opportunity,
                age: relative_age(opportunity.created_at, now),
            })
            .collect(),
    };
    (StatusCode::OK, Json(page)).into_response()
}
