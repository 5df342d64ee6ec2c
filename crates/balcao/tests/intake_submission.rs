//! Intake wizard driven over HTTP, persisting to a mock data service.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use balcao::config::DataServiceConfig;
use balcao::marketplace::RestOpportunityStore;
use balcao::session::{MemorySessionStorage, SessionStore};
use balcao::workflows::application::{application_router, WizardBlueprint, WizardRegistry};
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{body_partial_json, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INSERT_PATH: &str = "/rest/v1/balcao_opportunities";

fn router(server: &MockServer) -> Router {
    let store = RestOpportunityStore::new(
        reqwest::Client::new(),
        &DataServiceConfig {
            base_url: Url::parse(&server.uri()).expect("mock url"),
            public_key: "anon-key".to_string(),
            timeout: Duration::from_secs(5),
        },
    );
    let session = SessionStore::restore(MemorySessionStorage::with_identity("owner@balcao.dev"));
    application_router(Arc::new(WizardRegistry::new(
        WizardBlueprint::standard(),
        Arc::new(store),
        session,
    )))
}

async fn call(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request builds");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body readable");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn answers() -> Value {
    json!({
        "nome": "Ana Ribeiro",
        "nicho": "Tech",
        "instagram": "@ana.funnels",
        "whatsapp": "+55 11 91234-5678",
        "email": "ana@funnels.dev",
        "faturamento": "R$ 30.000,00",
        "como_ajudar": "Build the webinar launch funnel",
        "por_que_escolher": "Warm audience and a proven offer"
    })
}

async fn filled_wizard_at_last_step(router: &Router) -> String {
    let (status, body) = call(router, Method::POST, "/api/v1/applications/wizards", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["wizard_id"].as_str().expect("wizard id").to_string();

    let (status, _) = call(
        router,
        Method::PATCH,
        &format!("/api/v1/applications/wizards/{id}/fields"),
        Some(answers()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..3 {
        let (status, _) = call(
            router,
            Method::POST,
            &format!("/api/v1/applications/wizards/{id}/advance"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    id
}

#[tokio::test]
async fn completed_wizard_is_stored_under_the_signed_in_member() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .and(header_matcher("apikey", "anon-key"))
        .and(header_matcher("prefer", "return=minimal"))
        .and(body_partial_json(json!({
            "user_id": "owner@balcao.dev",
            "nome": "Ana Ribeiro",
            "por_que_escolher": "Warm audience and a proven offer"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let router = router(&server);
    let id = filled_wizard_at_last_step(&router).await;

    let (status, body) = call(
        &router,
        Method::POST,
        &format!("/api/v1/applications/wizards/{id}/advance"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["wizard"]["status"], "succeeded");
    assert_eq!(body["wizard"]["step_index"], 0);
    assert_eq!(body["wizard"]["fields"]["nome"], "");
}

#[tokio::test]
async fn rejected_insert_can_be_retried_with_the_same_answers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(INSERT_PATH))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;

    let router = router(&server);
    let id = filled_wizard_at_last_step(&router).await;
    let advance = format!("/api/v1/applications/wizards/{id}/advance");

    let (status, body) = call(&router, Method::POST, &advance, None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["wizard"]["status"], "failed");
    assert!(!body["transition"]["outcome"]["message"]
        .as_str()
        .expect("retry prompt")
        .contains("maintenance"));

    let (status, body) = call(&router, Method::POST, &advance, None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["wizard"]["status"], "succeeded");

    let requests = server.received_requests().await.expect("recording enabled");
    let bodies: Vec<Value> = requests
        .iter()
        .map(|request| serde_json::from_slice(&request.body).expect("json insert"))
        .collect();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0], bodies[1]);
}
