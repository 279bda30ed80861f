//! Shared test harness: builds the full application router with the same
//! middleware stack as `main.rs`, plus request helpers that speak the
//! `x-user-id` identity seam.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use helpdesk_api::background::sla_monitor::SlaMonitor;
use helpdesk_api::config::ServerConfig;
use helpdesk_api::routes;
use helpdesk_api::state::AppState;
use helpdesk_events::{DbNotifier, EventBus, Notifier};

/// The admin user seeded by the first migration.
pub const SEED_ADMIN: i64 = 1;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        sla_check_interval_secs: 60,
        sla_tick_timeout_secs: 30,
    }
}

/// Build the application state without starting the monitor loop; tests
/// drive ticks through `force_check` / the operational routes.
pub fn build_test_state(pool: PgPool) -> AppState {
    let config = test_config();
    let event_bus = Arc::new(EventBus::default());
    let notifier: Arc<dyn Notifier> = Arc::new(DbNotifier::new(pool.clone()));
    let sla_monitor = Arc::new(SlaMonitor::new(
        pool.clone(),
        Arc::clone(&notifier),
        Arc::clone(&event_bus),
        Duration::from_secs(config.sla_check_interval_secs),
        Duration::from_secs(config.sla_tick_timeout_secs),
    ));

    AppState {
        pool,
        config: Arc::new(config),
        event_bus,
        notifier,
        sla_monitor,
    }
}

/// Build the full application router with all middleware layers, using
/// the given database pool.
///
/// This mirrors the router construction in `main.rs` so integration
/// tests exercise the same middleware stack (CORS, request ID, timeout,
/// tracing, panic recovery) that production uses.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_with_state(build_test_state(pool))
}

pub fn build_app_with_state(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Send a GET request as the given user.
pub async fn get(app: Router, user_id: i64, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("x-user-id", user_id.to_string())
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a POST request with a JSON body as the given user.
pub async fn post_json(
    app: Router,
    user_id: i64,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("x-user-id", user_id.to_string())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Send a PUT request with a JSON body as the given user.
pub async fn put_json(
    app: Router,
    user_id: i64,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::PUT)
            .uri(uri)
            .header("x-user-id", user_id.to_string())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}

// ---------------------------------------------------------------------------
// Fixture helpers (run as the seeded admin through the API)
// ---------------------------------------------------------------------------

/// Create a user with the given role id and return their id.
pub async fn create_user(pool: &PgPool, username: &str, role_id: i16) -> i64 {
    let app = build_test_app(pool.clone());
    let resp = post_json(
        app,
        SEED_ADMIN,
        "/api/v1/admin/users",
        serde_json::json!({ "username": username, "role_id": role_id }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await["data"]["id"].as_i64().unwrap()
}

/// Create a category and return its id.
pub async fn create_category(pool: &PgPool, name: &str) -> i64 {
    let app = build_test_app(pool.clone());
    let resp = post_json(
        app,
        SEED_ADMIN,
        "/api/v1/categories",
        serde_json::json!({ "name": name }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    body_json(resp).await["data"]["id"].as_i64().unwrap()
}

/// Create an agent (user + profile) linked to a category. Returns
/// `(agent_id, user_id)`.
pub async fn create_linked_agent(
    pool: &PgPool,
    username: &str,
    category_id: i64,
    max_tickets: i32,
) -> (i64, i64) {
    let user_id = create_user(pool, username, 2).await;

    let app = build_test_app(pool.clone());
    let resp = post_json(
        app,
        SEED_ADMIN,
        "/api/v1/agents",
        serde_json::json!({ "user_id": user_id, "max_tickets": max_tickets }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let agent_id = body_json(resp).await["data"]["id"].as_i64().unwrap();

    let app = build_test_app(pool.clone());
    let resp = put_json(
        app,
        SEED_ADMIN,
        &format!("/api/v1/agents/{agent_id}/categories/{category_id}"),
        serde_json::json!({}),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    (agent_id, user_id)
}
