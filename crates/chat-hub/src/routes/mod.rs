//! HTTP routes for the chat hub.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::hub::Hub;
use crate::middleware::require_auth;
use crate::observability::{health_router, HealthState};
use crate::transport::ws::ws_router;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Hub,
    pub health: Arc<HealthState>,
}

/// Build the application routes.
///
/// - `/ws` - Hub WebSocket endpoint (token in the query string)
/// - `/v1/conferences/...`, `/v1/rooms/:room/conference` - Conference REST surface
/// - `/health`, `/ready` - Probes
///
/// The timeout only wraps the HTTP routes; upgraded sockets live as long as
/// the client stays connected.
pub fn build_routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/v1/conferences/:id/public", get(handlers::public_conference))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/v1/conferences", post(handlers::create_conference))
        .route("/v1/conferences/leave", post(handlers::leave_conference))
        .route("/v1/conferences/:id", get(handlers::get_conference))
        .route("/v1/conferences/:id/join", post(handlers::join_conference))
        .route(
            "/v1/rooms/:room/conference",
            get(handlers::conference_for_room),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    let http_routes = public_routes
        .merge(protected_routes)
        .merge(health_router(Arc::clone(&state.health)))
        .layer(TimeoutLayer::new(Duration::from_secs(30)));

    ws_router(state.hub)
        .merge(http_routes)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::fixture;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    fn app() -> (Router, crate::test_support::Fixture) {
        let f = fixture();
        let state = AppState {
            hub: f.hub.clone(),
            health: Arc::new(HealthState::new(Arc::clone(f.hub.metrics()))),
        };
        (build_routes(state), f)
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_protected_route_requires_bearer() {
        let (app, _f) = app();
        let response = app
            .oneshot(
                Request::post("/v1/conferences")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_then_public_info() {
        let (app, _f) = app();
        let response = app
            .clone()
            .oneshot(
                Request::post("/v1/conferences")
                    .header("authorization", "Bearer tok-alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let info: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let id = info["conference_id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::get(format!("/v1/conferences/{id}/public"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let public: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(public["participant_count"], 1);
        assert_eq!(public["capacity"], 10);
        assert!(public.get("participants").is_none());
    }
}
