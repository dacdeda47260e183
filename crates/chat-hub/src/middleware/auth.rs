//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the `Authorization` header, validates it
//! with the hub's identity validator and injects the resulting [`Identity`]
//! into request extensions.

use crate::auth::Identity;
use crate::errors::HubError;
use crate::routes::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use tracing::instrument;

/// Reject requests without a valid identity token.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// Missing or invalid tokens get 401 before the handler runs.
#[instrument(skip_all, name = "hub.middleware.auth")]
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HubError> {
    let auth_header = req
        .headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "hub.middleware.auth", "Missing Authorization header");
            HubError::InvalidToken("Missing Authorization header".to_string())
        })?;

    let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "hub.middleware.auth", "Invalid Authorization header format");
        HubError::InvalidToken("Invalid Authorization header format".to_string())
    })?;

    let identity: Identity = state.hub.identity().validate(token).await?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
