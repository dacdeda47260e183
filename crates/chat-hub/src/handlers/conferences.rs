//! Conference REST handlers.
//!
//! - `POST /v1/conferences` - Create a conference (authenticated)
//! - `POST /v1/conferences/:id/join` - Join a conference (authenticated)
//! - `POST /v1/conferences/leave` - Leave the caller's conference (authenticated)
//! - `GET /v1/conferences/:id` - Full info with participants (authenticated)
//! - `GET /v1/rooms/:room/conference` - Active conference of a room (room members)
//! - `GET /v1/conferences/:id/public` - Participant count and capacity (public)
//!
//! Transitions made here notify hub sessions exactly like the equivalent
//! hub frames.

use crate::auth::Identity;
use crate::conference::{ConferenceInfo, PublicConferenceInfo};
use crate::errors::HubError;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use common::types::ConferenceId;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Default, Deserialize)]
pub struct CreateConferenceRequest {
    #[serde(default)]
    pub room: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LeaveConferenceResponse {
    pub left: bool,
    pub conference_id: Option<ConferenceId>,
}

/// Handler for POST /v1/conferences
///
/// The caller leaves any conference they were in and becomes the sole
/// participant of a new one.
///
/// # Response
///
/// - 201 Created: Conference info
/// - 401 Unauthorized: Invalid or missing token
/// - 403 Forbidden: Caller may not use the given room
#[instrument(skip_all, name = "hub.http.create_conference", fields(username = %identity.username))]
pub async fn create_conference(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    body: Option<Json<CreateConferenceRequest>>,
) -> Result<(StatusCode, Json<ConferenceInfo>), HubError> {
    let room = body.and_then(|Json(request)| request.room);
    let info = state
        .hub
        .create_conference(&identity.username, room)
        .await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// Handler for POST /v1/conferences/:id/join
///
/// # Response
///
/// - 200 OK: Conference info after joining
/// - 404 Not Found: Unknown conference
/// - 409 Conflict: Conference is full
#[instrument(skip_all, name = "hub.http.join_conference", fields(username = %identity.username))]
pub async fn join_conference(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<ConferenceInfo>, HubError> {
    let conference_id = parse_conference_id(&id)?;
    let info = state
        .hub
        .join_conference(conference_id, &identity.username)
        .await?;
    Ok(Json(info))
}

/// Handler for POST /v1/conferences/leave
///
/// Always 200; `left` is false if the caller was not in a conference.
#[instrument(skip_all, name = "hub.http.leave_conference", fields(username = %identity.username))]
pub async fn leave_conference(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<LeaveConferenceResponse>, HubError> {
    let departure = state.hub.leave_conference(&identity.username).await?;
    Ok(Json(LeaveConferenceResponse {
        left: departure.is_some(),
        conference_id: departure.map(|d| d.conference_id),
    }))
}

/// Handler for GET /v1/conferences/:id
#[instrument(skip_all, name = "hub.http.get_conference")]
pub async fn get_conference(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConferenceInfo>, HubError> {
    let conference_id = parse_conference_id(&id)?;
    Ok(Json(state.hub.conference_info(conference_id).await?))
}

/// Handler for GET /v1/rooms/:room/conference
///
/// # Response
///
/// - 200 OK: The room's active conference
/// - 403 Forbidden: Caller is not a member of the room
/// - 404 Not Found: No active conference for the room
#[instrument(
    skip_all,
    name = "hub.http.conference_for_room",
    fields(username = %identity.username)
)]
pub async fn conference_for_room(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(room): Path<String>,
) -> Result<Json<ConferenceInfo>, HubError> {
    let info = state
        .hub
        .conference_for_room(&room, &identity.username)
        .await?;
    Ok(Json(info))
}

/// Handler for GET /v1/conferences/:id/public
///
/// No authentication. Participant usernames are never exposed here.
#[instrument(skip_all, name = "hub.http.public_conference")]
pub async fn public_conference(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicConferenceInfo>, HubError> {
    let conference_id = parse_conference_id(&id)?;
    Ok(Json(state.hub.public_conference_info(conference_id).await?))
}

fn parse_conference_id(raw: &str) -> Result<ConferenceId, HubError> {
    raw.parse()
        .map_err(|_| HubError::BadRequest("Invalid conference id".to_string()))
}
