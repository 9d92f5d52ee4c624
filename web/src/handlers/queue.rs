//! Admission queue endpoints.
//!
//! - POST /api/events/:id/queue/join - Join (or re-confirm a place in) the queue
//! - GET /api/events/:id/queue/position - Where an identifier stands
//! - POST /api/events/:id/queue/promote - Admit the next participant (operator)
//! - POST /api/events/:id/queue/complete - Release a processing slot (operator or self)
//! - GET /api/events/:id/queue/status - Queue snapshot (operator)
//!
//! None of these block waiting for admission. Callers poll `position` or
//! subscribe to `/ws/queue` for changes.

use crate::error::AppError;
use crate::extractors::{Caller, Operator};
use crate::state::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use turnstile_core::{
    ContactInfo, JoinOutcome, ParticipantId, ProcessingEntry, QueueStatus, QueueToken, ResourceId,
};

// ============================================================================
// Request / Response Types
// ============================================================================

/// Body of a join request.
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    /// Display name
    pub name: String,
    /// Contact email, used to recognize anonymous re-joins
    #[serde(default)]
    pub email: Option<String>,
}

/// Query string of a position request.
#[derive(Debug, Deserialize)]
pub struct PositionQuery {
    /// Participant id or queue token; defaults to the caller's id
    #[serde(default)]
    pub identifier: Option<String>,
}

/// Where an identifier stands.
#[derive(Debug, Serialize, Deserialize)]
pub struct PositionResponse {
    /// 0 while processing, 1-based while waiting, -1 when not in the queue
    pub position: i64,
    /// Waiting-list length
    pub total: usize,
    /// Whether the identifier holds a processing slot
    pub is_processing: bool,
    /// Queue token of the matched entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_token: Option<QueueToken>,
}

/// Result of a promotion.
#[derive(Debug, Serialize)]
pub struct PromoteResponse {
    /// Promoted entry, `null` when nobody was waiting
    pub promoted: Option<ProcessingEntry>,
}

/// Body of a complete request.
#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    /// Participant to release; defaults to the caller
    #[serde(default)]
    pub participant_id: Option<String>,
}

/// Result of a completion.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompleteResponse {
    /// Whether a processing slot was actually released
    pub completed: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Join the queue for an event.
///
/// Authenticated callers are identified by `X-Participant-Id`; anonymous
/// callers get a queue token back and are recognized on re-join by email.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/events/E1/queue/join \
///   -H 'Content-Type: application/json' \
///   -d '{"name": "Ada", "email": "ada@example.com"}'
/// ```
///
/// Response:
/// ```json
/// {
///   "queue_token": "3f2b...",
///   "participant_id": "3f2b...",
///   "position": 1,
///   "total": 1,
///   "is_processing": false
/// }
/// ```
pub async fn join(
    Path(event_id): Path<String>,
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<JoinRequest>,
) -> Result<Json<JoinOutcome>, AppError> {
    let resource_id = ResourceId::new(event_id)?;
    let contact = ContactInfo::new(request.name, request.email)?;

    let outcome = state
        .manager
        .join(&resource_id, caller.participant_id, contact)
        .await;

    Ok(Json(outcome))
}

/// Look up a position by participant id or queue token.
///
/// A processing participant's check doubles as a heartbeat.
///
/// # Example
///
/// ```bash
/// curl 'http://localhost:8080/api/events/E1/queue/position?identifier=3f2b...'
/// ```
pub async fn position(
    Path(event_id): Path<String>,
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<PositionQuery>,
) -> Result<Json<PositionResponse>, AppError> {
    let resource_id = ResourceId::new(event_id)?;
    let identifier = query
        .identifier
        .filter(|identifier| !identifier.trim().is_empty())
        .or_else(|| caller.participant_id.map(|id| id.to_string()))
        .ok_or_else(|| AppError::bad_request("identifier is required for anonymous callers"))?;

    let report = state.manager.position(&resource_id, identifier.trim());

    Ok(Json(PositionResponse {
        position: report.position(),
        total: report.total,
        is_processing: report.is_processing(),
        queue_token: report.queue_token,
    }))
}

/// Admit the head of the waiting list. Operator only.
///
/// An empty queue is not an error: the response is `{"promoted": null}`.
pub async fn promote(
    Path(event_id): Path<String>,
    State(state): State<AppState>,
    Operator(operator): Operator,
) -> Result<Json<PromoteResponse>, AppError> {
    let resource_id = ResourceId::new(event_id)?;
    let promoted = state.manager.promote_next(&resource_id).await;

    tracing::debug!(
        resource_id = %resource_id,
        operator = ?operator.participant_id,
        promoted = promoted.is_some(),
        "Promotion requested"
    );

    Ok(Json(PromoteResponse { promoted }))
}

/// Release a processing slot.
///
/// Participants may release their own slot; operators may release anyone's.
/// The body is optional, but a body that is present must be a valid
/// [`CompleteRequest`].
pub async fn complete(
    Path(event_id): Path<String>,
    State(state): State<AppState>,
    caller: Caller,
    body: Bytes,
) -> Result<Json<CompleteResponse>, AppError> {
    let resource_id = ResourceId::new(event_id)?;
    let request = parse_optional_body::<CompleteRequest>(&body)?;

    let participant_id = match request.participant_id {
        Some(raw) => ParticipantId::new(raw)?,
        None => caller
            .participant_id
            .clone()
            .ok_or_else(|| AppError::bad_request("participant_id is required"))?,
    };

    if !caller.may_act_for(&participant_id) {
        return Err(AppError::forbidden(
            "Only operators may complete on behalf of another participant",
        ));
    }

    let completed = state.manager.complete(&resource_id, &participant_id).await;

    Ok(Json(CompleteResponse { completed }))
}

/// Queue snapshot. Operator only.
pub async fn status(
    Path(event_id): Path<String>,
    State(state): State<AppState>,
    _operator: Operator,
) -> Result<Json<QueueStatus>, AppError> {
    let resource_id = ResourceId::new(event_id)?;
    Ok(Json(state.manager.status(&resource_id)))
}

/// Parse a JSON body that may be omitted entirely.
fn parse_optional_body<T>(body: &[u8]) -> Result<T, AppError>
where
    T: Default + serde::de::DeserializeOwned,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request(format!("Invalid request body: {e}")))
}
