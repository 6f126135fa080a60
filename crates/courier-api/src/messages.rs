use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use uuid::Uuid;

use courier_types::api::{Claims, EditMessageRequest, MessagePage, SendMessageRequest};
use courier_types::models::Message;

use crate::error::ApiError;
use crate::messaging::MessagingService;
use crate::state::{AppState, run_blocking};

/// POST /messages
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<SendMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = run_blocking(&state, move |s| {
        MessagingService::new(&s.db).send_message(claims.sub, req.receiver_id, req.content.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /messages/{peer_id}?page&limit, newest first. A peer id that is not a
/// UUID names nobody and lists as empty.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(peer_id): Path<String>,
    WithRejection(Query(page), _): WithRejection<Query<MessagePage>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let Ok(peer_id) = peer_id.parse::<Uuid>() else {
        return Ok(Json(Vec::<Message>::new()));
    };

    let messages = run_blocking(&state, move |s| {
        MessagingService::new(&s.db).list_messages(claims.sub, peer_id, page.page, page.limit)
    })
    .await?;

    Ok(Json(messages))
}

/// GET /messages/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let conversations = run_blocking(&state, move |s| {
        MessagingService::new(&s.db).list_conversations(claims.sub)
    })
    .await?;

    Ok(Json(conversations))
}

/// PUT /messages/{id}
pub async fn edit_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<EditMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let message = run_blocking(&state, move |s| {
        MessagingService::new(&s.db).edit_message(claims.sub, message_id, req.content.as_deref())
    })
    .await?;

    Ok(Json(message))
}

/// DELETE /messages/{id}
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Path(message_id), _): WithRejection<Path<Uuid>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let ack = run_blocking(&state, move |s| {
        MessagingService::new(&s.db).delete_message(claims.sub, message_id)
    })
    .await?;

    Ok(Json(ack))
}
