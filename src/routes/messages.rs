use crate::{
    error::AppError,
    middleware::guards::User,
    models::message::{MessageKind, NewMessage},
    services::MessageStore,
    state::AppState,
};
use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub message_type: MessageKind,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_file_name: Option<String>,
}

/// POST /message/send
/// Persist a message over the request/response path. Realtime delivery is
/// the hub connection's job; this endpoint only writes to the store.
#[post("/message/send")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();

    if body.message_type == MessageKind::Image && body.image_url.is_none() {
        return Err(AppError::BadRequest(
            "image messages require an imageUrl".into(),
        ));
    }

    let message = state
        .store
        .save(NewMessage {
            sender_id: user.id,
            receiver_id: body.receiver_id,
            content: body.content,
            kind: body.message_type,
            image_url: body.image_url,
            image_file_name: body.image_file_name,
        })
        .await?;

    Ok(HttpResponse::Ok().json(message))
}

/// GET /message/conversation/{otherUserId}
/// Full exchange between the caller and one other user, oldest first.
#[get("/message/conversation/{other_user_id}")]
pub async fn get_conversation(
    state: web::Data<AppState>,
    user: User,
    other_user_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let messages = state
        .store
        .conversation(user.id, other_user_id.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(messages))
}

/// POST /message/read/{messageId}
/// Mark one received message as read; 404 when the message does not exist,
/// is not addressed to the caller, or is already read.
#[post("/message/read/{message_id}")]
pub async fn mark_message_read(
    state: web::Data<AppState>,
    user: User,
    message_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let updated = state
        .store
        .mark_read(message_id.into_inner(), user.id)
        .await?;

    if !updated {
        return Err(AppError::NotFound);
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Message marked as read" })))
}

/// GET /message/unread-count/{senderId}
#[get("/message/unread-count/{sender_id}")]
pub async fn get_unread_count(
    state: web::Data<AppState>,
    user: User,
    sender_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let count = state
        .store
        .count_unread(user.id, sender_id.into_inner())
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "unreadCount": count })))
}

/// GET /message/conversations
/// One entry per chat partner with the latest message and unread count.
#[get("/message/conversations")]
pub async fn get_conversations(
    state: web::Data<AppState>,
    user: User,
) -> Result<HttpResponse, AppError> {
    let conversations = state.store.conversations_for(user.id).await?;

    Ok(HttpResponse::Ok().json(conversations))
}
