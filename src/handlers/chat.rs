use axum::{extract::Extension, Json};
use std::time::Instant;
use tracing::info;

use crate::models::chat::{ChatReply, ChatRequest};
use crate::state::AppState;
use crate::utils::error::ApiError;

pub async fn chat_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let start_time = Instant::now();

    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message must not be empty".to_string()));
    }

    let session_id = match request.session_id {
        Some(id) => {
            super::validate_session_id(&id)?;
            id
        }
        None => uuid::Uuid::new_v4().to_string(),
    };

    info!(
        "Chat request: session={}, message_len={}",
        session_id,
        request.message.len()
    );

    let driver = state.session(&session_id)?;
    let reply = driver.ask(&request.message).await?;

    info!(
        "Chat turn completed: session={}, elapsed={:?}",
        session_id,
        start_time.elapsed()
    );

    Ok(Json(ChatReply { session_id, reply }))
}
