//! Assistant and chat history handlers

use axum::{
    extract::{Query, State},
    response::Json,
    Extension,
};

use crate::assistant::{ChatReq, ChatResp};
use crate::entity::chatlog;
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::routes::ApiResponse;
use crate::service::chat::ChatLogRequest;
use crate::state::AppState;

/// POST /v1/chat
pub async fn assistant_chat(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ChatReq>,
) -> AppResult<Json<ApiResponse<ChatResp>>> {
    let resp = state.intents.dispatch(&current.id, req).await?;
    Ok(Json(ApiResponse::success(resp)))
}

/// GET /v1/chat/log
pub async fn chat_log(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(req): Query<ChatLogRequest>,
) -> AppResult<Json<ApiResponse<Vec<chatlog::Model>>>> {
    let logs = state.services.chat.history(&current.id, req).await?;
    Ok(Json(ApiResponse::success(logs)))
}
