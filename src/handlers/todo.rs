//! Todo handlers

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Serialize;

use crate::entity::todo::TodoStatus;
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::routes::{ApiResponse, IdResp};
use crate::service::todo::{
    CreateRecordRequest, CreateTodoRequest, EditTodoRequest, FinishTodoRequest, TodoInfo,
    TodoListRequest, TodoListResponse,
};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FinishResp {
    pub status: TodoStatus,
}

/// GET /v1/todo/:id
pub async fn todo_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<TodoInfo>>> {
    let info = state.services.todo.info(&id).await?;
    Ok(Json(ApiResponse::success(info)))
}

/// POST /v1/todo
pub async fn create_todo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateTodoRequest>,
) -> AppResult<Json<ApiResponse<IdResp>>> {
    let id = state.services.todo.create(&current.id, req).await?;
    Ok(Json(ApiResponse::success(IdResp { id })))
}

/// PUT /v1/todo
pub async fn edit_todo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<EditTodoRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.services.todo.edit(&current.id, req).await?;
    Ok(Json(ApiResponse::ok()))
}

/// DELETE /v1/todo/:id
pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.services.todo.delete(&current.id, &id).await?;
    Ok(Json(ApiResponse::ok()))
}

/// POST /v1/todo/finish
pub async fn finish_todo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<FinishTodoRequest>,
) -> AppResult<Json<ApiResponse<FinishResp>>> {
    let status = state.services.todo.finish(&current.id, req).await?;
    Ok(Json(ApiResponse::success(FinishResp { status })))
}

/// POST /v1/todo/record
pub async fn create_record(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateRecordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.services.todo.create_record(&current.id, req).await?;
    Ok(Json(ApiResponse::ok()))
}

/// GET /v1/todo/list
pub async fn list_todos(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(req): Query<TodoListRequest>,
) -> AppResult<Json<ApiResponse<TodoListResponse>>> {
    let list = state.services.todo.list(&current.id, req).await?;
    Ok(Json(ApiResponse::success(list)))
}
