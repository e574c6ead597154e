//! User handlers

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};

use crate::entity::user::UserResponse;
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::routes::{ApiResponse, IdResp};
use crate::service::user::{
    ChangePasswordRequest, CreateUserRequest, EditUserRequest, LoginRequest, LoginResponse,
    UserListRequest, UserListResponse,
};
use crate::state::AppState;

/// POST /v1/user/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let resp = state.services.user.login(req).await?;
    Ok(Json(ApiResponse::success(resp)))
}

/// GET /v1/user/:id
pub async fn user_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let user = state.services.user.info(&id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// POST /v1/user
pub async fn create_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<Json<ApiResponse<IdResp>>> {
    current.require_system()?;
    let id = state.services.user.create(req).await?;
    Ok(Json(ApiResponse::success(IdResp { id })))
}

/// PUT /v1/user
pub async fn edit_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<EditUserRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if req.id != current.id || req.status.is_some() {
        current.require_system()?;
    }
    state.services.user.edit(req).await?;
    Ok(Json(ApiResponse::ok()))
}

/// DELETE /v1/user/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    current.require_system()?;
    state.services.user.delete(&id).await?;
    tracing::info!("User {} deleted by {}", id, current.name);
    Ok(Json(ApiResponse::ok()))
}

/// GET /v1/user/list
pub async fn list_users(
    State(state): State<AppState>,
    Query(req): Query<UserListRequest>,
) -> AppResult<Json<ApiResponse<UserListResponse>>> {
    let list = state.services.user.list(req).await?;
    Ok(Json(ApiResponse::success(list)))
}

/// POST /v1/user/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    state
        .services
        .user
        .change_password(&current.id, current.is_system, req)
        .await?;
    Ok(Json(ApiResponse::ok()))
}
