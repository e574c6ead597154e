//! Department handlers

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};

use crate::entity::department::DepartmentTree;
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::routes::{ApiResponse, IdResp};
use crate::service::department::{
    CreateDepartmentRequest, EditDepartmentRequest, SetDepartmentUsersRequest,
};
use crate::state::AppState;

/// GET /v1/dep/soa
pub async fn department_soa(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<DepartmentTree>>>> {
    let forest = state.services.department.soa().await?;
    Ok(Json(ApiResponse::success(forest)))
}

/// GET /v1/dep/:id
pub async fn department_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<DepartmentTree>>> {
    let dep = state.services.department.info(&id).await?;
    Ok(Json(ApiResponse::success(dep)))
}

/// POST /v1/dep
pub async fn create_department(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateDepartmentRequest>,
) -> AppResult<Json<ApiResponse<IdResp>>> {
    current.require_system()?;
    let id = state.services.department.create(req).await?;
    Ok(Json(ApiResponse::success(IdResp { id })))
}

/// PUT /v1/dep
pub async fn edit_department(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<EditDepartmentRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    current.require_system()?;
    state.services.department.edit(req).await?;
    Ok(Json(ApiResponse::ok()))
}

/// DELETE /v1/dep/:id
pub async fn delete_department(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    current.require_system()?;
    state.services.department.delete(&id).await?;
    Ok(Json(ApiResponse::ok()))
}

/// POST /v1/dep/user
pub async fn set_department_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<SetDepartmentUsersRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    current.require_system()?;
    state.services.department.set_users(req).await?;
    Ok(Json(ApiResponse::ok()))
}

/// GET /v1/dep/user/:id
pub async fn department_users(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<DepartmentTree>>> {
    let tree = state.services.department.members(&id).await?;
    Ok(Json(ApiResponse::success(tree)))
}
