//! Approval handlers
//!
//! Every state change is pushed to the users it concerns over the
//! WebSocket registry: the next approver while the chain runs, the
//! submitter once it ends.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Serialize;

use crate::entity::approval::{self, ApprovalStatus};
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::routes::ApiResponse;
use crate::service::approval::{
    notification, ApprovalListRequest, ApprovalListResponse, CreateApprovalRequest,
    DisposeRequest,
};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CreateApprovalResp {
    pub id: String,
    pub no: String,
}

#[derive(Debug, Serialize)]
pub struct DisposeResp {
    pub status: ApprovalStatus,
    #[serde(rename = "approvalId")]
    pub approval_id: String,
}

async fn push(state: &AppState, model: &approval::Model) {
    let (message, targets) = notification(model);
    state.hub.notify(&message, &targets).await;
}

/// POST /v1/approval
pub async fn create_approval(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateApprovalRequest>,
) -> AppResult<Json<ApiResponse<CreateApprovalResp>>> {
    let model = state.services.approval.create(&current.id, req).await?;
    push(&state, &model).await;
    Ok(Json(ApiResponse::success(CreateApprovalResp {
        id: model.id,
        no: model.no,
    })))
}

/// POST /v1/approval/dispose
pub async fn dispose_approval(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<DisposeRequest>,
) -> AppResult<Json<ApiResponse<DisposeResp>>> {
    let model = state.services.approval.dispose(&current.id, req).await?;
    push(&state, &model).await;
    Ok(Json(ApiResponse::success(DisposeResp {
        status: model.status,
        approval_id: model.approval_id,
    })))
}

/// GET /v1/approval/:id
///
/// A failed name lookup still returns the approval, with the error status.
pub async fn approval_info(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let info = state.services.approval.info(&current.id, &id).await?;
    let response = match info.error {
        None => Json(ApiResponse::success(info.value)).into_response(),
        Some(e) => {
            let status = e.status();
            let body = ApiResponse::partial(status.as_u16(), e.public_message(), info.value);
            (status, Json(body)).into_response()
        }
    };
    Ok(response)
}

/// GET /v1/approval/list
pub async fn list_approvals(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(req): Query<ApprovalListRequest>,
) -> AppResult<Json<ApiResponse<ApprovalListResponse>>> {
    let list = state.services.approval.list(&current.id, req).await?;
    Ok(Json(ApiResponse::success(list)))
}
