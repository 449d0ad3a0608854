use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::{SendMessageResponse, SendToAllRequest, SendToUserRequest};
use crate::AppState;
use crate::error::AppError;
use crate::utils::{Claims, error_codes, error_to_api_response, success_to_api_response};

#[axum::debug_handler]
pub async fn send_to_all(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendToAllRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.content.trim().is_empty() {
        return Err(AppError::Validation("消息内容不能为空".to_string()));
    }

    tracing::info!("User {} sending work notice to all users", claims.sub);
    let sent = state.dispatcher.send_to_all(&req.content).await?;
    Ok(send_result(sent))
}

#[axum::debug_handler]
pub async fn send_to_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendToUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.user_id.trim().is_empty() {
        return Err(AppError::Validation("接收人不能为空".to_string()));
    }
    if req.content.trim().is_empty() {
        return Err(AppError::Validation("消息内容不能为空".to_string()));
    }

    tracing::info!("User {} sending work notice to {}", claims.sub, req.user_id);
    let sent = state
        .dispatcher
        .send_to_user(&req.user_id, &req.content)
        .await?;
    Ok(send_result(sent))
}

#[axum::debug_handler]
pub async fn list_logs(State(state): State<AppState>) -> impl IntoResponse {
    match state.dispatcher.list_audit_entries().await {
        Ok(entries) => (StatusCode::OK, success_to_api_response(entries)),
        Err(e) => {
            tracing::error!("Failed to list message logs: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

// 平台拒绝属于业务失败，发送记录已写入，仍返回 200
fn send_result(sent: bool) -> impl IntoResponse {
    if sent {
        (
            StatusCode::OK,
            success_to_api_response(SendMessageResponse { sent }),
        )
    } else {
        (
            StatusCode::OK,
            error_to_api_response(error_codes::SEND_FAILED, "消息发送失败".to_string()),
        )
    }
}
