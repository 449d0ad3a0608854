use axum::{
    Json,
    extract::{Extension, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::{CallbackQuery, LOGIN_STATE, LoginResponse, LoginStatusResponse, QrCodeResponse};
use crate::{
    AppState,
    dingtalk::login_redirect_url,
    error::{AppError, PlatformError},
    utils::{
        ApiResponse, Claims, error_codes, error_to_api_response, generate_token,
        success_to_api_response,
    },
};

#[axum::debug_handler]
pub async fn qr_code(State(state): State<AppState>) -> impl IntoResponse {
    let dingtalk = &state.config.dingtalk;
    match login_redirect_url(dingtalk, &dingtalk.callback_url, LOGIN_STATE) {
        Ok(url) => (
            StatusCode::OK,
            success_to_api_response(QrCodeResponse { qr_code_url: url }),
        ),
        Err(e) => {
            tracing::error!("Failed to build login url: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}

/// 扫码回调：用临时授权码换取用户身份并签发会话令牌
#[axum::debug_handler]
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<(StatusCode, Json<ApiResponse<LoginResponse>>), AppError> {
    let code = query.code.unwrap_or_default();
    if code.trim().is_empty() {
        return Err(AppError::Validation("缺少临时授权码".to_string()));
    }
    if query.state.as_deref() != Some(LOGIN_STATE) {
        tracing::warn!("Login callback with unexpected state: {:?}", query.state);
    }

    let identity = state
        .exchanger
        .exchange(&code)
        .await
        .map_err(|e| match e {
            PlatformError::Config(_) => AppError::Platform(e),
            other => AppError::LoginFailed(other.to_string()),
        })?;

    match generate_token(&identity.open_id, &identity.nick, &state.config) {
        Ok((token, expires_at)) => Ok((
            StatusCode::OK,
            success_to_api_response(LoginResponse {
                open_id: identity.open_id,
                nick: identity.nick,
                union_id: identity.union_id,
                token,
                expires_at,
            }),
        )),
        Err(e) => {
            tracing::error!("Failed to sign session token: {}", e);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "生成令牌失败".to_string()),
            ))
        }
    }
}

#[axum::debug_handler]
pub async fn status(Extension(claims): Extension<Claims>) -> impl IntoResponse {
    (
        StatusCode::OK,
        success_to_api_response(LoginStatusResponse {
            is_logged_in: true,
            user_id: claims.sub,
            user_name: claims.nick,
        }),
    )
}
