use std::fmt;

use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::utils::error_codes;

/// 身份换取失败时所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeStage {
    /// 仅使用应用凭证换取 sns_token
    Primary,
    /// 携带 access_token 的备用换取
    Fallback,
    /// 使用 sns_token 获取用户信息
    Fetch,
}

impl fmt::Display for ExchangeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeStage::Primary => "primary",
            ExchangeStage::Fallback => "fallback",
            ExchangeStage::Fetch => "fetch",
        };
        f.write_str(name)
    }
}

/// 钉钉平台集成层的错误
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("参数无效: {0}")]
    InvalidArgument(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("获取access_token失败: [{code}] {message}")]
    RemoteAuth { code: i64, message: String },

    #[error("登录身份换取失败({stage}): {}", format_code(.code, .message))]
    Exchange {
        stage: ExchangeStage,
        code: Option<i64>,
        message: String,
    },

    #[error("消息发送被拒绝: [{code}] {message}")]
    Dispatch { code: i64, message: String },

    #[error("网络请求失败: {0}")]
    Transport(String),

    #[error("平台响应格式错误: {0}")]
    MalformedResponse(String),

    #[error("存储错误: {0}")]
    Storage(String),
}

fn format_code(code: &Option<i64>, message: &str) -> String {
    match code {
        Some(code) => format!("[{}] {}", code, message),
        None => message.to_string(),
    }
}

impl PlatformError {
    /// 将某一阶段内的远程失败归入该阶段的换取错误，本地配置和参数错误原样返回
    pub fn at_stage(self, stage: ExchangeStage) -> Self {
        match self {
            PlatformError::Exchange { .. }
            | PlatformError::Config(_)
            | PlatformError::InvalidArgument(_) => self,
            PlatformError::RemoteAuth { code, message } => PlatformError::Exchange {
                stage,
                code: Some(code),
                message,
            },
            other => PlatformError::Exchange {
                stage,
                code: None,
                message: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PlatformError::Transport(format!("请求超时: {}", e))
        } else {
            PlatformError::Transport(e.to_string())
        }
    }
}

impl From<sqlx::Error> for PlatformError {
    fn from(e: sqlx::Error) -> Self {
        PlatformError::Storage(e.to_string())
    }
}

/// HTTP 层错误
#[derive(Debug)]
pub enum AppError {
    Unauthorized,
    Validation(String),
    LoginFailed(String),
    Platform(PlatformError),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    msg: String,
}

impl From<PlatformError> for AppError {
    fn from(e: PlatformError) -> Self {
        match e {
            PlatformError::InvalidArgument(msg) => AppError::Validation(msg),
            other => AppError::Platform(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, msg) = match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                error_codes::AUTH_FAILED,
                "未授权访问".to_string(),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR, msg)
            }
            AppError::LoginFailed(msg) => {
                (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg)
            }
            AppError::Platform(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                e.to_string(),
            ),
        };

        (status, Json(ErrorResponse { code, msg })).into_response()
    }
}
