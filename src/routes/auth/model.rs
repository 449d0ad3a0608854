use serde::{Deserialize, Serialize};

/// 扫码登录页面携带的 state 参数
pub const LOGIN_STATE: &str = "STATE";

#[derive(Debug, Serialize)]
pub struct QrCodeResponse {
    pub qr_code_url: String,
}

/// 钉钉回调参数，`code` 为一次性临时授权码
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub open_id: String,
    pub nick: String,
    pub union_id: String,
    pub token: String,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct LoginStatusResponse {
    pub is_logged_in: bool,
    pub user_id: String,
    pub user_name: String,
}
