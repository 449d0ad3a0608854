// 钉钉开放平台集成层
// 服务凭证缓存、扫码登录身份换取、工作通知发送

mod client;
mod dispatch;
mod exchange;
mod schema;
mod token;

#[cfg(test)]
mod fake;

use url::Url;

use crate::config::DingTalkConfig;
use crate::error::PlatformError;

pub use client::{HttpPlatformClient, PlatformApi};
pub use dispatch::Dispatcher;
pub use exchange::{IdentityExchanger, LoginIdentity};
pub use schema::{
    Recipient, SendResponse, SnsTokenResponse, SnsUserInfo, TokenResponse, UserInfoResponse,
    WorkNotice,
};
pub use token::{AccessToken, AccessTokenCache};

/// 构造扫码登录页地址，`callback_url` 必须与平台登记的回调地址完全一致
pub fn login_redirect_url(
    config: &DingTalkConfig,
    callback_url: &str,
    state: &str,
) -> Result<String, PlatformError> {
    let (app_key, _) = config.credentials()?;
    let url = Url::parse_with_params(
        &format!("{}/connect/qrconnect", config.api_base),
        &[
            ("appid", app_key),
            ("response_type", "code"),
            ("scope", "snsapi_login"),
            ("state", state),
            ("redirect_uri", callback_url),
        ],
    )
    .map_err(|e| PlatformError::Config(format!("无效的钉钉 API 地址: {}", e)))?;

    Ok(url.to_string())
}
