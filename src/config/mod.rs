use std::env;
use std::time::Duration;

use crate::error::PlatformError;

/// 钉钉平台默认 API 地址
pub const DEFAULT_API_BASE: &str = "https://oapi.dingtalk.com";
/// 平台 access_token 的有效期（秒）
pub const PLATFORM_TOKEN_VALIDITY_SECS: u64 = 7200;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub dingtalk: DingTalkConfig,
}

/// 钉钉应用配置
#[derive(Debug, Clone, serde::Deserialize)]
pub struct DingTalkConfig {
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub agent_id: String,
    pub api_base: String,
    pub callback_url: String,
    pub http_timeout_secs: u64,
    pub token_refresh_margin_secs: u64,
    /// 触发备用换取策略的平台错误码
    pub credential_rejected_codes: Vec<i64>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .unwrap_or_else(|_| "24".into())
            .trim_end_matches('h')
            .parse::<u64>()
            .unwrap_or(24);

        Ok(Config {
            database_url: non_empty_var("DATABASE_URL"),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: jwt_expiration * 3600,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            dingtalk: DingTalkConfig::from_env(),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }
}

impl DingTalkConfig {
    /// 使用默认值构造配置，`app_key`/`app_secret` 允许为空，首次使用时才报错
    pub fn new(app_key: Option<String>, app_secret: Option<String>, agent_id: &str) -> Self {
        Self {
            app_key,
            app_secret,
            agent_id: agent_id.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            callback_url: "http://localhost:8080/api/auth/callback".to_string(),
            http_timeout_secs: 5,
            token_refresh_margin_secs: 1800,
            credential_rejected_codes: vec![40001, 40014, 40089, 42001],
        }
    }

    fn from_env() -> Self {
        let mut config = Self::new(
            non_empty_var("DINGTALK_APP_KEY"),
            non_empty_var("DINGTALK_APP_SECRET"),
            &env::var("DINGTALK_AGENT_ID").unwrap_or_default(),
        );

        if let Some(base) = non_empty_var("DINGTALK_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(callback) = non_empty_var("DINGTALK_CALLBACK_URL") {
            config.callback_url = callback;
        }
        if let Some(timeout) = non_empty_var("DINGTALK_HTTP_TIMEOUT").and_then(|v| v.parse().ok()) {
            config.http_timeout_secs = timeout;
        }
        if let Some(margin) =
            non_empty_var("DINGTALK_TOKEN_REFRESH_MARGIN").and_then(|v| v.parse().ok())
        {
            config.token_refresh_margin_secs = margin;
        }
        if let Some(codes) = non_empty_var("DINGTALK_CREDENTIAL_REJECTED_CODES") {
            config.credential_rejected_codes = parse_codes(&codes);
        }

        config
    }

    /// 返回应用凭证，缺失时返回配置错误
    pub fn credentials(&self) -> Result<(&str, &str), PlatformError> {
        let app_key = self
            .app_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| PlatformError::Config("DINGTALK_APP_KEY 未配置".into()))?;
        let app_secret = self
            .app_secret
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| PlatformError::Config("DINGTALK_APP_SECRET 未配置".into()))?;
        Ok((app_key, app_secret))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn token_refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin_secs)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_codes(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|code| code.trim().parse::<i64>().ok())
        .collect()
}
