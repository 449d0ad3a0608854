use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::schema::{
    SendResponse, SnsTokenResponse, TokenResponse, UserInfoResponse, WorkNotice, WorkNoticeBody,
};
use crate::config::DingTalkConfig;
use crate::error::PlatformError;

/// 响应体写入错误信息时保留的最大长度
const MAX_BODY_IN_ERROR: usize = 512;

/// 钉钉开放平台的远程调用能力
///
/// 只负责传输和解析，`errcode` 的业务含义由调用方判断。
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// 使用应用凭证获取企业 access_token
    async fn fetch_access_token(&self) -> Result<TokenResponse, PlatformError>;

    /// 用一次性登录码换取 sns_token，`access_token` 为备用策略携带的服务凭证
    async fn get_sns_token(
        &self,
        tmp_auth_code: &str,
        access_token: Option<&str>,
    ) -> Result<SnsTokenResponse, PlatformError>;

    async fn get_user_info(&self, sns_token: &str) -> Result<UserInfoResponse, PlatformError>;

    async fn send_work_notice(
        &self,
        access_token: &str,
        notice: &WorkNotice,
    ) -> Result<SendResponse, PlatformError>;
}

/// 基于 reqwest 的平台客户端
#[derive(Clone)]
pub struct HttpPlatformClient {
    http: Client,
    config: DingTalkConfig,
}

impl HttpPlatformClient {
    pub fn new(config: DingTalkConfig) -> Result<Self, PlatformError> {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| PlatformError::Config(format!("无法创建 HTTP 客户端: {}", e)))?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        debug!("Requesting DingTalk GET {}", path);
        let response = self
            .http
            .get(self.endpoint(path))
            .query(query)
            .send()
            .await
            .inspect_err(|e| error!("DingTalk GET {} failed: {}", path, e))?;

        read_json(path, response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<T, PlatformError> {
        debug!("Requesting DingTalk POST {}", path);
        let response = self
            .http
            .post(self.endpoint(path))
            .query(query)
            .json(body)
            .send()
            .await
            .inspect_err(|e| error!("DingTalk POST {} failed: {}", path, e))?;

        read_json(path, response).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, PlatformError> {
    let status = response.status();
    if !status.is_success() {
        error!("DingTalk {} returned HTTP {}", path, status);
        return Err(PlatformError::Transport(format!("{} 返回 HTTP {}", path, status)));
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice::<T>(&bytes).map_err(|e| {
        let mut body = String::from_utf8_lossy(&bytes).to_string();
        if body.len() > MAX_BODY_IN_ERROR {
            let mut cut = MAX_BODY_IN_ERROR;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push_str("...");
        }
        error!("Unexpected DingTalk response from {}: {}", path, e);
        PlatformError::MalformedResponse(format!("{}: {}; body: {}", path, e, body))
    })
}

#[async_trait]
impl PlatformApi for HttpPlatformClient {
    async fn fetch_access_token(&self) -> Result<TokenResponse, PlatformError> {
        let (app_key, app_secret) = self.config.credentials()?;
        self.get_json("/gettoken", &[("appkey", app_key), ("appsecret", app_secret)])
            .await
    }

    async fn get_sns_token(
        &self,
        tmp_auth_code: &str,
        access_token: Option<&str>,
    ) -> Result<SnsTokenResponse, PlatformError> {
        let (app_key, app_secret) = self.config.credentials()?;
        let mut query = vec![
            ("tmp_auth_code", tmp_auth_code),
            ("appid", app_key),
            ("appsecret", app_secret),
        ];
        if let Some(token) = access_token {
            query.push(("access_token", token));
        }
        self.get_json("/sns/gettoken", &query).await
    }

    async fn get_user_info(&self, sns_token: &str) -> Result<UserInfoResponse, PlatformError> {
        self.get_json("/sns/getuserinfo", &[("sns_token", sns_token)])
            .await
    }

    async fn send_work_notice(
        &self,
        access_token: &str,
        notice: &WorkNotice,
    ) -> Result<SendResponse, PlatformError> {
        let body = WorkNoticeBody::new(&self.config.agent_id, notice);
        self.post_json(
            "/topapi/message/corpconversation/asyncsend_v2",
            &[("access_token", access_token)],
            &body,
        )
        .await
    }
}
