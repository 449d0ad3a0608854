//! 测试用的平台替身，记录每个接口的调用次数与参数。

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::client::PlatformApi;
use super::schema::{
    SendResponse, SnsTokenResponse, SnsUserInfo, TokenResponse, UserInfoResponse, WorkNotice,
};
use crate::error::PlatformError;

/// 未设置的回复按网络错误处理
#[derive(Default)]
pub(crate) struct FakePlatform {
    pub token_delay: Duration,
    pub token_calls: AtomicUsize,
    token_reply: Mutex<Option<TokenResponse>>,
    primary_reply: Mutex<Option<SnsTokenResponse>>,
    fallback_reply: Mutex<Option<SnsTokenResponse>>,
    user_info_reply: Mutex<Option<UserInfoResponse>>,
    send_reply: Mutex<Option<SendResponse>>,
    /// (tmp_auth_code, access_token)
    pub sns_calls: Mutex<Vec<(String, Option<String>)>>,
    pub user_info_calls: Mutex<Vec<String>>,
    /// (access_token, notice)
    pub notices: Mutex<Vec<(String, WorkNotice)>>,
}

impl FakePlatform {
    pub fn with_token_delay(delay: Duration) -> Self {
        Self {
            token_delay: delay,
            ..Self::default()
        }
    }

    pub fn set_token_reply(&self, reply: TokenResponse) {
        *self.token_reply.lock().unwrap() = Some(reply);
    }

    pub fn set_primary_reply(&self, reply: SnsTokenResponse) {
        *self.primary_reply.lock().unwrap() = Some(reply);
    }

    pub fn set_fallback_reply(&self, reply: SnsTokenResponse) {
        *self.fallback_reply.lock().unwrap() = Some(reply);
    }

    pub fn set_user_info_reply(&self, reply: UserInfoResponse) {
        *self.user_info_reply.lock().unwrap() = Some(reply);
    }

    pub fn set_send_reply(&self, reply: SendResponse) {
        *self.send_reply.lock().unwrap() = Some(reply);
    }

    pub fn sns_call_count(&self) -> usize {
        self.sns_calls.lock().unwrap().len()
    }

    pub fn notice_count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }
}

fn unreachable_platform() -> PlatformError {
    PlatformError::Transport("connection refused".into())
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn fetch_access_token(&self) -> Result<TokenResponse, PlatformError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if !self.token_delay.is_zero() {
            tokio::time::sleep(self.token_delay).await;
        }
        self.token_reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(unreachable_platform)
    }

    async fn get_sns_token(
        &self,
        tmp_auth_code: &str,
        access_token: Option<&str>,
    ) -> Result<SnsTokenResponse, PlatformError> {
        self.sns_calls
            .lock()
            .unwrap()
            .push((tmp_auth_code.to_string(), access_token.map(str::to_string)));
        let reply = match access_token {
            None => &self.primary_reply,
            Some(_) => &self.fallback_reply,
        };
        reply.lock().unwrap().clone().ok_or_else(unreachable_platform)
    }

    async fn get_user_info(&self, sns_token: &str) -> Result<UserInfoResponse, PlatformError> {
        self.user_info_calls
            .lock()
            .unwrap()
            .push(sns_token.to_string());
        self.user_info_reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(unreachable_platform)
    }

    async fn send_work_notice(
        &self,
        access_token: &str,
        notice: &WorkNotice,
    ) -> Result<SendResponse, PlatformError> {
        self.notices
            .lock()
            .unwrap()
            .push((access_token.to_string(), notice.clone()));
        self.send_reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(unreachable_platform)
    }
}

pub(crate) fn token_ok(value: &str) -> TokenResponse {
    TokenResponse {
        errcode: 0,
        errmsg: "ok".into(),
        access_token: Some(value.to_string()),
        expires_in: Some(7200),
    }
}

pub(crate) fn token_rejected(code: i64, message: &str) -> TokenResponse {
    TokenResponse {
        errcode: code,
        errmsg: message.to_string(),
        access_token: None,
        expires_in: None,
    }
}

pub(crate) fn sns_ok(sns_token: &str) -> SnsTokenResponse {
    SnsTokenResponse {
        errcode: 0,
        errmsg: "ok".into(),
        sns_token: Some(sns_token.to_string()),
    }
}

pub(crate) fn sns_err(code: i64, message: &str) -> SnsTokenResponse {
    SnsTokenResponse {
        errcode: code,
        errmsg: message.to_string(),
        sns_token: None,
    }
}

pub(crate) fn user_info_ok(nick: &str, openid: &str, unionid: &str) -> UserInfoResponse {
    UserInfoResponse {
        errcode: 0,
        errmsg: "ok".into(),
        user_info: Some(SnsUserInfo {
            nick: Some(nick.to_string()),
            openid: Some(openid.to_string()),
            unionid: Some(unionid.to_string()),
        }),
    }
}

pub(crate) fn send_result(code: i64, message: &str) -> SendResponse {
    SendResponse {
        errcode: code,
        errmsg: message.to_string(),
        task_id: (code == 0).then_some(1),
    }
}
