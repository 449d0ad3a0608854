//! 扫码登录的身份换取流程。
//!
//! 登录码先按主策略（仅应用凭证）换取 sns_token；若平台以凭证被拒绝的错误码
//! 回应，则改用备用策略（额外携带企业 access_token）重试一次，最后用
//! sns_token 拉取用户信息。
//!
//! ```text
//! Primary ──ok──────────────┐
//!    │ credential rejected  ├──> FetchIdentity ──ok──> Done
//!    └──> Fallback ──ok─────┘
//! 其余任何失败都直接结束于当前阶段
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::client::PlatformApi;
use super::schema::{SnsTokenResponse, UserInfoResponse};
use super::token::AccessTokenCache;
use crate::error::{ExchangeStage, PlatformError};

/// 换取成功后的登录身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginIdentity {
    pub open_id: String,
    pub nick: String,
    pub union_id: String,
}

#[derive(Debug, PartialEq, Eq)]
enum ExchangeStep {
    Primary,
    Fallback { rejected_code: i64 },
    FetchIdentity { sns_token: String },
    Done(LoginIdentity),
}

pub struct IdentityExchanger {
    api: Arc<dyn PlatformApi>,
    tokens: Arc<AccessTokenCache>,
    credential_rejected_codes: Vec<i64>,
}

impl IdentityExchanger {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        tokens: Arc<AccessTokenCache>,
        credential_rejected_codes: Vec<i64>,
    ) -> Self {
        Self {
            api,
            tokens,
            credential_rejected_codes,
        }
    }

    /// 将一次性登录码换成用户身份
    pub async fn exchange(&self, login_code: &str) -> Result<LoginIdentity, PlatformError> {
        let code = login_code.trim();
        if code.is_empty() {
            return Err(PlatformError::InvalidArgument("登录码不能为空".into()));
        }

        self.run(code)
            .await
            .inspect(|identity| info!("DingTalk login resolved for openid {}", identity.open_id))
            .inspect_err(|e| error!("DingTalk login exchange failed: {}", e))
    }

    async fn run(&self, code: &str) -> Result<LoginIdentity, PlatformError> {
        let mut step = ExchangeStep::Primary;
        loop {
            step = match step {
                ExchangeStep::Primary => {
                    let resp = self
                        .api
                        .get_sns_token(code, None)
                        .await
                        .map_err(|e| e.at_stage(ExchangeStage::Primary))?;
                    self.after_sns_token(ExchangeStage::Primary, resp)?
                }
                ExchangeStep::Fallback { rejected_code } => {
                    warn!(
                        "Primary login exchange rejected with errcode {}, retrying with access token",
                        rejected_code
                    );
                    let token = self
                        .tokens
                        .get_token()
                        .await
                        .map_err(|e| e.at_stage(ExchangeStage::Fallback))?;
                    let resp = self
                        .api
                        .get_sns_token(code, Some(&token.value))
                        .await
                        .map_err(|e| e.at_stage(ExchangeStage::Fallback))?;
                    self.after_sns_token(ExchangeStage::Fallback, resp)?
                }
                ExchangeStep::FetchIdentity { sns_token } => {
                    let resp = self
                        .api
                        .get_user_info(&sns_token)
                        .await
                        .map_err(|e| e.at_stage(ExchangeStage::Fetch))?;
                    ExchangeStep::Done(identity_from(resp)?)
                }
                ExchangeStep::Done(identity) => return Ok(identity),
            };
        }
    }

    /// sns_token 响应的状态转移；只有主策略可以转入备用策略
    fn after_sns_token(
        &self,
        stage: ExchangeStage,
        resp: SnsTokenResponse,
    ) -> Result<ExchangeStep, PlatformError> {
        if resp.errcode == 0 {
            return match resp.sns_token.filter(|t| !t.is_empty()) {
                Some(sns_token) => {
                    debug!("Obtained sns_token via {} exchange", stage);
                    Ok(ExchangeStep::FetchIdentity { sns_token })
                }
                None => Err(PlatformError::Exchange {
                    stage: ExchangeStage::Fetch,
                    code: None,
                    message: "empty session token".into(),
                }),
            };
        }

        if stage == ExchangeStage::Primary && self.credential_rejected_codes.contains(&resp.errcode)
        {
            return Ok(ExchangeStep::Fallback {
                rejected_code: resp.errcode,
            });
        }

        Err(PlatformError::Exchange {
            stage,
            code: Some(resp.errcode),
            message: resp.errmsg,
        })
    }
}

fn identity_from(resp: UserInfoResponse) -> Result<LoginIdentity, PlatformError> {
    let fetch_error = |code, message: &str| PlatformError::Exchange {
        stage: ExchangeStage::Fetch,
        code,
        message: message.to_string(),
    };

    if resp.errcode != 0 {
        return Err(fetch_error(Some(resp.errcode), &resp.errmsg));
    }

    let info = resp
        .user_info
        .ok_or_else(|| fetch_error(None, "getuserinfo 响应缺少 user_info"))?;
    let open_id = info
        .openid
        .filter(|v| !v.is_empty())
        .ok_or_else(|| fetch_error(None, "getuserinfo 响应缺少 openid"))?;
    let nick = info
        .nick
        .ok_or_else(|| fetch_error(None, "getuserinfo 响应缺少 nick"))?;
    let union_id = info
        .unionid
        .ok_or_else(|| fetch_error(None, "getuserinfo 响应缺少 unionid"))?;

    Ok(LoginIdentity {
        open_id,
        nick,
        union_id,
    })
}
