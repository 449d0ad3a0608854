use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use super::client::PlatformApi;
use super::schema::{Recipient, WorkNotice};
use super::token::AccessTokenCache;
use crate::audit::{AuditLog, MessageLogEntry, MessageType, NewMessageLog};
use crate::error::PlatformError;

/// 工作通知发送器
///
/// 远程失败（取 token 失败、网络错误、平台拒绝）只体现为 `Ok(false)`
/// 和一条失败的审计记录；只有参数非法和审计写入失败会以 `Err` 返回。
pub struct Dispatcher {
    api: Arc<dyn PlatformApi>,
    tokens: Arc<AccessTokenCache>,
    audit: Arc<dyn AuditLog>,
    credential_rejected_codes: Vec<i64>,
}

impl Dispatcher {
    pub fn new(
        api: Arc<dyn PlatformApi>,
        tokens: Arc<AccessTokenCache>,
        audit: Arc<dyn AuditLog>,
        credential_rejected_codes: Vec<i64>,
    ) -> Self {
        Self {
            api,
            tokens,
            audit,
            credential_rejected_codes,
        }
    }

    pub async fn send_to_all(&self, content: &str) -> Result<bool, PlatformError> {
        ensure_not_blank(content, "消息内容不能为空")?;
        self.dispatch(Recipient::AllUsers, content).await
    }

    pub async fn send_to_user(&self, target_id: &str, content: &str) -> Result<bool, PlatformError> {
        ensure_not_blank(target_id, "接收用户不能为空")?;
        ensure_not_blank(content, "消息内容不能为空")?;
        self.dispatch(Recipient::User(target_id.to_string()), content)
            .await
    }

    pub async fn list_audit_entries(&self) -> Result<Vec<MessageLogEntry>, PlatformError> {
        self.audit.list_newest_first().await
    }

    async fn dispatch(&self, recipient: Recipient, content: &str) -> Result<bool, PlatformError> {
        let sent_at = Utc::now();
        let (message_type, target_user_id) = match &recipient {
            Recipient::AllUsers => (MessageType::All, None),
            Recipient::User(id) => (MessageType::Specific, Some(id.clone())),
        };

        let notice = WorkNotice {
            recipient,
            content: content.to_string(),
        };
        let outcome = self.try_send(&notice).await;

        let error_message = match &outcome {
            Ok(()) => {
                info!("Work notice sent to {:?}", notice.recipient);
                None
            }
            Err(e) => {
                error!("Failed to send work notice to {:?}: {}", notice.recipient, e);
                Some(e.to_string())
            }
        };

        self.audit
            .append(NewMessageLog {
                message_type,
                target_user_id,
                content: notice.content,
                sent_at,
                success: outcome.is_ok(),
                error_message,
            })
            .await?;

        Ok(outcome.is_ok())
    }

    async fn try_send(&self, notice: &WorkNotice) -> Result<(), PlatformError> {
        let token = self.tokens.get_token().await?;
        let resp = self.api.send_work_notice(&token.value, notice).await?;

        if resp.errcode != 0 {
            // 凭证失效时丢弃缓存，下一次发送会重新获取
            if self.credential_rejected_codes.contains(&resp.errcode) {
                self.tokens.invalidate_if(&token.value).await;
            }
            return Err(PlatformError::Dispatch {
                code: resp.errcode,
                message: resp.errmsg,
            });
        }

        Ok(())
    }
}

fn ensure_not_blank(value: &str, message: &str) -> Result<(), PlatformError> {
    if value.trim().is_empty() {
        return Err(PlatformError::InvalidArgument(message.to_string()));
    }
    Ok(())
}
