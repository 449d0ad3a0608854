// 消息发送审计日志
// 每次发送尝试恰好写入一条记录，写入后不再修改

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

pub use memory::InMemoryAuditLog;
pub use postgres::PgAuditLog;

/// 消息类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// 发送给全体成员
    All,
    /// 发送给指定用户
    Specific,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::All => "all",
            MessageType::Specific => "specific",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(MessageType::All),
            "specific" => Some(MessageType::Specific),
            _ => None,
        }
    }
}

/// 一条已落库的发送记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageLogEntry {
    pub id: i64,
    pub message_type: MessageType,
    /// 仅当类型为 `Specific` 时存在
    pub target_user_id: Option<String>,
    pub content: String,
    /// 发起发送的时间
    pub sent_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// 待写入的发送记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessageLog {
    pub message_type: MessageType,
    pub target_user_id: Option<String>,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
}

impl NewMessageLog {
    fn into_entry(self, id: i64) -> MessageLogEntry {
        MessageLogEntry {
            id,
            message_type: self.message_type,
            target_user_id: self.target_user_id,
            content: self.content,
            sent_at: self.sent_at,
            success: self.success,
            error_message: self.error_message,
        }
    }
}

/// 只追加的审计日志存储
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: NewMessageLog) -> Result<MessageLogEntry, PlatformError>;

    /// 按发送时间倒序返回全部记录
    async fn list_newest_first(&self) -> Result<Vec<MessageLogEntry>, PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_round_trips_through_db_text() {
        for ty in [MessageType::All, MessageType::Specific] {
            assert_eq!(MessageType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(MessageType::parse("broadcast"), None);
    }
}
