use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::{AuditLog, MessageLogEntry, MessageType, NewMessageLog};
use crate::error::PlatformError;

/// 消息日志表实体
#[derive(Debug, Clone, FromRow)]
struct MessageLogRow {
    id: i64,
    message_type: String,
    target_user_id: Option<String>,
    content: String,
    sent_at: DateTime<Utc>,
    is_success: bool,
    error_message: Option<String>,
}

impl TryFrom<MessageLogRow> for MessageLogEntry {
    type Error = PlatformError;

    fn try_from(row: MessageLogRow) -> Result<Self, Self::Error> {
        let message_type = MessageType::parse(&row.message_type).ok_or_else(|| {
            PlatformError::Storage(format!("未知的消息类型: {}", row.message_type))
        })?;

        Ok(MessageLogEntry {
            id: row.id,
            message_type,
            target_user_id: row.target_user_id,
            content: row.content,
            sent_at: row.sent_at,
            success: row.is_success,
            error_message: row.error_message,
        })
    }
}

/// 基于 Postgres 的审计日志
#[derive(Clone)]
pub struct PgAuditLog {
    pool: PgPool,
}

impl PgAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 建表（若不存在）
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS message_logs (
                id BIGSERIAL PRIMARY KEY,
                message_type TEXT NOT NULL,
                target_user_id TEXT,
                content TEXT NOT NULL,
                sent_at TIMESTAMPTZ NOT NULL,
                is_success BOOLEAN NOT NULL,
                error_message TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_message_logs_sent_at ON message_logs (sent_at DESC, id DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AuditLog for PgAuditLog {
    async fn append(&self, entry: NewMessageLog) -> Result<MessageLogEntry, PlatformError> {
        let row = sqlx::query_as::<_, MessageLogRow>(
            r#"
            INSERT INTO message_logs
                (message_type, target_user_id, content, sent_at, is_success, error_message)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, message_type, target_user_id, content, sent_at, is_success, error_message
            "#,
        )
        .bind(entry.message_type.as_str())
        .bind(&entry.target_user_id)
        .bind(&entry.content)
        .bind(entry.sent_at)
        .bind(entry.success)
        .bind(&entry.error_message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert message log: {}", e);
            e
        })?;

        row.try_into()
    }

    async fn list_newest_first(&self) -> Result<Vec<MessageLogEntry>, PlatformError> {
        let rows = sqlx::query_as::<_, MessageLogRow>(
            r#"
            SELECT id, message_type, target_user_id, content, sent_at, is_success, error_message
            FROM message_logs
            ORDER BY sent_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!("Loaded {} message logs", rows.len());
        rows.into_iter().map(MessageLogEntry::try_from).collect()
    }
}
