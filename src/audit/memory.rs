use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AuditLog, MessageLogEntry, NewMessageLog};
use crate::error::PlatformError;

/// 未配置数据库时使用的内存审计日志，进程退出即丢失
#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<MessageLogEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: NewMessageLog) -> Result<MessageLogEntry, PlatformError> {
        let mut entries = self.entries.write().await;
        let entry = entry.into_entry(entries.len() as i64 + 1);
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_newest_first(&self) -> Result<Vec<MessageLogEntry>, PlatformError> {
        let mut entries = self.entries.read().await.clone();
        entries.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }
}
