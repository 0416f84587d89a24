//! 视图对账 / View reconciliation
//!
//! 事件与兜底定时器都汇入同一个幂等的“重新加载”动作
//! Change events and the safety-net tick both funnel into one idempotent reload

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use super::messaging::MessagingService;
use crate::domain::{Contact, Message, Role, UserProfile};
use crate::error::ImResult;

/// 读操作重试策略（`retry.*`）/ Read retry policy (`retry.*`)
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub read_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            read_attempts: 3,
            base_delay_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的退避（指数）/ Backoff after failed attempt `attempt` (exponential)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(10);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// 带有界指数退避的读重试；只重试 `TransientStore`
/// Retry a read with bounded exponential backoff; only `TransientStore` is retried
pub async fn retry_read<T, F, Fut>(policy: &RetryPolicy, op: &str, mut f: F) -> ImResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ImResult<T>>,
{
    let attempts = policy.read_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "🔁 {} failed (attempt {}/{}): {}, retrying in {:?}",
                    op, attempt, attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// 会话视图：按消息 ID 去重，带 `since` 游标
/// Thread view: deduplicated by message id with a `since` cursor
#[derive(Debug, Clone)]
pub struct ThreadView {
    thread_id: String,
    messages: Vec<Message>,
    seen: HashSet<String>,
    cursor: Option<i64>,
}

impl ThreadView {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            seen: HashSet::new(),
            cursor: None,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn cursor(&self) -> Option<i64> {
        self.cursor
    }

    /// 合并一批消息，返回此前未见过的部分 / Merge a batch, returning the part not seen before
    pub fn merge(&mut self, batch: Vec<Message>) -> Vec<Message> {
        let mut fresh = Vec::new();
        for m in batch {
            if m.thread_id != self.thread_id || !self.seen.insert(m.id.clone()) {
                continue;
            }
            self.cursor = Some(self.cursor.map_or(m.seq, |c| c.max(m.seq)));
            fresh.push(m.clone());
            self.messages.push(m);
        }
        if !fresh.is_empty() {
            self.messages.sort_by_key(|m| m.seq);
        }
        fresh
    }

    /// 增量拉取游标之后的消息 / Incrementally fetch messages after the cursor
    pub async fn reload(
        &mut self,
        service: &MessagingService,
        user: &UserProfile,
    ) -> ImResult<Vec<Message>> {
        let batch = service
            .list_messages(user, &self.thread_id, self.cursor, None)
            .await?;
        Ok(self.merge(batch))
    }

    /// 丢弃本地状态并全量重新加载（已读状态变化或溢出后）
    /// Drop local state and reload everything (after read-state changes or overflow)
    pub async fn resync(
        &mut self,
        service: &MessagingService,
        user: &UserProfile,
    ) -> ImResult<Vec<Message>> {
        self.messages.clear();
        self.seen.clear();
        self.cursor = None;
        self.reload(service, user).await
    }
}

/// 收件箱视图：每次整体重算 / Inbox view: recomputed as a whole each time
#[derive(Debug, Clone)]
pub struct InboxView {
    role_filter: Option<Role>,
    contacts: Vec<Contact>,
}

impl InboxView {
    pub fn new(role_filter: Option<Role>) -> Self {
        Self {
            role_filter,
            contacts: Vec::new(),
        }
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn unread_total(&self) -> usize {
        self.contacts.iter().map(|c| c.unread_count).sum()
    }

    pub async fn reload(
        &mut self,
        service: &MessagingService,
        user: &UserProfile,
    ) -> ImResult<&[Contact]> {
        self.contacts = service.list_contacts(user, self.role_filter).await?;
        Ok(&self.contacts)
    }
}
