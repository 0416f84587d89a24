use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use uuid::Uuid;

use super::traits::{ImStore, UserDirectory};
use super::{next_timestamp, now_millis};
use crate::domain::{Message, MessageDraft, Thread, UserProfile};
use crate::error::{ImError, ImResult};
use crate::service::identity::ThreadKey;

#[derive(Default)]
struct Tables {
    threads: HashMap<String, Thread>,
    // 唯一索引：键字符串 -> 会话ID / Unique index: key string -> thread id
    thread_keys: HashMap<String, String>,
    messages: HashMap<String, Vec<Message>>,
}

/// 内存存储 / In-memory store
///
/// 单把读写锁保护全部表，追加消息在写锁内分配 seq 与时间戳
/// One RwLock guards all tables; appends assign seq and timestamp under the write lock
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 全部消息条数（测试与诊断用）/ Total message rows (tests and diagnostics)
    pub fn message_count(&self) -> usize {
        self.tables.read().messages.values().map(Vec::len).sum()
    }

    pub fn thread_count(&self) -> usize {
        self.tables.read().threads.len()
    }
}

#[async_trait]
impl ImStore for MemoryStore {
    async fn find_thread(&self, key: &ThreadKey) -> ImResult<Option<Thread>> {
        let tables = self.tables.read();
        Ok(tables
            .thread_keys
            .get(&key.as_string())
            .and_then(|id| tables.threads.get(id))
            .cloned())
    }

    async fn insert_thread(&self, key: &ThreadKey) -> ImResult<Thread> {
        let mut tables = self.tables.write();
        let key_str = key.as_string();
        if tables.thread_keys.contains_key(&key_str) {
            return Err(ImError::Conflict(key_str));
        }
        let now = now_millis();
        let thread = Thread {
            id: Uuid::new_v4().to_string(),
            participant_low: key.participant_low.clone(),
            participant_high: key.participant_high.clone(),
            product_id: key.product_id.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.thread_keys.insert(key_str, thread.id.clone());
        tables.threads.insert(thread.id.clone(), thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> ImResult<Option<Thread>> {
        Ok(self.tables.read().threads.get(thread_id).cloned())
    }

    async fn touch_thread(&self, thread_id: &str) -> ImResult<bool> {
        let mut tables = self.tables.write();
        match tables.threads.get_mut(thread_id) {
            Some(thread) => {
                thread.updated_at = thread.updated_at.max(now_millis());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_threads_for_user(&self, user_id: &str) -> ImResult<Vec<Thread>> {
        let tables = self.tables.read();
        let mut list: Vec<Thread> = tables
            .threads
            .values()
            .filter(|t| t.has_participant(user_id))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        Ok(list)
    }

    async fn append_message(&self, draft: &MessageDraft) -> ImResult<Message> {
        let mut tables = self.tables.write();
        if !tables.threads.contains_key(&draft.thread_id) {
            return Err(ImError::not_found("thread", &draft.thread_id));
        }
        let log = tables.messages.entry(draft.thread_id.clone()).or_default();
        let last = log.last();
        let message = Message {
            id: Uuid::new_v4().to_string(),
            thread_id: draft.thread_id.clone(),
            seq: last.map(|m| m.seq + 1).unwrap_or(1),
            sender_id: draft.sender_id.clone(),
            receiver_id: draft.receiver_id.clone(),
            content: draft.content.clone(),
            created_at: next_timestamp(last.map(|m| m.created_at)),
            is_read: false,
        };
        log.push(message.clone());
        if let Some(thread) = tables.threads.get_mut(&draft.thread_id) {
            thread.updated_at = thread.updated_at.max(message.created_at);
        }
        Ok(message)
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        since_seq: Option<i64>,
        limit: Option<usize>,
    ) -> ImResult<Vec<Message>> {
        let tables = self.tables.read();
        let after = since_seq.unwrap_or(0);
        let iter = tables
            .messages
            .get(thread_id)
            .into_iter()
            .flatten()
            .filter(|m| m.seq > after)
            .cloned();
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }

    async fn last_message(&self, thread_id: &str) -> ImResult<Option<Message>> {
        Ok(self
            .tables
            .read()
            .messages
            .get(thread_id)
            .and_then(|log| log.last())
            .cloned())
    }

    async fn count_unread(&self, thread_id: &str, receiver_id: &str) -> ImResult<usize> {
        Ok(self
            .tables
            .read()
            .messages
            .get(thread_id)
            .map(|log| {
                log.iter()
                    .filter(|m| m.receiver_id == receiver_id && !m.is_read)
                    .count()
            })
            .unwrap_or(0))
    }

    async fn mark_read(&self, thread_id: &str, receiver_id: &str) -> ImResult<usize> {
        let mut tables = self.tables.write();
        let mut flipped = 0;
        if let Some(log) = tables.messages.get_mut(thread_id) {
            for m in log
                .iter_mut()
                .filter(|m| m.receiver_id == receiver_id && !m.is_read)
            {
                m.is_read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn ping(&self) -> ImResult<()> {
        Ok(())
    }
}

/// 内存用户目录（由配置 `directory.users` 初始化）
/// In-memory user directory (seeded from `directory.users`)
#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<String, UserProfile>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserProfile>) -> Self {
        let dir = Self::new();
        for u in users {
            dir.upsert(u);
        }
        dir
    }

    pub fn upsert(&self, user: UserProfile) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn lookup(&self, user_id: &str) -> ImResult<Option<UserProfile>> {
        Ok(self.users.get(user_id).map(|u| u.value().clone()))
    }
}
