//! 消息服务门面 / Messaging service facade
//!
//! 买家、卖家、管理员三个界面共用同一个入口
//! The single entry point shared by the buyer, seller and admin surfaces

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use super::identity::resolve_thread_key;
use super::inbox::InboxAggregator;
use super::message_log::MessageLog;
use super::notifier::{ChangeNotifier, Subscription, Topic};
use super::read_state::ReadStateTracker;
use super::thread_store::ThreadStore;
use super::view::{retry_read, RetryPolicy};
use crate::domain::{Contact, Message, Role, SubscribeScope, Thread, UserProfile};
use crate::error::{ImError, ImResult};
use crate::storage::{ImStore, UserDirectory};

/// 消息参数（`messaging.*` + `retry.*`）/ Messaging settings (`messaging.*` + `retry.*`)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagingSettings {
    pub max_message_len: usize,
    pub preview_len: usize,
    #[serde(skip)]
    pub retry: RetryPolicy,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            max_message_len: 4000,
            preview_len: 80,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct MessagingService {
    store: Arc<dyn ImStore>,
    directory: Arc<dyn UserDirectory>,
    notifier: ChangeNotifier,
    threads: ThreadStore,
    log: MessageLog,
    reads: ReadStateTracker,
    inbox: InboxAggregator,
    settings: MessagingSettings,
}

impl MessagingService {
    pub fn new(
        store: Arc<dyn ImStore>,
        directory: Arc<dyn UserDirectory>,
        notifier: ChangeNotifier,
        settings: MessagingSettings,
    ) -> Self {
        let threads = ThreadStore::new(store.clone());
        let log = MessageLog::new(
            store.clone(),
            threads.clone(),
            notifier.clone(),
            settings.max_message_len,
        );
        let reads = ReadStateTracker::new(store.clone(), threads.clone(), notifier.clone());
        let inbox = InboxAggregator::new(
            store.clone(),
            directory.clone(),
            threads.clone(),
            settings.preview_len,
        );
        Self {
            store,
            directory,
            notifier,
            threads,
            log,
            reads,
            inbox,
            settings,
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn store(&self) -> &Arc<dyn ImStore> {
        &self.store
    }

    /// 打开（或惰性创建）与对方的会话 / Open, or lazily create, the thread with a counterpart
    pub async fn open_or_create_thread(
        &self,
        user: &UserProfile,
        counterpart_id: &str,
        product_id: Option<&str>,
    ) -> ImResult<String> {
        // 先做纯校验，避免无谓查询 / Pure validation first, before any lookup
        resolve_thread_key(&user.id, counterpart_id, product_id)?;
        let counterpart_id = counterpart_id.trim();
        let counterpart = retry_read(&self.settings.retry, "lookup_user", move || {
            self.directory.lookup(counterpart_id)
        })
        .await?
        .ok_or_else(|| ImError::not_found("user", counterpart_id))?;
        let thread = self
            .threads
            .get_or_create(&user.participant(), &counterpart.participant(), product_id)
            .await?;
        debug!("🧵 {} opened {} with {}", user.id, thread.id, counterpart.id);
        Ok(thread.id)
    }

    /// 列出会话消息（`since` 为已持有的最后 seq）
    /// List thread messages (`since` is the seq of the last message already held)
    pub async fn list_messages(
        &self,
        user: &UserProfile,
        thread_id: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> ImResult<Vec<Message>> {
        self.participant_thread(user, thread_id).await?;
        retry_read(&self.settings.retry, "list_messages", move || {
            self.log.list_by_thread(thread_id, since, limit)
        })
        .await
    }

    /// 发送消息；暂时性存储故障直接返回，不自动重试
    /// Send a message; transient store failures surface immediately and are never retried
    pub async fn send_message(
        &self,
        user: &UserProfile,
        thread_id: &str,
        content: &str,
    ) -> ImResult<Message> {
        self.log.append(thread_id, &user.id, content).await
    }

    pub async fn mark_thread_read(&self, user: &UserProfile, thread_id: &str) -> ImResult<usize> {
        self.reads.mark_read(thread_id, &user.id).await
    }

    pub async fn list_contacts(
        &self,
        user: &UserProfile,
        role_filter: Option<Role>,
    ) -> ImResult<Vec<Contact>> {
        retry_read(&self.settings.retry, "list_contacts", move || {
            self.inbox.build_contacts(&user.id, role_filter)
        })
        .await
    }

    pub async fn unread_total(&self, user: &UserProfile) -> ImResult<usize> {
        retry_read(&self.settings.retry, "unread_total", move || {
            self.inbox.unread_total(&user.id)
        })
        .await
    }

    /// 订阅会话或收件箱 / Subscribe to a thread or an inbox
    ///
    /// 会话需是参与者；收件箱只能订阅自己的（管理员亦然）
    /// Threads require participation; an inbox can only be one's own (admins included)
    pub async fn subscribe(
        &self,
        user: &UserProfile,
        scope: SubscribeScope,
        id: &str,
    ) -> ImResult<Subscription> {
        let topic = match scope {
            SubscribeScope::Thread => {
                let thread = self.participant_thread(user, id).await?;
                Topic::Thread(thread.id)
            }
            SubscribeScope::Inbox => {
                if id != user.id {
                    return Err(ImError::not_a_participant(format!("inbox:{}", id), &user.id));
                }
                Topic::Inbox(user.id.clone())
            }
        };
        info!("🔔 {} subscribed to {}", user.id, topic);
        Ok(self.notifier.subscribe(topic))
    }

    async fn participant_thread(&self, user: &UserProfile, thread_id: &str) -> ImResult<Thread> {
        let thread = retry_read(&self.settings.retry, "get_thread", move || {
            self.threads.get(thread_id)
        })
        .await?;
        if !thread.has_participant(&user.id) {
            return Err(ImError::not_a_participant(thread_id, &user.id));
        }
        Ok(thread)
    }
}
