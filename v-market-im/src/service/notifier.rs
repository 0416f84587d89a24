//! 变更通知 / Change notifier
//!
//! 每个主题一条 tokio broadcast 通道；订阅者落后溢出时收到 `Resync`
//! One tokio broadcast channel per topic; a subscriber that falls behind receives `Resync`

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

/// 订阅主题 / Subscription topic
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum Topic {
    Thread(String),
    Inbox(String),
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Thread(id) => write!(f, "thread:{}", id),
            Topic::Inbox(id) => write!(f, "inbox:{}", id),
        }
    }
}

/// 变更事件（消费者应重新查询而不是信任负载）
/// Change event (consumers re-query rather than trust the payload)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    MessageAppended {
        thread_id: String,
        message_id: String,
        seq: i64,
    },
    ThreadTouched {
        thread_id: String,
    },
    ReadStateChanged {
        thread_id: String,
        reader_id: String,
    },
    /// 缓冲溢出，必须全量刷新 / Buffer overflowed, refetch everything
    Resync,
}

type TopicMap = DashMap<Topic, broadcast::Sender<ChangeEvent>>;

/// 发布/订阅中心 / Pub/sub hub
#[derive(Clone)]
pub struct ChangeNotifier {
    topics: Arc<TopicMap>,
    capacity: usize,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// 订阅主题；丢弃 `Subscription` 即退订
    /// Subscribe to a topic; dropping the `Subscription` unsubscribes
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let rx = self
            .topics
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        debug!("🔔 subscribed to {}", topic);
        Subscription {
            topic,
            rx,
            topics: self.topics.clone(),
        }
    }

    /// 发布事件，返回收到的订阅者数；无订阅者时为空操作
    /// Publish an event, returning how many subscribers got it; no-op without subscribers
    pub fn publish(&self, topic: &Topic, event: ChangeEvent) -> usize {
        match self.topics.get(topic) {
            Some(tx) => match tx.send(event) {
                Ok(n) => n,
                Err(_) => {
                    warn!("⚠️  publish on {} found no live receivers", topic);
                    0
                }
            },
            None => 0,
        }
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

/// 订阅句柄 / Subscription handle
pub struct Subscription {
    topic: Topic,
    rx: broadcast::Receiver<ChangeEvent>,
    topics: Arc<TopicMap>,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// 等待下一个事件；落后时返回 `Resync`
    /// Wait for the next event; `Resync` after lagging
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("⚠️  subscriber on {} lagged by {} events", self.topic, skipped);
                Some(ChangeEvent::Resync)
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// 非阻塞读取 / Non-blocking read
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Lagged(_)) => Some(ChangeEvent::Resync),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // 自身接收端仍存活，计数为 1 即最后一个订阅者
        // Our own receiver is still alive, so a count of 1 means we are the last one
        let removed = self
            .topics
            .remove_if(&self.topic, |_, tx| tx.receiver_count() <= 1)
            .is_some();
        if removed {
            debug!("🔕 topic {} released", self.topic);
        }
    }
}
