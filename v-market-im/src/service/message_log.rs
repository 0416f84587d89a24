use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::notifier::{ChangeEvent, ChangeNotifier, Topic};
use super::thread_store::ThreadStore;
use crate::domain::{Message, MessageDraft};
use crate::error::{ImError, ImResult};
use crate::storage::ImStore;

/// 消息日志：只追加、会话内有序 / Message log: append-only, ordered per thread
#[derive(Clone)]
pub struct MessageLog {
    store: Arc<dyn ImStore>,
    threads: ThreadStore,
    notifier: ChangeNotifier,
    max_message_len: usize,
    // 每会话发布闸门：写入与发布在同一临界区内，事件顺序与追加顺序一致
    // Per-thread publish gate: write and publish share one critical section so events follow append order
    gates: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl MessageLog {
    pub fn new(
        store: Arc<dyn ImStore>,
        threads: ThreadStore,
        notifier: ChangeNotifier,
        max_message_len: usize,
    ) -> Self {
        Self {
            store,
            threads,
            notifier,
            max_message_len,
            gates: Arc::new(DashMap::new()),
        }
    }

    /// 追加一条消息 / Append a message
    ///
    /// 校验顺序：空内容、超长、会话不存在、发送方不是参与者
    /// Validation order: empty content, too long, unknown thread, sender not a participant
    pub async fn append(&self, thread_id: &str, sender_id: &str, content: &str) -> ImResult<Message> {
        if content.trim().is_empty() {
            return Err(ImError::EmptyMessage);
        }
        let len = content.chars().count();
        if len > self.max_message_len {
            return Err(ImError::MessageTooLong {
                len,
                max: self.max_message_len,
            });
        }
        let thread = self.threads.get(thread_id).await?;
        let receiver_id = thread
            .counterpart_of(sender_id)
            .ok_or_else(|| ImError::not_a_participant(thread_id, sender_id))?
            .to_string();

        let draft = MessageDraft {
            thread_id: thread.id.clone(),
            sender_id: sender_id.to_string(),
            receiver_id,
            content: content.to_string(),
        };

        let gate = self.gate(thread_id);
        let guard = gate.lock().await;
        let result = self.store.append_message(&draft).await;
        if let Ok(message) = &result {
            self.publish_appended(message);
        }
        drop(guard);
        self.gates
            .remove_if(thread_id, |_, g| Arc::strong_count(g) <= 2);

        let message = result?;
        info!(
            "💬 message {} seq={} appended to {} by {}",
            message.id, message.seq, message.thread_id, message.sender_id
        );
        Ok(message)
    }

    /// 按 seq 升序列出 `since` 之后的消息 / List messages after `since`, ascending by seq
    pub async fn list_by_thread(
        &self,
        thread_id: &str,
        since: Option<i64>,
        limit: Option<usize>,
    ) -> ImResult<Vec<Message>> {
        let list = self.store.list_messages(thread_id, since, limit).await?;
        debug!("📜 {} messages from {} since {:?}", list.len(), thread_id, since);
        Ok(list)
    }

    fn gate(&self, thread_id: &str) -> Arc<Mutex<()>> {
        self.gates
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn publish_appended(&self, message: &Message) {
        self.notifier.publish(
            &Topic::Thread(message.thread_id.clone()),
            ChangeEvent::MessageAppended {
                thread_id: message.thread_id.clone(),
                message_id: message.id.clone(),
                seq: message.seq,
            },
        );
        for uid in [&message.sender_id, &message.receiver_id] {
            self.notifier.publish(
                &Topic::Inbox(uid.clone()),
                ChangeEvent::ThreadTouched {
                    thread_id: message.thread_id.clone(),
                },
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn gate_count(&self) -> usize {
        self.gates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Participant, Role};
    use crate::storage::MemoryStore;

    async fn setup() -> (MessageLog, ChangeNotifier, Arc<MemoryStore>, String) {
        let store = Arc::new(MemoryStore::new());
        let threads = ThreadStore::new(store.clone());
        let notifier = ChangeNotifier::new(64);
        let thread = threads
            .get_or_create(
                &Participant { id: "u1".into(), role: Role::Buyer },
                &Participant { id: "u2".into(), role: Role::Seller },
                Some("p7"),
            )
            .await
            .unwrap();
        let log = MessageLog::new(store.clone(), threads, notifier.clone(), 10);
        (log, notifier, store, thread.id)
    }

    #[tokio::test]
    async fn blank_content_writes_nothing() {
        let (log, _, store, tid) = setup().await;
        assert_eq!(log.append(&tid, "u1", "").await, Err(ImError::EmptyMessage));
        assert_eq!(log.append(&tid, "u1", "   ").await, Err(ImError::EmptyMessage));
        assert_eq!(store.message_count(), 0);
    }

    #[tokio::test]
    async fn too_long_is_rejected() {
        let (log, _, store, tid) = setup().await;
        let err = log.append(&tid, "u1", "this is far too long").await.unwrap_err();
        assert!(matches!(err, ImError::MessageTooLong { max: 10, .. }));
        assert_eq!(store.message_count(), 0);
    }

    #[tokio::test]
    async fn outsider_cannot_append() {
        let (log, _, _, tid) = setup().await;
        assert!(matches!(
            log.append(&tid, "u3", "hi").await,
            Err(ImError::NotAParticipant { .. })
        ));
        assert!(matches!(
            log.append("missing", "u1", "hi").await,
            Err(ImError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn append_sets_receiver_and_publishes() {
        let (log, notifier, _, tid) = setup().await;
        let mut thread_sub = notifier.subscribe(Topic::Thread(tid.clone()));
        let mut inbox_sub = notifier.subscribe(Topic::Inbox("u2".into()));
        let m = log.append(&tid, "u1", "hello").await.unwrap();
        assert_eq!(m.receiver_id, "u2");
        assert!(!m.is_read);
        assert_eq!(
            thread_sub.recv().await,
            Some(ChangeEvent::MessageAppended {
                thread_id: tid.clone(),
                message_id: m.id.clone(),
                seq: 1
            })
        );
        assert_eq!(
            inbox_sub.recv().await,
            Some(ChangeEvent::ThreadTouched { thread_id: tid })
        );
        assert_eq!(log.gate_count(), 0);
    }

    #[tokio::test]
    async fn concurrent_appends_keep_order_and_events() {
        let (log, notifier, _, tid) = setup().await;
        let mut sub = notifier.subscribe(Topic::Thread(tid.clone()));
        let mut handles = Vec::new();
        for i in 0..20 {
            let log = log.clone();
            let tid = tid.clone();
            let sender = if i % 2 == 0 { "u1" } else { "u2" };
            handles.push(tokio::spawn(async move {
                log.append(&tid, sender, &format!("m{}", i)).await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let all = log.list_by_thread(&tid, None, None).await.unwrap();
        let seqs: Vec<i64> = all.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, (1..=20).collect::<Vec<_>>());
        assert!(all.windows(2).all(|w| w[0].created_at < w[1].created_at));
        for expected in 1..=20 {
            match sub.recv().await {
                Some(ChangeEvent::MessageAppended { seq, .. }) => assert_eq!(seq, expected),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }
}
