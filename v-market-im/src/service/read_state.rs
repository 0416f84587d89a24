use std::sync::Arc;

use tracing::debug;

use super::notifier::{ChangeEvent, ChangeNotifier, Topic};
use super::thread_store::ThreadStore;
use crate::error::{ImError, ImResult};
use crate::storage::ImStore;

/// 已读状态跟踪 / Read-state tracker
#[derive(Clone)]
pub struct ReadStateTracker {
    store: Arc<dyn ImStore>,
    threads: ThreadStore,
    notifier: ChangeNotifier,
}

impl ReadStateTracker {
    pub fn new(store: Arc<dyn ImStore>, threads: ThreadStore, notifier: ChangeNotifier) -> Self {
        Self {
            store,
            threads,
            notifier,
        }
    }

    /// 把发给 `reader_id` 的未读消息全部置为已读，幂等
    /// Flip every unread message addressed to `reader_id`; idempotent
    pub async fn mark_read(&self, thread_id: &str, reader_id: &str) -> ImResult<usize> {
        let thread = self.threads.get(thread_id).await?;
        if !thread.has_participant(reader_id) {
            return Err(ImError::not_a_participant(thread_id, reader_id));
        }
        let flipped = self.store.mark_read(thread_id, reader_id).await?;
        if flipped > 0 {
            self.notifier.publish(
                &Topic::Thread(thread_id.to_string()),
                ChangeEvent::ReadStateChanged {
                    thread_id: thread_id.to_string(),
                    reader_id: reader_id.to_string(),
                },
            );
            self.notifier.publish(
                &Topic::Inbox(reader_id.to_string()),
                ChangeEvent::ThreadTouched {
                    thread_id: thread_id.to_string(),
                },
            );
        }
        debug!("👁️  {} marked {} read in {}", reader_id, flipped, thread_id);
        Ok(flipped)
    }
}
