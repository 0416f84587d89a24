use async_trait::async_trait;

use crate::domain::{Message, MessageDraft, Thread, UserProfile};
use crate::error::ImResult;
use crate::service::identity::ThreadKey;

/// 消息存储接口（threads + messages 两张表），便于测试替换
/// Messaging store seam (threads + messages tables), swappable for tests
///
/// 实现必须保证 `(participant_low, participant_high, product_id)` 唯一，
/// 且同一会话内的 `append_message` 串行化（seq/时间戳严格递增）
/// Implementations must keep `(participant_low, participant_high, product_id)` unique
/// and serialize `append_message` per thread (strictly increasing seq and timestamp)
#[async_trait]
pub trait ImStore: Send + Sync {
    async fn find_thread(&self, key: &ThreadKey) -> ImResult<Option<Thread>>;

    /// 插入新会话；键已存在时返回 `ImError::Conflict`
    /// Insert a new thread; `ImError::Conflict` when the key already exists
    async fn insert_thread(&self, key: &ThreadKey) -> ImResult<Thread>;

    async fn get_thread(&self, thread_id: &str) -> ImResult<Option<Thread>>;

    /// 推进 `updated_at`；会话不存在时返回 false
    /// Bump `updated_at`; false when the thread does not exist
    async fn touch_thread(&self, thread_id: &str) -> ImResult<bool>;

    /// 用户参与的全部会话，按 `updated_at` 降序
    /// Every thread of the user, `updated_at` descending
    async fn list_threads_for_user(&self, user_id: &str) -> ImResult<Vec<Thread>>;

    /// 追加消息并在同一次写入中推进会话的 `updated_at`
    /// Append a message and bump the thread's `updated_at` in the same write
    async fn append_message(&self, draft: &MessageDraft) -> ImResult<Message>;

    /// 按 seq 升序；`since_seq` 之后的消息 / Ascending by seq, after `since_seq` when given
    async fn list_messages(
        &self,
        thread_id: &str,
        since_seq: Option<i64>,
        limit: Option<usize>,
    ) -> ImResult<Vec<Message>>;

    async fn last_message(&self, thread_id: &str) -> ImResult<Option<Message>>;

    async fn count_unread(&self, thread_id: &str, receiver_id: &str) -> ImResult<usize>;

    /// 把该接收方的未读消息置为已读，返回翻转条数
    /// Flip the receiver's unread messages to read, returning how many flipped
    async fn mark_read(&self, thread_id: &str, receiver_id: &str) -> ImResult<usize>;

    /// 连通性检查 / Connectivity probe
    async fn ping(&self) -> ImResult<()>;
}

/// 用户目录（身份服务的只读视图）/ User directory (read-only view of the identity collaborator)
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn lookup(&self, user_id: &str) -> ImResult<Option<UserProfile>>;
}
