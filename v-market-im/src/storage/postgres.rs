use async_trait::async_trait;
use sqlx::{FromRow, Pool, Postgres};
use tracing::info;
use uuid::Uuid;

use super::traits::{ImStore, UserDirectory};
use super::{next_timestamp, now_millis};
use crate::domain::{Message, MessageDraft, Role, Thread, UserProfile};
use crate::error::{ImError, ImResult};
use crate::service::identity::ThreadKey;

/// 建表语句（幂等）/ Schema statements (idempotent)
///
/// 唯一索引把 NULL 商品折叠为 ''，保证无商品会话同样唯一
/// The unique index folds a NULL product to '' so product-less threads are unique too
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS market_users (
        id TEXT PRIMARY KEY,
        role TEXT NOT NULL,
        display_name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS im_threads (
        id TEXT PRIMARY KEY,
        participant_low TEXT NOT NULL,
        participant_high TEXT NOT NULL,
        product_id TEXT,
        created_at BIGINT NOT NULL,
        updated_at BIGINT NOT NULL,
        last_seq BIGINT NOT NULL DEFAULT 0,
        last_created_at BIGINT
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS im_threads_key_uq
        ON im_threads (participant_low, participant_high, COALESCE(product_id, ''))",
    "CREATE INDEX IF NOT EXISTS im_threads_low_idx ON im_threads (participant_low, updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS im_threads_high_idx ON im_threads (participant_high, updated_at DESC)",
    "CREATE TABLE IF NOT EXISTS im_messages (
        id TEXT PRIMARY KEY,
        thread_id TEXT NOT NULL REFERENCES im_threads(id),
        seq BIGINT NOT NULL,
        sender_id TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at BIGINT NOT NULL,
        is_read BOOLEAN NOT NULL DEFAULT FALSE,
        UNIQUE (thread_id, seq)
    )",
    "CREATE INDEX IF NOT EXISTS im_messages_unread_idx
        ON im_messages (thread_id, receiver_id) WHERE NOT is_read",
];

const THREAD_COLUMNS: &str =
    "id, participant_low, participant_high, product_id, created_at, updated_at";
const MESSAGE_COLUMNS: &str =
    "id, thread_id, seq, sender_id, receiver_id, content, created_at, is_read";

/// `LIMIT` 参数，超出 i64 的值按不限处理 / `LIMIT` bind value, saturating at i64::MAX
fn limit_param(limit: Option<usize>) -> i64 {
    limit
        .map(|n| i64::try_from(n).unwrap_or(i64::MAX))
        .unwrap_or(i64::MAX)
}

#[derive(FromRow)]
struct ThreadRow {
    id: String,
    participant_low: String,
    participant_high: String,
    product_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<ThreadRow> for Thread {
    fn from(r: ThreadRow) -> Self {
        Thread {
            id: r.id,
            participant_low: r.participant_low,
            participant_high: r.participant_high,
            product_id: r.product_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: String,
    thread_id: String,
    seq: i64,
    sender_id: String,
    receiver_id: String,
    content: String,
    created_at: i64,
    is_read: bool,
}

impl From<MessageRow> for Message {
    fn from(r: MessageRow) -> Self {
        Message {
            id: r.id,
            thread_id: r.thread_id,
            seq: r.seq,
            sender_id: r.sender_id,
            receiver_id: r.receiver_id,
            content: r.content,
            created_at: r.created_at,
            is_read: r.is_read,
        }
    }
}

/// PostgreSQL 存储 / PostgreSQL store
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// 创建表与索引 / Create tables and indexes
    pub async fn migrate(&self) -> ImResult<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        info!("🗄️  im schema ready ({} statements)", SCHEMA.len());
        Ok(())
    }
}

#[async_trait]
impl ImStore for PgStore {
    async fn find_thread(&self, key: &ThreadKey) -> ImResult<Option<Thread>> {
        let sql = format!(
            "SELECT {} FROM im_threads
             WHERE participant_low = $1 AND participant_high = $2
               AND COALESCE(product_id, '') = COALESCE($3, '')",
            THREAD_COLUMNS
        );
        let row: Option<ThreadRow> = sqlx::query_as(&sql)
            .bind(&key.participant_low)
            .bind(&key.participant_high)
            .bind(&key.product_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Thread::from))
    }

    async fn insert_thread(&self, key: &ThreadKey) -> ImResult<Thread> {
        let now = now_millis();
        let sql = format!(
            "INSERT INTO im_threads ({}) VALUES ($1, $2, $3, $4, $5, $5) RETURNING {}",
            THREAD_COLUMNS, THREAD_COLUMNS
        );
        let row: ThreadRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&key.participant_low)
            .bind(&key.participant_high)
            .bind(&key.product_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn get_thread(&self, thread_id: &str) -> ImResult<Option<Thread>> {
        let sql = format!("SELECT {} FROM im_threads WHERE id = $1", THREAD_COLUMNS);
        let row: Option<ThreadRow> = sqlx::query_as(&sql)
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Thread::from))
    }

    async fn touch_thread(&self, thread_id: &str) -> ImResult<bool> {
        let res = sqlx::query(
            "UPDATE im_threads SET updated_at = GREATEST(updated_at, $2) WHERE id = $1",
        )
        .bind(thread_id)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_threads_for_user(&self, user_id: &str) -> ImResult<Vec<Thread>> {
        let sql = format!(
            "SELECT {} FROM im_threads
             WHERE participant_low = $1 OR participant_high = $1
             ORDER BY updated_at DESC, id ASC",
            THREAD_COLUMNS
        );
        let rows: Vec<ThreadRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Thread::from).collect())
    }

    async fn append_message(&self, draft: &MessageDraft) -> ImResult<Message> {
        let mut tx = v::begin_tx(&self.pool).await?;
        // 锁住会话行，同一会话的追加在此串行 / Row lock serializes appends per thread
        let last: Option<(i64, Option<i64>)> = sqlx::query_as(
            "SELECT last_seq, last_created_at FROM im_threads WHERE id = $1 FOR UPDATE",
        )
        .bind(&draft.thread_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (last_seq, last_created_at) =
            last.ok_or_else(|| ImError::not_found("thread", &draft.thread_id))?;
        let seq = last_seq + 1;
        let created_at = next_timestamp(last_created_at);

        let sql = format!(
            "INSERT INTO im_messages ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE) RETURNING {}",
            MESSAGE_COLUMNS, MESSAGE_COLUMNS
        );
        let row: MessageRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&draft.thread_id)
            .bind(seq)
            .bind(&draft.sender_id)
            .bind(&draft.receiver_id)
            .bind(&draft.content)
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE im_threads
             SET last_seq = $2, last_created_at = $3, updated_at = GREATEST(updated_at, $3)
             WHERE id = $1",
        )
        .bind(&draft.thread_id)
        .bind(seq)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        since_seq: Option<i64>,
        limit: Option<usize>,
    ) -> ImResult<Vec<Message>> {
        let sql = format!(
            "SELECT {} FROM im_messages WHERE thread_id = $1 AND seq > $2 ORDER BY seq ASC LIMIT $3",
            MESSAGE_COLUMNS
        );
        let limit = limit_param(limit);
        let rows: Vec<MessageRow> = sqlx::query_as(&sql)
            .bind(thread_id)
            .bind(since_seq.unwrap_or(0))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn last_message(&self, thread_id: &str) -> ImResult<Option<Message>> {
        let sql = format!(
            "SELECT {} FROM im_messages WHERE thread_id = $1 ORDER BY seq DESC LIMIT 1",
            MESSAGE_COLUMNS
        );
        let row: Option<MessageRow> = sqlx::query_as(&sql)
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Message::from))
    }

    async fn count_unread(&self, thread_id: &str, receiver_id: &str) -> ImResult<usize> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM im_messages WHERE thread_id = $1 AND receiver_id = $2 AND NOT is_read",
        )
        .bind(thread_id)
        .bind(receiver_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as usize)
    }

    async fn mark_read(&self, thread_id: &str, receiver_id: &str) -> ImResult<usize> {
        let res = sqlx::query(
            "UPDATE im_messages SET is_read = TRUE
             WHERE thread_id = $1 AND receiver_id = $2 AND NOT is_read",
        )
        .bind(thread_id)
        .bind(receiver_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() as usize)
    }

    async fn ping(&self) -> ImResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// PostgreSQL 用户目录（`market_users` 表）/ PostgreSQL user directory (`market_users`)
#[derive(Clone)]
pub struct PgDirectory {
    pool: Pool<Postgres>,
}

impl PgDirectory {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgDirectory {
    async fn lookup(&self, user_id: &str) -> ImResult<Option<UserProfile>> {
        let row: Option<(String, String, String)> =
            sqlx::query_as("SELECT id, role, display_name FROM market_users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((id, role, display_name)) => {
                let role: Role = role.parse().map_err(ImError::TransientStore)?;
                Ok(Some(UserProfile {
                    id,
                    role,
                    display_name,
                }))
            }
            None => Ok(None),
        }
    }
}
