use std::sync::Arc;

use tracing::{debug, info};

use super::identity::{check_role_pair, resolve_thread_key};
use crate::domain::{Participant, Thread};
use crate::error::{ImError, ImResult};
use crate::storage::ImStore;

/// 会话存储：惰性创建、绝不重复 / Thread store: lazily created, never duplicated
#[derive(Clone)]
pub struct ThreadStore {
    store: Arc<dyn ImStore>,
}

impl ThreadStore {
    pub fn new(store: Arc<dyn ImStore>) -> Self {
        Self { store }
    }

    /// 查找或创建会话 / Find or create the thread for a pair and optional product
    ///
    /// 已存在的会话直接返回，不再校验角色；唯一约束冲突时重新读取
    /// An existing thread is returned without re-checking roles; a uniqueness conflict refetches
    pub async fn get_or_create(
        &self,
        a: &Participant,
        b: &Participant,
        product_id: Option<&str>,
    ) -> ImResult<Thread> {
        let key = resolve_thread_key(&a.id, &b.id, product_id)?;
        if let Some(thread) = self.store.find_thread(&key).await? {
            debug!("🧵 thread {} found for {}", thread.id, key);
            return Ok(thread);
        }
        check_role_pair(a.role, b.role)?;
        match self.store.insert_thread(&key).await {
            Ok(thread) => {
                info!("🧵 thread {} created for {}", thread.id, key);
                Ok(thread)
            }
            Err(ImError::Conflict(_)) => {
                debug!("🧵 lost creation race for {}, refetching", key);
                self.store.find_thread(&key).await?.ok_or_else(|| {
                    ImError::TransientStore(format!("thread {} vanished after conflict", key))
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, thread_id: &str) -> ImResult<Thread> {
        self.store
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| ImError::not_found("thread", thread_id))
    }

    /// 推进活跃时间 / Bump the activity timestamp
    pub async fn touch(&self, thread_id: &str) -> ImResult<()> {
        if self.store.touch_thread(thread_id).await? {
            Ok(())
        } else {
            Err(ImError::not_found("thread", thread_id))
        }
    }

    pub async fn list_for_user(&self, user_id: &str) -> ImResult<Vec<Thread>> {
        self.store.list_threads_for_user(user_id).await
    }
}
