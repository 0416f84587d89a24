//! 收件箱聚合 / Inbox aggregation
//!
//! 联系人列表是派生视图：每次按需从会话与消息重新计算，从不落库
//! The contact list is a derived view recomputed on demand from threads and messages, never stored

use std::sync::Arc;

use futures_util::future::try_join_all;
use tracing::debug;

use super::thread_store::ThreadStore;
use crate::domain::{Contact, Role, Thread};
use crate::error::ImResult;
use crate::storage::{ImStore, UserDirectory};

#[derive(Clone)]
pub struct InboxAggregator {
    store: Arc<dyn ImStore>,
    directory: Arc<dyn UserDirectory>,
    threads: ThreadStore,
    preview_len: usize,
}

impl InboxAggregator {
    pub fn new(
        store: Arc<dyn ImStore>,
        directory: Arc<dyn UserDirectory>,
        threads: ThreadStore,
        preview_len: usize,
    ) -> Self {
        Self {
            store,
            directory,
            threads,
            preview_len,
        }
    }

    /// 构建联系人列表，按最近活跃降序 / Build the contact list, most recent activity first
    ///
    /// `role_filter` 只保留该角色的对方；目录中不存在的对方在过滤时被跳过
    /// `role_filter` keeps counterparts of that role; counterparts unknown to the directory are skipped by it
    pub async fn build_contacts(
        &self,
        user_id: &str,
        role_filter: Option<Role>,
    ) -> ImResult<Vec<Contact>> {
        let threads = self.threads.list_for_user(user_id).await?;
        let rows = try_join_all(
            threads
                .iter()
                .map(|thread| self.contact_for(user_id, thread, role_filter)),
        )
        .await?;
        let mut contacts: Vec<Contact> = rows.into_iter().flatten().collect();
        contacts.sort_by(|a, b| {
            b.last_activity_at
                .cmp(&a.last_activity_at)
                .then_with(|| a.thread_id.cmp(&b.thread_id))
        });
        debug!(
            "📇 {} contacts for {} (filter={:?})",
            contacts.len(),
            user_id,
            role_filter
        );
        Ok(contacts)
    }

    /// 全部会话未读数之和（角标）/ Unread total across every thread (badge count)
    pub async fn unread_total(&self, user_id: &str) -> ImResult<usize> {
        let threads = self.threads.list_for_user(user_id).await?;
        let counts = try_join_all(
            threads
                .iter()
                .map(|t| self.store.count_unread(&t.id, user_id)),
        )
        .await?;
        Ok(counts.into_iter().sum())
    }

    async fn contact_for(
        &self,
        user_id: &str,
        thread: &Thread,
        role_filter: Option<Role>,
    ) -> ImResult<Option<Contact>> {
        let counterpart_id = match thread.counterpart_of(user_id) {
            Some(id) => id.to_string(),
            None => return Ok(None),
        };
        let profile = self.directory.lookup(&counterpart_id).await?;
        if let Some(role) = role_filter {
            if profile.as_ref().map(|p| p.role) != Some(role) {
                return Ok(None);
            }
        }
        let (last, unread_count) = futures_util::try_join!(
            self.store.last_message(&thread.id),
            self.store.count_unread(&thread.id, user_id)
        )?;
        let (last_message_preview, last_activity_at) = match last {
            Some(m) => (truncate_preview(&m.content, self.preview_len), m.created_at),
            None => (String::new(), thread.updated_at),
        };
        Ok(Some(Contact {
            counterpart_name: profile
                .as_ref()
                .map(|p| p.display_name.clone())
                .unwrap_or_else(|| counterpart_id.clone()),
            counterpart_role: profile.map(|p| p.role),
            counterpart_id,
            thread_id: thread.id.clone(),
            product_id: thread.product_id.clone(),
            last_message_preview,
            last_activity_at,
            unread_count,
        }))
    }
}

/// 截断预览文本（按字符边界，超长加 `…`）
/// Truncate preview text on a char boundary, appending `…` when cut
pub fn truncate_preview(content: &str, max_chars: usize) -> String {
    let flat: String = content
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut out: String = flat.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(truncate_preview("short", 10), "short");
        assert_eq!(truncate_preview("有机蔬菜新鲜到货", 4), "有机蔬菜…");
        assert_eq!(truncate_preview("line1\nline2", 20), "line1 line2");
    }
}
