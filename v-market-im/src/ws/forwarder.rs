//! 订阅转发 / Subscription forwarding
//!
//! 变更事件与兜底定时器驱动同一个视图刷新，推送结果给客户端
//! Change events and the safety-net tick drive the same view refresh, pushing results to the client

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::{ImFrame, UserProfile};
use crate::error::ImResult;
use crate::server::VMarketIMServer;
use crate::service::notifier::{ChangeEvent, Subscription, Topic};
use crate::service::view::{InboxView, ThreadView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Refresh {
    Incremental,
    Full,
}

enum LiveView {
    Thread(ThreadView),
    Inbox(InboxView),
}

impl LiveView {
    fn for_topic(topic: &Topic) -> Self {
        match topic {
            Topic::Thread(id) => LiveView::Thread(ThreadView::new(id.clone())),
            Topic::Inbox(_) => LiveView::Inbox(InboxView::new(None)),
        }
    }

    /// 刷新视图，有变化时返回要推送的帧 / Refresh the view, returning a frame when something changed
    async fn refresh(
        &mut self,
        server: &VMarketIMServer,
        user: &UserProfile,
        mode: Refresh,
    ) -> ImResult<Option<ImFrame>> {
        match self {
            LiveView::Thread(view) => {
                let (items, reset) = match mode {
                    Refresh::Full => (view.resync(&server.service, user).await?, true),
                    Refresh::Incremental => (view.reload(&server.service, user).await?, false),
                };
                if items.is_empty() && !reset {
                    return Ok(None);
                }
                Ok(Some(ImFrame::new(
                    "messages",
                    serde_json::json!({ "thread_id": view.thread_id(), "items": items, "reset": reset }),
                )))
            }
            LiveView::Inbox(view) => {
                let before = view.contacts().to_vec();
                let after = view.reload(&server.service, user).await?;
                if mode == Refresh::Incremental && after == before.as_slice() {
                    return Ok(None);
                }
                let unread = view.unread_total();
                Ok(Some(ImFrame::new(
                    "contacts",
                    serde_json::json!({ "items": view.contacts(), "unread": unread }),
                )))
            }
        }
    }
}

/// 启动订阅转发任务；任务被中止时订阅随之释放
/// Spawn a forwarder; aborting the task releases its subscription
pub fn spawn_forwarder(
    server: VMarketIMServer,
    client_id: String,
    user: UserProfile,
    mut sub: Subscription,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let topic = sub.topic().clone();
        let mut view = LiveView::for_topic(&topic);
        let period = Duration::from_millis(server.config.notifier.resync_interval_ms.max(1));
        let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        let mut mode = Refresh::Full;

        loop {
            match view.refresh(&server, &user, mode).await {
                Ok(Some(frame)) => {
                    if server.send_frame(&client_id, &frame).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_retryable() => {
                    warn!("⚠️  refresh of {} for {} failed: {}", topic, client_id, e);
                }
                Err(e) => {
                    let _ = server
                        .send_frame(&client_id, &ImFrame::error(e.code(), e.to_string()))
                        .await;
                    break;
                }
            }

            mode = tokio::select! {
                event = sub.recv() => match event {
                    Some(ChangeEvent::MessageAppended { .. }) | Some(ChangeEvent::ThreadTouched { .. }) => Refresh::Incremental,
                    Some(ChangeEvent::ReadStateChanged { .. }) | Some(ChangeEvent::Resync) => Refresh::Full,
                    None => break,
                },
                _ = tick.tick() => Refresh::Incremental,
            };
        }
        debug!("🔕 forwarder for {} on {} stopped", client_id, topic);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketImConfig;
    use crate::domain::Role;
    use crate::service::{ChangeNotifier, DirectoryIdentityProvider, MessagingService, MessagingSettings};
    use crate::storage::{MemoryDirectory, MemoryStore};
    use std::sync::Arc;

    fn server() -> VMarketIMServer {
        let directory = Arc::new(MemoryDirectory::with_users(vec![
            UserProfile::new("u1", Role::Buyer, "Asha"),
            UserProfile::new("u2", Role::Seller, "Green Farm"),
        ]));
        let service = Arc::new(MessagingService::new(
            Arc::new(MemoryStore::new()),
            directory.clone(),
            ChangeNotifier::new(8),
            MessagingSettings::default(),
        ));
        VMarketIMServer::new(
            service,
            Arc::new(DirectoryIdentityProvider::new(directory)),
            MarketImConfig::default(),
        )
    }

    #[tokio::test]
    async fn thread_view_pushes_only_new_messages() {
        let server = server();
        let buyer = UserProfile::new("u1", Role::Buyer, "Asha");
        let tid = server
            .service
            .open_or_create_thread(&buyer, "u2", None)
            .await
            .unwrap();
        server.service.send_message(&buyer, &tid, "hello").await.unwrap();

        let mut view = LiveView::for_topic(&Topic::Thread(tid.clone()));
        let first = view.refresh(&server, &buyer, Refresh::Full).await.unwrap().unwrap();
        assert_eq!(first.frame_type, "messages");
        assert_eq!(first.data["reset"], true);
        assert!(view.refresh(&server, &buyer, Refresh::Incremental).await.unwrap().is_none());

        server.service.send_message(&buyer, &tid, "again").await.unwrap();
        let next = view.refresh(&server, &buyer, Refresh::Incremental).await.unwrap().unwrap();
        assert_eq!(next.data["items"][0]["content"], "again");
    }

    #[tokio::test]
    async fn inbox_view_skips_unchanged_lists() {
        let server = server();
        let seller = UserProfile::new("u2", Role::Seller, "Green Farm");
        let buyer = UserProfile::new("u1", Role::Buyer, "Asha");
        let tid = server
            .service
            .open_or_create_thread(&buyer, "u2", Some("p7"))
            .await
            .unwrap();
        server.service.send_message(&buyer, &tid, "Is this organic?").await.unwrap();

        let mut view = LiveView::for_topic(&Topic::Inbox("u2".into()));
        let first = view.refresh(&server, &seller, Refresh::Full).await.unwrap().unwrap();
        assert_eq!(first.frame_type, "contacts");
        assert_eq!(first.data["unread"], 1);
        assert!(view.refresh(&server, &seller, Refresh::Incremental).await.unwrap().is_none());
    }
}
