use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::info;

use crate::config::MarketImConfig;
use crate::domain::UserProfile;
use crate::service::auth::IdentityProvider;
use crate::service::messaging::MessagingService;

/// 客户端连接信息 / Client Connection Information
pub struct Connection {
    pub client_id: String,
    pub user: Option<UserProfile>,               // 认证后的用户 / Authenticated user
    pub sender: mpsc::UnboundedSender<Message>,  // 消息发送器 / Message sender
    pub last_heartbeat: Arc<Mutex<Instant>>,     // 最后心跳时间 / Last heartbeat time
    pub subscriptions: DashMap<String, JoinHandle<()>>, // 订阅转发任务 / Subscription forwarders
}

impl Connection {
    pub fn new(client_id: String, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            client_id,
            user: None,
            sender,
            last_heartbeat: Arc::new(Mutex::new(Instant::now())),
            subscriptions: DashMap::new(),
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    /// 终止全部订阅转发任务（随之丢弃订阅）/ Abort every forwarder, dropping its subscription
    pub fn abort_subscriptions(&self) {
        for entry in self.subscriptions.iter() {
            entry.value().abort();
        }
        self.subscriptions.clear();
    }
}

/// 服务端全局状态 / Server Global State
#[derive(Clone)]
pub struct VMarketIMServer {
    pub service: Arc<MessagingService>,                     // 消息服务 / Messaging service
    pub identity: Arc<dyn IdentityProvider>,                // 身份解析 / Identity provider
    pub config: Arc<MarketImConfig>,                        // 运行配置 / Runtime configuration
    pub connections: Arc<DashMap<String, Connection>>,      // 客户端连接 / Client connections
}

impl VMarketIMServer {
    pub fn new(
        service: Arc<MessagingService>,
        identity: Arc<dyn IdentityProvider>,
        config: MarketImConfig,
    ) -> Self {
        Self {
            service,
            identity,
            config: Arc::new(config),
            connections: Arc::new(DashMap::new()),
        }
    }

    /// 在线客户端数 / Online client count
    pub fn online_count(&self) -> usize {
        self.connections.len()
    }

    /// 绑定用户到连接；换成另一个用户时先终止旧用户的订阅
    /// Bind an authenticated user to a connection; switching users aborts the previous user's subscriptions
    pub fn bind_user(&self, client_id: &str, user: UserProfile) {
        if let Some(mut conn) = self.connections.get_mut(client_id) {
            if let Some(previous) = conn.uid().filter(|uid| *uid != user.id) {
                info!(
                    "🔁 Client {} re-authenticated as {} (was {}), dropping {} subscription(s)",
                    client_id,
                    user.id,
                    previous,
                    conn.subscriptions.len()
                );
                conn.abort_subscriptions();
            }
            conn.user = Some(user);
        }
    }

    /// 移除连接并终止其订阅 / Remove a connection and abort its subscriptions
    pub fn remove_connection(&self, client_id: &str) -> Option<Connection> {
        let (_, conn) = self.connections.remove(client_id)?;
        conn.abort_subscriptions();
        Some(conn)
    }

    pub async fn update_heartbeat(&self, client_id: &str) {
        if let Some(conn) = self.connections.get(client_id) {
            *conn.last_heartbeat.lock() = Instant::now();
        }
    }

    /// 清理心跳超时的连接 / Drop connections whose heartbeat timed out
    pub async fn cleanup_timeout_connections(&self, timeout_ms: u64) -> usize {
        let stale: Vec<String> = self
            .connections
            .iter()
            .filter(|c| c.last_heartbeat.lock().elapsed().as_millis() as u64 > timeout_ms)
            .map(|c| c.key().clone())
            .collect();
        for client_id in &stale {
            let _ = self.send_close_message(client_id, "Heartbeat timeout").await;
            if self.remove_connection(client_id).is_some() {
                info!("🧹 Removed stale client {}", client_id);
            }
        }
        stale.len()
    }
}
