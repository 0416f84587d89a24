use async_trait::async_trait;
use v::{HealthCheck, HealthStatus};

use crate::VMarketIMServer;

// 为消息服务实现统一健康检查接口
// Implement unified HealthCheck for the messaging service
#[async_trait]
impl HealthCheck for VMarketIMServer {
    /// 探测存储连通性，并附带在线连接与通知主题数
    /// Probe store connectivity, reporting online connections and notifier topics
    async fn check_health(&self) -> HealthStatus {
        let online = self.online_count();
        let topics = self.service.notifier().topic_count();
        match self.service.store().ping().await {
            Ok(()) => HealthStatus::up(
                "im_store",
                format!("online={} topics={}", online, topics),
            ),
            Err(e) => HealthStatus::down("im_store", e.to_string()),
        }
    }
}
