use crate::server::VMarketIMServer;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

/// 周期清理心跳超时连接 / Periodically drop connections whose heartbeat timed out
pub fn spawn_cleanup_task(
    server: Arc<VMarketIMServer>,
    timeout_ms: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let cleanup_interval_ms = cleanup_interval_for(timeout_ms);
        tracing::info!(
            "⏰ Cleanup interval set to {}ms for timeout {}ms",
            cleanup_interval_ms,
            timeout_ms
        );
        let mut cleanup_interval = interval(Duration::from_millis(cleanup_interval_ms));
        loop {
            tokio::select! {
                _ = cleanup_interval.tick() => {
                    let removed = server.cleanup_timeout_connections(timeout_ms).await;
                    if removed > 0 {
                        tracing::info!("🧹 cleaned {} stale connections", removed);
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() { break; }
                }
            }
        }
    })
}

fn cleanup_interval_for(timeout_ms: u64) -> u64 {
    if timeout_ms <= 1000 {
        (timeout_ms / 2).max(1)
    } else if timeout_ms <= 10000 {
        1000
    } else {
        5000
    }
}

#[cfg(test)]
mod tests {
    use super::cleanup_interval_for;

    #[test]
    fn interval_scales_with_timeout() {
        assert_eq!(cleanup_interval_for(0), 1);
        assert_eq!(cleanup_interval_for(800), 400);
        assert_eq!(cleanup_interval_for(5000), 1000);
        assert_eq!(cleanup_interval_for(60_000), 5000);
    }
}
