use actix_web::{web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use v::{init_tracing, ConfigManager};
use v_market_im::config::{MarketImConfig, StorageBackend};
use v_market_im::service::{
    AuthCenterIdentityProvider, ChangeNotifier, DirectoryIdentityProvider, IdentityProvider,
    MessagingService,
};
use v_market_im::storage::{
    ImStore, MemoryDirectory, MemoryStore, PgDirectory, PgStore, UserDirectory,
};
use v_market_im::{router, tasks, VMarketIMServer};

/// 命令行参数 / Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "v-market-im WebSocket & HTTP Server", long_about = None)]
pub struct Args {
    /// 指定配置文件路径（TOML/JSON/YAML自动识别）
    /// Specify config file path (auto-detect TOML/JSON/YAML)
    #[arg(short = 'c', long = "config", default_value = "config/default.toml")]
    config: String,
}

/// 按配置选择存储后端 / Pick the storage backend from configuration
async fn build_storage(
    config: &MarketImConfig,
) -> Result<(Arc<dyn ImStore>, Arc<dyn UserDirectory>)> {
    match config.storage {
        StorageBackend::Memory => {
            let directory = MemoryDirectory::with_users(config.directory_users.clone());
            info!("💾 in-memory store, {} directory users", directory.len());
            Ok((Arc::new(MemoryStore::new()), Arc::new(directory)))
        }
        StorageBackend::Postgres => {
            let pool = v::connect(&config.database).await?;
            let store = PgStore::new(pool.clone());
            store.migrate().await?;
            info!("🐘 postgres store ready");
            Ok((Arc::new(store), Arc::new(PgDirectory::new(pool))))
        }
    }
}

fn build_identity(
    config: &MarketImConfig,
    directory: Arc<dyn UserDirectory>,
) -> Result<Arc<dyn IdentityProvider>> {
    if config.auth.enabled {
        info!("🔐 auth center at {}", config.auth.center_url);
        Ok(Arc::new(AuthCenterIdentityProvider::new(
            &config.auth.center_url,
            config.auth.timeout_ms,
        )?))
    } else {
        warn!("🔓 auth disabled, tokens are treated as user ids");
        Ok(Arc::new(DirectoryIdentityProvider::new(directory)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let cm = match ConfigManager::from_file(&args.config) {
        Ok(cm) => cm,
        Err(e) => {
            eprintln!("config file unavailable ({}), using environment only", e);
            ConfigManager::new()?
        }
    };
    let config = MarketImConfig::load(&cm);

    // 初始化日志 / Initialize logging
    init_tracing(&config.logging_level)?;
    cm.log_sources_info();

    let (store, directory) = build_storage(&config).await?;
    let identity = build_identity(&config, directory.clone())?;
    let notifier = ChangeNotifier::new(config.notifier.channel_capacity);
    let service = Arc::new(MessagingService::new(
        store,
        directory,
        notifier,
        config.messaging.clone(),
    ));

    let host = config.server.host.clone();
    let http_port = config.server.http_port;
    let ws_port = config.server.ws_port;
    let timeout_ms = config.server.timeout_ms;
    let server = Arc::new(VMarketIMServer::new(service, identity, config));

    // 启动心跳清理任务 / Start heartbeat cleanup task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cleanup = tasks::heartbeat::spawn_cleanup_task(server.clone(), timeout_ms, shutdown_rx);

    // 启动WebSocket服务器 / Start WebSocket server
    let ws_server = server.clone();
    let ws_host = host.clone();
    let ws_task = tokio::spawn(async move {
        if let Err(e) = ws_server.run(ws_host, ws_port).await {
            error!("❌ WebSocket server error: {}", e);
        }
    });

    // 启动HTTP服务器 / Start HTTP server
    let http_data = web::Data::new(server.clone());
    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(http_data.clone())
            .configure(router::configure)
    })
    .bind((host.as_str(), http_port))?
    .run();
    let http_handle = http_server.handle();
    info!("🌐 HTTP server listening on {}:{}", host, http_port);

    tokio::select! {
        res = http_server => {
            if let Err(e) = res {
                error!("❌ HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown signal received");
            http_handle.stop(true).await;
        }
    }

    let _ = shutdown_tx.send(true);
    ws_task.abort();
    let _ = cleanup.await;

    info!("✅ Server shutdown successfully");
    Ok(())
}
