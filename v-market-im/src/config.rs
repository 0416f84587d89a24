use tracing::warn;
use v::{ConfigManager, DatabaseSettings};

use crate::domain::UserProfile;
use crate::service::messaging::MessagingSettings;
use crate::service::view::RetryPolicy;

/// 服务监听配置 / Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    pub ws_port: u16,
    /// 心跳超时 / Heartbeat timeout
    pub timeout_ms: u64,
}

/// 存储后端 / Storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

impl StorageBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Some(StorageBackend::Memory),
            "postgres" | "postgresql" | "pg" => Some(StorageBackend::Postgres),
            _ => None,
        }
    }

    /// 未知取值回退到内存存储并告警 / Unknown values fall back to memory with a warning
    fn from_config(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| {
            warn!(
                "⚠️  unknown storage.backend '{}', falling back to memory (nothing is persisted)",
                raw
            );
            StorageBackend::Memory
        })
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub center_url: String,
    pub timeout_ms: u64,
    /// 未认证连接的关闭期限 / Deadline before an unauthenticated socket is closed
    pub deadline_ms: u64,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub channel_capacity: usize,
    pub resync_interval_ms: u64,
}

/// 全部运行配置 / Complete runtime configuration
#[derive(Debug, Clone)]
pub struct MarketImConfig {
    pub server: ServerConfig,
    pub storage: StorageBackend,
    pub database: DatabaseSettings,
    pub auth: AuthConfig,
    pub messaging: MessagingSettings,
    pub notifier: NotifierConfig,
    pub logging_level: String,
    /// 内存目录种子用户 / Seed users for the in-memory directory
    pub directory_users: Vec<UserProfile>,
}

impl Default for MarketImConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                http_port: 8080,
                ws_port: 5200,
                timeout_ms: 60_000,
            },
            storage: StorageBackend::Memory,
            database: DatabaseSettings::default(),
            auth: AuthConfig {
                enabled: false,
                center_url: "http://127.0.0.1:8090".to_string(),
                timeout_ms: 1000,
                deadline_ms: 3000,
            },
            messaging: MessagingSettings::default(),
            notifier: NotifierConfig {
                channel_capacity: 64,
                resync_interval_ms: 30_000,
            },
            logging_level: "info".to_string(),
            directory_users: Vec::new(),
        }
    }
}

impl MarketImConfig {
    /// 从配置管理器读取，缺失的键使用默认值
    /// Read from the config manager, falling back to defaults for missing keys
    pub fn load(cm: &ConfigManager) -> Self {
        let d = Self::default();
        Self {
            server: ServerConfig {
                host: cm.get_or("server.host", d.server.host),
                http_port: cm.get_or("server.http_port", d.server.http_port),
                ws_port: cm.get_or("server.ws_port", d.server.ws_port),
                timeout_ms: cm.get_or("server.timeout_ms", d.server.timeout_ms),
            },
            storage: StorageBackend::from_config(&cm.get_or("storage.backend", "memory".to_string())),
            database: cm.get_or("database", d.database),
            auth: AuthConfig {
                enabled: cm.get_or("auth.enabled", d.auth.enabled),
                center_url: cm.get_or("auth.center_url", d.auth.center_url),
                timeout_ms: cm.get_or("auth.timeout_ms", d.auth.timeout_ms),
                deadline_ms: cm.get_or("auth.deadline_ms", d.auth.deadline_ms),
            },
            messaging: MessagingSettings {
                max_message_len: cm.get_or("messaging.max_message_len", d.messaging.max_message_len),
                preview_len: cm.get_or("messaging.preview_len", d.messaging.preview_len),
                retry: cm.get_or::<RetryPolicy>("retry", d.messaging.retry),
            },
            notifier: NotifierConfig {
                channel_capacity: cm.get_or("notifier.channel_capacity", d.notifier.channel_capacity),
                resync_interval_ms: cm
                    .get_or("notifier.resync_interval_ms", d.notifier.resync_interval_ms),
            },
            logging_level: cm.get_or("logging.level", d.logging_level),
            directory_users: cm.get_or("directory.users", d.directory_users),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use v::ConfigSource;

    fn manager(toml: &str) -> ConfigManager {
        ConfigManager::with_sources(vec![ConfigSource::String {
            content: toml.to_string(),
            format: v::FileFormat::Toml,
        }])
        .unwrap()
    }

    #[test]
    fn defaults_apply_for_missing_keys() {
        let cfg = MarketImConfig::load(&manager("[server]\nhttp_port = 9000"));
        assert_eq!(cfg.server.http_port, 9000);
        assert_eq!(cfg.server.ws_port, 5200);
        assert_eq!(cfg.storage, StorageBackend::Memory);
        assert_eq!(cfg.messaging.max_message_len, 4000);
        assert_eq!(cfg.messaging.retry.read_attempts, 3);
        assert_eq!(cfg.notifier.resync_interval_ms, 30_000);
        assert_eq!(cfg.auth.deadline_ms, 3000);
    }

    #[test]
    fn reads_sections_and_seed_users() {
        let cfg = MarketImConfig::load(&manager(
            r#"
[storage]
backend = "postgres"

[retry]
read_attempts = 5

[[directory.users]]
id = "u1"
role = "buyer"
display_name = "Asha"
"#,
        ));
        assert_eq!(cfg.storage, StorageBackend::Postgres);
        assert_eq!(cfg.messaging.retry.read_attempts, 5);
        assert_eq!(cfg.messaging.retry.base_delay_ms, 50);
        assert_eq!(cfg.directory_users.len(), 1);
        assert_eq!(cfg.directory_users[0].role, Role::Buyer);
    }

    #[test]
    fn misspelled_backend_is_not_postgres() {
        assert_eq!(StorageBackend::parse(" PostgreSQL "), Some(StorageBackend::Postgres));
        assert_eq!(StorageBackend::parse("postgress"), None);
        let cfg = MarketImConfig::load(&manager("[storage]\nbackend = \"postgress\""));
        assert_eq!(cfg.storage, StorageBackend::Memory);
    }
}
