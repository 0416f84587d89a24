use anyhow::{anyhow, Result};
use config::{Config, ConfigBuilder, Environment, File};
pub use config::FileFormat;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// 配置错误类型 / Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置文件不存在 / config file not found: {path}")]
    FileNotFound { path: String },
}

/// 配置数据源信息 / Configuration source info
#[derive(Debug, Clone)]
pub struct ConfigSourceInfo {
    pub source_type: String,
    pub description: String,
    pub priority: u8,
    pub loaded: bool,
}

/// 配置管理器 / Configuration manager
///
/// 由 `main` 构建一次后显式传递，不做全局单例
/// Built once in `main` and passed explicitly, no global singleton
#[derive(Debug)]
pub struct ConfigManager {
    config: Config,
    sources_info: Vec<ConfigSourceInfo>,
}

impl ConfigManager {
    /// 仅使用环境变量创建 / Create from environment variables only
    pub fn new() -> Result<Self> {
        Self::with_sources(vec![])
    }

    /// 使用配置文件 + 环境变量创建 / Create from a config file plus environment
    ///
    /// 文件不存在时返回错误 / Errors when the file does not exist
    pub fn from_file(path: &str) -> Result<Self> {
        if !std::path::Path::new(path).exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string(),
            }
            .into());
        }
        Self::with_sources(vec![ConfigSource::File {
            path: path.to_string(),
            format: None,
            required: true,
        }])
    }

    /// 使用指定的配置源创建配置管理器
    /// Create a manager from explicit sources
    ///
    /// 优先级（后者覆盖前者）/ Priority (later overrides earlier):
    /// 给定源 -> 环境变量 `V_*` / given sources -> `V_*` environment variables
    pub fn with_sources(sources: Vec<ConfigSource>) -> Result<Self> {
        let mut builder = Config::builder();
        let mut sources_info = Vec::new();

        let env = ConfigSource::Env {
            prefix: "V".to_string(),
            separator: "_",
        };

        for (idx, source) in sources.into_iter().chain(std::iter::once(env)).enumerate() {
            let mut info = source.get_source_info(idx as u8 + 1);
            if let ConfigSource::File { path, required, .. } = &source {
                if !*required && !std::path::Path::new(path).exists() {
                    sources_info.push(info);
                    continue;
                }
            }
            builder = source.add_to_builder(builder)?;
            info.loaded = true;
            sources_info.push(info);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("构建配置失败 / failed to build config: {}", e))?;
        Ok(Self {
            config,
            sources_info,
        })
    }

    /// 获取指定 key 的配置值 / Get the value at `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config
            .get(key)
            .map_err(|e| anyhow!("获取配置 '{}' 失败 / failed to read config: {}", key, e))
    }

    /// 获取配置值，不存在或类型不符时返回默认值
    /// Get the value at `key`, or `default` when absent or mistyped
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// 记录配置源信息到日志 / Log configuration sources
    pub fn log_sources_info(&self) {
        for info in &self.sources_info {
            let status = if info.loaded { "loaded" } else { "skipped" };
            tracing::info!(
                "🔧 config source #{} {} [{}]: {}",
                info.priority,
                info.source_type,
                status,
                info.description
            );
        }
    }
}

/// 配置源类型 / Configuration source kind
pub enum ConfigSource {
    /// 文件配置源 / File source
    File {
        path: String,
        format: Option<FileFormat>,
        required: bool,
    },
    /// 环境变量配置源 / Environment source
    Env {
        prefix: String,
        separator: &'static str,
    },
    /// 内存配置源（HashMap）/ In-memory source
    Memory(HashMap<String, serde_json::Value>),
    /// 字符串配置源 / Inline string source
    String { content: String, format: FileFormat },
}

impl ConfigSource {
    /// 获取配置源信息 / Describe this source
    pub fn get_source_info(&self, priority: u8) -> ConfigSourceInfo {
        let (source_type, description) = match self {
            ConfigSource::File { path, required, .. } => (
                "File",
                format!("文件配置源 / file: {} (required: {})", path, required),
            ),
            ConfigSource::Env { prefix, separator } => (
                "Environment",
                format!("环境变量 / env: prefix={}, separator={}", prefix, separator),
            ),
            ConfigSource::Memory(map) => (
                "Memory",
                format!("内存配置源 / memory: {} keys", map.len()),
            ),
            ConfigSource::String { .. } => ("String", "字符串配置源 / inline string".to_string()),
        };
        ConfigSourceInfo {
            source_type: source_type.to_string(),
            description,
            priority,
            loaded: false,
        }
    }

    pub fn add_to_builder(
        self,
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<ConfigBuilder<config::builder::DefaultState>> {
        match self {
            ConfigSource::File {
                path,
                format,
                required,
            } => {
                let file_source = match format {
                    Some(format) => File::with_name(&path).format(format),
                    None => File::with_name(&path),
                };
                Ok(builder.add_source(file_source.required(required)))
            }
            ConfigSource::Env { prefix, separator } => Ok(builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator(separator)
                    .prefix_separator("_")
                    .ignore_empty(true),
            )),
            ConfigSource::Memory(map) => {
                let json_content = serde_json::to_string(&map)
                    .map_err(|e| anyhow!("序列化内存配置失败 / memory config: {}", e))?;
                Ok(builder.add_source(File::from_str(&json_content, FileFormat::Json)))
            }
            ConfigSource::String { content, format } => {
                Ok(builder.add_source(File::from_str(&content, format)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ConfigManager, ConfigSource};
    use config::FileFormat;
    use std::collections::HashMap;

    #[test]
    fn test_config_from_string() {
        let source = ConfigSource::String {
            content: "[server]\nhttp_port = 8080".to_string(),
            format: FileFormat::Toml,
        };
        let manager = ConfigManager::with_sources(vec![source]).unwrap();
        assert_eq!(manager.get::<i64>("server.http_port").unwrap(), 8080);
        assert!(manager.get::<i64>("server.absent").is_err());
    }

    #[test]
    fn test_config_from_memory() {
        let mut map = HashMap::new();
        map.insert(
            "host".to_string(),
            serde_json::Value::String("127.0.0.1".to_string()),
        );
        let manager = ConfigManager::with_sources(vec![ConfigSource::Memory(map)]).unwrap();
        assert_eq!(manager.get::<String>("host").unwrap(), "127.0.0.1");
    }

    #[test]
    fn test_missing_key_falls_back() {
        let manager = ConfigManager::with_sources(vec![ConfigSource::String {
            content: "[messaging]\npreview_len = 40".to_string(),
            format: FileFormat::Toml,
        }])
        .unwrap();
        assert_eq!(manager.get_or("messaging.max_message_len", 4000_i64), 4000);
        assert_eq!(manager.get_or("messaging.preview_len", 80_i64), 40);
    }

    #[test]
    fn test_optional_file_is_skipped() {
        let manager = ConfigManager::with_sources(vec![ConfigSource::File {
            path: "config/does-not-exist.toml".to_string(),
            format: Some(FileFormat::Toml),
            required: false,
        }])
        .unwrap();
        let loaded: Vec<_> = manager.sources_info.iter().filter(|i| i.loaded).collect();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].source_type, "Environment");
        let err = ConfigManager::from_file("config/does-not-exist.toml").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::FileNotFound { .. })
        ));
    }
}
