//! 应用运行配置加载。
//!
//! 配置在进程启动时读取一次，构造为不可变结构后按引用传入各组件；
//! 测试通过 [`AppConfig::from_lookup`] 以键值表构造，不依赖全局状态。

mod properties;

pub use properties::{Properties, load_properties, resolve_uri};

use std::collections::HashMap;
use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("unsupported configuration uri: {0}")]
    UnsupportedUri(String),
    #[error("unable to read {uri}: {message}")]
    Source { uri: String, message: String },
}

/// 协议描述符注册表配置。
#[derive(Debug, Clone, Default)]
pub struct ProtocolDescriptorSettings {
    /// 禁用内置默认描述符。
    pub default_disabled: bool,
    /// 描述符配置源（`file:` URI 或路径），空串视为未配置。
    pub configuration_uri: Option<String>,
}

impl ProtocolDescriptorSettings {
    pub fn new(default_disabled: bool, configuration_uri: Option<&str>) -> Self {
        Self {
            default_disabled,
            configuration_uri: configuration_uri
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        }
    }
}

/// Broker 地址解析配置。
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// 解析策略名（注册表键）。
    pub ip_resolver: String,
    /// 环境覆盖值（`broker.ip`）。
    pub ip_override: Option<String>,
    /// 包含 `broker.ip` 的 properties 文件。
    pub config_url: Option<String>,
    /// Broker 插件特权上下文所属作用域。
    pub scope_id: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            ip_resolver: DEFAULT_IP_RESOLVER.to_string(),
            ip_override: None,
            config_url: None,
            scope_id: DEFAULT_BROKER_SCOPE_ID.to_string(),
        }
    }
}

pub const DEFAULT_IP_RESOLVER: &str = "default";
pub const DEFAULT_BROKER_SCOPE_ID: &str = "1";

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub redis_connection_ttl_seconds: u64,
    pub protocol_descriptor: ProtocolDescriptorSettings,
    pub broker: BrokerSettings,
    pub store_timeout_ms: u64,
    pub connect_max_retries: u32,
    /// 回调接口的共享令牌（`Authorization: Bearer <token>`）；未配置时平台事件一律拒绝。
    pub hook_token: Option<String>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从键值表读取配置（测试使用）。
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| values.get(key).cloned())
    }

    /// 从任意键值来源读取配置。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reader = Reader { lookup };
        let http_addr = reader
            .string("KAPUA_HTTP_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8090".to_string());
        let database_url = reader.optional("KAPUA_DATABASE_URL");
        let redis_url = reader.optional("KAPUA_REDIS_URL");
        let redis_connection_ttl_seconds =
            reader.u64_with_default("KAPUA_REDIS_CONNECTION_TTL_SECONDS", 300)?;
        let protocol_descriptor = ProtocolDescriptorSettings::new(
            reader.bool_with_default("KAPUA_PROTOCOL_DESCRIPTOR_DEFAULT_DISABLE", false),
            reader
                .optional("KAPUA_PROTOCOL_DESCRIPTOR_CONFIGURATION_URI")
                .as_deref(),
        );
        let broker = BrokerSettings {
            ip_resolver: reader
                .optional("KAPUA_BROKER_IP_RESOLVER")
                .unwrap_or_else(|| DEFAULT_IP_RESOLVER.to_string()),
            ip_override: reader.optional("BROKER_IP"),
            config_url: reader.optional("KAPUA_CONFIG_URL"),
            scope_id: reader
                .optional("KAPUA_BROKER_SCOPE_ID")
                .unwrap_or_else(|| DEFAULT_BROKER_SCOPE_ID.to_string()),
        };
        let store_timeout_ms = reader.u64_with_default("KAPUA_STORE_TIMEOUT_MS", 5000)?;
        if store_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "KAPUA_STORE_TIMEOUT_MS".to_string(),
                "0".to_string(),
            ));
        }
        let connect_max_retries = reader.u32_with_default("KAPUA_CONNECT_MAX_RETRIES", 3)?;
        let hook_token = reader.optional("KAPUA_HOOK_TOKEN");

        Ok(Self {
            http_addr,
            database_url,
            redis_url,
            redis_connection_ttl_seconds,
            protocol_descriptor,
            broker,
            store_timeout_ms,
            connect_max_retries,
            hook_token,
        })
    }
}

struct Reader<F> {
    lookup: F,
}

impl<F> Reader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn optional(&self, key: &str) -> Option<String> {
        match (self.lookup)(key) {
            Some(value) if !value.trim().is_empty() => Some(value),
            _ => None,
        }
    }

    fn u64_with_default(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        let value = match self.optional(key) {
            Some(value) => value,
            None => return Ok(default),
        };
        value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::Invalid(key.to_string(), value))
    }

    fn u32_with_default(&self, key: &str, default: u32) -> Result<u32, ConfigError> {
        let value = match self.optional(key) {
            Some(value) => value,
            None => return Ok(default),
        };
        value
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::Invalid(key.to_string(), value))
    }

    fn bool_with_default(&self, key: &str, default: bool) -> bool {
        match self.optional(key) {
            Some(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
            None => default,
        }
    }
}
