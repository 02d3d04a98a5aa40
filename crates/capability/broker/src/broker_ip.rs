//! Broker 地址解析。
//!
//! 策略按名称从静态注册表选择：
//! - `default`：环境覆盖（`BROKER_IP`）优先，其次配置文件中的 `broker.ip`
//! - `environment`：仅环境覆盖
//! - `config-file`：仅配置文件
//!
//! 两者皆无时解析失败，不猜测默认地址。

use crate::BrokerError;
use kapua_config::{BrokerSettings, load_properties};
use std::sync::Arc;

/// 配置文件中的 Broker 地址键
pub const BROKER_IP_KEY: &str = "broker.ip";

pub trait BrokerIpResolver: Send + Sync {
    fn broker_ip_or_host_name(&self) -> Result<String, BrokerError>;
}

type ResolverFactory = fn(&BrokerSettings) -> Result<Arc<dyn BrokerIpResolver>, BrokerError>;

static RESOLVER_FACTORIES: &[(&str, ResolverFactory)] = &[
    ("default", default_factory),
    ("environment", environment_factory),
    ("config-file", config_file_factory),
];

fn default_factory(settings: &BrokerSettings) -> Result<Arc<dyn BrokerIpResolver>, BrokerError> {
    Ok(Arc::new(DefaultBrokerIpResolver::from_settings(settings)?))
}

fn environment_factory(
    settings: &BrokerSettings,
) -> Result<Arc<dyn BrokerIpResolver>, BrokerError> {
    Ok(Arc::new(EnvironmentBrokerIpResolver::new(
        settings.ip_override.clone(),
    )))
}

fn config_file_factory(
    settings: &BrokerSettings,
) -> Result<Arc<dyn BrokerIpResolver>, BrokerError> {
    Ok(Arc::new(ConfigFileBrokerIpResolver::from_settings(settings)?))
}

/// 已注册的策略名
pub fn registered_resolvers() -> Vec<&'static str> {
    RESOLVER_FACTORIES.iter().map(|(name, _)| *name).collect()
}

/// 按 `settings.ip_resolver` 构造解析器；未知名称返回 `UnknownResolver`。
pub fn broker_ip_resolver(
    settings: &BrokerSettings,
) -> Result<Arc<dyn BrokerIpResolver>, BrokerError> {
    let factory = RESOLVER_FACTORIES
        .iter()
        .find(|(name, _)| *name == settings.ip_resolver)
        .map(|(_, factory)| *factory)
        .ok_or_else(|| BrokerError::UnknownResolver(settings.ip_resolver.clone()))?;
    factory(settings)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// 构造时读取配置文件；文件不可读时构造失败。
fn read_config_file(settings: &BrokerSettings) -> Result<Option<String>, BrokerError> {
    let Some(uri) = settings.config_url.as_deref().filter(|uri| !uri.is_empty()) else {
        return Ok(None);
    };
    let properties = load_properties(uri)?;
    Ok(non_empty(properties.get(BROKER_IP_KEY).map(str::to_string)))
}

/// 环境覆盖优先，其次配置文件。
#[derive(Debug, Clone)]
pub struct DefaultBrokerIpResolver {
    ip_override: Option<String>,
    config_value: Option<String>,
}

impl DefaultBrokerIpResolver {
    pub fn new(ip_override: Option<String>, config_value: Option<String>) -> Self {
        Self {
            ip_override: non_empty(ip_override),
            config_value: non_empty(config_value),
        }
    }

    pub fn from_settings(settings: &BrokerSettings) -> Result<Self, BrokerError> {
        Ok(Self::new(
            settings.ip_override.clone(),
            read_config_file(settings)?,
        ))
    }
}

impl BrokerIpResolver for DefaultBrokerIpResolver {
    fn broker_ip_or_host_name(&self) -> Result<String, BrokerError> {
        self.ip_override
            .clone()
            .or_else(|| self.config_value.clone())
            .ok_or(BrokerError::BrokerAddressUnavailable)
    }
}

/// 仅使用环境覆盖。
#[derive(Debug, Clone)]
pub struct EnvironmentBrokerIpResolver {
    ip_override: Option<String>,
}

impl EnvironmentBrokerIpResolver {
    pub fn new(ip_override: Option<String>) -> Self {
        Self {
            ip_override: non_empty(ip_override),
        }
    }
}

impl BrokerIpResolver for EnvironmentBrokerIpResolver {
    fn broker_ip_or_host_name(&self) -> Result<String, BrokerError> {
        self.ip_override
            .clone()
            .ok_or(BrokerError::BrokerAddressUnavailable)
    }
}

/// 仅使用配置文件中的 `broker.ip`。
#[derive(Debug, Clone)]
pub struct ConfigFileBrokerIpResolver {
    config_value: Option<String>,
}

impl ConfigFileBrokerIpResolver {
    pub fn from_settings(settings: &BrokerSettings) -> Result<Self, BrokerError> {
        Ok(Self {
            config_value: read_config_file(settings)?,
        })
    }
}

impl BrokerIpResolver for ConfigFileBrokerIpResolver {
    fn broker_ip_or_host_name(&self) -> Result<String, BrokerError> {
        self.config_value
            .clone()
            .ok_or(BrokerError::BrokerAddressUnavailable)
    }
}
