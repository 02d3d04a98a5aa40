//! Broker 集成能力：设备身份绑定判定、Broker 地址解析、连接事件处理。

mod broker_ip;
mod handler;
mod identity;

pub use broker_ip::{
    BrokerIpResolver, ConfigFileBrokerIpResolver, DefaultBrokerIpResolver,
    EnvironmentBrokerIpResolver, broker_ip_resolver, registered_resolvers,
};
pub use handler::{ConnectHandler, ConnectOutcome, ConnectRequest};
pub use identity::{
    BindDecision, ConnectionIdentityResolver, DenyReason, ReservationChange, ResolverError,
};

use kapua_config::ConfigError;
use kapua_protocol::DescriptorError;
use kapua_registry::RegistryError;

/// Broker 集成错误。
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unknown broker ip resolver: {0}")]
    UnknownResolver(String),
    #[error("broker address unavailable: neither override nor configuration provides broker.ip")]
    BrokerAddressUnavailable,
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("store unavailable: {operation} exceeded {timeout_ms}ms")]
    Unavailable {
        operation: &'static str,
        timeout_ms: u64,
    },
}
