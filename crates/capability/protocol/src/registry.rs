//! 协议描述符注册表
//!
//! 配置源格式（每个协议一组键）：
//!
//! ```text
//! mqtt.transport_protocol=MQTT
//! mqtt.device.APP=KuraAppsMessage
//! mqtt.kapua.APP=KapuaAppsMessage
//! ```

use crate::descriptor::ProtocolDescriptor;
use crate::error::DescriptorError;
use crate::types::MessageClass;
use domain::MessageType;
use kapua_config::{Properties, ProtocolDescriptorSettings, load_properties};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

const ATTR_TRANSPORT_PROTOCOL: &str = "transport_protocol";
const ATTR_DEVICE: &str = "device";
const ATTR_KAPUA: &str = "kapua";

/// 描述符查找能力，便于替换实现与测试。
pub trait DescriptorProvider: Send + Sync {
    /// 按协议名精确查找描述符。
    ///
    /// - `Ok(None)`：无匹配且默认描述符已禁用
    /// - `Err(_)`：该协议的配置引用了无法解析的消息类
    fn get_descriptor(
        &self,
        name: Option<&str>,
    ) -> Result<Option<Arc<ProtocolDescriptor>>, DescriptorError>;
}

#[derive(Debug, Clone)]
enum Unresolved {
    UnknownClass {
        class_name: String,
    },
    TypeMismatch {
        class_name: String,
        message_type: MessageType,
    },
}

#[derive(Debug, Clone)]
enum Entry {
    Ready(Arc<ProtocolDescriptor>),
    Broken(Unresolved),
}

#[derive(Debug, Default)]
struct RawDescriptor {
    transport_protocol: Option<String>,
    device: BTreeMap<MessageType, String>,
    kapua: BTreeMap<MessageType, String>,
}

/// 协议描述符注册表（构造后只读，可跨线程共享）。
#[derive(Debug, Clone)]
pub struct ProtocolDescriptorRegistry {
    entries: HashMap<String, Entry>,
    fallback: Option<Arc<ProtocolDescriptor>>,
}

impl ProtocolDescriptorRegistry {
    /// 按配置构造注册表。
    ///
    /// 配置了 URI 时必须能读取并解析，否则构造失败；未配置 URI 不是错误。
    pub fn from_settings(settings: &ProtocolDescriptorSettings) -> Result<Self, DescriptorError> {
        let properties = match settings.configuration_uri.as_deref() {
            Some(uri) => {
                let properties = load_properties(uri)?;
                info!(uri, keys = properties.len(), "protocol descriptor source loaded");
                properties
            }
            None => Properties::default(),
        };
        Self::from_properties(&properties, settings.default_disabled)
    }

    /// 由已读取的键值对构造注册表。
    pub fn from_properties(
        properties: &Properties,
        default_disabled: bool,
    ) -> Result<Self, DescriptorError> {
        let entries = parse(properties)?
            .into_iter()
            .map(|(name, raw)| {
                let entry = resolve(raw);
                if let Entry::Broken(issue) = &entry {
                    debug!(protocol = %name, ?issue, "protocol descriptor left unresolved");
                }
                (name, entry)
            })
            .collect();
        let fallback = if default_disabled {
            None
        } else {
            Some(Arc::new(ProtocolDescriptor::builtin_default()))
        };
        Ok(Self { entries, fallback })
    }

    /// 已配置的协议名（不含默认描述符）。
    pub fn protocols(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn has_default(&self) -> bool {
        self.fallback.is_some()
    }
}

impl DescriptorProvider for ProtocolDescriptorRegistry {
    fn get_descriptor(
        &self,
        name: Option<&str>,
    ) -> Result<Option<Arc<ProtocolDescriptor>>, DescriptorError> {
        match name.and_then(|name| self.entries.get(name).map(|entry| (name, entry))) {
            Some((_, Entry::Ready(descriptor))) => Ok(Some(descriptor.clone())),
            Some((protocol, Entry::Broken(issue))) => Err(match issue.clone() {
                Unresolved::UnknownClass { class_name } => DescriptorError::UnknownMessageClass {
                    protocol: protocol.to_string(),
                    class_name,
                },
                Unresolved::TypeMismatch {
                    class_name,
                    message_type,
                } => DescriptorError::MessageTypeMismatch {
                    protocol: protocol.to_string(),
                    class_name,
                    message_type: message_type.to_string(),
                },
            }),
            None => Ok(self.fallback.clone()),
        }
    }
}

fn malformed(key: &str, reason: impl Into<String>) -> DescriptorError {
    DescriptorError::Malformed {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn parse(properties: &Properties) -> Result<BTreeMap<String, RawDescriptor>, DescriptorError> {
    let mut raws: BTreeMap<String, RawDescriptor> = BTreeMap::new();
    for (key, value) in properties.iter() {
        let (protocol, attribute) = key
            .split_once('.')
            .filter(|(protocol, _)| !protocol.is_empty())
            .ok_or_else(|| malformed(key, "expected <protocol>.<attribute>"))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(malformed(key, "empty value"));
        }
        let raw = raws.entry(protocol.to_string()).or_default();
        match attribute.split_once('.') {
            None if attribute == ATTR_TRANSPORT_PROTOCOL => {
                raw.transport_protocol = Some(value.to_string());
            }
            Some((ATTR_DEVICE, message_type)) => {
                let message_type = message_type
                    .parse::<MessageType>()
                    .map_err(|err| malformed(key, err.to_string()))?;
                raw.device.insert(message_type, value.to_string());
            }
            Some((ATTR_KAPUA, message_type)) => {
                let message_type = message_type
                    .parse::<MessageType>()
                    .map_err(|err| malformed(key, err.to_string()))?;
                raw.kapua.insert(message_type, value.to_string());
            }
            _ => return Err(malformed(key, format!("unknown attribute {attribute}"))),
        }
    }
    for (protocol, raw) in &raws {
        if raw.transport_protocol.is_none() {
            return Err(malformed(
                &format!("{protocol}.{ATTR_TRANSPORT_PROTOCOL}"),
                "missing transport protocol",
            ));
        }
    }
    Ok(raws)
}

fn resolve_classes(
    names: BTreeMap<MessageType, String>,
) -> Result<BTreeMap<MessageType, &'static MessageClass>, Unresolved> {
    let mut classes = BTreeMap::new();
    for (message_type, class_name) in names {
        let class = MessageClass::lookup(&class_name).ok_or_else(|| Unresolved::UnknownClass {
            class_name: class_name.clone(),
        })?;
        if class.message_type != message_type {
            return Err(Unresolved::TypeMismatch {
                class_name,
                message_type,
            });
        }
        classes.insert(message_type, class);
    }
    Ok(classes)
}

fn resolve(raw: RawDescriptor) -> Entry {
    let transport_protocol = raw.transport_protocol.unwrap_or_default();
    let device = match resolve_classes(raw.device) {
        Ok(classes) => classes,
        Err(issue) => return Entry::Broken(issue),
    };
    let kapua = match resolve_classes(raw.kapua) {
        Ok(classes) => classes,
        Err(issue) => return Entry::Broken(issue),
    };
    Entry::Ready(Arc::new(ProtocolDescriptor::new(
        transport_protocol,
        device,
        kapua,
    )))
}
