//! 协议描述符

use crate::types::{MessageClass, MessageOrigin};
use domain::MessageType;
use std::collections::BTreeMap;

/// 默认描述符使用的传输协议名。
pub const DEFAULT_TRANSPORT_PROTOCOL: &str = "MQTT";

/// 协议描述符：传输协议名 + 各消息类型的设备侧/平台侧消息类。
///
/// 注册表加载时构造，之后只读。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolDescriptor {
    transport_protocol: String,
    device_classes: BTreeMap<MessageType, &'static MessageClass>,
    kapua_classes: BTreeMap<MessageType, &'static MessageClass>,
}

impl ProtocolDescriptor {
    pub fn new(
        transport_protocol: impl Into<String>,
        device_classes: BTreeMap<MessageType, &'static MessageClass>,
        kapua_classes: BTreeMap<MessageType, &'static MessageClass>,
    ) -> Self {
        Self {
            transport_protocol: transport_protocol.into(),
            device_classes,
            kapua_classes,
        }
    }

    /// 内置默认描述符：MQTT，全部消息类型映射到内置消息类。
    pub fn builtin_default() -> Self {
        let collect = |origin| {
            MessageType::ALL
                .into_iter()
                .filter_map(|message_type| {
                    MessageClass::builtin(origin, message_type).map(|class| (message_type, class))
                })
                .collect::<BTreeMap<_, _>>()
        };
        Self::new(
            DEFAULT_TRANSPORT_PROTOCOL,
            collect(MessageOrigin::Device),
            collect(MessageOrigin::Kapua),
        )
    }

    pub fn transport_protocol(&self) -> &str {
        &self.transport_protocol
    }

    /// 设备侧消息类；未映射返回 `None`。
    pub fn device_class(&self, message_type: MessageType) -> Option<&'static MessageClass> {
        self.device_classes.get(&message_type).copied()
    }

    /// 平台侧消息类；未映射返回 `None`。
    pub fn kapua_class(&self, message_type: MessageType) -> Option<&'static MessageClass> {
        self.kapua_classes.get(&message_type).copied()
    }
}
