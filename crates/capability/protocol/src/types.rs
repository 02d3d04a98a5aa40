//! 消息类注册表
//!
//! 描述符配置中的类名是该静态表的查找键，不做运行时加载。

use domain::MessageType;

/// 消息类来源。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageOrigin {
    /// 设备侧（线上报文）消息类
    Device,
    /// 平台侧消息类
    Kapua,
}

/// 已注册的消息类引用。
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MessageClass {
    pub name: &'static str,
    pub message_type: MessageType,
    pub origin: MessageOrigin,
}

const fn class(
    name: &'static str,
    message_type: MessageType,
    origin: MessageOrigin,
) -> MessageClass {
    MessageClass {
        name,
        message_type,
        origin,
    }
}

/// 全部已注册消息类。
pub static MESSAGE_CLASSES: &[MessageClass] = &[
    class("KuraAppsMessage", MessageType::App, MessageOrigin::Device),
    class("KuraBirthMessage", MessageType::Birth, MessageOrigin::Device),
    class("KuraDisconnectMessage", MessageType::Disconnect, MessageOrigin::Device),
    class("KuraMissingMessage", MessageType::Missing, MessageOrigin::Device),
    class("KuraNotifyMessage", MessageType::Notify, MessageOrigin::Device),
    class("KuraDataMessage", MessageType::Data, MessageOrigin::Device),
    class("KapuaAppsMessage", MessageType::App, MessageOrigin::Kapua),
    class("KapuaBirthMessage", MessageType::Birth, MessageOrigin::Kapua),
    class("KapuaDisconnectMessage", MessageType::Disconnect, MessageOrigin::Kapua),
    class("KapuaMissingMessage", MessageType::Missing, MessageOrigin::Kapua),
    class("KapuaNotifyMessage", MessageType::Notify, MessageOrigin::Kapua),
    class("KapuaDataMessage", MessageType::Data, MessageOrigin::Kapua),
];

impl MessageClass {
    /// 按名称查找消息类（精确匹配）。
    pub fn lookup(name: &str) -> Option<&'static MessageClass> {
        MESSAGE_CLASSES.iter().find(|item| item.name == name)
    }

    /// 指定来源与消息类型的内置消息类。
    pub fn builtin(origin: MessageOrigin, message_type: MessageType) -> Option<&'static MessageClass> {
        MESSAGE_CLASSES
            .iter()
            .find(|item| item.origin == origin && item.message_type == message_type)
    }
}
