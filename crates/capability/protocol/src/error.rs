//! 协议描述符错误类型定义

use kapua_config::ConfigError;

/// 协议描述符错误
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    /// 配置源不可读或 URI 非法
    #[error("descriptor source error: {0}")]
    Source(#[from] ConfigError),

    /// 配置源内容无法解析
    #[error("malformed descriptor configuration at {key}: {reason}")]
    Malformed { key: String, reason: String },

    /// 配置引用了未注册的消息类
    #[error("protocol {protocol}: unknown message class {class_name}")]
    UnknownMessageClass { protocol: String, class_name: String },

    /// 消息类与其映射的消息类型不一致
    #[error("protocol {protocol}: message class {class_name} does not handle {message_type}")]
    MessageTypeMismatch {
        protocol: String,
        class_name: String,
        message_type: String,
    },
}
