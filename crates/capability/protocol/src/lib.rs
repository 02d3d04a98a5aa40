//! # 协议描述符能力模块
//!
//! 在设备连接时确定其使用的传输协议与消息类映射：
//!
//! ```text
//! ProtocolDescriptorSettings (default_disabled + configuration_uri)
//!       │
//!       ▼
//! ProtocolDescriptorRegistry ── 静态消息类表 (MESSAGE_CLASSES)
//!       │
//!       ▼
//! get_descriptor("mqtt") → ProtocolDescriptor { transport, device/kapua classes }
//! ```
//!
//! 查找为精确匹配（区分大小写、不做 trim）；无匹配时返回内置默认描述符，
//! 默认描述符被禁用时返回 `None`。

mod descriptor;
mod error;
mod registry;
mod types;

pub use descriptor::{DEFAULT_TRANSPORT_PROTOCOL, ProtocolDescriptor};
pub use error::DescriptorError;
pub use registry::{DescriptorProvider, ProtocolDescriptorRegistry};
pub use types::{MESSAGE_CLASSES, MessageClass, MessageOrigin};
