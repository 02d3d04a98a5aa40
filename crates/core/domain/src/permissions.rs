//! 权限码与角色常量。

/// 通配权限（特权上下文）。
pub const ALL: &str = "*";

/// 系统角色：允许跨作用域访问。
pub const ROLE_SYSTEM: &str = "system";

pub const DEVICE_CONNECTION_READ: &str = "DEVICE_CONNECTION.READ";
pub const DEVICE_CONNECTION_WRITE: &str = "DEVICE_CONNECTION.WRITE";
pub const DEVICE_CONNECTION_DELETE: &str = "DEVICE_CONNECTION.DELETE";
/// 读取审计信息（创建人/修改人名称）。
pub const DEVICE_CONNECTION_INFO: &str = "DEVICE_CONNECTION.INFO";
