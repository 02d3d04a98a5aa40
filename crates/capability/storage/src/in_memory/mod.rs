//! 内存存储实现模块
//!
//! 用于测试和未配置数据库时的本地运行。
//!
//! - DeviceConnectionStore + DeviceConnectionOptionStore: InMemoryDeviceConnectionStore
//! - UserStore: InMemoryUserStore
//! - ConnectionCache: InMemoryConnectionCache

pub mod cache;
pub mod connection;
pub mod user;

pub use cache::*;
pub use connection::*;
pub use user::*;
