//! # PostgreSQL 存储实现模块
//!
//! 生产环境使用的存储实现，表结构见 `migrations/`。
//!
//! - **DeviceConnectionStore / DeviceConnectionOptionStore** (`connection.rs`)
//! - **UserStore** (`user.rs`)
//!
//! ## 唯一性约束
//!
//! - `uq_device_connections_scope_client`：`(scope_id, client_id)`，冲突映射为 `Duplicate`
//! - `uq_device_connection_options_reserved_user`：部分唯一索引
//!   `(scope_id, reserved_user_id) where reserved_user_id is not null`，
//!   冲突映射为 `UserAlreadyReserved`
//!
//! ## 事务
//!
//! 连接与选项的创建在同一事务内完成（`pool.begin()` / `tx.commit()`，
//! 未提交的事务在 drop 时回滚）。删除依赖 `on delete cascade`。

pub mod connection;
pub mod user;

pub use connection::*;
pub use user::*;
