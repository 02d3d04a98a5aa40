//! # Kapua Storage 模块
//!
//! 设备连接注册表的存储抽象层。
//!
//! ## 分层
//!
//! 1. **接口层** (`traits.rs`)：连接、连接选项、用户存储与连接快照缓存的异步 Trait
//! 2. **模型层** (`models.rs`)：连接、选项、快照、查询条件
//! 3. **错误层** (`error.rs`)：`StorageError`，区分不存在、版本冲突、预留冲突与不可用
//! 4. **验证层** (`validation.rs`)：作用域与 ID 非空校验
//! 5. **连接层** (`connection.rs`)：PostgreSQL 连接池
//! 6. **实现层**：
//!    - `in_memory/`：`RwLock<HashMap>` 实现（测试与无数据库运行）
//!    - `postgres/`：sqlx 实现（生产环境，表结构见 `migrations/`）
//!    - `redis`：Redis 连接快照缓存（JSON + TTL）
//!
//! ## 一致性约束
//!
//! - `(scope_id, client_id)` 唯一
//! - 同一作用域内一个非空 `reserved_user_id` 至多被一个连接选项持有，
//!   由存储层原子保证（内存实现在同一写锁内检查并写入，Postgres 使用部分唯一索引）
//! - 所有写入以 `optlock` 做乐观锁，过期版本返回 `StorageError::Conflict`
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use kapua_storage::{DeviceConnectionStore, InMemoryDeviceConnectionStore};
//!
//! let store = InMemoryDeviceConnectionStore::new();
//! let snapshot = store.find_snapshot_by_client_id("1", "gw-01").await?;
//! ```

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod redis;
pub mod traits;
pub mod validation;

pub use connection::connect_pool;
pub use error::StorageError;
pub use in_memory::*;
pub use models::*;
pub use postgres::*;
pub use redis::*;
pub use traits::*;
