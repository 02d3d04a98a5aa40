//! 存储接口 Trait 定义
//!
//! - DeviceConnectionStore：设备连接存储
//! - DeviceConnectionOptionStore：连接选项存储（只读 + 更新，选项随连接创建/删除）
//! - UserStore：用户存储（审计名称解析）
//! - ConnectionCache：连接快照缓存
//!
//! 所有接口显式接收 `scope_id`，权限校验由上层服务完成。

use crate::error::StorageError;
use crate::models::{
    ConnectionOptionQuery, ConnectionSnapshot, DeviceConnection, DeviceConnectionOption,
    DeviceConnectionQuery, NewDeviceConnection, UserRecord,
};
use async_trait::async_trait;

/// 设备连接存储接口
#[async_trait]
pub trait DeviceConnectionStore: Send + Sync {
    /// 创建连接及其默认选项（OPEN）。
    ///
    /// `(scope_id, client_id)` 已存在时返回 `Duplicate`。
    async fn create_connection(
        &self,
        record: NewDeviceConnection,
    ) -> Result<ConnectionSnapshot, StorageError>;

    async fn find_connection(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnection>, StorageError>;

    /// 一次读取连接及其选项。
    async fn find_snapshot_by_client_id(
        &self,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<ConnectionSnapshot>, StorageError>;

    async fn query_connections(
        &self,
        query: &DeviceConnectionQuery,
    ) -> Result<Vec<DeviceConnection>, StorageError>;

    async fn count_connections(&self, query: &DeviceConnectionQuery) -> Result<u64, StorageError>;

    /// 更新连接的可变字段。
    ///
    /// `record.audit.optlock` 必须等于当前版本，否则返回 `Conflict`。
    async fn update_connection(
        &self,
        record: DeviceConnection,
        modified_by: &str,
    ) -> Result<DeviceConnection, StorageError>;

    /// 删除连接（选项一并删除），返回被删除的记录。
    async fn delete_connection(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnection>, StorageError>;

    /// 删除作用域内全部连接，返回被删除的记录。
    async fn delete_connections_by_scope(
        &self,
        scope_id: &str,
    ) -> Result<Vec<DeviceConnection>, StorageError>;
}

/// 连接选项存储接口
///
/// 预留用户唯一性由实现保证：同一作用域内一个非空 `reserved_user_id`
/// 至多被一个选项持有，违反时返回 `UserAlreadyReserved`。
#[async_trait]
pub trait DeviceConnectionOptionStore: Send + Sync {
    async fn find_option(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnectionOption>, StorageError>;

    async fn query_options(
        &self,
        query: &ConnectionOptionQuery,
    ) -> Result<Vec<DeviceConnectionOption>, StorageError>;

    async fn count_options(&self, query: &ConnectionOptionQuery) -> Result<u64, StorageError>;

    /// 更新选项的可变字段（乐观锁保护）。
    async fn update_option(
        &self,
        record: DeviceConnectionOption,
        modified_by: &str,
    ) -> Result<DeviceConnectionOption, StorageError>;
}

/// 用户存储接口
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(
        &self,
        scope_id: &str,
        user_id: &str,
    ) -> Result<Option<UserRecord>, StorageError>;
}

/// 连接快照缓存
///
/// 同一快照以 id 和 client_id 两个键缓存。
#[async_trait]
pub trait ConnectionCache: Send + Sync {
    async fn get(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<ConnectionSnapshot>, StorageError>;

    async fn get_by_client_id(
        &self,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<ConnectionSnapshot>, StorageError>;

    async fn put(&self, snapshot: &ConnectionSnapshot) -> Result<(), StorageError>;

    async fn remove(&self, scope_id: &str, id: &str, client_id: &str) -> Result<(), StorageError>;
}
