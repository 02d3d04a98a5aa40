//! 设备连接注册表：连接服务、连接选项服务与平台事件监听。
//!
//! 所有写入路径：先失效缓存，再写存储，成功后回填缓存。
//! 缓存失效失败时放弃写入。

mod audit;
mod connections;
mod events;
mod options;

use kapua_auth::AuthError;
use kapua_storage::StorageError;

pub use connections::{ConnectEvent, DeviceConnectionService, RegistryConfig};
pub use options::DeviceConnectionOptionService;

/// 注册表错误。
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RegistryError {
    pub fn storage(&self) -> Option<&StorageError> {
        match self {
            RegistryError::Storage(err) => Some(err),
            _ => None,
        }
    }

    /// 预留用户冲突（同作用域内已被其它连接持有）
    pub fn is_user_already_reserved(&self) -> bool {
        matches!(self.storage(), Some(StorageError::UserAlreadyReserved { .. }))
    }

    pub fn is_conflict(&self) -> bool {
        self.storage().is_some_and(StorageError::is_conflict)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.storage(), Some(StorageError::NotFound { .. }))
    }
}

pub(crate) fn ensure_argument(field: &str, value: &str) -> Result<(), RegistryError> {
    if value.is_empty() {
        return Err(RegistryError::InvalidArgument(format!("{field} required")));
    }
    Ok(())
}

/// 乐观锁冲突或创建竞争，重读后可重试。
pub(crate) fn is_retryable(err: &StorageError) -> bool {
    err.is_conflict() || matches!(err, StorageError::Duplicate { .. })
}
