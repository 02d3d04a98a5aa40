//! 存储层错误类型
//!
//! 区分以下几类失败，调用方据此决定重试、拒绝或上报：
//! - 记录不存在 / 唯一键重复
//! - 乐观锁版本冲突（同一连接并发写入）
//! - 预留用户冲突（跨连接唯一性）
//! - 存储不可用（连接池超时、网络错误）

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} {id} was modified concurrently (expected version {expected})")]
    Conflict {
        entity: &'static str,
        id: String,
        expected: i32,
    },

    #[error("user {user_id} already reserved by connection {connection_id} in scope {scope_id}")]
    UserAlreadyReserved {
        scope_id: String,
        user_id: String,
        connection_id: String,
    },

    #[error("duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Internal(String),
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// 是否为可通过重读后重试解决的冲突。
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<domain::ParseEnumError> for StorageError {
    fn from(err: domain::ParseEnumError) -> Self {
        Self::Internal(err.to_string())
    }
}
