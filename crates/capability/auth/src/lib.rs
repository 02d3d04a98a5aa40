//! 授权能力：权限校验、审计用户名解析、设备信任密钥。

mod authorization;
mod trust_key;
mod users;

pub use authorization::{AuthorizationService, ContextAuthorizationService};
pub use trust_key::{
    TrustKeyCheck, TrustKeyStatus, hash_trust_key, secret_matches, verify_trust_key,
};
pub use users::{StoreUserNameResolver, UserNameResolver};

/// 授权相关错误。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("permission {permission} denied in scope {scope_id}")]
    PermissionDenied {
        permission: String,
        scope_id: String,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<kapua_storage::StorageError> for AuthError {
    fn from(err: kapua_storage::StorageError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
