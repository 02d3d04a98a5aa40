use crate::AuthError;
use async_trait::async_trait;
use kapua_storage::UserStore;
use std::sync::Arc;

/// 用户 id 到用户名的解析（审计字段展示用）。
#[async_trait]
pub trait UserNameResolver: Send + Sync {
    async fn resolve_name(
        &self,
        scope_id: &str,
        user_id: &str,
    ) -> Result<Option<String>, AuthError>;
}

/// 基于 UserStore 的用户名解析。
pub struct StoreUserNameResolver {
    users: Arc<dyn UserStore>,
}

impl StoreUserNameResolver {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserNameResolver for StoreUserNameResolver {
    async fn resolve_name(
        &self,
        scope_id: &str,
        user_id: &str,
    ) -> Result<Option<String>, AuthError> {
        let user = self.users.find_user(scope_id, user_id).await?;
        Ok(user.map(|user| user.username))
    }
}
