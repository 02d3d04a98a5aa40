//! 用户内存存储实现

use crate::error::StorageError;
use crate::models::UserRecord;
use crate::traits::UserStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// 用户内存存储
///
/// 键为 (scope_id, user_id)。
pub struct InMemoryUserStore {
    users: RwLock<HashMap<(String, String), UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// 预置用户记录
    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let map = users
            .into_iter()
            .map(|user| ((user.scope_id.clone(), user.user_id.clone()), user))
            .collect();
        Self {
            users: RwLock::new(map),
        }
    }

    pub fn insert(&self, user: UserRecord) -> Result<(), StorageError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        users.insert((user.scope_id.clone(), user.user_id.clone()), user);
        Ok(())
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_user(
        &self,
        scope_id: &str,
        user_id: &str,
    ) -> Result<Option<UserRecord>, StorageError> {
        let users = self
            .users
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(users
            .get(&(scope_id.to_string(), user_id.to_string()))
            .cloned())
    }
}
