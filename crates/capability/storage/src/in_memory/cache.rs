//! 连接快照内存缓存

use crate::error::StorageError;
use crate::models::ConnectionSnapshot;
use crate::traits::ConnectionCache;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Entries {
    /// (scope_id, id) -> snapshot
    by_id: HashMap<(String, String), ConnectionSnapshot>,
    /// (scope_id, client_id) -> id
    by_client_id: HashMap<(String, String), String>,
}

/// 连接快照内存缓存（无过期）
#[derive(Default)]
pub struct InMemoryConnectionCache {
    entries: RwLock<Entries>,
}

impl InMemoryConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.by_id.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ConnectionCache for InMemoryConnectionCache {
    async fn get(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<ConnectionSnapshot>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(entries
            .by_id
            .get(&(scope_id.to_string(), id.to_string()))
            .cloned())
    }

    async fn get_by_client_id(
        &self,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<ConnectionSnapshot>, StorageError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(id) = entries
            .by_client_id
            .get(&(scope_id.to_string(), client_id.to_string()))
        else {
            return Ok(None);
        };
        Ok(entries
            .by_id
            .get(&(scope_id.to_string(), id.clone()))
            .cloned())
    }

    async fn put(&self, snapshot: &ConnectionSnapshot) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let connection = &snapshot.connection;
        entries.by_client_id.insert(
            (connection.scope_id.clone(), connection.client_id.clone()),
            connection.id.clone(),
        );
        entries.by_id.insert(
            (connection.scope_id.clone(), connection.id.clone()),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn remove(&self, scope_id: &str, id: &str, client_id: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        entries
            .by_client_id
            .remove(&(scope_id.to_string(), client_id.to_string()));
        entries.by_id.remove(&(scope_id.to_string(), id.to_string()));
        Ok(())
    }
}
