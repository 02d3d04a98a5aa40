//! 设备连接内存存储实现
//!
//! 连接与选项放在同一把写锁下，唯一性检查与写入是原子的：
//! - `(scope_id, client_id)` 唯一
//! - `(scope_id, reserved_user_id)` 唯一（非空时）

use crate::error::StorageError;
use crate::models::{
    ConnectionOptionQuery, ConnectionSnapshot, DeviceConnection, DeviceConnectionOption,
    DeviceConnectionQuery, NewDeviceConnection, now_epoch_ms, paginate,
};
use crate::traits::{DeviceConnectionOptionStore, DeviceConnectionStore};
use crate::validation::{ensure_id, ensure_scope};
use std::collections::HashMap;
use std::sync::RwLock;

type ScopedKey = (String, String);

#[derive(Default)]
struct State {
    connections: HashMap<String, DeviceConnection>,
    options: HashMap<String, DeviceConnectionOption>,
    /// (scope_id, client_id) -> connection id
    client_index: HashMap<ScopedKey, String>,
    /// (scope_id, reserved_user_id) -> connection id
    reservations: HashMap<ScopedKey, String>,
}

impl State {
    fn remove(&mut self, id: &str) -> Option<DeviceConnection> {
        let connection = self.connections.remove(id)?;
        self.client_index
            .remove(&(connection.scope_id.clone(), connection.client_id.clone()));
        if let Some(option) = self.options.remove(id) {
            if let Some(user_id) = option.reserved_user_id {
                self.reservations.remove(&(option.scope_id, user_id));
            }
        }
        Some(connection)
    }
}

/// 设备连接内存存储（同时实现连接与选项两个接口）
pub struct InMemoryDeviceConnectionStore {
    state: RwLock<State>,
}

impl InMemoryDeviceConnectionStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }
}

impl Default for InMemoryDeviceConnectionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_failed() -> StorageError {
    StorageError::new("lock failed")
}

#[async_trait::async_trait]
impl DeviceConnectionStore for InMemoryDeviceConnectionStore {
    async fn create_connection(
        &self,
        record: NewDeviceConnection,
    ) -> Result<ConnectionSnapshot, StorageError> {
        ensure_scope(&record.scope_id)?;
        ensure_id("id", &record.id)?;
        ensure_id("client_id", &record.client_id)?;
        let mut state = self.state.write().map_err(|_| lock_failed())?;
        let client_key = (record.scope_id.clone(), record.client_id.clone());
        if state.client_index.contains_key(&client_key) {
            return Err(StorageError::Duplicate {
                entity: "device_connection",
                key: record.client_id,
            });
        }
        if state.connections.contains_key(&record.id) {
            return Err(StorageError::Duplicate {
                entity: "device_connection",
                key: record.id,
            });
        }
        let (connection, option) = record.into_records(now_epoch_ms());
        state.client_index.insert(client_key, connection.id.clone());
        state
            .connections
            .insert(connection.id.clone(), connection.clone());
        state.options.insert(option.id.clone(), option.clone());
        Ok(ConnectionSnapshot { connection, option })
    }

    async fn find_connection(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnection>, StorageError> {
        ensure_scope(scope_id)?;
        let state = self.state.read().map_err(|_| lock_failed())?;
        Ok(state
            .connections
            .get(id)
            .filter(|item| item.scope_id == scope_id)
            .cloned())
    }

    async fn find_snapshot_by_client_id(
        &self,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<ConnectionSnapshot>, StorageError> {
        ensure_scope(scope_id)?;
        let state = self.state.read().map_err(|_| lock_failed())?;
        let key = (scope_id.to_string(), client_id.to_string());
        let Some(id) = state.client_index.get(&key) else {
            return Ok(None);
        };
        let connection = state.connections.get(id).cloned();
        let option = state.options.get(id).cloned();
        Ok(connection
            .zip(option)
            .map(|(connection, option)| ConnectionSnapshot { connection, option }))
    }

    async fn query_connections(
        &self,
        query: &DeviceConnectionQuery,
    ) -> Result<Vec<DeviceConnection>, StorageError> {
        ensure_scope(&query.scope_id)?;
        let state = self.state.read().map_err(|_| lock_failed())?;
        let mut items: Vec<DeviceConnection> = state
            .connections
            .values()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Ok(paginate(items, query.offset, query.limit))
    }

    async fn count_connections(&self, query: &DeviceConnectionQuery) -> Result<u64, StorageError> {
        ensure_scope(&query.scope_id)?;
        let state = self.state.read().map_err(|_| lock_failed())?;
        let count = state
            .connections
            .values()
            .filter(|item| query.matches(item))
            .count();
        Ok(count as u64)
    }

    async fn update_connection(
        &self,
        record: DeviceConnection,
        modified_by: &str,
    ) -> Result<DeviceConnection, StorageError> {
        ensure_scope(&record.scope_id)?;
        let mut state = self.state.write().map_err(|_| lock_failed())?;
        let Some(current) = state
            .connections
            .get_mut(&record.id)
            .filter(|item| item.scope_id == record.scope_id)
        else {
            return Err(StorageError::not_found("device_connection", record.id));
        };
        if current.audit.optlock != record.audit.optlock {
            return Err(StorageError::Conflict {
                entity: "device_connection",
                id: record.id,
                expected: record.audit.optlock,
            });
        }
        current.status = record.status;
        current.user_id = record.user_id;
        current.protocol = record.protocol;
        current.client_ip = record.client_ip;
        current.server_ip = record.server_ip;
        current.audit = current.audit.touched(modified_by, now_epoch_ms());
        Ok(current.clone())
    }

    async fn delete_connection(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnection>, StorageError> {
        ensure_scope(scope_id)?;
        let mut state = self.state.write().map_err(|_| lock_failed())?;
        let owned = state
            .connections
            .get(id)
            .is_some_and(|item| item.scope_id == scope_id);
        if !owned {
            return Ok(None);
        }
        Ok(state.remove(id))
    }

    async fn delete_connections_by_scope(
        &self,
        scope_id: &str,
    ) -> Result<Vec<DeviceConnection>, StorageError> {
        ensure_scope(scope_id)?;
        let mut state = self.state.write().map_err(|_| lock_failed())?;
        let ids: Vec<String> = state
            .connections
            .values()
            .filter(|item| item.scope_id == scope_id)
            .map(|item| item.id.clone())
            .collect();
        Ok(ids.iter().filter_map(|id| state.remove(id)).collect())
    }
}

#[async_trait::async_trait]
impl DeviceConnectionOptionStore for InMemoryDeviceConnectionStore {
    async fn find_option(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnectionOption>, StorageError> {
        ensure_scope(scope_id)?;
        let state = self.state.read().map_err(|_| lock_failed())?;
        Ok(state
            .options
            .get(id)
            .filter(|item| item.scope_id == scope_id)
            .cloned())
    }

    async fn query_options(
        &self,
        query: &ConnectionOptionQuery,
    ) -> Result<Vec<DeviceConnectionOption>, StorageError> {
        ensure_scope(&query.scope_id)?;
        let state = self.state.read().map_err(|_| lock_failed())?;
        let mut items: Vec<DeviceConnectionOption> = state
            .options
            .values()
            .filter(|item| query.matches(item))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(paginate(items, query.offset, query.limit))
    }

    async fn count_options(&self, query: &ConnectionOptionQuery) -> Result<u64, StorageError> {
        ensure_scope(&query.scope_id)?;
        let state = self.state.read().map_err(|_| lock_failed())?;
        let count = state
            .options
            .values()
            .filter(|item| query.matches(item))
            .count();
        Ok(count as u64)
    }

    async fn update_option(
        &self,
        record: DeviceConnectionOption,
        modified_by: &str,
    ) -> Result<DeviceConnectionOption, StorageError> {
        ensure_scope(&record.scope_id)?;
        let mut state = self.state.write().map_err(|_| lock_failed())?;
        let Some(current) = state
            .options
            .get(&record.id)
            .filter(|item| item.scope_id == record.scope_id)
            .cloned()
        else {
            return Err(StorageError::not_found("device_connection_option", record.id));
        };
        if current.audit.optlock != record.audit.optlock {
            return Err(StorageError::Conflict {
                entity: "device_connection_option",
                id: record.id,
                expected: record.audit.optlock,
            });
        }
        if let Some(user_id) = record.reserved_user_id.as_deref() {
            let key = (record.scope_id.clone(), user_id.to_string());
            if let Some(holder) = state.reservations.get(&key) {
                if holder != &record.id {
                    return Err(StorageError::UserAlreadyReserved {
                        scope_id: record.scope_id,
                        user_id: user_id.to_string(),
                        connection_id: holder.clone(),
                    });
                }
            }
        }
        if let Some(previous) = current.reserved_user_id.as_deref() {
            state
                .reservations
                .remove(&(record.scope_id.clone(), previous.to_string()));
        }
        if let Some(user_id) = record.reserved_user_id.as_deref() {
            state.reservations.insert(
                (record.scope_id.clone(), user_id.to_string()),
                record.id.clone(),
            );
        }
        let updated = DeviceConnectionOption {
            audit: current.audit.touched(modified_by, now_epoch_ms()),
            ..record
        };
        state.options.insert(updated.id.clone(), updated.clone());
        Ok(updated)
    }
}
