//! Redis 连接快照缓存实现
//!
//! 键格式：
//! - `scope:{scope_id}:device_connection:{id}` -> 快照 JSON
//! - `scope:{scope_id}:client:{client_id}:device_connection` -> 连接 id
//!
//! 两个键在同一 pipeline 中以相同 TTL 写入。

use crate::error::StorageError;
use crate::models::ConnectionSnapshot;
use crate::traits::ConnectionCache;
use redis::AsyncCommands;

fn connection_key(scope_id: &str, id: &str) -> String {
    format!("scope:{}:device_connection:{}", scope_id, id)
}

fn client_key(scope_id: &str, client_id: &str) -> String {
    format!("scope:{}:client:{}:device_connection", scope_id, client_id)
}

/// Redis 连接快照缓存
pub struct RedisConnectionCache {
    client: redis::Client,
    ttl_seconds: u64,
}

impl RedisConnectionCache {
    pub fn new(client: redis::Client, ttl_seconds: u64) -> Self {
        Self {
            client,
            ttl_seconds: ttl_seconds.max(1),
        }
    }

    pub fn connect(redis_url: &str, ttl_seconds: u64) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self::new(client, ttl_seconds))
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StorageError> {
        Ok(self.client.get_multiplexed_tokio_connection().await?)
    }
}

#[async_trait::async_trait]
impl ConnectionCache for RedisConnectionCache {
    async fn get(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<ConnectionSnapshot>, StorageError> {
        let mut connection = self.connection().await?;
        let data: Option<String> = connection.get(connection_key(scope_id, id)).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&data)?))
    }

    async fn get_by_client_id(
        &self,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<ConnectionSnapshot>, StorageError> {
        let mut connection = self.connection().await?;
        let id: Option<String> = connection.get(client_key(scope_id, client_id)).await?;
        let Some(id) = id else {
            return Ok(None);
        };
        let data: Option<String> = connection.get(connection_key(scope_id, &id)).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        let snapshot: ConnectionSnapshot = serde_json::from_str(&data)?;
        // id 键可能已指向被替换的连接
        if snapshot.connection.client_id != client_id {
            tracing::debug!(
                target: "kapua.storage",
                scope_id,
                client_id,
                cached_client_id = %snapshot.connection.client_id,
                "cache_client_index_stale"
            );
            return Ok(None);
        }
        Ok(Some(snapshot))
    }

    async fn put(&self, snapshot: &ConnectionSnapshot) -> Result<(), StorageError> {
        let mut connection = self.connection().await?;
        let record = &snapshot.connection;
        let data = serde_json::to_string(snapshot)?;
        redis::pipe()
            .atomic()
            .set_ex(connection_key(&record.scope_id, &record.id), data, self.ttl_seconds)
            .ignore()
            .set_ex(
                client_key(&record.scope_id, &record.client_id),
                &record.id,
                self.ttl_seconds,
            )
            .ignore()
            .query_async::<_, ()>(&mut connection)
            .await?;
        Ok(())
    }

    async fn remove(&self, scope_id: &str, id: &str, client_id: &str) -> Result<(), StorageError> {
        let mut connection = self.connection().await?;
        let keys = vec![connection_key(scope_id, id), client_key(scope_id, client_id)];
        connection.del::<_, ()>(keys).await?;
        Ok(())
    }
}
