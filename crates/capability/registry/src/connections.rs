use crate::audit::AuditNames;
use crate::{RegistryError, ensure_argument, is_retryable};
use domain::permissions::{DEVICE_CONNECTION_DELETE, DEVICE_CONNECTION_READ, DEVICE_CONNECTION_WRITE};
use domain::{ConnectionStatus, ScopeContext};
use kapua_auth::{AuthorizationService, UserNameResolver};
use kapua_storage::{
    ConnectionCache, ConnectionSnapshot, DeviceConnection, DeviceConnectionOptionStore,
    DeviceConnectionQuery, DeviceConnectionStore, NewDeviceConnection, StorageError,
};
use kapua_telemetry::{
    record_cache_hit, record_cache_miss, record_disconnect, record_optimistic_lock_retry,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 设备连接事件（Broker 回调）。
#[derive(Debug, Clone)]
pub struct ConnectEvent {
    pub scope_id: String,
    pub client_id: String,
    pub user_id: String,
    pub protocol: Option<String>,
    pub client_ip: Option<String>,
    pub server_ip: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// 乐观锁冲突后的最大重试次数
    pub max_retries: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// 设备连接服务。
#[derive(Clone)]
pub struct DeviceConnectionService {
    pub(crate) connections: Arc<dyn DeviceConnectionStore>,
    pub(crate) options: Arc<dyn DeviceConnectionOptionStore>,
    pub(crate) cache: Arc<dyn ConnectionCache>,
    pub(crate) authorization: Arc<dyn AuthorizationService>,
    user_names: Arc<dyn UserNameResolver>,
    pub(crate) config: RegistryConfig,
}

impl DeviceConnectionService {
    pub fn new(
        connections: Arc<dyn DeviceConnectionStore>,
        options: Arc<dyn DeviceConnectionOptionStore>,
        cache: Arc<dyn ConnectionCache>,
        authorization: Arc<dyn AuthorizationService>,
        user_names: Arc<dyn UserNameResolver>,
    ) -> Self {
        Self::new_with_config(
            connections,
            options,
            cache,
            authorization,
            user_names,
            RegistryConfig::default(),
        )
    }

    pub fn new_with_config(
        connections: Arc<dyn DeviceConnectionStore>,
        options: Arc<dyn DeviceConnectionOptionStore>,
        cache: Arc<dyn ConnectionCache>,
        authorization: Arc<dyn AuthorizationService>,
        user_names: Arc<dyn UserNameResolver>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            connections,
            options,
            cache,
            authorization,
            user_names,
            config,
        }
    }

    fn audit_names(&self) -> AuditNames<'_> {
        AuditNames {
            authorization: self.authorization.as_ref(),
            resolver: self.user_names.as_ref(),
        }
    }

    /// 按 client_id 直接读取存储中的连接快照，不经缓存。
    ///
    /// 绑定判定以存储为准，缓存只服务于查询。
    pub async fn load_by_client_id(
        &self,
        ctx: &ScopeContext,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<ConnectionSnapshot>, RegistryError> {
        ensure_argument("scope_id", scope_id)?;
        ensure_argument("client_id", client_id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_READ, scope_id)?;
        Ok(self
            .connections
            .find_snapshot_by_client_id(scope_id, client_id)
            .await?)
    }

    /// 按 client_id 查找连接快照（先查缓存）。
    pub async fn find_by_client_id(
        &self,
        ctx: &ScopeContext,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<ConnectionSnapshot>, RegistryError> {
        ensure_argument("scope_id", scope_id)?;
        ensure_argument("client_id", client_id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_READ, scope_id)?;
        match self.cache.get_by_client_id(scope_id, client_id).await {
            Ok(Some(snapshot)) => {
                record_cache_hit();
                return Ok(Some(snapshot));
            }
            Ok(None) => record_cache_miss(),
            Err(err) => {
                record_cache_miss();
                warn!(
                    target: "kapua.registry",
                    scope_id = %scope_id,
                    client_id = %client_id,
                    error = %err,
                    "connection_cache_read_failed"
                );
            }
        }
        let snapshot = self
            .connections
            .find_snapshot_by_client_id(scope_id, client_id)
            .await?;
        if let Some(snapshot) = &snapshot {
            self.populate(snapshot).await;
        }
        Ok(snapshot)
    }

    pub async fn find(
        &self,
        ctx: &ScopeContext,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnection>, RegistryError> {
        ensure_argument("scope_id", scope_id)?;
        ensure_argument("id", id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_READ, scope_id)?;
        let cached = match self.cache.get(scope_id, id).await {
            Ok(Some(snapshot)) => {
                record_cache_hit();
                Some(snapshot.connection)
            }
            Ok(None) | Err(_) => {
                record_cache_miss();
                None
            }
        };
        let connection = match cached {
            Some(connection) => Some(connection),
            None => self.connections.find_connection(scope_id, id).await?,
        };
        let Some(mut connection) = connection else {
            return Ok(None);
        };
        self.audit_names().fill(ctx, scope_id, &mut connection.audit).await;
        Ok(Some(connection))
    }

    pub async fn query(
        &self,
        ctx: &ScopeContext,
        query: &DeviceConnectionQuery,
    ) -> Result<Vec<DeviceConnection>, RegistryError> {
        ensure_argument("scope_id", &query.scope_id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_READ, &query.scope_id)?;
        let mut items = self.connections.query_connections(query).await?;
        for item in &mut items {
            self.audit_names().fill(ctx, &query.scope_id, &mut item.audit).await;
        }
        Ok(items)
    }

    pub async fn count(
        &self,
        ctx: &ScopeContext,
        query: &DeviceConnectionQuery,
    ) -> Result<u64, RegistryError> {
        ensure_argument("scope_id", &query.scope_id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_READ, &query.scope_id)?;
        Ok(self.connections.count_connections(query).await?)
    }

    /// 记录设备连接：首次连接时创建连接与 OPEN 选项，否则更新为 CONNECTED。
    pub async fn record_connect(
        &self,
        ctx: &ScopeContext,
        event: &ConnectEvent,
    ) -> Result<DeviceConnection, RegistryError> {
        ensure_argument("scope_id", &event.scope_id)?;
        ensure_argument("client_id", &event.client_id)?;
        ensure_argument("user_id", &event.user_id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_WRITE, &event.scope_id)?;
        let connection = self
            .with_retry(move || self.try_connect(ctx, event))
            .await?;
        info!(
            target: "kapua.registry",
            scope_id = %connection.scope_id,
            client_id = %connection.client_id,
            connection_id = %connection.id,
            user_id = %connection.user_id,
            optlock = connection.audit.optlock,
            "device_connected"
        );
        Ok(connection)
    }

    /// 记录设备断开；未知 client_id 返回 `None`。
    pub async fn record_disconnect(
        &self,
        ctx: &ScopeContext,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<DeviceConnection>, RegistryError> {
        ensure_argument("scope_id", scope_id)?;
        ensure_argument("client_id", client_id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_WRITE, scope_id)?;
        let connection = self
            .with_retry(move || {
                self.try_transition(ctx, scope_id, client_id, ConnectionStatus::Disconnected)
            })
            .await?;
        match &connection {
            Some(connection) => {
                record_disconnect();
                info!(
                    target: "kapua.registry",
                    scope_id = %scope_id,
                    client_id = %client_id,
                    connection_id = %connection.id,
                    "device_disconnected"
                );
            }
            None => warn!(
                target: "kapua.registry",
                scope_id = %scope_id,
                client_id = %client_id,
                "disconnect_for_unknown_client"
            ),
        }
        Ok(connection)
    }

    /// 离线对账：仍为 CONNECTED 的连接标记为 MISSING。
    pub async fn mark_missing(
        &self,
        ctx: &ScopeContext,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<DeviceConnection>, RegistryError> {
        ensure_argument("scope_id", scope_id)?;
        ensure_argument("client_id", client_id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_WRITE, scope_id)?;
        let connection = self
            .with_retry(move || {
                self.try_transition(ctx, scope_id, client_id, ConnectionStatus::Missing)
            })
            .await?;
        if let Some(connection) = &connection {
            info!(
                target: "kapua.registry",
                scope_id = %scope_id,
                client_id = %client_id,
                status = %connection.status,
                "device_missing_checked"
            );
        }
        Ok(connection)
    }

    /// 删除连接（管理操作）。
    pub async fn delete(
        &self,
        ctx: &ScopeContext,
        scope_id: &str,
        id: &str,
    ) -> Result<(), RegistryError> {
        ensure_argument("scope_id", scope_id)?;
        ensure_argument("id", id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_DELETE, scope_id)?;
        let Some(existing) = self.connections.find_connection(scope_id, id).await? else {
            return Err(StorageError::not_found("device_connection", id).into());
        };
        self.cache
            .remove(scope_id, &existing.id, &existing.client_id)
            .await?;
        self.connections.delete_connection(scope_id, id).await?;
        info!(
            target: "kapua.registry",
            scope_id = %scope_id,
            client_id = %existing.client_id,
            connection_id = %existing.id,
            actor = %ctx.user_id,
            "device_connection_deleted"
        );
        Ok(())
    }

    async fn try_connect(
        &self,
        ctx: &ScopeContext,
        event: &ConnectEvent,
    ) -> Result<DeviceConnection, StorageError> {
        let existing = self
            .connections
            .find_snapshot_by_client_id(&event.scope_id, &event.client_id)
            .await?;
        let Some(snapshot) = existing else {
            let created = self
                .connections
                .create_connection(NewDeviceConnection {
                    id: uuid::Uuid::new_v4().to_string(),
                    scope_id: event.scope_id.clone(),
                    client_id: event.client_id.clone(),
                    status: ConnectionStatus::Connected,
                    user_id: event.user_id.clone(),
                    protocol: event.protocol.clone(),
                    client_ip: event.client_ip.clone(),
                    server_ip: event.server_ip.clone(),
                    created_by: ctx.user_id.clone(),
                })
                .await?;
            self.populate(&created).await;
            return Ok(created.connection);
        };
        self.write_connection(ctx, snapshot, |record| {
            record.status = ConnectionStatus::Connected;
            record.user_id = event.user_id.clone();
            record.protocol = event.protocol.clone();
            record.client_ip = event.client_ip.clone();
            record.server_ip = event.server_ip.clone();
        })
        .await
    }

    async fn try_transition(
        &self,
        ctx: &ScopeContext,
        scope_id: &str,
        client_id: &str,
        status: ConnectionStatus,
    ) -> Result<Option<DeviceConnection>, StorageError> {
        let Some(snapshot) = self
            .connections
            .find_snapshot_by_client_id(scope_id, client_id)
            .await?
        else {
            return Ok(None);
        };
        // MISSING 只覆盖仍在线的连接
        if status == ConnectionStatus::Missing
            && snapshot.connection.status != ConnectionStatus::Connected
        {
            return Ok(Some(snapshot.connection));
        }
        let updated = self
            .write_connection(ctx, snapshot, |record| record.status = status)
            .await?;
        Ok(Some(updated))
    }

    /// 失效缓存 -> 写存储 -> 以写后重读的快照回填缓存。
    async fn write_connection(
        &self,
        ctx: &ScopeContext,
        snapshot: ConnectionSnapshot,
        apply: impl FnOnce(&mut DeviceConnection),
    ) -> Result<DeviceConnection, StorageError> {
        let mut record = snapshot.connection;
        self.cache
            .remove(&record.scope_id, &record.id, &record.client_id)
            .await?;
        apply(&mut record);
        let updated = self
            .connections
            .update_connection(record, &ctx.user_id)
            .await?;
        // 写前读到的选项可能已被并发修改，回填只用重读结果
        match self
            .connections
            .find_snapshot_by_client_id(&updated.scope_id, &updated.client_id)
            .await
        {
            Ok(Some(fresh)) => self.populate(&fresh).await,
            Ok(None) => {}
            Err(err) => warn!(
                target: "kapua.registry",
                scope_id = %updated.scope_id,
                client_id = %updated.client_id,
                error = %err,
                "connection_cache_reload_failed"
            ),
        }
        Ok(updated)
    }

    /// 回填缓存后复核存储版本；期间有并发写入（版本号变化或记录已删除）则撤销回填。
    ///
    /// 并发写入方在写存储后会再次失效缓存，两者合起来保证缓存不会长期停留在旧版本。
    pub(crate) async fn populate(&self, snapshot: &ConnectionSnapshot) {
        let connection = &snapshot.connection;
        if let Err(err) = self.cache.put(snapshot).await {
            warn!(
                target: "kapua.registry",
                scope_id = %connection.scope_id,
                client_id = %connection.client_id,
                error = %err,
                "connection_cache_populate_failed"
            );
            return;
        }
        let current = match self
            .connections
            .find_snapshot_by_client_id(&connection.scope_id, &connection.client_id)
            .await
        {
            Ok(current) => current,
            Err(err) => {
                warn!(
                    target: "kapua.registry",
                    scope_id = %connection.scope_id,
                    client_id = %connection.client_id,
                    error = %err,
                    "connection_cache_verify_failed"
                );
                None
            }
        };
        let unchanged = current.is_some_and(|current| {
            current.connection.audit.optlock == connection.audit.optlock
                && current.option.audit.optlock == snapshot.option.audit.optlock
        });
        if unchanged {
            return;
        }
        debug!(
            target: "kapua.registry",
            scope_id = %connection.scope_id,
            client_id = %connection.client_id,
            "connection_cache_populate_reverted"
        );
        self.evict(&connection.scope_id, &connection.id, &connection.client_id)
            .await;
    }

    /// 写存储之后的失效：失败只记录日志（写入已生效）。
    pub(crate) async fn evict(&self, scope_id: &str, id: &str, client_id: &str) {
        if let Err(err) = self.cache.remove(scope_id, id, client_id).await {
            warn!(
                target: "kapua.registry",
                scope_id = %scope_id,
                client_id = %client_id,
                error = %err,
                "connection_cache_evict_failed"
            );
        }
    }

    /// 乐观锁冲突时重读重试，超过上限返回最后一次冲突。
    pub(crate) async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, RegistryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StorageError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if is_retryable(&err) && attempt < self.config.max_retries => {
                    attempt += 1;
                    record_optimistic_lock_retry();
                    debug!(
                        target: "kapua.registry",
                        attempt,
                        error = %err,
                        "optimistic_lock_retry"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
