use crate::audit::AuditNames;
use crate::{RegistryError, ensure_argument};
use domain::ScopeContext;
use domain::permissions::{DEVICE_CONNECTION_READ, DEVICE_CONNECTION_WRITE};
use kapua_auth::{AuthorizationService, UserNameResolver, hash_trust_key};
use kapua_storage::{
    ConnectionCache, ConnectionOptionQuery, DeviceConnectionOption, DeviceConnectionOptionStore,
    DeviceConnectionStore, StorageError,
};
use kapua_telemetry::record_reservation_conflict;
use std::sync::Arc;
use tracing::{info, warn};

/// 设备连接选项服务（预留用户、耦合模式、信任密钥）。
///
/// 选项随连接创建与删除，这里只提供查询与更新。
#[derive(Clone)]
pub struct DeviceConnectionOptionService {
    options: Arc<dyn DeviceConnectionOptionStore>,
    connections: Arc<dyn DeviceConnectionStore>,
    cache: Arc<dyn ConnectionCache>,
    authorization: Arc<dyn AuthorizationService>,
    user_names: Arc<dyn UserNameResolver>,
}

impl DeviceConnectionOptionService {
    pub fn new(
        options: Arc<dyn DeviceConnectionOptionStore>,
        connections: Arc<dyn DeviceConnectionStore>,
        cache: Arc<dyn ConnectionCache>,
        authorization: Arc<dyn AuthorizationService>,
        user_names: Arc<dyn UserNameResolver>,
    ) -> Self {
        Self {
            options,
            connections,
            cache,
            authorization,
            user_names,
        }
    }

    fn audit_names(&self) -> AuditNames<'_> {
        AuditNames {
            authorization: self.authorization.as_ref(),
            resolver: self.user_names.as_ref(),
        }
    }

    pub async fn find(
        &self,
        ctx: &ScopeContext,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnectionOption>, RegistryError> {
        ensure_argument("scope_id", scope_id)?;
        ensure_argument("id", id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_READ, scope_id)?;
        let Some(mut option) = self.options.find_option(scope_id, id).await? else {
            return Ok(None);
        };
        self.audit_names().fill(ctx, scope_id, &mut option.audit).await;
        Ok(Some(option))
    }

    pub async fn query(
        &self,
        ctx: &ScopeContext,
        query: &ConnectionOptionQuery,
    ) -> Result<Vec<DeviceConnectionOption>, RegistryError> {
        ensure_argument("scope_id", &query.scope_id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_READ, &query.scope_id)?;
        let mut items = self.options.query_options(query).await?;
        for item in &mut items {
            self.audit_names().fill(ctx, &query.scope_id, &mut item.audit).await;
        }
        Ok(items)
    }

    pub async fn count(
        &self,
        ctx: &ScopeContext,
        query: &ConnectionOptionQuery,
    ) -> Result<u64, RegistryError> {
        ensure_argument("scope_id", &query.scope_id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_READ, &query.scope_id)?;
        Ok(self.options.count_options(query).await?)
    }

    /// 更新连接选项。
    ///
    /// 预留用户已被同作用域其它连接持有时返回 `UserAlreadyReserved`；
    /// `option.audit.optlock` 过期时返回 `Conflict`。
    pub async fn update(
        &self,
        ctx: &ScopeContext,
        option: DeviceConnectionOption,
    ) -> Result<DeviceConnectionOption, RegistryError> {
        ensure_argument("scope_id", &option.scope_id)?;
        ensure_argument("id", &option.id)?;
        self.authorization
            .check_permission(ctx, DEVICE_CONNECTION_WRITE, &option.scope_id)?;

        if let Some(user_id) = option.reserved_user_id.as_deref() {
            let query = ConnectionOptionQuery {
                limit: Some(1),
                ..ConnectionOptionQuery::reserved_elsewhere(&option.scope_id, user_id, &option.id)
            };
            if let Some(holder) = self.options.query_options(&query).await?.into_iter().next() {
                record_reservation_conflict();
                warn!(
                    target: "kapua.registry",
                    scope_id = %option.scope_id,
                    connection_id = %option.id,
                    user_id = %user_id,
                    holder = %holder.id,
                    "user_already_reserved"
                );
                return Err(StorageError::UserAlreadyReserved {
                    scope_id: option.scope_id.clone(),
                    user_id: user_id.to_string(),
                    connection_id: holder.id,
                }
                .into());
            }
        }

        let Some(connection) = self
            .connections
            .find_connection(&option.scope_id, &option.id)
            .await?
        else {
            return Err(StorageError::not_found("device_connection", option.id).into());
        };
        self.cache
            .remove(&connection.scope_id, &connection.id, &connection.client_id)
            .await?;

        let mut updated = match self.options.update_option(option, &ctx.user_id).await {
            Ok(updated) => updated,
            Err(err) => {
                if matches!(err, StorageError::UserAlreadyReserved { .. }) {
                    record_reservation_conflict();
                }
                return Err(err.into());
            }
        };
        // 写前失效与写入之间可能有并发回填旧快照，写后再失效一次
        if let Err(err) = self
            .cache
            .remove(&connection.scope_id, &connection.id, &connection.client_id)
            .await
        {
            warn!(
                target: "kapua.registry",
                scope_id = %connection.scope_id,
                client_id = %connection.client_id,
                error = %err,
                "connection_cache_evict_failed"
            );
        }
        info!(
            target: "kapua.registry",
            scope_id = %updated.scope_id,
            connection_id = %updated.id,
            coupling_mode = %updated.user_coupling_mode,
            reserved_user_id = ?updated.reserved_user_id,
            optlock = updated.audit.optlock,
            "connection_option_updated"
        );
        let scope_id = updated.scope_id.clone();
        self.audit_names().fill(ctx, &scope_id, &mut updated.audit).await;
        Ok(updated)
    }

    /// 设置设备信任密钥（以 argon2 哈希保存）。
    pub async fn update_trust_key(
        &self,
        ctx: &ScopeContext,
        scope_id: &str,
        id: &str,
        trust_key: &str,
        expiration_ms: Option<i64>,
    ) -> Result<DeviceConnectionOption, RegistryError> {
        ensure_argument("trust_key", trust_key)?;
        let Some(option) = self.find(ctx, scope_id, id).await? else {
            return Err(StorageError::not_found("device_connection_option", id).into());
        };
        let option = DeviceConnectionOption {
            trust_key: Some(hash_trust_key(trust_key)?),
            trust_expiration_ms: expiration_ms,
            ..option
        };
        self.update(ctx, option).await
    }
}
