//! 平台服务事件监听。

use crate::{DeviceConnectionService, RegistryError, ensure_argument};
use domain::permissions::{DEVICE_CONNECTION_DELETE, DEVICE_CONNECTION_WRITE};
use domain::{ScopeContext, ServiceEvent};
use domain::events::{OPERATION_DELETE, SERVICE_ACCOUNT, SERVICE_GROUP, SERVICE_USER};
use kapua_storage::{ConnectionOptionQuery, DeviceConnectionOption, StorageError};
use tracing::{debug, info};

impl DeviceConnectionService {
    /// 处理平台服务事件。
    ///
    /// - `account/delete`：删除该账户作用域内全部连接
    /// - `user/delete`：释放该用户在作用域内的预留
    /// - `group/delete`：连接不携带分组，忽略
    ///
    /// 写入前校验事件投递方的权限：账户删除需 `DEVICE_CONNECTION.DELETE`，
    /// 用户删除需 `DEVICE_CONNECTION.WRITE`。
    pub async fn on_service_event(
        &self,
        ctx: &ScopeContext,
        event: &ServiceEvent,
    ) -> Result<(), RegistryError> {
        if event.is(SERVICE_ACCOUNT, OPERATION_DELETE) {
            ensure_argument("entity_id", &event.entity_id)?;
            self.authorization
                .check_permission(ctx, DEVICE_CONNECTION_DELETE, &event.entity_id)?;
            return self.on_account_deleted(&event.entity_id).await;
        }
        if event.is(SERVICE_USER, OPERATION_DELETE) {
            ensure_argument("scope_id", &event.scope_id)?;
            ensure_argument("entity_id", &event.entity_id)?;
            self.authorization
                .check_permission(ctx, DEVICE_CONNECTION_WRITE, &event.scope_id)?;
            return self
                .on_user_deleted(&event.scope_id, &event.entity_id)
                .await;
        }
        if event.is(SERVICE_GROUP, OPERATION_DELETE) {
            debug!(
                target: "kapua.registry",
                scope_id = %event.scope_id,
                group_id = %event.entity_id,
                "group_delete_ignored"
            );
            return Ok(());
        }
        debug!(
            target: "kapua.registry",
            service = %event.service,
            operation = %event.operation,
            "service_event_ignored"
        );
        Ok(())
    }

    async fn on_account_deleted(&self, account_id: &str) -> Result<(), RegistryError> {
        let removed = self.connections.delete_connections_by_scope(account_id).await?;
        for connection in &removed {
            self.cache
                .remove(&connection.scope_id, &connection.id, &connection.client_id)
                .await?;
        }
        info!(
            target: "kapua.registry",
            scope_id = %account_id,
            removed = removed.len(),
            "account_connections_deleted"
        );
        Ok(())
    }

    async fn on_user_deleted(&self, scope_id: &str, user_id: &str) -> Result<(), RegistryError> {
        let query = ConnectionOptionQuery {
            reserved_user_id: Some(user_id.to_string()),
            ..ConnectionOptionQuery::new(scope_id)
        };
        let held = self.options.query_options(&query).await?;
        for option in held {
            let id = option.id.as_str();
            self.with_retry(move || self.release_reservation(scope_id, id, user_id))
                .await?;
            info!(
                target: "kapua.registry",
                scope_id = %scope_id,
                connection_id = %option.id,
                user_id = %user_id,
                "reservation_released"
            );
        }
        Ok(())
    }

    async fn release_reservation(
        &self,
        scope_id: &str,
        id: &str,
        user_id: &str,
    ) -> Result<(), StorageError> {
        let Some(option) = self.options.find_option(scope_id, id).await? else {
            return Ok(());
        };
        if option.reserved_user_id.as_deref() != Some(user_id) {
            return Ok(());
        }
        let connection = self.connections.find_connection(scope_id, id).await?;
        if let Some(connection) = &connection {
            self.cache
                .remove(scope_id, &connection.id, &connection.client_id)
                .await?;
        }
        let released = DeviceConnectionOption {
            reserved_user_id: None,
            allow_user_change: false,
            ..option
        };
        self.options.update_option(released, "system").await?;
        if let Some(connection) = &connection {
            self.evict(scope_id, &connection.id, &connection.client_id)
                .await;
        }
        Ok(())
    }
}
