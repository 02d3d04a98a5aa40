//! Postgres 设备连接 / 连接选项存储实现
//!
//! 写操作以 `optlock` 做乐观锁：`where optlock = $n`，未命中时区分
//! 记录不存在（`NotFound`）与版本过期（`Conflict`）。

use crate::error::StorageError;
use crate::models::{
    AuditFields, ConnectionOptionQuery, ConnectionSnapshot, DeviceConnection,
    DeviceConnectionOption, DeviceConnectionQuery, NewDeviceConnection, now_epoch_ms,
};
use crate::traits::{DeviceConnectionOptionStore, DeviceConnectionStore};
use crate::validation::{ensure_id, ensure_scope};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

const CLIENT_ID_CONSTRAINT: &str = "uq_device_connections_scope_client";
const RESERVED_USER_CONSTRAINT: &str = "uq_device_connection_options_reserved_user";

const CONNECTION_COLUMNS: &str = "id, scope_id, client_id, status, user_id, protocol, \
     client_ip, server_ip, created_on_ms, created_by, modified_on_ms, modified_by, optlock";

const OPTION_COLUMNS: &str = "id, scope_id, user_coupling_mode, reserved_user_id, \
     allow_user_change, trust_key, trust_expiration_ms, created_on_ms, created_by, \
     modified_on_ms, modified_by, optlock";

pub struct PgDeviceConnectionStore {
    pub pool: PgPool,
}

impl PgDeviceConnectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }

    async fn current_optlock(
        &self,
        table: &'static str,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<i32>, StorageError> {
        let sql = format!("select optlock from {table} where scope_id = $1 and id = $2");
        let row = sqlx::query(&sql)
            .bind(scope_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("optlock")?)),
            None => Ok(None),
        }
    }

    async fn reservation_holder(
        &self,
        scope_id: &str,
        user_id: &str,
    ) -> Result<Option<String>, StorageError> {
        let row = sqlx::query(
            "select id from device_connection_options \
             where scope_id = $1 and reserved_user_id = $2",
        )
        .bind(scope_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("id")?)),
            None => Ok(None),
        }
    }

    /// 乐观锁更新未命中时的错误
    async fn missed_update(
        &self,
        table: &'static str,
        entity: &'static str,
        scope_id: &str,
        id: String,
        expected: i32,
    ) -> StorageError {
        match self.current_optlock(table, scope_id, &id).await {
            Ok(Some(actual)) => {
                debug!(
                    target: "kapua.storage",
                    entity,
                    scope_id,
                    id = %id,
                    expected,
                    actual,
                    "optlock_conflict"
                );
                StorageError::Conflict {
                    entity,
                    id,
                    expected,
                }
            }
            Ok(None) => StorageError::not_found(entity, id),
            Err(err) => {
                warn!(
                    target: "kapua.storage",
                    entity,
                    scope_id,
                    id = %id,
                    error = %err,
                    "optlock_lookup_failed"
                );
                err
            }
        }
    }
}

fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db) => db.constraint(),
        _ => None,
    }
}

fn audit_from_row(row: &PgRow, prefix: &str) -> Result<AuditFields, StorageError> {
    Ok(AuditFields {
        created_on_ms: row.try_get(format!("{prefix}created_on_ms").as_str())?,
        created_by: row.try_get(format!("{prefix}created_by").as_str())?,
        modified_on_ms: row.try_get(format!("{prefix}modified_on_ms").as_str())?,
        modified_by: row.try_get(format!("{prefix}modified_by").as_str())?,
        optlock: row.try_get(format!("{prefix}optlock").as_str())?,
        created_by_name: None,
        modified_by_name: None,
    })
}

fn connection_from_row(row: &PgRow) -> Result<DeviceConnection, StorageError> {
    let status: String = row.try_get("status")?;
    Ok(DeviceConnection {
        id: row.try_get("id")?,
        scope_id: row.try_get("scope_id")?,
        client_id: row.try_get("client_id")?,
        status: status.parse()?,
        user_id: row.try_get("user_id")?,
        protocol: row.try_get("protocol")?,
        client_ip: row.try_get("client_ip")?,
        server_ip: row.try_get("server_ip")?,
        audit: audit_from_row(row, "")?,
    })
}

fn option_from_row(row: &PgRow, prefix: &str) -> Result<DeviceConnectionOption, StorageError> {
    let column = |name: &str| format!("{prefix}{name}");
    let mode: String = row.try_get(column("user_coupling_mode").as_str())?;
    Ok(DeviceConnectionOption {
        id: row.try_get(column("id").as_str())?,
        scope_id: row.try_get(column("scope_id").as_str())?,
        user_coupling_mode: mode.parse()?,
        reserved_user_id: row.try_get(column("reserved_user_id").as_str())?,
        allow_user_change: row.try_get(column("allow_user_change").as_str())?,
        trust_key: row.try_get(column("trust_key").as_str())?,
        trust_expiration_ms: row.try_get(column("trust_expiration_ms").as_str())?,
        audit: audit_from_row(row, prefix)?,
    })
}

fn page_limit(limit: Option<usize>) -> Option<i64> {
    limit.map(|value| value as i64)
}

#[async_trait::async_trait]
impl DeviceConnectionStore for PgDeviceConnectionStore {
    async fn create_connection(
        &self,
        record: NewDeviceConnection,
    ) -> Result<ConnectionSnapshot, StorageError> {
        ensure_scope(&record.scope_id)?;
        ensure_id("id", &record.id)?;
        ensure_id("client_id", &record.client_id)?;
        let (connection, option) = record.into_records(now_epoch_ms());
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "insert into device_connections (id, scope_id, client_id, status, user_id, \
             protocol, client_ip, server_ip, created_on_ms, created_by, modified_on_ms, \
             modified_by, optlock) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(&connection.id)
        .bind(&connection.scope_id)
        .bind(&connection.client_id)
        .bind(connection.status.as_str())
        .bind(&connection.user_id)
        .bind(&connection.protocol)
        .bind(&connection.client_ip)
        .bind(&connection.server_ip)
        .bind(connection.audit.created_on_ms)
        .bind(&connection.audit.created_by)
        .bind(connection.audit.modified_on_ms)
        .bind(&connection.audit.modified_by)
        .bind(connection.audit.optlock)
        .execute(&mut *tx)
        .await;
        if let Err(err) = inserted {
            let duplicate = matches!(
                violated_constraint(&err),
                Some(CLIENT_ID_CONSTRAINT) | Some("device_connections_pkey")
            );
            if duplicate {
                debug!(
                    target: "kapua.storage",
                    scope_id = %connection.scope_id,
                    client_id = %connection.client_id,
                    "device_connection_duplicate"
                );
                return Err(StorageError::Duplicate {
                    entity: "device_connection",
                    key: connection.client_id,
                });
            }
            return Err(err.into());
        }
        sqlx::query(
            "insert into device_connection_options (id, scope_id, user_coupling_mode, \
             reserved_user_id, allow_user_change, trust_key, trust_expiration_ms, \
             created_on_ms, created_by, modified_on_ms, modified_by, optlock) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(&option.id)
        .bind(&option.scope_id)
        .bind(option.user_coupling_mode.as_str())
        .bind(&option.reserved_user_id)
        .bind(option.allow_user_change)
        .bind(&option.trust_key)
        .bind(option.trust_expiration_ms)
        .bind(option.audit.created_on_ms)
        .bind(&option.audit.created_by)
        .bind(option.audit.modified_on_ms)
        .bind(&option.audit.modified_by)
        .bind(option.audit.optlock)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(ConnectionSnapshot { connection, option })
    }

    async fn find_connection(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnection>, StorageError> {
        ensure_scope(scope_id)?;
        let sql = format!(
            "select {CONNECTION_COLUMNS} from device_connections where scope_id = $1 and id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(scope_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(connection_from_row).transpose()
    }

    async fn find_snapshot_by_client_id(
        &self,
        scope_id: &str,
        client_id: &str,
    ) -> Result<Option<ConnectionSnapshot>, StorageError> {
        ensure_scope(scope_id)?;
        let row = sqlx::query(
            "select c.id, c.scope_id, c.client_id, c.status, c.user_id, c.protocol, \
             c.client_ip, c.server_ip, c.created_on_ms, c.created_by, c.modified_on_ms, \
             c.modified_by, c.optlock, \
             o.id as o_id, o.scope_id as o_scope_id, \
             o.user_coupling_mode as o_user_coupling_mode, \
             o.reserved_user_id as o_reserved_user_id, \
             o.allow_user_change as o_allow_user_change, o.trust_key as o_trust_key, \
             o.trust_expiration_ms as o_trust_expiration_ms, \
             o.created_on_ms as o_created_on_ms, o.created_by as o_created_by, \
             o.modified_on_ms as o_modified_on_ms, o.modified_by as o_modified_by, \
             o.optlock as o_optlock \
             from device_connections c \
             join device_connection_options o on o.id = c.id \
             where c.scope_id = $1 and c.client_id = $2",
        )
        .bind(scope_id)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ConnectionSnapshot {
            connection: connection_from_row(&row)?,
            option: option_from_row(&row, "o_")?,
        }))
    }

    async fn query_connections(
        &self,
        query: &DeviceConnectionQuery,
    ) -> Result<Vec<DeviceConnection>, StorageError> {
        ensure_scope(&query.scope_id)?;
        let sql = format!(
            "select {CONNECTION_COLUMNS} from device_connections \
             where scope_id = $1 \
             and ($2::text is null or client_id = $2) \
             and ($3::text is null or status = $3) \
             and ($4::text is null or user_id = $4) \
             order by client_id limit $5 offset $6"
        );
        let rows = sqlx::query(&sql)
            .bind(&query.scope_id)
            .bind(&query.client_id)
            .bind(query.status.map(|status| status.as_str()))
            .bind(&query.user_id)
            .bind(page_limit(query.limit))
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(connection_from_row).collect()
    }

    async fn count_connections(&self, query: &DeviceConnectionQuery) -> Result<u64, StorageError> {
        ensure_scope(&query.scope_id)?;
        let row = sqlx::query(
            "select count(*) as total from device_connections \
             where scope_id = $1 \
             and ($2::text is null or client_id = $2) \
             and ($3::text is null or status = $3) \
             and ($4::text is null or user_id = $4)",
        )
        .bind(&query.scope_id)
        .bind(&query.client_id)
        .bind(query.status.map(|status| status.as_str()))
        .bind(&query.user_id)
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total as u64)
    }

    async fn update_connection(
        &self,
        record: DeviceConnection,
        modified_by: &str,
    ) -> Result<DeviceConnection, StorageError> {
        ensure_scope(&record.scope_id)?;
        let sql = format!(
            "update device_connections set \
             status = $1, user_id = $2, protocol = $3, client_ip = $4, server_ip = $5, \
             modified_on_ms = $6, modified_by = $7, optlock = optlock + 1 \
             where scope_id = $8 and id = $9 and optlock = $10 \
             returning {CONNECTION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(record.status.as_str())
            .bind(&record.user_id)
            .bind(&record.protocol)
            .bind(&record.client_ip)
            .bind(&record.server_ip)
            .bind(now_epoch_ms())
            .bind(modified_by)
            .bind(&record.scope_id)
            .bind(&record.id)
            .bind(record.audit.optlock)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => connection_from_row(&row),
            None => Err(self
                .missed_update(
                    "device_connections",
                    "device_connection",
                    &record.scope_id,
                    record.id,
                    record.audit.optlock,
                )
                .await),
        }
    }

    async fn delete_connection(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnection>, StorageError> {
        ensure_scope(scope_id)?;
        let sql = format!(
            "delete from device_connections where scope_id = $1 and id = $2 \
             returning {CONNECTION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(scope_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(connection_from_row).transpose()
    }

    async fn delete_connections_by_scope(
        &self,
        scope_id: &str,
    ) -> Result<Vec<DeviceConnection>, StorageError> {
        ensure_scope(scope_id)?;
        let sql = format!(
            "delete from device_connections where scope_id = $1 returning {CONNECTION_COLUMNS}"
        );
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(&sql)
            .bind(scope_id)
            .fetch_all(&mut *tx)
            .await?;
        let removed = rows
            .iter()
            .map(connection_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        tx.commit().await?;
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl DeviceConnectionOptionStore for PgDeviceConnectionStore {
    async fn find_option(
        &self,
        scope_id: &str,
        id: &str,
    ) -> Result<Option<DeviceConnectionOption>, StorageError> {
        ensure_scope(scope_id)?;
        let sql = format!(
            "select {OPTION_COLUMNS} from device_connection_options \
             where scope_id = $1 and id = $2"
        );
        let row = sqlx::query(&sql)
            .bind(scope_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(|row| option_from_row(row, ""))
            .transpose()
    }

    async fn query_options(
        &self,
        query: &ConnectionOptionQuery,
    ) -> Result<Vec<DeviceConnectionOption>, StorageError> {
        ensure_scope(&query.scope_id)?;
        let sql = format!(
            "select {OPTION_COLUMNS} from device_connection_options \
             where scope_id = $1 \
             and ($2::text is null or reserved_user_id = $2) \
             and ($3::text is null or user_coupling_mode = $3) \
             and ($4::text is null or id <> $4) \
             order by id limit $5 offset $6"
        );
        let rows = sqlx::query(&sql)
            .bind(&query.scope_id)
            .bind(&query.reserved_user_id)
            .bind(query.coupling_mode.map(|mode| mode.as_str()))
            .bind(&query.exclude_id)
            .bind(page_limit(query.limit))
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| option_from_row(row, "")).collect()
    }

    async fn count_options(&self, query: &ConnectionOptionQuery) -> Result<u64, StorageError> {
        ensure_scope(&query.scope_id)?;
        let row = sqlx::query(
            "select count(*) as total from device_connection_options \
             where scope_id = $1 \
             and ($2::text is null or reserved_user_id = $2) \
             and ($3::text is null or user_coupling_mode = $3) \
             and ($4::text is null or id <> $4)",
        )
        .bind(&query.scope_id)
        .bind(&query.reserved_user_id)
        .bind(query.coupling_mode.map(|mode| mode.as_str()))
        .bind(&query.exclude_id)
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total as u64)
    }

    async fn update_option(
        &self,
        record: DeviceConnectionOption,
        modified_by: &str,
    ) -> Result<DeviceConnectionOption, StorageError> {
        ensure_scope(&record.scope_id)?;
        let sql = format!(
            "update device_connection_options set \
             user_coupling_mode = $1, reserved_user_id = $2, allow_user_change = $3, \
             trust_key = $4, trust_expiration_ms = $5, \
             modified_on_ms = $6, modified_by = $7, optlock = optlock + 1 \
             where scope_id = $8 and id = $9 and optlock = $10 \
             returning {OPTION_COLUMNS}"
        );
        let result = sqlx::query(&sql)
            .bind(record.user_coupling_mode.as_str())
            .bind(&record.reserved_user_id)
            .bind(record.allow_user_change)
            .bind(&record.trust_key)
            .bind(record.trust_expiration_ms)
            .bind(now_epoch_ms())
            .bind(modified_by)
            .bind(&record.scope_id)
            .bind(&record.id)
            .bind(record.audit.optlock)
            .fetch_optional(&self.pool)
            .await;
        let row = match result {
            Ok(row) => row,
            Err(err) if violated_constraint(&err) == Some(RESERVED_USER_CONSTRAINT) => {
                let user_id = record.reserved_user_id.unwrap_or_default();
                let connection_id = self
                    .reservation_holder(&record.scope_id, &user_id)
                    .await?
                    .unwrap_or_default();
                debug!(
                    target: "kapua.storage",
                    scope_id = %record.scope_id,
                    user_id = %user_id,
                    holder = %connection_id,
                    "reserved_user_constraint_violated"
                );
                return Err(StorageError::UserAlreadyReserved {
                    scope_id: record.scope_id,
                    user_id,
                    connection_id,
                });
            }
            Err(err) => return Err(err.into()),
        };
        match row {
            Some(row) => option_from_row(&row, ""),
            None => Err(self
                .missed_update(
                    "device_connection_options",
                    "device_connection_option",
                    &record.scope_id,
                    record.id,
                    record.audit.optlock,
                )
                .await),
        }
    }
}
