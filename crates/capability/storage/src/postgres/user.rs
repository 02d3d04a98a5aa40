//! Postgres 用户存储实现

use crate::error::StorageError;
use crate::models::UserRecord;
use crate::traits::UserStore;
use sqlx::{PgPool, Row};

pub struct PgUserStore {
    pub pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn find_user(
        &self,
        scope_id: &str,
        user_id: &str,
    ) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(
            "select scope_id, user_id, username from users \
             where scope_id = $1 and user_id = $2",
        )
        .bind(scope_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(UserRecord {
            scope_id: row.try_get("scope_id")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
        }))
    }
}
