use async_trait::async_trait;
use sqlx::FromRow;

use crate::application::repos::{RepoError, UsersRepo};
use crate::domain::entities::{UserId, UserRecord};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserRecord::from))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<UserRecord>, RepoError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name FROM users WHERE name = $1")
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserRecord::from))
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT id, name FROM users ORDER BY id")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(UserRecord::from).collect())
    }
}
