use async_trait::async_trait;
use sqlx::FromRow;

use crate::application::repos::{
    LegacyFollowsRepo, RepoError, SeedBoundary, SeedRepo, TruncateReport,
};
use crate::domain::entities::LegacyFollowRow;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct LegacyFriendsRow {
    me: String,
    friends: String,
}

#[async_trait]
impl SeedRepo for PostgresRepositories {
    async fn truncate_above(&self, boundary: SeedBoundary) -> Result<TruncateReport, RepoError> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx_error)?;

        let posts = sqlx::query("DELETE FROM posts WHERE id > $1")
            .bind(boundary.post_cutoff)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        let users = sqlx::query("DELETE FROM users WHERE id > $1")
            .bind(boundary.user_cutoff)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .rows_affected();

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(TruncateReport { posts, users })
    }
}

#[async_trait]
impl LegacyFollowsRepo for PostgresRepositories {
    async fn list_legacy_follows(&self) -> Result<Vec<LegacyFollowRow>, RepoError> {
        let rows = sqlx::query_as::<_, LegacyFriendsRow>(
            "SELECT me, friends FROM legacy_friends ORDER BY id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| LegacyFollowRow {
                me: row.me,
                friends: row.friends,
            })
            .collect())
    }
}
