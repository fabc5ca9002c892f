use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::application::repos::{NewPost, PostsRepo, PostsWriteRepo, RepoError};
use crate::domain::entities::{PostRecord, UserId};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(Debug, FromRow)]
struct PostRow {
    id: i64,
    user_id: i64,
    body: String,
    created_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    fn scan_posts(
        &self,
        before: Option<OffsetDateTime>,
    ) -> BoxStream<'_, Result<PostRecord, RepoError>> {
        let stream = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, user_id, body, created_at
            FROM posts
            WHERE ($1::timestamptz IS NULL OR created_at < $1)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(before)
        .fetch(self.pool())
        .map(|row| row.map(PostRecord::from).map_err(map_sqlx_error));

        Box::pin(stream)
    }

    fn scan_posts_ascending(&self) -> BoxStream<'_, Result<PostRecord, RepoError>> {
        let stream = sqlx::query_as::<_, PostRow>(
            "SELECT id, user_id, body, created_at FROM posts ORDER BY created_at ASC, id ASC",
        )
        .fetch(self.pool())
        .map(|row| row.map(PostRecord::from).map_err(map_sqlx_error));

        Box::pin(stream)
    }

    async fn list_by_author(
        &self,
        user_id: UserId,
        before: Option<OffsetDateTime>,
        limit: usize,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, user_id, body, created_at
            FROM posts
            WHERE user_id = $1
              AND ($2::timestamptz IS NULL OR created_at < $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(before)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn insert_post(&self, post: NewPost) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            INSERT INTO posts (user_id, body, created_at)
            VALUES ($1, $2, now())
            RETURNING id, user_id, body, created_at
            "#,
        )
        .bind(post.user_id)
        .bind(post.body)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }
}
