//! Write paths: posting, following and unfollowing.
//!
//! The acting user must exist in the record store; an unknown actor is
//! NotFound and nothing is written.
//!
//! The record store is written first and the derived caches after it. A
//! cache failure after a successful insert is reported to the caller but the
//! insert stays; the next bake repairs the derived views.

use std::sync::Arc;

use tracing::info;

use crate::application::directory::UserDirectory;
use crate::application::error::AppError;
use crate::application::follows::FollowGraph;
use crate::application::repos::{NewPost, PostsWriteRepo};
use crate::cache::Caches;
use crate::domain::entities::{PostRecord, UserRecord};
use crate::domain::error::DomainError;
use crate::domain::posts::{author_line, format_timestamp, render_body};

#[derive(Clone)]
pub struct ActivityService {
    writer: Arc<dyn PostsWriteRepo>,
    directory: Arc<UserDirectory>,
    graph: Arc<dyn FollowGraph>,
    caches: Caches,
}

impl ActivityService {
    pub fn new(
        writer: Arc<dyn PostsWriteRepo>,
        directory: Arc<UserDirectory>,
        graph: Arc<dyn FollowGraph>,
        caches: Caches,
    ) -> Self {
        Self {
            writer,
            directory,
            graph,
            caches,
        }
    }

    pub async fn post(&self, author: &str, text: &str) -> Result<PostRecord, AppError> {
        if text.trim().is_empty() {
            return Err(DomainError::EmptyPost.into());
        }
        let user = self.known_user(author).await?;

        let record = self
            .writer
            .insert_post(NewPost {
                user_id: user.id,
                body: text.to_string(),
            })
            .await?;

        let timestamp = format_timestamp(record.created_at);
        let html = render_body(&record.body);
        self.caches
            .author
            .append_post(&user.name, &author_line(&timestamp, &html))
            .await?;
        let tags = self
            .caches
            .hashtags
            .index_all(&user.name, &timestamp, &record.body, &html)
            .await?;
        self.caches.home.invalidate(&user.name).await?;

        info!(
            target = "warbler::application::activity",
            author = %user.name,
            post_id = record.id,
            tags,
            "post created"
        );
        Ok(record)
    }

    pub async fn follow(&self, actor: &str, target: &str) -> Result<(), AppError> {
        let actor = self.known_user(actor).await?;
        let target = self.known_user(target).await?;
        self.graph.follow(&actor.name, &target.name).await?;
        self.caches.home.invalidate(&actor.name).await?;
        Ok(())
    }

    pub async fn unfollow(&self, actor: &str, target: &str) -> Result<(), AppError> {
        let actor = self.known_user(actor).await?;
        let target = self.known_user(target).await?;
        self.graph.unfollow(&actor.name, &target.name).await?;
        self.caches.home.invalidate(&actor.name).await?;
        Ok(())
    }

    async fn known_user(&self, name: &str) -> Result<UserRecord, AppError> {
        self.directory
            .find_by_name(name)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user `{name}`")))
    }
}
