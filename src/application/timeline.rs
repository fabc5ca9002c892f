//! Read paths: home feed, author page, search.
//!
//! Each read asks the narrowest cache that can answer it and falls back to
//! the record store otherwise. Only the cursor-less home page is ever written
//! back; concurrent misses for the same viewer may both compose and both
//! store, and the last write wins.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::TryStreamExt;
use metrics::counter;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::directory::UserDirectory;
use crate::application::error::AppError;
use crate::application::follows::FollowGraph;
use crate::application::repos::PostsRepo;
use crate::cache::Caches;
use crate::domain::entities::UserRecord;
use crate::domain::posts::{TimelineEntry, extract_hashtags};
use crate::presentation::views::render_post_list;

#[derive(Debug, Clone)]
pub struct AuthorPage {
    pub author: UserRecord,
    pub is_own: bool,
    pub is_following: bool,
    /// Rendered post list fragment.
    pub posts_html: String,
}

#[derive(Debug, Clone)]
pub struct SearchPage {
    pub query: String,
    pub posts_html: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SearchQuery<'a> {
    Empty,
    Tag(&'a str),
    Text(&'a str),
}

impl<'a> SearchQuery<'a> {
    fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim();
        match trimmed.strip_prefix('#') {
            Some(tag) if !tag.is_empty() && !tag.contains(char::is_whitespace) => Self::Tag(tag),
            _ if trimmed.is_empty() => Self::Empty,
            _ => Self::Text(trimmed),
        }
    }

    fn matches(&self, body: &str) -> bool {
        match self {
            Self::Empty => false,
            Self::Tag(tag) => extract_hashtags(body).iter().any(|found| found == tag),
            Self::Text(text) => body.contains(text),
        }
    }
}

#[derive(Clone)]
pub struct TimelineService {
    posts: Arc<dyn PostsRepo>,
    directory: Arc<UserDirectory>,
    graph: Arc<dyn FollowGraph>,
    caches: Caches,
    page_size: usize,
}

impl TimelineService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        directory: Arc<UserDirectory>,
        graph: Arc<dyn FollowGraph>,
        caches: Caches,
        page_size: usize,
    ) -> Self {
        Self {
            posts,
            directory,
            graph,
            caches,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// The viewer's home feed fragment. An unknown viewer is NotFound and no
    /// cache entry is created for it.
    ///
    /// Without a cursor the cached page is returned, or composed and stored
    /// on a miss. With a cursor the page is composed from the record store and
    /// never cached.
    pub async fn home(
        &self,
        viewer: &str,
        cursor: Option<OffsetDateTime>,
    ) -> Result<String, AppError> {
        let record = self
            .directory
            .find_by_name(viewer)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user `{viewer}`")))?;
        let viewer = record.name.as_str();

        if cursor.is_none()
            && let Some(cached) = self.caches.home.get(viewer).await?
        {
            return Ok(cached);
        }

        let followees = self.graph.followees(viewer).await?;
        let entries = self.compose_home(&followees, cursor).await?;
        let fragment = render_post_list(&entries)?;

        if cursor.is_none() {
            self.caches.home.put(viewer, &fragment).await?;
        }
        Ok(fragment)
    }

    async fn compose_home(
        &self,
        followees: &BTreeSet<String>,
        cursor: Option<OffsetDateTime>,
    ) -> Result<Vec<TimelineEntry>, AppError> {
        let mut entries = Vec::with_capacity(self.page_size);
        if followees.is_empty() {
            return Ok(entries);
        }

        let mut stream = self.posts.scan_posts(cursor);
        while let Some(post) = stream.try_next().await? {
            let Some(author) = self.directory.name_of(post.user_id).await? else {
                continue;
            };
            if !followees.contains(&author) {
                continue;
            }
            entries.push(TimelineEntry::from_record(&author, &post));
            if entries.len() >= self.page_size {
                break;
            }
        }
        Ok(entries)
    }

    /// An author's page. The recent window comes from the author timeline
    /// cache; older pages come from the record store.
    pub async fn author(
        &self,
        viewer: Option<&str>,
        author: &str,
        cursor: Option<OffsetDateTime>,
    ) -> Result<AuthorPage, AppError> {
        let record = self
            .directory
            .find_by_name(author)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user `{author}`")))?;

        let entries = match cursor {
            None => self
                .caches
                .author
                .recent_posts(&record.name, self.page_size)
                .await?
                .iter()
                .map(|line| TimelineEntry::from_author_line(&record.name, line))
                .collect::<Result<Vec<_>, _>>()?,
            Some(before) => self
                .posts
                .list_by_author(record.id, Some(before), self.page_size)
                .await?
                .iter()
                .map(|post| TimelineEntry::from_record(&record.name, post))
                .collect(),
        };

        let is_own = viewer == Some(record.name.as_str());
        let is_following = match viewer {
            Some(viewer) if !is_own => self.graph.followees(viewer).await?.contains(&record.name),
            _ => false,
        };

        Ok(AuthorPage {
            posts_html: render_post_list(&entries)?,
            author: record,
            is_own,
            is_following,
        })
    }

    /// Search by `#tag` or free text.
    ///
    /// A cursor-less tag query is answered by the hashtag index. Everything
    /// else scans the record store newest first and stops once a page is full,
    /// so a rare match costs up to a full scan.
    pub async fn search(
        &self,
        raw_query: &str,
        cursor: Option<OffsetDateTime>,
    ) -> Result<SearchPage, AppError> {
        let query = SearchQuery::parse(raw_query);
        let entries = match (&query, cursor) {
            (SearchQuery::Empty, _) => Vec::new(),
            (SearchQuery::Tag(tag), None) => self
                .caches
                .hashtags
                .recent_by_tag(tag, self.page_size)
                .await?
                .iter()
                .map(|line| TimelineEntry::from_hashtag_line(line))
                .collect::<Result<Vec<_>, _>>()?,
            (_, cursor) => self.scan_matches(&query, cursor).await?,
        };

        Ok(SearchPage {
            query: raw_query.trim().to_string(),
            posts_html: render_post_list(&entries)?,
        })
    }

    async fn scan_matches(
        &self,
        query: &SearchQuery<'_>,
        cursor: Option<OffsetDateTime>,
    ) -> Result<Vec<TimelineEntry>, AppError> {
        let mut entries = Vec::with_capacity(self.page_size);
        let mut scanned: u64 = 0;

        let mut stream = self.posts.scan_posts(cursor);
        while let Some(post) = stream.try_next().await? {
            scanned += 1;
            if !query.matches(&post.body) {
                continue;
            }
            let Some(author) = self.directory.name_of(post.user_id).await? else {
                continue;
            };
            entries.push(TimelineEntry::from_record(&author, &post));
            if entries.len() >= self.page_size {
                break;
            }
        }

        counter!("warbler_search_scan_rows_total").increment(scanned);
        debug!(
            target = "warbler::application::timeline",
            scanned,
            matched = entries.len(),
            "search scan finished"
        );
        Ok(entries)
    }
}
