#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use time::{OffsetDateTime, macros::datetime};
use warbler::application::activity::ActivityService;
use warbler::application::directory::UserDirectory;
use warbler::application::follows::FollowGraph;
use warbler::application::rebuild::{RebuildController, RebuildParts};
use warbler::application::repos::{
    HealthRepo, LegacyFollowsRepo, NewPost, PostsRepo, PostsWriteRepo, RepoError, SeedBoundary,
    SeedRepo, TruncateReport, UsersRepo,
};
use warbler::application::timeline::TimelineService;
use warbler::cache::{CacheEngine, Caches, EngineSupervisor, MemoryEngine, SnapshotFiles};
use warbler::domain::entities::{LegacyFollowRow, PostRecord, UserId, UserRecord};

pub const PAGE_SIZE: usize = 50;

#[derive(Default)]
struct StoreState {
    users: Vec<UserRecord>,
    posts: Vec<PostRecord>,
    legacy: Vec<LegacyFollowRow>,
    next_post_id: i64,
}

/// Record store kept in memory. Every inserted post is one second newer than
/// the previous one so ordering and cursors are deterministic.
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    reads: AtomicUsize,
    fail_scans: AtomicBool,
}

impl InMemoryStore {
    pub fn with_users(names: &[&str]) -> Self {
        let users = names
            .iter()
            .enumerate()
            .map(|(idx, name)| UserRecord {
                id: idx as i64 + 1,
                name: (*name).to_string(),
            })
            .collect();
        Self {
            state: Mutex::new(StoreState {
                users,
                next_post_id: 1,
                ..StoreState::default()
            }),
            reads: AtomicUsize::new(0),
            fail_scans: AtomicBool::new(false),
        }
    }

    pub fn add_user(&self, name: &str) -> UserId {
        let mut state = self.state.lock().expect("store lock");
        let id = state.users.iter().map(|user| user.id).max().unwrap_or(0) + 1;
        state.users.push(UserRecord {
            id,
            name: name.to_string(),
        });
        id
    }

    pub fn add_legacy_follows(&self, me: &str, friends: &str) {
        self.state
            .lock()
            .expect("store lock")
            .legacy
            .push(LegacyFollowRow {
                me: me.to_string(),
                friends: friends.to_string(),
            });
    }

    pub fn post_count(&self) -> usize {
        self.state.lock().expect("store lock").posts.len()
    }

    pub fn user_names(&self) -> Vec<String> {
        self.state
            .lock()
            .expect("store lock")
            .users
            .iter()
            .map(|user| user.name.clone())
            .collect()
    }

    /// Number of post reads (scans and author listings) served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_scans(&self, fail: bool) {
        self.fail_scans.store(fail, Ordering::SeqCst);
    }

    fn sorted_posts(&self, descending: bool) -> Vec<PostRecord> {
        let mut posts = self.state.lock().expect("store lock").posts.clone();
        posts.sort_by_key(|post| (post.created_at, post.id));
        if descending {
            posts.reverse();
        }
        posts
    }

    fn stream(&self, posts: Vec<PostRecord>) -> BoxStream<'_, Result<PostRecord, RepoError>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_scans.load(Ordering::SeqCst) {
            return futures::stream::iter(vec![Err(RepoError::from_persistence(
                "scan failed",
            ))])
            .boxed();
        }
        futures::stream::iter(posts.into_iter().map(Ok)).boxed()
    }
}

#[async_trait]
impl UsersRepo for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().expect("store lock");
        Ok(state.users.iter().find(|user| user.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<UserRecord>, RepoError> {
        let state = self.state.lock().expect("store lock");
        Ok(state.users.iter().find(|user| user.name == name).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError> {
        Ok(self.state.lock().expect("store lock").users.clone())
    }
}

#[async_trait]
impl PostsRepo for InMemoryStore {
    fn scan_posts(
        &self,
        before: Option<OffsetDateTime>,
    ) -> BoxStream<'_, Result<PostRecord, RepoError>> {
        let posts = self
            .sorted_posts(true)
            .into_iter()
            .filter(|post| before.is_none_or(|cursor| post.created_at < cursor))
            .collect();
        self.stream(posts)
    }

    fn scan_posts_ascending(&self) -> BoxStream<'_, Result<PostRecord, RepoError>> {
        let posts = self.sorted_posts(false);
        self.stream(posts)
    }

    async fn list_by_author(
        &self,
        user_id: UserId,
        before: Option<OffsetDateTime>,
        limit: usize,
    ) -> Result<Vec<PostRecord>, RepoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .sorted_posts(true)
            .into_iter()
            .filter(|post| post.user_id == user_id)
            .filter(|post| before.is_none_or(|cursor| post.created_at < cursor))
            .take(limit)
            .collect())
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryStore {
    async fn insert_post(&self, post: NewPost) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().expect("store lock");
        let id = state.next_post_id;
        state.next_post_id += 1;
        let record = PostRecord {
            id,
            user_id: post.user_id,
            body: post.body,
            created_at: datetime!(2017-10-21 00:00:00 UTC) + Duration::from_secs(id as u64),
        };
        state.posts.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl SeedRepo for InMemoryStore {
    async fn truncate_above(&self, boundary: SeedBoundary) -> Result<TruncateReport, RepoError> {
        let mut state = self.state.lock().expect("store lock");
        let posts_before = state.posts.len();
        let users_before = state.users.len();
        state.posts.retain(|post| post.id <= boundary.post_cutoff);
        state.users.retain(|user| user.id <= boundary.user_cutoff);
        Ok(TruncateReport {
            posts: (posts_before - state.posts.len()) as u64,
            users: (users_before - state.users.len()) as u64,
        })
    }
}

#[async_trait]
impl LegacyFollowsRepo for InMemoryStore {
    async fn list_legacy_follows(&self) -> Result<Vec<LegacyFollowRow>, RepoError> {
        Ok(self.state.lock().expect("store lock").legacy.clone())
    }
}

#[async_trait]
impl HealthRepo for InMemoryStore {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Services wired the way `main` wires them, over the in-memory store and
/// an in-process engine with a cache-backed follow graph.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub engine: Arc<MemoryEngine>,
    pub caches: Caches,
    pub directory: Arc<UserDirectory>,
    pub graph: Arc<dyn FollowGraph>,
    pub timelines: Arc<TimelineService>,
    pub activity: Arc<ActivityService>,
}

impl Harness {
    pub async fn new(users: &[&str]) -> Self {
        Self::with_engine(users, Arc::new(MemoryEngine::new())).await
    }

    pub async fn with_engine(users: &[&str], engine: Arc<MemoryEngine>) -> Self {
        let store = Arc::new(InMemoryStore::with_users(users));
        let cache_engine: Arc<dyn CacheEngine> = engine.clone();
        let caches = Caches::new(cache_engine);
        let graph: Arc<dyn FollowGraph> = Arc::new(caches.graph.clone());

        let directory = Arc::new(UserDirectory::new(store.clone()));
        directory.reload().await.expect("directory loads");

        let timelines = Arc::new(TimelineService::new(
            store.clone(),
            directory.clone(),
            graph.clone(),
            caches.clone(),
            PAGE_SIZE,
        ));
        let activity = Arc::new(ActivityService::new(
            store.clone(),
            directory.clone(),
            graph.clone(),
            caches.clone(),
        ));

        Self {
            store,
            engine,
            caches,
            directory,
            graph,
            timelines,
            activity,
        }
    }

    pub fn rebuild(&self, snapshots: SnapshotFiles, boundary: SeedBoundary) -> RebuildController {
        let supervisor: Arc<dyn EngineSupervisor> = self.engine.clone();
        self.rebuild_with_supervisor(snapshots, boundary, supervisor, Duration::from_secs(2))
    }

    pub fn rebuild_with_supervisor(
        &self,
        snapshots: SnapshotFiles,
        boundary: SeedBoundary,
        supervisor: Arc<dyn EngineSupervisor>,
        engine_timeout: Duration,
    ) -> RebuildController {
        RebuildController::new(RebuildParts {
            seed: self.store.clone(),
            legacy_follows: self.store.clone(),
            posts: self.store.clone(),
            directory: self.directory.clone(),
            graph: self.graph.clone(),
            engine: self.engine.clone(),
            supervisor,
            snapshots,
            boundary,
            stop_timeout: engine_timeout,
            start_timeout: engine_timeout,
        })
    }
}

/// Extract `(author, body html)` pairs from a rendered post list, in order.
pub fn rendered_posts(fragment: &str) -> Vec<(String, String)> {
    fragment
        .split(r#"<div class="post">"#)
        .skip(1)
        .filter_map(|chunk| {
            let author_block = between(chunk, r#"<div class="author">"#, "</div>")?;
            let author = between(author_block, "\">", "</a>")?;
            let body = between(chunk, r#"<div class="body">"#, "</div>")?;
            Some((author.to_string(), body.to_string()))
        })
        .collect()
}

fn between<'a>(haystack: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = haystack.find(start)? + start.len();
    let len = haystack[from..].find(end)?;
    Some(&haystack[from..from + len])
}
