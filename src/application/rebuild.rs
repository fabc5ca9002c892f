//! Reset-to-seed and bake-seed.
//!
//! Both procedures run out of band, one at a time. Every step either
//! succeeds or aborts the rest of the procedure; nothing already done is
//! rolled back. Bake always starts from a full flush, so re-running it after
//! a failure converges.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt;
use metrics::histogram;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, timeout};
use tracing::{info, warn};

use crate::application::directory::UserDirectory;
use crate::application::follows::FollowGraph;
use crate::application::repos::{
    LegacyFollowsRepo, PostsRepo, SeedBoundary, SeedRepo, TruncateReport,
};
use crate::cache::{
    AuthorTimelineCache, CacheEngine, EngineSupervisor, HashtagIndexCache, SnapshotFiles,
};
use crate::domain::posts::{author_line, format_timestamp, render_body};

const PING_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildStep {
    TruncateRecords,
    ReloadDirectory,
    ResetFollowGraph,
    StopEngine,
    RestoreSeed,
    StartEngine,
    FlushCache,
    ReplayPosts,
    ReplayFollows,
    SaveCache,
    CaptureSeed,
}

impl RebuildStep {
    pub const fn as_str(self) -> &'static str {
        match self {
            RebuildStep::TruncateRecords => "truncate_records",
            RebuildStep::ReloadDirectory => "reload_directory",
            RebuildStep::ResetFollowGraph => "reset_follow_graph",
            RebuildStep::StopEngine => "stop_engine",
            RebuildStep::RestoreSeed => "restore_seed",
            RebuildStep::StartEngine => "start_engine",
            RebuildStep::FlushCache => "flush_cache",
            RebuildStep::ReplayPosts => "replay_posts",
            RebuildStep::ReplayFollows => "replay_follows",
            RebuildStep::SaveCache => "save_cache",
            RebuildStep::CaptureSeed => "capture_seed",
        }
    }
}

impl fmt::Display for RebuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    #[error("rebuild step `{step}` failed: {source}")]
    Step {
        step: RebuildStep,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("rebuild step `{step}` timed out after {waited:?}")]
    Timeout { step: RebuildStep, waited: Duration },
}

impl RebuildError {
    pub fn step(&self) -> RebuildStep {
        match self {
            RebuildError::Step { step, .. } | RebuildError::Timeout { step, .. } => *step,
        }
    }
}

fn failed<E>(step: RebuildStep) -> impl FnOnce(E) -> RebuildError
where
    E: Into<Box<dyn StdError + Send + Sync>>,
{
    move |err| RebuildError::Step {
        step,
        source: err.into(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub truncated: TruncateReport,
    pub users: usize,
    pub snapshot_bytes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BakeReport {
    pub posts: u64,
    pub hashtags: u64,
    pub follow_edges: u64,
}

/// Everything the controller touches.
pub struct RebuildParts {
    pub seed: Arc<dyn SeedRepo>,
    pub legacy_follows: Arc<dyn LegacyFollowsRepo>,
    pub posts: Arc<dyn PostsRepo>,
    pub directory: Arc<UserDirectory>,
    pub graph: Arc<dyn FollowGraph>,
    pub engine: Arc<dyn CacheEngine>,
    pub supervisor: Arc<dyn EngineSupervisor>,
    pub snapshots: SnapshotFiles,
    pub boundary: SeedBoundary,
    pub stop_timeout: Duration,
    pub start_timeout: Duration,
}

pub struct RebuildController {
    parts: RebuildParts,
    author: AuthorTimelineCache,
    hashtags: HashtagIndexCache,
    running: Mutex<()>,
}

impl RebuildController {
    pub fn new(parts: RebuildParts) -> Self {
        Self {
            author: AuthorTimelineCache::new(parts.engine.clone()),
            hashtags: HashtagIndexCache::new(parts.engine.clone()),
            parts,
            running: Mutex::new(()),
        }
    }

    /// Drop records created after the seed and swap the seed image in.
    pub async fn reset_to_seed(&self) -> Result<ResetReport, RebuildError> {
        let _running = self.running.lock().await;
        let started = Instant::now();
        let parts = &self.parts;

        let truncated = parts
            .seed
            .truncate_above(parts.boundary)
            .await
            .map_err(failed(RebuildStep::TruncateRecords))?;

        let users = parts
            .directory
            .reload()
            .await
            .map_err(failed(RebuildStep::ReloadDirectory))?;

        parts
            .graph
            .reset()
            .await
            .map_err(failed(RebuildStep::ResetFollowGraph))?;

        parts
            .supervisor
            .stop()
            .await
            .map_err(failed(RebuildStep::StopEngine))?;
        self.wait_for_engine(RebuildStep::StopEngine, false, parts.stop_timeout)
            .await?;

        let snapshot_bytes = parts
            .snapshots
            .restore_seed()
            .await
            .map_err(failed(RebuildStep::RestoreSeed))?;

        parts
            .supervisor
            .start()
            .await
            .map_err(failed(RebuildStep::StartEngine))?;
        self.wait_for_engine(RebuildStep::StartEngine, true, parts.start_timeout)
            .await?;

        let elapsed = started.elapsed();
        histogram!("warbler_rebuild_ms", "operation" => "reset")
            .record(elapsed.as_secs_f64() * 1000.0);
        info!(
            target = "warbler::application::rebuild",
            truncated_posts = truncated.posts,
            truncated_users = truncated.users,
            users,
            snapshot_bytes,
            elapsed_ms = elapsed.as_millis() as u64,
            "reset to seed"
        );

        Ok(ResetReport {
            truncated,
            users,
            snapshot_bytes,
        })
    }

    /// Rebuild the author timelines and hashtag index from the record store
    /// and capture the result as the new seed image. Home pages are left to
    /// fill lazily.
    pub async fn bake_seed(&self) -> Result<BakeReport, RebuildError> {
        let _running = self.running.lock().await;
        let started = Instant::now();
        let parts = &self.parts;
        let mut report = BakeReport::default();

        parts
            .engine
            .flush_all()
            .await
            .map_err(failed(RebuildStep::FlushCache))?;

        let mut stream = parts.posts.scan_posts_ascending();
        while let Some(post) = stream
            .try_next()
            .await
            .map_err(failed(RebuildStep::ReplayPosts))?
        {
            let author = parts
                .directory
                .name_of(post.user_id)
                .await
                .map_err(failed(RebuildStep::ReplayPosts))?
                .ok_or_else(|| {
                    failed::<String>(RebuildStep::ReplayPosts)(format!(
                        "post {} references unknown user {}",
                        post.id, post.user_id
                    ))
                })?;

            let timestamp = format_timestamp(post.created_at);
            let html = render_body(&post.body);
            self.author
                .append_post(&author, &author_line(&timestamp, &html))
                .await
                .map_err(failed(RebuildStep::ReplayPosts))?;
            let tags = self
                .hashtags
                .index_all(&author, &timestamp, &post.body, &html)
                .await
                .map_err(failed(RebuildStep::ReplayPosts))?;

            report.posts += 1;
            report.hashtags += tags as u64;
        }
        drop(stream);

        if parts.graph.is_cache_backed() {
            let rows = parts
                .legacy_follows
                .list_legacy_follows()
                .await
                .map_err(failed(RebuildStep::ReplayFollows))?;
            for edge in rows.iter().flat_map(|row| row.edges()) {
                parts
                    .graph
                    .follow(&edge.follower, &edge.followee)
                    .await
                    .map_err(failed(RebuildStep::ReplayFollows))?;
                report.follow_edges += 1;
            }
        }

        parts
            .engine
            .save()
            .await
            .map_err(failed(RebuildStep::SaveCache))?;

        parts
            .snapshots
            .capture_seed()
            .await
            .map_err(failed(RebuildStep::CaptureSeed))?;

        let elapsed = started.elapsed();
        histogram!("warbler_rebuild_ms", "operation" => "bake")
            .record(elapsed.as_secs_f64() * 1000.0);
        info!(
            target = "warbler::application::rebuild",
            posts = report.posts,
            hashtags = report.hashtags,
            follow_edges = report.follow_edges,
            elapsed_ms = elapsed.as_millis() as u64,
            "baked seed"
        );

        Ok(report)
    }

    /// Poll `ping` until the engine is (or is no longer) answering.
    async fn wait_for_engine(
        &self,
        step: RebuildStep,
        want_up: bool,
        limit: Duration,
    ) -> Result<(), RebuildError> {
        let deadline = Instant::now() + limit;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let up = matches!(
                timeout(remaining.max(PING_INTERVAL), self.parts.engine.ping()).await,
                Ok(Ok(()))
            );
            if up == want_up {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(
                    target = "warbler::application::rebuild",
                    step = step.as_str(),
                    want_up,
                    "cache engine did not change state in time"
                );
                return Err(RebuildError::Timeout {
                    step,
                    waited: limit,
                });
            }
            sleep(PING_INTERVAL).await;
        }
    }
}
