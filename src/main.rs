use std::{future::IntoFuture, process, sync::Arc};

use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use warbler::{
    application::{
        activity::ActivityService,
        directory::UserDirectory,
        error::AppError,
        follows::FollowGraph,
        rebuild::{RebuildController, RebuildParts},
        repos::{
            HealthRepo, LegacyFollowsRepo, PostsRepo, PostsWriteRepo, SeedBoundary, SeedRepo,
            UsersRepo,
        },
        timeline::TimelineService,
    },
    cache::{
        CacheConfig, CacheEngine, CacheError, Caches, EngineSupervisor, MemoryEngine, RedisEngine,
    },
    config::{self, EngineKind, FollowGraphMode},
    infra::{
        db::PostgresRepositories,
        engine_process::SystemctlSupervisor,
        error::InfraError,
        follow_client::RemoteFollowGraph,
        http::{self, HttpState},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let app = build_application_context(&settings).await?;

    match command {
        config::Command::Serve(_) => serve_http(&settings, app.http_state).await,
        config::Command::BakeSeed(_) => run_bake_seed(&app.rebuild).await,
        config::Command::ResetToSeed(_) => run_reset_to_seed(&app.rebuild).await,
    }
}

async fn run_bake_seed(rebuild: &RebuildController) -> Result<(), AppError> {
    info!(target = "warbler::bake_seed", "Starting seed bake");
    let report = rebuild.bake_seed().await?;
    info!(
        target = "warbler::bake_seed",
        posts = report.posts,
        hashtags = report.hashtags,
        follow_edges = report.follow_edges,
        "Seed image captured"
    );
    Ok(())
}

async fn run_reset_to_seed(rebuild: &RebuildController) -> Result<(), AppError> {
    info!(target = "warbler::reset_to_seed", "Starting reset");
    let report = rebuild.reset_to_seed().await?;
    info!(
        target = "warbler::reset_to_seed",
        truncated_posts = report.truncated.posts,
        truncated_users = report.truncated.users,
        users = report.users,
        "Reset to seed completed"
    );
    Ok(())
}

struct ApplicationContext {
    http_state: HttpState,
    rebuild: Arc<RebuildController>,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn init_engine(
    cache_config: &CacheConfig,
) -> Result<(Arc<dyn CacheEngine>, Arc<dyn EngineSupervisor>), AppError> {
    let startup = |err: CacheError| AppError::from(InfraError::cache_engine(err.to_string()));

    match cache_config.engine {
        EngineKind::Redis => {
            let engine = RedisEngine::connect(&cache_config.redis_url)
                .await
                .map_err(startup)?;
            engine.ping().await.map_err(startup)?;
            let engine: Arc<dyn CacheEngine> = Arc::new(engine);
            let supervisor: Arc<dyn EngineSupervisor> =
                Arc::new(SystemctlSupervisor::new(cache_config.systemd_unit.clone()));
            Ok((engine, supervisor))
        }
        EngineKind::Memory => {
            let engine = Arc::new(
                MemoryEngine::open(cache_config.live_snapshot.clone())
                    .await
                    .map_err(startup)?,
            );
            let supervisor: Arc<dyn EngineSupervisor> = engine.clone();
            let engine: Arc<dyn CacheEngine> = engine;
            Ok((engine, supervisor))
        }
    }
}

fn init_follow_graph(
    settings: &config::FollowGraphSettings,
    caches: &Caches,
) -> Result<Arc<dyn FollowGraph>, AppError> {
    match settings.mode {
        FollowGraphMode::Cache => {
            let graph: Arc<dyn FollowGraph> = Arc::new(caches.graph.clone());
            Ok(graph)
        }
        FollowGraphMode::Remote => {
            let endpoint = settings.endpoint.clone().ok_or_else(|| {
                AppError::from(InfraError::configuration(
                    "follow_graph.endpoint is required in remote mode",
                ))
            })?;
            let client = RemoteFollowGraph::new(endpoint)
                .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;
            Ok(Arc::new(client))
        }
    }
}

async fn build_application_context(
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let repositories = init_repositories(settings).await?;

    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let seed_repo: Arc<dyn SeedRepo> = repositories.clone();
    let legacy_follows_repo: Arc<dyn LegacyFollowsRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories.clone();

    let cache_config = CacheConfig::from(&settings.cache);
    let (engine, supervisor) = init_engine(&cache_config).await?;
    let caches = Caches::new(engine.clone());
    let graph = init_follow_graph(&settings.follow_graph, &caches)?;

    let directory = Arc::new(UserDirectory::new(users_repo));
    let users = directory
        .reload()
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    info!(
        target = "warbler::startup",
        users,
        engine = ?cache_config.engine,
        follow_graph = ?settings.follow_graph.mode,
        "User directory loaded"
    );

    let timelines = Arc::new(TimelineService::new(
        posts_repo.clone(),
        directory.clone(),
        graph.clone(),
        caches.clone(),
        settings.timeline.page_size.get(),
    ));
    let activity = Arc::new(ActivityService::new(
        posts_write_repo,
        directory.clone(),
        graph.clone(),
        caches,
    ));
    let rebuild = Arc::new(RebuildController::new(RebuildParts {
        seed: seed_repo,
        legacy_follows: legacy_follows_repo,
        posts: posts_repo,
        directory,
        graph,
        engine: engine.clone(),
        supervisor,
        snapshots: cache_config.snapshot_files(),
        boundary: SeedBoundary {
            post_cutoff: settings.seed.post_cutoff,
            user_cutoff: settings.seed.user_cutoff,
        },
        stop_timeout: cache_config.stop_timeout,
        start_timeout: cache_config.start_timeout,
    }));

    let http_state = HttpState {
        timelines,
        activity,
        rebuild: rebuild.clone(),
        engine,
        store: health_repo,
    };

    Ok(ApplicationContext {
        http_state,
        rebuild,
    })
}

async fn serve_http(settings: &config::Settings, http_state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(http_state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "warbler::serve",
        addr = %settings.server.addr,
        "Listening"
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.notified().await }
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        _ = tokio::signal::ctrl_c() => {
            info!(target = "warbler::serve", "Shutdown signal received");
        }
    }

    shutdown.notify_one();
    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "warbler::serve",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::from(InfraError::from(std::io::Error::other(
            err.to_string(),
        )))),
    }
}
