mod cli;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderName;
use clap::Parser;
use shortlink_cache::{MokaCacheConfig, MokaUrlCache, RedisUrlCache};
use shortlink_core::{Base62, CoordinationStore, Repository, UrlCache};
use shortlink_counter::{
    IdAllocator, InMemoryCoordinationStore, LeaseSettings, RangeLeaseAllocator,
    RedisCoordinationStore,
};
use shortlink_gateway::{App, AppState, ChannelVisitSink};
use shortlink_service::{LinkManager, LinkService, ServiceSettings};
use shortlink_storage::{InMemoryRepository, MySqlRepository};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{LogFormatArg, SharedBackendArg, StorageBackendArg, CLI};

const VISIT_DRAIN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.log_format);

    info!(
        listen_addr = %config.listen_addr,
        coordination_backend = %config.coordination,
        cache_backend = %config.cache,
        storage_backend = %config.storage,
        range_size = config.range_size,
        "starting shortlink gateway"
    );

    let identity_header = HeaderName::try_from(config.identity_header.as_str())
        .with_context(|| format!("invalid identity header '{}'", config.identity_header))?;
    let links = build_link_manager(&config).await?;
    let (visits, visit_drain) = ChannelVisitSink::spawn(config.visit_buffer as usize);

    let state = AppState::new(links, Arc::new(visits), config.public_base_url.as_str())
        .with_identity_header(identity_header);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    axum::serve(
        listener,
        App::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // The router and every sink handle are gone; let the drain flush.
    if tokio::time::timeout(VISIT_DRAIN_GRACE, visit_drain)
        .await
        .is_err()
    {
        warn!("visit drain did not finish in time, pending visits dropped");
    }

    info!("gateway stopped");
    Ok(())
}

fn init_tracing(format: LogFormatArg) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()));

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}

fn redis_url(config: &CLI) -> anyhow::Result<&str> {
    config
        .redis_url
        .as_deref()
        .context("redis url is required when a redis backend is selected")
}

async fn build_link_manager(config: &CLI) -> anyhow::Result<Arc<dyn LinkManager>> {
    let settings = LeaseSettings::builder()
        .counter_key(config.counter_key.as_str())
        .range_size(config.range_size)
        .initial_base(config.counter_initial_base)
        .max_refill_attempts(config.refill_attempts)
        .coordination_timeout(Duration::from_millis(config.coordination_timeout_ms))
        .build();

    match config.coordination {
        SharedBackendArg::InMemory => {
            let allocator = start_allocator(settings, InMemoryCoordinationStore::new()).await?;
            with_allocator(config, allocator).await
        }
        SharedBackendArg::Redis => {
            let store = RedisCoordinationStore::connect(redis_url(config)?)
                .await
                .context("failed to connect to the coordination store")?;
            let allocator = start_allocator(settings, store).await?;
            with_allocator(config, allocator).await
        }
    }
}

/// Makes sure the counter exists and takes the first lease before serving.
async fn start_allocator<S: CoordinationStore>(
    settings: LeaseSettings,
    store: S,
) -> anyhow::Result<RangeLeaseAllocator<S>> {
    let allocator = RangeLeaseAllocator::new(settings, store).context("invalid lease settings")?;
    allocator
        .ensure_counter()
        .await
        .context("failed to initialize the counter node")?;
    let lease = allocator
        .prime()
        .await
        .context("failed to acquire the first id range")?;

    info!(
        base = lease.base,
        start = lease.start(),
        remaining = lease.remaining(),
        "id allocator ready"
    );
    Ok(allocator)
}

async fn with_allocator<A: IdAllocator>(
    config: &CLI,
    allocator: A,
) -> anyhow::Result<Arc<dyn LinkManager>> {
    match config.storage {
        StorageBackendArg::InMemory => {
            with_repository(config, allocator, InMemoryRepository::new()).await
        }
        StorageBackendArg::Mysql => {
            let dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(dsn)
                .await
                .context("failed to connect to MySQL")?;
            repository
                .migrate()
                .await
                .context("failed to create the url_mapping table")?;
            with_repository(config, allocator, repository).await
        }
    }
}

async fn with_repository<A: IdAllocator, R: Repository>(
    config: &CLI,
    allocator: A,
    repository: R,
) -> anyhow::Result<Arc<dyn LinkManager>> {
    let ttl = config.cache_ttl_secs.map(Duration::from_secs);

    match config.cache {
        SharedBackendArg::InMemory => {
            let cache: MokaUrlCache = MokaCacheConfig::builder()
                .max_capacity(config.cache_capacity)
                .ttl(ttl)
                .build()
                .into();
            Ok(link_service(config, allocator, repository, cache))
        }
        SharedBackendArg::Redis => {
            let mut cache = RedisUrlCache::connect(redis_url(config)?)
                .await
                .context("failed to connect to the Redis cache")?;
            if let Some(ttl) = ttl {
                cache = cache.with_ttl(ttl);
            }
            Ok(link_service(config, allocator, repository, cache))
        }
    }
}

fn link_service<A: IdAllocator, R: Repository, C: UrlCache>(
    config: &CLI,
    allocator: A,
    repository: R,
    cache: C,
) -> Arc<dyn LinkManager> {
    let settings = ServiceSettings::builder()
        .store_timeout(Duration::from_millis(config.store_timeout_ms))
        .cache_timeout(Duration::from_millis(config.cache_timeout_ms))
        .build();
    Arc::new(LinkService::new(
        allocator, Base62, repository, cache, settings,
    ))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }
    info!("shutting down, draining in-flight requests");
}
