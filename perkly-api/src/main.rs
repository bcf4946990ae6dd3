use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use perkly_api::{app, AppState};
use perkly_core::RecordStore;
use perkly_offer::{EligibilityService, FeatureFlags, ServiceSettings};
use perkly_store::app_config::{Config, StoreBackend};
use perkly_store::{
    DbClient, EventPublisher, InMemoryCache, InMemoryRecordStore, PostgresRecordStore, RedisClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "perkly_api=debug,perkly_offer=debug,perkly_store=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("failed to load configuration")?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let store: Arc<dyn RecordStore> = match config.database.backend {
        StoreBackend::Postgres => {
            let db = DbClient::new(&config.database)
                .await
                .context("failed to connect to Postgres")?;
            if config.database.run_migrations {
                db.migrate().await.context("failed to run migrations")?;
            }
            Arc::new(PostgresRecordStore::new(db.pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory record store; nothing survives a restart");
            Arc::new(InMemoryRecordStore::new())
        }
    };

    let flags = Arc::new(FeatureFlags::from(&config.features));
    let events = EventPublisher::new(EVENT_BUFFER);
    let _event_logger = events.spawn_logger();

    let mut service = EligibilityService::new(store, ServiceSettings::from(&config))
        .with_flags(flags)
        .with_events(events);

    match &config.redis.url {
        Some(url) => match RedisClient::new(url.expose()).await {
            Ok(redis) => service = service.with_cache(Arc::new(redis)),
            Err(e) => {
                tracing::warn!("Redis unavailable ({}), using the in-memory cache", e);
                service = service.with_cache(Arc::new(InMemoryCache::new()));
            }
        },
        None => service = service.with_cache(Arc::new(InMemoryCache::new())),
    }

    let app = app(AppState::from_config(service, &config));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server.host / server.port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
