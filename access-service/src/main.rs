use access_service::{
    build_router,
    config::AccessConfig,
    db,
    services::{
        bootstrap, IdentityStore, MemoryDenylist, PgStore, RedisDenylist, Store, TokenDenylist,
    },
    AppState,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AccessConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    access_service::services::metrics::init_metrics().map_err(AppError::InternalError)?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting access service"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    tracing::info!("Identity store initialized");

    let denylist: Arc<dyn TokenDenylist> = match &config.redis {
        Some(redis) => Arc::new(
            RedisDenylist::new(redis)
                .await
                .map_err(AppError::InternalError)?,
        ),
        None => {
            tracing::warn!("REDIS_URL not set; revoked tokens are tracked in process memory");
            Arc::new(MemoryDenylist::new())
        }
    };

    provision(&config, store.as_ref()).await?;

    let state = AppState::new(config.clone(), store, denylist)?;
    let app = build_router(state);

    let addr = config.common.socket_addr();

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// Seed default groups and the bootstrap admin when configured. Both are
/// skipped when already present.
async fn provision(config: &AccessConfig, store: &dyn Store) -> Result<(), AppError> {
    if config.bootstrap.seed_default_access {
        bootstrap::seed_default_access(store).await?;
        tracing::info!("Default permissions and groups are in place");
    }

    if let (Some(email), Some(password)) = (
        config.bootstrap.admin_email.as_deref(),
        config.bootstrap.admin_password.as_deref(),
    ) {
        if store.find_user_by_email(email).await?.is_some() {
            tracing::info!("Bootstrap admin already exists");
        } else {
            bootstrap::create_user(
                store,
                email,
                password,
                "Administrator",
                &[bootstrap::ADMIN_GROUP],
                &[],
            )
            .await?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
