use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;

use edugrow_notify::audit::create_audit_store;
use edugrow_notify::config::Settings;
use edugrow_notify::gateway::{GatewayConfig, TwilioGateway};
use edugrow_notify::notification::{DispatcherConfig, NotificationDispatcher};
use edugrow_notify::postgres::PostgresPool;
use edugrow_notify::server::{create_app, AppState};
use edugrow_notify::telemetry::init_telemetry;
use edugrow_notify::triggers::RedisSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new().context("Failed to load configuration")?;
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    settings
        .gateway
        .validate()
        .context("Invalid gateway configuration")?;

    // Postgres is only connected when selected as the audit store
    let postgres_pool = match (&settings.store.backend[..], &settings.database) {
        ("postgres", Some(database)) => Some(Arc::new(
            PostgresPool::connect(database)
                .await
                .context("Failed to connect to PostgreSQL")?,
        )),
        _ => None,
    };

    let store = create_audit_store(&settings.store, postgres_pool.as_deref())
        .context("Failed to create audit store (is the database section configured?)")?;
    let gateway = Arc::new(TwilioGateway::new(GatewayConfig::from_settings(
        &settings.gateway,
    ))?);
    let dispatcher = Arc::new(NotificationDispatcher::new(
        store,
        gateway,
        DispatcherConfig::from_settings(&settings),
    ));

    let state = AppState::new(settings.clone(), dispatcher.clone(), postgres_pool.clone());
    tracing::info!("Application state initialized");

    let redis_subscriber = Arc::new(RedisSubscriber::new(settings.redis.clone(), dispatcher));
    let shutdown_signal = redis_subscriber.shutdown_signal();

    let redis_subscriber_clone = redis_subscriber.clone();
    let redis_handle = tokio::spawn(async move {
        if let Err(e) = redis_subscriber_clone.start().await {
            tracing::error!(error = %e, "Redis subscriber failed");
        }
    });

    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_signal))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    let _ = redis_handle.await;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: tokio::sync::broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
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
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    let _ = shutdown_tx.send(());
}
