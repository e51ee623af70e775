use mimalloc::MiMalloc;
use rollcall::db::ConnectionManager;
use rollcall::service::{CredentialService, ServiceState, Sha256Hasher, auth_actor};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = rollcall::Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        listen_addr = %cfg.basic.listen_addr,
        database = %cfg.database.database_path().display(),
        loglevel = %cfg.basic.loglevel,
        admin = ?cfg.admin
    );

    let connections = Arc::new(ConnectionManager::new(cfg.database.clone()));
    let service = Arc::new(CredentialService::new(
        connections.clone(),
        Arc::new(Sha256Hasher),
        cfg.admin.clone(),
    ));

    let auth = auth_actor::spawn(service).await?;
    match auth.status().await? {
        ServiceState::Ready => info!("credential service ready"),
        state => error!(%state, "credential service not ready; auth endpoints will answer 503"),
    }

    let state = rollcall::router::RollcallState::new(auth.clone(), connections.clone());
    let app = rollcall::router::rollcall_router(state);

    let listener = TcpListener::bind(cfg.basic.listen_addr.as_str()).await?;
    info!("HTTP server listening on {}", cfg.basic.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    auth.stop();
    connections.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c; shutting down");
    }
    info!("shutdown signal received");
}
