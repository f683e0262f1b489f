use std::net::SocketAddr;

use anyhow::Context;
use tokio::sync::watch;

use pos_auth::{
    auth::{build_components, sweeper::spawn_refresh_token_sweeper},
    config::AppConfig,
    db::{connection, dao::DaoContext},
    logging::init_tracing,
    routes::app,
    state::AppState,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("server failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env()?;
    if let Err(err) = init_tracing(&cfg.logging) {
        eprintln!("{err:#}");
        return Err(err);
    }

    let db_cfg = cfg
        .database
        .clone()
        .context("database config missing; set APP_DATABASE__URL")?;
    let auth_cfg = cfg
        .auth
        .clone()
        .context("auth config missing; set APP_AUTH__JWT_SECRET")?;

    let db = connection::connect(&db_cfg).await?;
    let stores = DaoContext::new(&db).auth_stores();
    let components = build_components(&auth_cfg, &stores);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = auth_cfg.sweep_interval().map(|interval| {
        spawn_refresh_token_sweeper(stores.refresh_tokens.clone(), interval, shutdown_rx)
    });

    let addr: SocketAddr = format!("{}:{}", cfg.general.host, cfg.general.port)
        .parse()
        .context("invalid host/port")?;
    let state = AppState::new(components);

    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper {
        handle.await.context("refresh token sweeper panicked")?;
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
