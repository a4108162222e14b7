use std::sync::Arc;

use clap::Parser;
use mariadb_stats_exporter::auth::BasicAuth;
use mariadb_stats_exporter::breaker::GuardedSource;
use mariadb_stats_exporter::catalog::{build_catalog, validate_catalog};
use mariadb_stats_exporter::collector::StatsCollector;
use mariadb_stats_exporter::config::Config;
use mariadb_stats_exporter::registry::Registry;
use mariadb_stats_exporter::server::{router, AppState, METRICS_PATH};
use mariadb_stats_exporter::source::MariaDbSource;
use mariadb_stats_exporter::Error;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Error> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::parse();
    if let Err(error) = config.validate() {
        tracing::error!(%error, "invalid configuration");
        return Err(error.into());
    }
    validate_catalog(&build_catalog())?;

    let source = GuardedSource::new(
        MariaDbSource::new(config.mariadb_options()),
        config.breaker_options(),
    );
    let mut registry = Registry::default();
    registry.register_collector(Box::new(StatsCollector::new(source, config.node.clone())))?;

    let auth = config
        .http_auth
        .then(|| BasicAuth::new(config.http_user.clone(), config.http_password_hash.clone()));
    let app = router(Arc::new(AppState { registry }), auth);

    let (host, port) = config.listen_addr();
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|error| {
            tracing::error!(host, port, %error, "failed to bind");
            error
        })?;
    let listen = listener.local_addr()?;
    tracing::info!(
        %listen,
        path = METRICS_PATH,
        http_auth = config.http_auth,
        sql_host = %config.sql_host,
        sql_port = config.sql_port,
        node = %config.node,
        "mariadb-stats-exporter listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
