use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    sync::Arc,
};

use clap::Parser;
use server::{
    cli::Cli,
    db::{self, SqliteCacheStorage, SqliteDiagnosticsStore},
    routes,
    upstream::UpstreamFetcher,
    AppState,
};
use service_worker::{DiagnosticsSink, ServiceWorker};
use shared::*;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    load_dotenv()?;
    configure_tracing();

    let args = Arc::new(Cli::parse());
    debug!(?args);

    // Run the migrations synchronously before creating the pool or launching the server
    let ran = db::run_migrations(&args.sqlite_connection_string, args.diagnostics_retention_days)?;
    info!("Ran {ran} db migrations");

    let pool = db::create_pool(&args.sqlite_connection_string)?;
    let upstream = UpstreamFetcher::new(&args.upstream_url, args.upstream_timeout())?;
    let diagnostics = SqliteDiagnosticsStore::new(pool.clone());

    let (sink, drain) = DiagnosticsSink::new(Arc::new(diagnostics.clone()), args.diagnostics_channel_bound);
    let drain = tokio::spawn(drain.run());

    let worker = Arc::new(ServiceWorker::new(
        args.worker_config(),
        Arc::new(SqliteCacheStorage::new(pool)),
        Arc::new(upstream.clone()),
        sink,
    ));

    // A failed install leaves the worker redundant, it then passes everything through
    match worker.start().await {
        Ok(state) => info!(?state, "Worker started"),
        Err(e) => error!("Worker install failed, requests will pass through: {e}"),
    }

    let socket = SocketAddr::new(IpAddr::from_str(&args.bind_addr)?, args.port);
    let listener = TcpListener::bind(socket).await?;
    debug!("listening on {}", listener.local_addr()?);

    let state = AppState {
        worker,
        diagnostics,
        upstream,
        args,
    };

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Every sink is gone with the router, the drain finishes writing what's queued
    drain.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
