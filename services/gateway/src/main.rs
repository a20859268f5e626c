use gateway::config::Config;
use gateway::state::AppState;
use gateway::sweeper;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();

    info!("connecting to database...");
    let pool = gateway::db::create_pool(&config.database_url).await;
    gateway::db::run_migrations(&pool).await;
    info!("migrations applied");

    let state = AppState::new(pool);

    let shutdown = state.shutdown.clone();
    let connections = state.connections.clone();
    let dispatcher = state.delay_queue.clone().spawn_dispatcher(shutdown.clone());
    let idle_sweeper = sweeper::spawn_idle_socket_sweeper(state.clone(), shutdown.clone());
    let session_sweeper = sweeper::spawn_session_expiry_sweeper(state.clone(), shutdown.clone());
    let purge_sweeper = sweeper::spawn_stale_purge_sweeper(state.clone(), shutdown.clone());

    let router = gateway::build_router(state, &config.cors_origins);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %bind_addr, "gateway listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .await
    .expect("server error");

    connections.cancel_all().await;
    let _ = tokio::join!(dispatcher, idle_sweeper, session_sweeper, purge_sweeper);
    info!("gateway shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT), signals the shared cancellation
/// token so the dispatcher and sweepers wind down, then returns to trigger
/// axum's own graceful shutdown.
async fn shutdown_signal(shutdown: tokio_util::sync::CancellationToken) {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
    shutdown.cancel();
}
