//! Application entry point and server initialization
//!
//! Loads configuration, opens the embedded database and serves the API with
//! graceful shutdown support.

use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use cinelog::config::Config;
use cinelog::route::create_app;
use cinelog::state::AppState;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .init();

    let port = config.port;
    let db_name = config.database_url.clone();

    let state = AppState::open(config).expect("Failed to initialize database");
    let app = create_app(state).layer(TraceLayer::new_for_http());

    // Bind to all network interfaces on the specified port
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind address");

    tracing::info!(port, database = %db_name, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
///
/// In-flight requests are allowed to finish, so a movie cascade that has
/// already started runs to completion or reports its partial failure.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping server");
}
