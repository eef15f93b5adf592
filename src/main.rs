use memory_review_backend::config::Config;
use memory_review_backend::db::Database;
use memory_review_backend::logging::init_tracing;
use memory_review_backend::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();
    let _log_guard = init_tracing(&config.log_level);

    let db = match Database::connect(&config.database).await {
        Ok(db) => db,
        Err(err) => {
            tracing::error!(error = %err, path = %config.database.path.display(), "database initialization failed");
            std::process::exit(1);
        }
    };

    let state = AppState::new(db.clone()).with_default_queue_limit(config.default_queue_limit);
    let app = memory_review_backend::create_app(state);

    let addr = config.bind_addr();
    tracing::info!(%addr, "memory-review backend listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listener failed");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
    }

    tracing::info!("HTTP server stopped, closing database");
    db.close().await;
    tracing::info!("Graceful shutdown complete");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
