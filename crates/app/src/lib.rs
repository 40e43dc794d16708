//! Snapseek HTTP server
//!
//! Delegated login, server-side sessions and a logged image search, served
//! over a small JSON API for the browser front end.
//!
//! # Routes
//!
//! - `GET /auth/{provider}` and `GET /auth/{provider}/callback`: login
//! - `GET|POST /auth/logout`
//! - `GET /api/me`, `POST /api/search`, `GET /api/history`: need a session
//! - `GET /api/top-searches`: public

use std::future::Future;
use std::io;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

pub mod config;
pub mod cookies;
pub mod error;
pub mod routes;
pub mod state;
pub mod sweeper;

pub use config::Config;
pub use state::AppState;

/// Serve until Ctrl+C or SIGTERM
pub async fn serve(listener: TcpListener, state: AppState) -> io::Result<()> {
    serve_with_shutdown(listener, state, shutdown_signal()).await
}

pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(address) = listener.local_addr() {
        info!("Server running on {address}");
    }

    axum::serve(listener, routes::router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
