//! HTTP surface: the stream routes the cast device fetches and a JSON
//! control API.

pub mod context;
pub mod error;
pub mod router;
pub mod routes;

use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;

pub use context::AppContext;
pub use error::AppError;
pub use router::build_router;

/// Serve until ctrl-c, SIGTERM, or `cancel` fires. Fires `cancel` on the way
/// out so background jobs stop with the server.
pub async fn serve(listener: TcpListener, ctx: AppContext, cancel: CancellationToken) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Starting server on {}", addr);

    let app = build_router(ctx);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = cancel.cancelled() => {},
    }

    tracing::info!("Shutdown signal received");
}
