//! Local HTTP server hosting the page and the bridge

use super::routes::{create_router, BridgeState};
use std::net::SocketAddr;

/// Serve the bridge on localhost until Ctrl+C
pub async fn run_server(port: u16, state: BridgeState) -> std::io::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Open http://{} to start", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
}
