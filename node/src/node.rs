//! Node server: bind the control surface, announce readiness, serve

use crate::api::create_router;
use crate::runtime::NodeRuntime;
use std::sync::Arc;
use tracing::info;

/// Serve a node's control surface and message ingress.
///
/// Readiness fires only after the listener is bound, so an orchestrator
/// that has seen every node's signal knows no inbound message can be
/// lost to a closed port.
pub async fn serve(runtime: Arc<NodeRuntime>, listen_addr: &str) -> anyhow::Result<()> {
    let router = create_router(runtime.clone());

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(node = %runtime.node_id(), "listening on {}", listen_addr);
    runtime.announce_ready();

    axum::serve(listener, router).await?;

    Ok(())
}
