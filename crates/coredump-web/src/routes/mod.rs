//! HTTP route handlers.
//!
//! Every route runs its `coredump-core` handler on the blocking pool, since
//! storage reads and chunk writes are synchronous.

use std::sync::Arc;

use axum::{extract::State, response::Response, routing::get, Router};
use tracing::debug;

use coredump_core::{Endpoint, FaultTrigger, RegionProvider, ServeBody};

use crate::body::ChannelSink;
use crate::ServerState;

/// Create the router for `/`, `/download` and `/crash`.
pub fn create_router<P, F>(state: ServerState<P, F>) -> Router
where
    P: RegionProvider + Send + Sync + 'static,
    F: FaultTrigger + Send + Sync + 'static,
{
    Router::new()
        .route(Endpoint::Index.path(), get(index_handler::<P, F>))
        .route(Endpoint::Download.path(), get(download_handler::<P, F>))
        .route(Endpoint::Crash.path(), get(crash_handler::<P, F>))
        .with_state(state)
}

/// Run `handler` against a fresh sink and stream what it writes.
async fn serve_blocking<H>(handler: Arc<H>) -> Response
where
    H: ServeBody + Send + Sync + 'static,
{
    let (mut sink, pending) = ChannelSink::new();
    tokio::task::spawn_blocking(move || {
        if let Err(err) = handler.serve(&mut sink) {
            sink.fail(&err);
        }
    });
    pending.into_response().await
}

/// GET /
async fn index_handler<P, F>(State(state): State<ServerState<P, F>>) -> Response
where
    P: RegionProvider + Send + Sync + 'static,
    F: FaultTrigger + Send + Sync + 'static,
{
    serve_blocking(state.index).await
}

/// GET /download
/// Streams the crash-dump region as `application/octet-stream`.
async fn download_handler<P, F>(State(state): State<ServerState<P, F>>) -> Response
where
    P: RegionProvider + Send + Sync + 'static,
    F: FaultTrigger + Send + Sync + 'static,
{
    debug!(region = %state.download.config().region, "Download requested");
    serve_blocking(state.download).await
}

/// GET /crash
/// Serves the landing page, then faults.
async fn crash_handler<P, F>(State(state): State<ServerState<P, F>>) -> Response
where
    P: RegionProvider + Send + Sync + 'static,
    F: FaultTrigger + Send + Sync + 'static,
{
    serve_blocking(state.crash).await
}
