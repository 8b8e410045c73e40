//! # coredump-web
//!
//! HTTP surface of the crash-dump server for hosts running tokio.
//!
//! This crate provides:
//! - The `/`, `/download` and `/crash` routes on an axum router
//! - A channel-backed chunk sink that feeds a streaming response body
//!
//! The handler logic itself lives in `coredump-core`; this crate only runs
//! it on the blocking pool and turns the chunks into an HTTP body.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coredump_core::{AbortFault, DumpConfig, FileRegions, RegionId};
//! use coredump_web::{create_router, ServerState};
//!
//! let regions = FileRegions::new().with(RegionId::core_dump(), "core.img");
//! let app = create_router(ServerState::new(regions, DumpConfig::default(), AbortFault));
//!
//! let listener = TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub mod body;
pub mod routes;

// Re-exports
pub use body::{ChannelSink, PendingResponse};
pub use routes::create_router;

use std::sync::Arc;

use coredump_core::{CrashTrigger, DownloadDump, DumpConfig, IndexPage};

/// Shared handler state for all routes.
pub struct ServerState<P, F> {
    pub index: Arc<IndexPage>,
    pub download: Arc<DownloadDump<P>>,
    pub crash: Arc<CrashTrigger<F>>,
}

impl<P, F> ServerState<P, F>
where
    P: coredump_core::RegionProvider,
    F: coredump_core::FaultTrigger,
{
    pub fn new(provider: P, config: DumpConfig, fault: F) -> Self {
        let index = IndexPage::default();
        Self {
            index: Arc::new(index),
            download: Arc::new(DownloadDump::new(provider, config)),
            crash: Arc::new(CrashTrigger::new(index, fault)),
        }
    }
}

impl<P, F> Clone for ServerState<P, F> {
    fn clone(&self) -> Self {
        Self {
            index: Arc::clone(&self.index),
            download: Arc::clone(&self.download),
            crash: Arc::clone(&self.crash),
        }
    }
}
