//! Request handlers for the three endpoints.
//!
//! Handler logic is framework-agnostic: each handler serves a body into a
//! [`ChunkSink`], and the platform layer (axum, esp-idf-http) only adapts
//! its response type to a sink and maps errors to a status code.

use tracing::{error, warn};

use crate::assets::StaticAsset;
use crate::config::DumpConfig;
use crate::error::DumpError;
use crate::region::RegionProvider;
use crate::session::{TransferReport, TransferSession};
use crate::writer::{ChunkSink, ChunkedWriter, ResponseHead};

/// The routes served by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /` - landing page.
    Index,
    /// `GET /download` - the crash-dump region as `core.bin`.
    Download,
    /// `GET /crash` - landing page, then a deliberate fault.
    Crash,
}

impl Endpoint {
    pub const ALL: [Endpoint; 3] = [Endpoint::Index, Endpoint::Download, Endpoint::Crash];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Index => "/",
            Endpoint::Download => "/download",
            Endpoint::Crash => "/crash",
        }
    }
}

/// Serve an HTTP response body.
pub trait ServeBody {
    type Output;

    fn serve<S: ChunkSink>(&self, sink: S) -> Result<Self::Output, DumpError>;
}

/// Send a static asset as a single chunk followed by the terminator.
pub fn serve_static<S: ChunkSink>(sink: S, asset: &StaticAsset) -> Result<(), DumpError> {
    let mut writer = ChunkedWriter::new(sink);
    writer.open(&ResponseHead::new(asset.content_type))?;
    writer.write_block(asset.bytes)?;
    writer.finish()?;
    Ok(())
}

/// `GET /`
#[derive(Debug, Clone, Copy)]
pub struct IndexPage {
    asset: StaticAsset,
}

impl IndexPage {
    pub fn new(asset: StaticAsset) -> Self {
        Self { asset }
    }
}

impl Default for IndexPage {
    fn default() -> Self {
        Self::new(StaticAsset::index())
    }
}

impl ServeBody for IndexPage {
    type Output = ();

    fn serve<S: ChunkSink>(&self, sink: S) -> Result<(), DumpError> {
        serve_static(sink, &self.asset)
    }
}

/// `GET /download`
#[derive(Debug, Clone)]
pub struct DownloadDump<P> {
    provider: P,
    config: DumpConfig,
}

impl<P: RegionProvider> DownloadDump<P> {
    pub fn new(provider: P, config: DumpConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &DumpConfig {
        &self.config
    }
}

impl<P: RegionProvider> ServeBody for DownloadDump<P> {
    type Output = TransferReport;

    fn serve<S: ChunkSink>(&self, sink: S) -> Result<TransferReport, DumpError> {
        TransferSession::new(sink).run(&self.provider, &self.config)
    }
}

/// Ends the process so the platform records a fresh crash dump.
///
/// Kept apart from the streaming path: nothing in a transfer session can
/// reach it.
pub trait FaultTrigger {
    fn trigger(&self) -> !;
}

/// Aborts the process.
///
/// On ESP-IDF `abort()` goes through the system panic handler, which writes
/// the core dump partition before rebooting.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortFault;

impl FaultTrigger for AbortFault {
    fn trigger(&self) -> ! {
        std::process::abort()
    }
}

/// `GET /crash`
#[derive(Debug, Clone, Copy)]
pub struct CrashTrigger<F> {
    page: IndexPage,
    fault: F,
}

impl<F: FaultTrigger> CrashTrigger<F> {
    pub fn new(page: IndexPage, fault: F) -> Self {
        Self { page, fault }
    }
}

impl<F: FaultTrigger> ServeBody for CrashTrigger<F> {
    type Output = std::convert::Infallible;

    /// Serve the page, wait until it is on the connection, then fault.
    /// Never returns.
    fn serve<S: ChunkSink>(&self, mut sink: S) -> Result<Self::Output, DumpError> {
        let delivered = self
            .page
            .serve(&mut sink)
            .and_then(|()| sink.commit().map_err(DumpError::from));
        if let Err(err) = delivered {
            warn!("Crash page not delivered: {}", err);
        }
        error!("Triggering deliberate fault");
        self.fault.trigger()
    }
}
