//! # coredump-core
//!
//! Core logic for serving a device's crash-dump partition over HTTP.
//!
//! This crate provides:
//! - Region identity and the flash/storage read abstraction
//! - A chunked partition reader that holds at most one block in memory
//! - A chunked response writer over a pluggable transport sink
//! - The per-request transfer session (download state machine)
//! - Request handlers for the index, download and crash endpoints
//! - Server lifecycle state driven by connect/disconnect events
//! - Serde configuration types shared by every target
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio/axum) and ESP32 (esp-idf) targets.

pub mod assets;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod reader;
pub mod region;
pub mod session;
pub mod writer;

pub use assets::{StaticAsset, INDEX_HTML};
pub use config::{AccessPointConfig, AuthMode, DumpConfig, HttpConfig, Settings, SizeSource};
pub use error::{ConfigError, DumpError, LayoutError, StorageError, TransportError};
pub use handlers::{
    serve_static, AbortFault, CrashTrigger, DownloadDump, Endpoint, FaultTrigger, IndexPage,
    ServeBody,
};
pub use lifecycle::ServerSlot;
pub use reader::PartitionReader;
pub use region::{
    DataSubtype, FileRegion, FileRegions, FlashRegion, MemoryRegion, MemoryRegions,
    PartitionType, RegionId, RegionLayout, RegionProvider,
};
pub use session::{stream_region, SessionState, TransferReport, TransferSession};
pub use writer::{ChunkSink, ChunkedWriter, RecordingSink, ResponseHead};
