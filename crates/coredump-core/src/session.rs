//! Transfer session: one download of the crash-dump region.
//!
//! ```text
//! Init ──► Streaming(offset) ──► Done
//!   │            │
//!   └────────────┴─────────────► Aborted
//! ```
//!
//! The session reads one block, writes it as one chunk, and only then reads
//! the next. There is no retry: the first storage or transport failure ends
//! the session in `Aborted`.

use tracing::{debug, error, info, trace};

use crate::config::DumpConfig;
use crate::error::{DumpError, TransportError};
use crate::reader::PartitionReader;
use crate::region::{FlashRegion, RegionLayout, RegionProvider};
use crate::writer::{ChunkSink, ChunkedWriter, ResponseHead, CONTENT_TYPE_OCTET_STREAM};

/// Download state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    Streaming { offset: u64 },
    Done,
    Aborted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Aborted)
    }
}

/// Summary of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    /// Payload bytes sent.
    pub bytes: u64,
    /// Data chunks sent, excluding the terminator.
    pub chunks: usize,
}

/// Per-request streaming state.
pub struct TransferSession<S: ChunkSink> {
    writer: ChunkedWriter<S>,
    state: SessionState,
}

impl<S: ChunkSink> TransferSession<S> {
    pub fn new(sink: S) -> Self {
        Self {
            writer: ChunkedWriter::new(sink),
            state: SessionState::Init,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn into_sink(self) -> S {
        self.writer.into_inner()
    }

    /// Stream the configured region to the sink.
    ///
    /// A session runs once; calling this again after it has left `Init`
    /// fails without touching the sink.
    pub fn run<P: RegionProvider>(
        &mut self,
        provider: &P,
        config: &DumpConfig,
    ) -> Result<TransferReport, DumpError> {
        if self.state != SessionState::Init {
            return Err(DumpError::TransportWrite(TransportError::Unusable));
        }

        info!(region = %config.region, "Starting crash dump transfer");
        let result = self.stream(provider, config);

        match &result {
            Ok(report) => {
                self.state = SessionState::Done;
                info!(
                    bytes = report.bytes,
                    chunks = report.chunks,
                    "Crash dump transfer complete"
                );
            }
            Err(err) => {
                error!(state = ?self.state, "Crash dump transfer aborted: {}", err);
                self.state = SessionState::Aborted;
            }
        }
        result
    }

    fn stream<P: RegionProvider>(
        &mut self,
        provider: &P,
        config: &DumpConfig,
    ) -> Result<TransferReport, DumpError> {
        let region = provider.find(&config.region)?;
        let layout = RegionLayout::resolve(config, region.size())?;
        debug!(
            total = layout.total_size(),
            block = layout.block_size(),
            blocks = layout.block_count(),
            "Resolved dump layout"
        );

        let head = ResponseHead::attachment(CONTENT_TYPE_OCTET_STREAM, config.filename.as_str());
        self.writer.open(&head)?;
        self.state = SessionState::Streaming { offset: 0 };

        let mut reader = PartitionReader::new(&region, layout);
        while let Some(block) = reader.next_block() {
            let block = block?;
            self.writer.write_block(block)?;
            self.state = SessionState::Streaming {
                offset: reader.offset(),
            };
            trace!(offset = reader.offset(), "Sent chunk");
        }

        self.writer.finish()?;
        Ok(TransferReport {
            bytes: self.writer.bytes_written(),
            chunks: self.writer.chunks_written(),
        })
    }
}

/// Run a single download session against `sink`.
pub fn stream_region<P, S>(
    provider: &P,
    config: &DumpConfig,
    sink: S,
) -> Result<TransferReport, DumpError>
where
    P: RegionProvider,
    S: ChunkSink,
{
    TransferSession::new(sink).run(provider, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{MemoryRegion, MemoryRegions, RegionId};
    use crate::writer::RecordingSink;
    use pretty_assertions::assert_eq;

    fn provider(size: usize) -> MemoryRegions {
        MemoryRegions::new().with(RegionId::core_dump(), MemoryRegion::patterned(size))
    }

    #[test]
    fn test_session_done() {
        let mut session = TransferSession::new(RecordingSink::new());
        let report = session.run(&provider(4096), &DumpConfig::default()).unwrap();

        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(report, TransferReport { bytes: 4096, chunks: 4 });

        let sink = session.into_sink();
        let head = sink.head.unwrap();
        assert_eq!(head.content_type, "application/octet-stream");
        assert_eq!(head.filename.as_deref(), Some("core.bin"));
    }

    #[test]
    fn test_session_aborts_on_missing_region() {
        let mut session = TransferSession::new(RecordingSink::new());
        let err = session
            .run(&MemoryRegions::new(), &DumpConfig::default())
            .unwrap_err();

        assert_eq!(err, DumpError::RegionNotFound(RegionId::core_dump()));
        assert_eq!(session.state(), SessionState::Aborted);

        let sink = session.into_sink();
        assert!(sink.head.is_none());
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn test_session_runs_once() {
        let provider = provider(2048);
        let mut session = TransferSession::new(RecordingSink::new());
        session.run(&provider, &DumpConfig::default()).unwrap();

        let err = session.run(&provider, &DumpConfig::default()).unwrap_err();
        assert_eq!(err, DumpError::TransportWrite(TransportError::Unusable));
        assert_eq!(session.state(), SessionState::Done);
        assert_eq!(session.into_sink().terminators(), 1);
    }

    #[test]
    fn test_zero_block_size_aborts_before_open() {
        let config = DumpConfig {
            block_size: 0,
            ..Default::default()
        };
        let mut sink = RecordingSink::new();
        let err = stream_region(&provider(1024), &config, &mut sink).unwrap_err();

        assert!(matches!(err, DumpError::Layout(_)));
        assert!(sink.head.is_none());
    }
}
