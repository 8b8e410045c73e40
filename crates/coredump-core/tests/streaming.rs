//! End-to-end tests for streaming a region through a transfer session.
//!
//! These drive the public API the way a platform handler does: look up the
//! region, stream it into a sink, and check what the client would receive.

use coredump_core::{
    stream_region, DumpConfig, DumpError, MemoryRegion, MemoryRegions,
    RecordingSink, RegionId, SessionState, SizeSource, TransferSession, TransportError,
};
use pretty_assertions::assert_eq;

fn config(total_size: u64, block_size: usize) -> DumpConfig {
    DumpConfig {
        total_size,
        block_size,
        ..Default::default()
    }
}

fn regions(region: &MemoryRegion) -> MemoryRegions {
    MemoryRegions::new().with(RegionId::core_dump(), region.clone())
}

#[test]
fn test_block_counts_and_lengths() {
    let region = MemoryRegion::patterned(10_000);
    let provider = regions(&region);

    for (total, block) in [(1, 1), (1, 1024), (1023, 1024), (1024, 1024), (1025, 1024), (10_000, 7), (9_999, 3333)] {
        let mut sink = RecordingSink::new();
        let report = stream_region(&provider, &config(total, block), &mut sink).unwrap();

        let expected_chunks = (total as usize + block - 1) / block;
        let lengths: Vec<usize> = sink.data_chunks().map(Vec::len).collect();

        assert_eq!(lengths.len(), expected_chunks, "N={} B={}", total, block);
        assert!(lengths[..lengths.len() - 1].iter().all(|&len| len == block));
        assert_eq!(lengths.iter().sum::<usize>() as u64, total);
        if total % block as u64 == 0 {
            assert_eq!(*lengths.last().unwrap(), block);
        }

        assert_eq!(report.chunks, expected_chunks);
        assert_eq!(report.bytes, total);
        assert_eq!(sink.frames.last(), Some(&Vec::new()));
        assert_eq!(sink.terminators(), 1);
    }
}

#[test]
fn test_body_equals_region_prefix() {
    let region = MemoryRegion::patterned(65536);
    let mut sink = RecordingSink::new();
    stream_region(&regions(&region), &config(40_000, 1024), &mut sink).unwrap();

    assert_eq!(sink.body(), &region.bytes()[..40_000]);
}

#[test]
fn test_full_dump_is_64_chunks_plus_terminator() {
    let region = MemoryRegion::patterned(65536);
    let mut sink = RecordingSink::new();
    stream_region(&regions(&region), &DumpConfig::default(), &mut sink).unwrap();

    assert_eq!(sink.frames.len(), 65);
    assert!(sink.frames[..64].iter().all(|frame| frame.len() == 1024));
    assert!(sink.frames[64].is_empty());
    assert_eq!(sink.body(), region.bytes());
}

#[test]
fn test_short_final_chunk() {
    let region = MemoryRegion::patterned(65536);
    let mut sink = RecordingSink::new();
    stream_region(&regions(&region), &config(65000, 1024), &mut sink).unwrap();

    assert_eq!(sink.frames.len(), 65);
    assert!(sink.frames[..63].iter().all(|frame| frame.len() == 1024));
    assert_eq!(sink.frames[63].len(), 488);
    assert!(sink.frames[64].is_empty());
}

#[test]
fn test_missing_region_writes_nothing() {
    let mut session = TransferSession::new(RecordingSink::new());
    let err = session
        .run(&MemoryRegions::new(), &DumpConfig::default())
        .unwrap_err();

    assert!(matches!(err, DumpError::RegionNotFound(_)));
    assert_eq!(session.state(), SessionState::Aborted);
    assert_eq!(session.into_sink().attempts, 0);
}

#[test]
fn test_write_failure_after_ten_chunks() {
    let region = MemoryRegion::patterned(65536);
    let mut session = TransferSession::new(RecordingSink::failing_after(10));
    let err = session
        .run(&regions(&region), &DumpConfig::default())
        .unwrap_err();

    assert_eq!(err, DumpError::TransportWrite(TransportError::Closed));
    assert_eq!(session.state(), SessionState::Aborted);

    let sink = session.into_sink();
    assert_eq!(sink.data_chunks().count(), 10);
    assert_eq!(sink.terminators(), 0);
    // The 11th chunk was attempted and rejected; nothing after it.
    assert_eq!(sink.attempts, 11);
    assert_eq!(region.reads(), 11);
}

#[test]
fn test_read_failure_mid_transfer() {
    let region = MemoryRegion::patterned(65536).with_bad_byte(5 * 1024 + 17);
    let mut session = TransferSession::new(RecordingSink::new());
    let err = session
        .run(&regions(&region), &DumpConfig::default())
        .unwrap_err();

    assert!(matches!(err, DumpError::StorageRead { offset: 5120, len: 1024, .. }));
    assert_eq!(session.state(), SessionState::Aborted);

    let sink = session.into_sink();
    assert_eq!(sink.data_chunks().count(), 5);
    assert_eq!(sink.terminators(), 0);
    assert_eq!(region.reads(), 6);
}

#[test]
fn test_partition_sized_transfer() {
    let region = MemoryRegion::patterned(3 * 1024 + 100);
    let config = DumpConfig {
        size_source: SizeSource::Partition,
        ..Default::default()
    };
    let mut sink = RecordingSink::new();
    let report = stream_region(&regions(&region), &config, &mut sink).unwrap();

    assert_eq!(report.bytes, 3 * 1024 + 100);
    assert_eq!(report.chunks, 4);
}
