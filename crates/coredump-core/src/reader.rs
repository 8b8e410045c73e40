//! Sequential, chunked reader over a storage region.

use crate::error::DumpError;
use crate::region::{FlashRegion, RegionLayout};

/// Reads a region front to back in fixed-size blocks.
///
/// The reader owns a single buffer of `min(block_size, total_size)` bytes;
/// every block it hands out borrows that buffer, so the next block can only
/// be read once the previous one has been consumed. `floor(N/B)` full blocks are yielded,
/// then one short block of `N mod B` bytes if that is nonzero.
///
/// A failed read fuses the reader. It never rewinds.
pub struct PartitionReader<'r, R: FlashRegion + ?Sized> {
    region: &'r R,
    buf: Vec<u8>,
    offset: u64,
    remaining: u64,
    fused: bool,
}

impl<'r, R: FlashRegion + ?Sized> PartitionReader<'r, R> {
    pub fn new(region: &'r R, layout: RegionLayout) -> Self {
        // A block never exceeds the payload, whatever the configured size.
        let capacity = layout.total_size().min(layout.block_size() as u64) as usize;
        Self {
            region,
            buf: vec![0; capacity],
            offset: 0,
            remaining: layout.total_size(),
            fused: false,
        }
    }

    /// Read the next block, or `None` once the region is exhausted or a
    /// read has failed.
    pub fn next_block(&mut self) -> Option<Result<&[u8], DumpError>> {
        if self.fused || self.remaining == 0 {
            return None;
        }

        let len = self.remaining.min(self.buf.len() as u64) as usize;
        let offset = self.offset;

        if let Err(source) = self.region.read(offset, &mut self.buf[..len]) {
            self.fused = true;
            return Some(Err(DumpError::StorageRead {
                offset,
                len,
                source,
            }));
        }

        self.offset += len as u64;
        self.remaining -= len as u64;
        Some(Ok(&self.buf[..len]))
    }

    /// Bytes read so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Bytes still to read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Payload size; always `offset() + remaining()`.
    pub fn total(&self) -> u64 {
        self.offset + self.remaining
    }

    pub fn is_fused(&self) -> bool {
        self.fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::region::MemoryRegion;
    use pretty_assertions::assert_eq;

    fn block_lengths(region: &MemoryRegion, total: u64, block: usize) -> Vec<usize> {
        let layout = RegionLayout::new(total, block).unwrap();
        let mut reader = PartitionReader::new(region, layout);
        let mut lengths = Vec::new();
        while let Some(block) = reader.next_block() {
            lengths.push(block.unwrap().len());
            assert_eq!(reader.offset() + reader.remaining(), total);
        }
        lengths
    }

    #[test]
    fn test_full_region_in_full_blocks() {
        let region = MemoryRegion::patterned(65536);
        let lengths = block_lengths(&region, 65536, 1024);
        assert_eq!(lengths.len(), 64);
        assert!(lengths.iter().all(|&len| len == 1024));
        assert_eq!(region.reads(), 64);
    }

    #[test]
    fn test_short_final_block() {
        let region = MemoryRegion::patterned(65536);
        let lengths = block_lengths(&region, 65000, 1024);
        assert_eq!(lengths.len(), 64);
        assert_eq!(lengths[62], 1024);
        assert_eq!(lengths[63], 488);
    }

    #[test]
    fn test_blocks_carry_region_bytes_in_order() {
        let region = MemoryRegion::patterned(5000);
        let layout = RegionLayout::new(5000, 1024).unwrap();
        let mut reader = PartitionReader::new(&region, layout);

        let mut out = Vec::new();
        while let Some(block) = reader.next_block() {
            out.extend_from_slice(block.unwrap());
        }
        assert_eq!(out, region.bytes());
    }

    #[test]
    fn test_oversized_block_reads_payload_in_one_block() {
        let region = MemoryRegion::patterned(16);
        let layout = RegionLayout::new(16, usize::MAX).unwrap();
        let mut reader = PartitionReader::new(&region, layout);

        assert_eq!(reader.next_block().unwrap().unwrap(), region.bytes());
        assert!(reader.next_block().is_none());
        assert_eq!(region.reads(), 1);
    }

    #[test]
    fn test_never_reads_past_total() {
        // Region is larger than the payload: the tail must not be touched.
        let region = MemoryRegion::patterned(4096).with_bad_byte(3000);
        let lengths = block_lengths(&region, 2500, 1000);
        assert_eq!(lengths, vec![1000, 1000, 500]);
    }

    #[test]
    fn test_read_failure_fuses_reader() {
        let region = MemoryRegion::patterned(4096).with_bad_byte(2048);
        let layout = RegionLayout::new(4096, 1024).unwrap();
        let mut reader = PartitionReader::new(&region, layout);

        assert!(reader.next_block().unwrap().is_ok());
        assert!(reader.next_block().unwrap().is_ok());
        match reader.next_block() {
            Some(Err(DumpError::StorageRead {
                offset,
                len,
                source: StorageError::Io(_),
            })) => {
                assert_eq!(offset, 2048);
                assert_eq!(len, 1024);
            }
            other => panic!("Expected StorageRead, got {:?}", other.map(|r| r.map(<[u8]>::len))),
        }

        assert!(reader.is_fused());
        assert!(reader.next_block().is_none());
        assert_eq!(reader.offset(), 2048);
        assert_eq!(reader.total(), 4096);
        assert_eq!(region.reads(), 3);
    }
}
