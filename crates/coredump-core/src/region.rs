//! Storage region abstraction.
//!
//! A region is a named, fixed-size span of raw storage identified by
//! `(type, subtype, label)`, the way partitions are addressed in a flash
//! partition table. Implementations are provided per platform:
//! - `MemoryRegion` for tests and in-memory images
//! - `FileRegion` for raw dump images on Linux
//! - the ESP32 crate reads the real flash partition
//!
//! Readers only ever hold a borrowed reference to a region; the storage
//! layer owns it.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{DumpConfig, SizeSource};
use crate::error::{DumpError, LayoutError, StorageError};

/// Partition type in the partition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartitionType {
    App,
    Data,
}

impl PartitionType {
    /// Raw partition table value.
    pub fn raw(self) -> u8 {
        match self {
            PartitionType::App => 0x00,
            PartitionType::Data => 0x01,
        }
    }
}

/// Data partition subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataSubtype {
    Nvs,
    CoreDump,
    Other(u8),
}

impl DataSubtype {
    /// Raw partition table value.
    pub fn raw(self) -> u8 {
        match self {
            DataSubtype::Nvs => 0x02,
            DataSubtype::CoreDump => 0x03,
            DataSubtype::Other(raw) => raw,
        }
    }
}

/// Identity of a storage region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionId {
    #[serde(rename = "type")]
    pub kind: PartitionType,
    pub subtype: DataSubtype,
    pub label: String,
}

impl RegionId {
    pub fn new(kind: PartitionType, subtype: DataSubtype, label: impl Into<String>) -> Self {
        Self {
            kind,
            subtype,
            label: label.into(),
        }
    }

    /// The default crash-dump partition: `(data, coredump, "coredump")`.
    pub fn core_dump() -> Self {
        Self::new(PartitionType::Data, DataSubtype::CoreDump, "coredump")
    }
}

impl Default for RegionId {
    fn default() -> Self {
        Self::core_dump()
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (type 0x{:02x}, subtype 0x{:02x})",
            self.label,
            self.kind.raw(),
            self.subtype.raw()
        )
    }
}

/// Raw, random-access read over a storage region.
pub trait FlashRegion {
    /// Size of the region as reported by the storage layer.
    fn size(&self) -> u64;

    /// Fill `buf` with the bytes starting at `offset`.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError>;
}

impl<R: FlashRegion + ?Sized> FlashRegion for &R {
    fn size(&self) -> u64 {
        (**self).size()
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read(offset, buf)
    }
}

/// Looks up regions by identity.
pub trait RegionProvider {
    type Region: FlashRegion;

    /// Find a region, returning `DumpError::RegionNotFound` if absent.
    fn find(&self, id: &RegionId) -> Result<Self::Region, DumpError>;
}

impl<P: RegionProvider + ?Sized> RegionProvider for Arc<P> {
    type Region = P::Region;

    fn find(&self, id: &RegionId) -> Result<Self::Region, DumpError> {
        (**self).find(id)
    }
}

fn check_bounds(offset: u64, len: usize, size: u64) -> Result<(), StorageError> {
    match offset.checked_add(len as u64) {
        Some(end) if end <= size => Ok(()),
        _ => Err(StorageError::OutOfBounds { offset, len, size }),
    }
}

// ============================================================================
// Layout
// ============================================================================

/// Total payload size `N` and block size `B` of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionLayout {
    total_size: u64,
    block_size: usize,
}

impl RegionLayout {
    pub fn new(total_size: u64, block_size: usize) -> Result<Self, LayoutError> {
        if block_size == 0 {
            return Err(LayoutError::ZeroBlockSize);
        }
        if total_size == 0 {
            return Err(LayoutError::ZeroTotalSize);
        }
        Ok(Self {
            total_size,
            block_size,
        })
    }

    /// Pick the payload size for `config` against a region of `region_size` bytes.
    ///
    /// A fixed size larger than the region is clamped so the reader never
    /// runs off the end of the partition.
    pub fn resolve(config: &DumpConfig, region_size: u64) -> Result<Self, LayoutError> {
        let total_size = match config.size_source {
            SizeSource::Partition => region_size,
            SizeSource::Fixed if config.total_size > region_size => {
                warn!(
                    region = %config.region,
                    configured = config.total_size,
                    region_size,
                    "Configured dump size exceeds region, clamping"
                );
                region_size
            }
            SizeSource::Fixed => config.total_size,
        };
        Self::new(total_size, config.block_size)
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks of exactly `block_size` bytes.
    pub fn full_blocks(&self) -> u64 {
        self.total_size / self.block_size as u64
    }

    /// Length of the trailing short block (zero if none).
    pub fn remainder(&self) -> usize {
        (self.total_size % self.block_size as u64) as usize
    }

    /// Total number of blocks, `ceil(N / B)`.
    pub fn block_count(&self) -> u64 {
        self.full_blocks() + u64::from(self.remainder() > 0)
    }

    /// Lengths of every block in read order.
    pub fn block_lengths(&self) -> impl Iterator<Item = usize> {
        let block_size = self.block_size;
        let remainder = self.remainder();
        (0..self.full_blocks())
            .map(move |_| block_size)
            .chain((remainder > 0).then_some(remainder))
    }
}

// ============================================================================
// In-memory regions
// ============================================================================

/// A region backed by an in-memory image.
///
/// Clones share the image, the read counter and any injected fault.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    image: Arc<Vec<u8>>,
    bad_offset: Option<u64>,
    reads: Arc<AtomicUsize>,
}

impl MemoryRegion {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image: Arc::new(image),
            bad_offset: None,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// An image where byte `i` is `i mod 251`, so misplaced blocks are visible.
    pub fn patterned(size: usize) -> Self {
        Self::new((0..size).map(|i| (i % 251) as u8).collect())
    }

    /// Fail any read that covers `offset`, like an uncorrectable flash error.
    pub fn with_bad_byte(mut self, offset: u64) -> Self {
        self.bad_offset = Some(offset);
        self
    }

    /// Number of `read` calls made so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.image
    }
}

impl FlashRegion for MemoryRegion {
    fn size(&self) -> u64 {
        self.image.len() as u64
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        check_bounds(offset, buf.len(), self.size())?;

        if let Some(bad) = self.bad_offset {
            if (offset..offset + buf.len() as u64).contains(&bad) {
                return Err(StorageError::Io(format!(
                    "uncorrectable error at offset {}",
                    bad
                )));
            }
        }

        let start = offset as usize;
        buf.copy_from_slice(&self.image[start..start + buf.len()]);
        Ok(())
    }
}

/// Provider over a fixed set of in-memory regions.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegions {
    regions: HashMap<RegionId, MemoryRegion>,
}

impl MemoryRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: RegionId, region: MemoryRegion) -> Self {
        self.regions.insert(id, region);
        self
    }
}

impl RegionProvider for MemoryRegions {
    type Region = MemoryRegion;

    fn find(&self, id: &RegionId) -> Result<MemoryRegion, DumpError> {
        self.regions
            .get(id)
            .cloned()
            .ok_or_else(|| DumpError::RegionNotFound(id.clone()))
    }
}

// ============================================================================
// File-backed regions
// ============================================================================

/// A region backed by a raw image file, e.g. a partition dumped with esptool.
#[derive(Debug)]
pub struct FileRegion {
    file: Mutex<File>,
    size: u64,
}

impl FileRegion {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: Mutex::new(file),
            size,
        })
    }
}

impl FlashRegion for FileRegion {
    fn size(&self) -> u64 {
        self.size
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        check_bounds(offset, buf.len(), self.size)?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| StorageError::Io("image file lock poisoned".to_string()))?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }
}

/// Provider mapping region identities to image files.
///
/// Each lookup opens the file afresh so concurrent sessions never share a
/// cursor.
#[derive(Debug, Clone, Default)]
pub struct FileRegions {
    paths: HashMap<RegionId, PathBuf>,
}

impl FileRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: RegionId, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(id, path.into());
        self
    }
}

impl RegionProvider for FileRegions {
    type Region = FileRegion;

    fn find(&self, id: &RegionId) -> Result<FileRegion, DumpError> {
        let path = self
            .paths
            .get(id)
            .ok_or_else(|| DumpError::RegionNotFound(id.clone()))?;

        FileRegion::open(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => DumpError::RegionNotFound(id.clone()),
            _ => DumpError::StorageRead {
                offset: 0,
                len: 0,
                source: StorageError::from(err),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_layout_exact_multiple() {
        let layout = RegionLayout::new(65536, 1024).unwrap();
        assert_eq!(layout.full_blocks(), 64);
        assert_eq!(layout.remainder(), 0);
        assert_eq!(layout.block_count(), 64);
        assert!(layout.block_lengths().all(|len| len == 1024));
    }

    #[test]
    fn test_layout_with_remainder() {
        let layout = RegionLayout::new(65000, 1024).unwrap();
        assert_eq!(layout.full_blocks(), 63);
        assert_eq!(layout.remainder(), 488);
        assert_eq!(layout.block_count(), 64);
        assert_eq!(layout.block_lengths().last(), Some(488));
    }

    #[test]
    fn test_layout_smaller_than_block() {
        let layout = RegionLayout::new(100, 1024).unwrap();
        assert_eq!(layout.block_lengths().collect::<Vec<_>>(), vec![100]);
    }

    #[test]
    fn test_layout_rejects_zero_sizes() {
        assert_eq!(RegionLayout::new(1024, 0), Err(LayoutError::ZeroBlockSize));
        assert_eq!(RegionLayout::new(0, 1024), Err(LayoutError::ZeroTotalSize));
    }

    #[test]
    fn test_resolve_clamps_fixed_size_to_region() {
        let config = DumpConfig::default();
        let layout = RegionLayout::resolve(&config, 4096).unwrap();
        assert_eq!(layout.total_size(), 4096);
    }

    #[test]
    fn test_resolve_partition_size() {
        let config = DumpConfig {
            size_source: SizeSource::Partition,
            ..Default::default()
        };
        let layout = RegionLayout::resolve(&config, 131072).unwrap();
        assert_eq!(layout.total_size(), 131072);
    }

    #[test]
    fn test_memory_region_read_and_bounds() {
        let region = MemoryRegion::patterned(300);
        let mut buf = [0u8; 4];
        region.read(250, &mut buf).unwrap();
        assert_eq!(buf, [250, 0, 1, 2]);

        let err = region.read(298, &mut buf).unwrap_err();
        assert_eq!(
            err,
            StorageError::OutOfBounds {
                offset: 298,
                len: 4,
                size: 300
            }
        );
        assert_eq!(region.reads(), 2);
    }

    #[test]
    fn test_memory_region_bad_byte() {
        let region = MemoryRegion::patterned(64).with_bad_byte(10);
        let mut buf = [0u8; 8];
        assert!(region.read(0, &mut buf).is_ok());
        assert!(matches!(region.read(8, &mut buf), Err(StorageError::Io(_))));
    }

    #[test]
    fn test_memory_regions_lookup() {
        let regions = MemoryRegions::new().with(RegionId::core_dump(), MemoryRegion::patterned(16));
        assert!(regions.find(&RegionId::core_dump()).is_ok());

        let other = RegionId::new(PartitionType::Data, DataSubtype::Nvs, "nvs");
        assert_eq!(
            regions.find(&other).unwrap_err(),
            DumpError::RegionNotFound(other)
        );
    }

    #[test]
    fn test_file_regions_missing_file_is_not_found() {
        let regions = FileRegions::new().with(
            RegionId::core_dump(),
            std::env::temp_dir().join("coredump-core-does-not-exist.bin"),
        );
        assert_eq!(
            regions.find(&RegionId::core_dump()).unwrap_err(),
            DumpError::RegionNotFound(RegionId::core_dump())
        );
    }

    #[test]
    fn test_file_region_reads_image() {
        let path = std::env::temp_dir().join(format!("coredump-core-{}.bin", std::process::id()));
        std::fs::write(&path, (0u8..=255).collect::<Vec<_>>()).unwrap();

        let region = FileRegion::open(&path).unwrap();
        let mut buf = [0u8; 3];
        region.read(100, &mut buf).unwrap();
        assert_eq!(region.size(), 256);
        assert_eq!(buf, [100, 101, 102]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_region_id_display() {
        assert_eq!(
            RegionId::core_dump().to_string(),
            "coredump (type 0x01, subtype 0x03)"
        );
    }
}
