//! Flash partition access through the ESP-IDF partition API.

use std::ffi::CString;

use esp_idf_svc::sys::{self, esp, esp_partition_t};

use coredump_core::{DumpError, FlashRegion, RegionId, RegionProvider, StorageError};

/// A partition from the partition table.
///
/// The table entry is static for the lifetime of the firmware; the region
/// only borrows it.
pub struct EspPartitionRegion {
    raw: &'static esp_partition_t,
}

impl EspPartitionRegion {
    pub fn address(&self) -> u32 {
        self.raw.address
    }
}

impl FlashRegion for EspPartitionRegion {
    fn size(&self) -> u64 {
        u64::from(self.raw.size)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        let end = offset.checked_add(buf.len() as u64);
        if end.map_or(true, |end| end > self.size()) {
            return Err(StorageError::OutOfBounds {
                offset,
                len: buf.len(),
                size: self.size(),
            });
        }

        esp!(unsafe {
            sys::esp_partition_read(
                self.raw,
                offset as _,
                buf.as_mut_ptr() as *mut _,
                buf.len() as _,
            )
        })
        .map_err(|err| StorageError::Io(err.to_string()))
    }
}

/// Looks partitions up by `(type, subtype, label)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspPartitions;

impl RegionProvider for EspPartitions {
    type Region = EspPartitionRegion;

    fn find(&self, id: &RegionId) -> Result<EspPartitionRegion, DumpError> {
        let label =
            CString::new(id.label.as_str()).map_err(|_| DumpError::RegionNotFound(id.clone()))?;

        let raw = unsafe {
            sys::esp_partition_find_first(
                id.kind.raw() as sys::esp_partition_type_t,
                id.subtype.raw() as sys::esp_partition_subtype_t,
                label.as_ptr(),
            )
        };

        // SAFETY: partition table entries live for the whole program.
        match unsafe { raw.as_ref() } {
            Some(raw) => {
                log::debug!(
                    "Found partition {} at 0x{:x}, {} bytes",
                    id,
                    raw.address,
                    raw.size
                );
                Ok(EspPartitionRegion { raw })
            }
            None => Err(DumpError::RegionNotFound(id.clone())),
        }
    }
}
