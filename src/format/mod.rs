//! Binary Codec Module
//!
//! Encoding and decoding of the on-disk log structures of a VHDX image.
//! All integers are little-endian on disk, regardless of host endianness.
//!
//! ## Log Entry Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Descriptor Sector(s)                                    │
//! │   Entry Header (64) | Descriptor (32) | Descriptor ...  │
//! │   (128 slots per sector, header uses the first two)     │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Sector (4096) - one per data descriptor            │
//! │   "data" (4) | SeqHigh (4) | Payload (4084) | SeqLow (4)│
//! │   ... repeated ...                                      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Only byte-length checks happen here. Semantic validation lives in
//! [`crate::log::validate`].

mod descriptor;
mod guid;
mod header;
mod sector;

pub use descriptor::{DescriptorKind, LogDescriptor};
pub use guid::Guid;
pub use header::LogEntryHeader;
pub use sector::DataSector;

use crate::error::{LogError, Result};

// =============================================================================
// Shared Constants
// =============================================================================

/// 1 MiB, the unit of log region placement and file growth
pub const MIB: u64 = 1024 * 1024;

/// Size of every log I/O unit
pub const LOG_SECTOR_SIZE: u32 = 4096;

/// [`LOG_SECTOR_SIZE`] as a buffer length
pub const SECTOR_BYTES: usize = LOG_SECTOR_SIZE as usize;

/// Entry header size on disk
pub const ENTRY_HEADER_SIZE: usize = 64;

/// Descriptor size on disk
pub const DESCRIPTOR_SIZE: usize = 32;

/// Descriptor slots in one log sector
pub const DESCRIPTORS_PER_SECTOR: u32 = (SECTOR_BYTES / DESCRIPTOR_SIZE) as u32;

/// Payload bytes stored in a data sector (the rest live in the descriptor)
pub const LOG_DATA_SIZE: usize = 4084;

/// Payload bytes carried by a data descriptor before the data sector's part
pub const LEADING_BYTES: usize = 8;

/// Payload bytes carried by a data descriptor after the data sector's part
pub const TRAILING_BYTES: usize = 4;

/// Offset of the checksum field within the entry header
pub const CHECKSUM_OFFSET: usize = 4;

/// Entry header signature: "loge"
pub const ENTRY_SIGNATURE: u32 = u32::from_le_bytes(*b"loge");

/// Zero descriptor signature: "zero"
pub const ZERO_SIGNATURE: u32 = u32::from_le_bytes(*b"zero");

/// Data descriptor signature: "desc"
pub const DESC_SIGNATURE: u32 = u32::from_le_bytes(*b"desc");

/// Data sector signature: "data"
pub const DATA_SIGNATURE: u32 = u32::from_le_bytes(*b"data");

/// Number of sectors needed for the entry header plus `count` descriptors.
///
/// The header takes the space of two descriptors in the first sector.
pub fn descriptor_sectors(count: u32) -> u32 {
    let slots = count as u64 + 2;
    slots.div_ceil(DESCRIPTORS_PER_SECTOR as u64) as u32
}

/// Fail with a format error unless `bytes` holds at least `needed` bytes
pub(crate) fn ensure_len(bytes: &[u8], needed: usize, what: &str) -> Result<()> {
    if bytes.len() < needed {
        return Err(LogError::Format(format!(
            "{}: expected {} bytes, got {}",
            what,
            needed,
            bytes.len()
        )));
    }
    Ok(())
}
