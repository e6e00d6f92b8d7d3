//! Log Module
//!
//! The write-ahead log living inside the image file.
//!
//! ## Responsibilities
//! - Circular sector buffer over the log region ([`buffer`])
//! - Structural checks on entries and descriptors ([`validate`])
//! - Finding the active sequence after a crash ([`scanner`])
//! - Replaying a sequence onto the image ([`flusher`])
//! - Turning a write into a log entry ([`writer`])
//!
//! ## Region Layout
//! ```text
//!        read                      write
//!         │                          │
//! ┌───────▼──────────────────────────▼─────────────────────┐
//! │ free  │ entry N │ entry N+1 │ .. │ free ... (>= 1 sector)│
//! └────────────────────────────────────────────────────────┘
//!   ▲ wraps to 0 at `length`
//! ```
//!
//! `read == write` means empty. The writer never fills the last free
//! sector, so a full log is never mistaken for an empty one.

pub mod buffer;
mod entry;
pub mod flusher;
pub mod scanner;
pub mod validate;
pub mod writer;

pub use entry::{read_entry, LogEntry};

use serde::Serialize;

use crate::error::{LogError, Result};
use crate::format::{Guid, LogEntryHeader, LOG_SECTOR_SIZE};

// =============================================================================
// Log Region
// =============================================================================

/// Cursor state over the log region of one open image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogRegion {
    /// Start of the region within the image file
    pub file_offset: u64,
    /// Region size in bytes, a positive sector multiple
    pub length: u64,
    /// Offset of the oldest unflushed sector
    pub read: u32,
    /// Offset where the next entry will be written
    pub write: u32,
    /// Sequence number for the next entry
    pub sequence: u64,
    /// Write cursor after the last appended entry
    pub tail: u32,
    /// Current log GUID; zero when no log is active
    pub guid: Guid,
}

impl LogRegion {
    /// Create an empty region at `file_offset` spanning `length` bytes
    pub fn new(file_offset: u64, length: u64, guid: Guid) -> Result<Self> {
        let sector = LOG_SECTOR_SIZE as u64;

        if length == 0 || length % sector != 0 {
            return Err(LogError::InvalidRegion(format!(
                "length {} is not a positive multiple of {}",
                length, sector
            )));
        }
        if length > u32::MAX as u64 {
            return Err(LogError::InvalidRegion(format!(
                "length {} exceeds the 32-bit cursor range",
                length
            )));
        }
        if file_offset % sector != 0 {
            return Err(LogError::InvalidRegion(format!(
                "offset {} is not sector aligned",
                file_offset
            )));
        }

        Ok(Self {
            file_offset,
            length,
            read: 0,
            write: 0,
            sequence: 0,
            tail: 0,
            guid,
        })
    }

    /// `idx` moved forward one sector, wrapping at the end of the region
    pub fn advance(&self, idx: u32) -> u32 {
        let next = idx as u64 + LOG_SECTOR_SIZE as u64;
        if next >= self.length {
            0
        } else {
            next as u32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    /// Number of sectors a write could still append
    pub fn free_sectors(&self) -> u32 {
        let used = if self.write >= self.read {
            self.write as u64 - self.read as u64
        } else {
            self.length - self.read as u64 + self.write as u64
        };
        ((self.length - used) / LOG_SECTOR_SIZE as u64).saturating_sub(1) as u32
    }

    /// Absolute file offset of the log sector at `idx`
    pub(crate) fn sector_offset(&self, idx: u32) -> u64 {
        self.file_offset + idx as u64
    }

    /// Mark the log empty. A zero GUID is the on-disk "no log" marker.
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
        self.guid = Guid::ZERO;
    }
}

// =============================================================================
// Active Sequence
// =============================================================================

/// A contiguous run of valid entries found by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveSequence {
    /// Region snapshot: `read` at the first entry, `write` past the last
    pub log: LogRegion,
    /// Number of entries in the run
    pub count: u32,
    /// Header of the final entry
    pub last: LogEntryHeader,
}

impl ActiveSequence {
    /// Sequence number of the final entry
    pub fn last_sequence(&self) -> u64 {
        self.last.sequence_number
    }
}
