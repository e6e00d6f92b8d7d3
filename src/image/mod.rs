//! Image Module
//!
//! The services the log engine consumes from the surrounding image driver.
//!
//! ## Responsibilities
//! - Raw positional I/O on the image file ([`ImageFile`])
//! - Access to the log location and log GUID held in the image's
//!   redundant headers ([`HeaderStore`])
//!
//! Two backends are provided for each: a real one over a VHDX file on disk
//! and an in-memory one for tooling and tests.

mod file;
mod header;
mod memory;

pub use file::FileImage;
pub use header::{ImageHeader, VhdxHeaders, HEADER1_OFFSET, HEADER2_OFFSET, HEADER_SIZE};
pub use memory::{MemHeaders, MemImage};

use crate::error::Result;
use crate::format::Guid;

/// Positional I/O on the image file
///
/// All methods take `&mut self`; the journal serializes access to the file.
pub trait ImageFile: Send {
    /// Fill `buf` from `offset`. Bytes past the end of the file read as zero.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write all of `data` at `offset`, growing the file if needed
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Flush everything written so far to durable storage
    fn sync(&mut self) -> Result<()>;

    /// Current length of the file in bytes
    fn file_length(&mut self) -> Result<u64>;

    /// Grow the file to `new_len` bytes. Never shrinks.
    fn extend_file(&mut self, new_len: u64) -> Result<()>;
}

/// The header fields the log engine reads and updates
pub trait HeaderStore: Send {
    /// GUID of the active log; zero when no log is active
    fn log_guid(&self) -> Guid;

    /// Byte offset of the log region within the image file
    fn log_offset(&self) -> u64;

    /// Length of the log region in bytes
    fn log_length(&self) -> u64;

    /// Persist `guid` as the log GUID in every header copy
    fn persist_log_guid(&mut self, file: &mut dyn ImageFile, guid: Guid) -> Result<()>;

    /// Called before the first modification of the image in a session
    fn mark_user_visible_write(&mut self, _file: &mut dyn ImageFile) -> Result<()> {
        Ok(())
    }
}
