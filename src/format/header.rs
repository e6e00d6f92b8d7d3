//! Log entry header codec
//!
//! ```text
//! ┌───────────┬──────────┬────────────┬──────────┬──────────────┐
//! │ "loge" (4)│ CRC (4)  │ EntryLen(4)│ Tail (4) │ Sequence (8) │
//! ├───────────┴──┬───────┴────┬───────┴──────────┴──────────────┤
//! │ DescCount (4)│ Reserved(4)│ LogGuid (16)                    │
//! ├──────────────┴────────────┴──┬──────────────────────────────┤
//! │ FlushedFileOffset (8)        │ LastFileOffset (8)           │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```

use bytes::{Buf, BufMut};
use serde::Serialize;

use crate::error::Result;

use super::{ensure_len, Guid, ENTRY_HEADER_SIZE, ENTRY_SIGNATURE};

/// Header at the start of every log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LogEntryHeader {
    pub signature: u32,
    /// CRC32C over the whole entry, computed with this field zeroed
    pub checksum: u32,
    /// Total entry length in bytes (sector multiple)
    pub entry_length: u32,
    /// Log offset of the oldest entry still needed at the time of writing
    pub tail: u32,
    /// Never zero for a valid entry
    pub sequence_number: u64,
    pub descriptor_count: u32,
    pub reserved: u32,
    pub log_guid: Guid,
    /// File size required before this entry can be replayed
    pub flushed_file_offset: u64,
    /// File size after this entry has been replayed
    pub last_file_offset: u64,
}

impl LogEntryHeader {
    /// A header with the "loge" signature and every other field zeroed
    pub fn new() -> Self {
        Self {
            signature: ENTRY_SIGNATURE,
            checksum: 0,
            entry_length: 0,
            tail: 0,
            sequence_number: 0,
            descriptor_count: 0,
            reserved: 0,
            log_guid: Guid::ZERO,
            flushed_file_offset: 0,
            last_file_offset: 0,
        }
    }

    /// Decode a header from the first 64 bytes of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, ENTRY_HEADER_SIZE, "log entry header")?;

        let mut buf = &bytes[..ENTRY_HEADER_SIZE];
        let signature = buf.get_u32_le();
        let checksum = buf.get_u32_le();
        let entry_length = buf.get_u32_le();
        let tail = buf.get_u32_le();
        let sequence_number = buf.get_u64_le();
        let descriptor_count = buf.get_u32_le();
        let reserved = buf.get_u32_le();
        let log_guid = Guid::decode(&buf[..Guid::SIZE])?;
        buf.advance(Guid::SIZE);
        let flushed_file_offset = buf.get_u64_le();
        let last_file_offset = buf.get_u64_le();

        Ok(Self {
            signature,
            checksum,
            entry_length,
            tail,
            sequence_number,
            descriptor_count,
            reserved,
            log_guid,
            flushed_file_offset,
            last_file_offset,
        })
    }

    /// Encode to the 64-byte on-disk form
    pub fn encode(&self) -> [u8; ENTRY_HEADER_SIZE] {
        let mut out = [0u8; ENTRY_HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.signature);
        buf.put_u32_le(self.checksum);
        buf.put_u32_le(self.entry_length);
        buf.put_u32_le(self.tail);
        buf.put_u64_le(self.sequence_number);
        buf.put_u32_le(self.descriptor_count);
        buf.put_u32_le(self.reserved);
        buf.put_slice(&self.log_guid.encode());
        buf.put_u64_le(self.flushed_file_offset);
        buf.put_u64_le(self.last_file_offset);
        out
    }
}

impl Default for LogEntryHeader {
    fn default() -> Self {
        Self::new()
    }
}
