//! VHDX image headers
//!
//! A VHDX file carries two copies of its header, at 64 KiB and 128 KiB.
//! The valid copy with the higher sequence number is current. Updates are
//! written to the other copy with the next sequence number, so a torn write
//! always leaves one intact header behind.
//!
//! ## Header Layout (4096 bytes)
//! ```text
//! ┌──────────┬─────────┬──────────────┬────────────────────┬────────────────────┐
//! │"head" (4)│ CRC (4) │ Sequence (8) │ FileWriteGuid (16) │ DataWriteGuid (16) │
//! ├──────────┴─────────┴─┬────────────┼─────────────┬──────┴──────┬─────────────┤
//! │ LogGuid (16)         │ LogVer (2) │ Version (2) │ LogLen (4)  │ LogOff (8)  │
//! ├──────────────────────┴────────────┴─────────────┴─────────────┴─────────────┤
//! │ Reserved (4016)                                                             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```

use bytes::{Buf, BufMut};
use tracing::debug;

use crate::checksum::{checksum, stamp_checksum};
use crate::error::{LogError, Result};
use crate::format::{ensure_len, Guid, MIB};

use super::{HeaderStore, ImageFile};

/// Offset of the first header copy
pub const HEADER1_OFFSET: u64 = 64 * 1024;

/// Offset of the second header copy
pub const HEADER2_OFFSET: u64 = 128 * 1024;

/// Size of one header copy
pub const HEADER_SIZE: usize = 4096;

/// Header signature: "head"
const HEADER_SIGNATURE: u32 = u32::from_le_bytes(*b"head");

/// File type identifier written at offset 0
const FILE_IDENTIFIER: &[u8; 8] = b"vhdxfile";

/// Image format version written by [`VhdxHeaders::create`]
const FORMAT_VERSION: u16 = 1;

/// Only log layout version 0 exists
const LOG_VERSION: u16 = 0;

const HEADER_CHECKSUM_OFFSET: usize = 4;

/// One decoded header copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub signature: u32,
    pub checksum: u32,
    pub sequence_number: u64,
    pub file_write_guid: Guid,
    pub data_write_guid: Guid,
    pub log_guid: Guid,
    pub log_version: u16,
    pub version: u16,
    pub log_length: u32,
    pub log_offset: u64,
}

impl ImageHeader {
    /// Decode a header copy from the first 4096 bytes of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, HEADER_SIZE, "image header")?;

        let mut buf = &bytes[..HEADER_SIZE];
        let signature = buf.get_u32_le();
        let checksum = buf.get_u32_le();
        let sequence_number = buf.get_u64_le();
        let file_write_guid = Guid::decode(buf)?;
        buf.advance(Guid::SIZE);
        let data_write_guid = Guid::decode(buf)?;
        buf.advance(Guid::SIZE);
        let log_guid = Guid::decode(buf)?;
        buf.advance(Guid::SIZE);
        let log_version = buf.get_u16_le();
        let version = buf.get_u16_le();
        let log_length = buf.get_u32_le();
        let log_offset = buf.get_u64_le();

        Ok(Self {
            signature,
            checksum,
            sequence_number,
            file_write_guid,
            data_write_guid,
            log_guid,
            log_version,
            version,
            log_length,
            log_offset,
        })
    }

    /// Encode to a full 4096-byte header with its checksum stamped
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_SIZE];
        {
            let mut buf = &mut out[..];
            buf.put_u32_le(self.signature);
            buf.put_u32_le(0);
            buf.put_u64_le(self.sequence_number);
            buf.put_slice(&self.file_write_guid.encode());
            buf.put_slice(&self.data_write_guid.encode());
            buf.put_slice(&self.log_guid.encode());
            buf.put_u16_le(self.log_version);
            buf.put_u16_le(self.version);
            buf.put_u32_le(self.log_length);
            buf.put_u64_le(self.log_offset);
        }
        stamp_checksum(&mut out, HEADER_CHECKSUM_OFFSET);
        out
    }

    /// Read one copy from disk; `None` if its signature or checksum is bad
    fn read(file: &mut dyn ImageFile, offset: u64) -> Result<Option<Self>> {
        let mut bytes = vec![0u8; HEADER_SIZE];
        file.read_at(offset, &mut bytes)?;

        let header = Self::decode(&bytes)?;
        if header.signature != HEADER_SIGNATURE
            || checksum(&bytes, HEADER_CHECKSUM_OFFSET) != header.checksum
        {
            return Ok(None);
        }
        Ok(Some(header))
    }
}

/// The two redundant headers of a VHDX file
#[derive(Debug, Clone)]
pub struct VhdxHeaders {
    headers: [ImageHeader; 2],
    current: usize,
    session_guid: Guid,
    first_visible_write: bool,
}

impl VhdxHeaders {
    /// Read both header copies and select the current one
    pub fn load(file: &mut dyn ImageFile) -> Result<Self> {
        let first = ImageHeader::read(file, HEADER1_OFFSET)?;
        let second = ImageHeader::read(file, HEADER2_OFFSET)?;

        let (headers, current) = match (first, second) {
            // Equal sequence numbers are only consistent if the copies agree
            (Some(a), Some(b)) if a.sequence_number == b.sequence_number && a != b => {
                return Err(LogError::Format(format!(
                    "Both headers carry sequence number {} but differ",
                    a.sequence_number
                )))
            }
            (Some(a), Some(b)) => {
                let current = if b.sequence_number > a.sequence_number { 1 } else { 0 };
                ([a, b], current)
            }
            (Some(a), None) => ([a, a], 0),
            (None, Some(b)) => ([b, b], 1),
            (None, None) => {
                return Err(LogError::Format(
                    "No valid VHDX header found".to_string(),
                ))
            }
        };

        let active = headers[current];
        if active.log_version != LOG_VERSION {
            return Err(LogError::Format(format!(
                "Unsupported log version: {}",
                active.log_version
            )));
        }
        if active.log_offset < MIB || active.log_offset % MIB != 0 {
            return Err(LogError::Format(format!(
                "Log offset {} is not a nonzero multiple of 1 MiB",
                active.log_offset
            )));
        }
        if active.log_length as u64 % MIB != 0 {
            return Err(LogError::Format(format!(
                "Log length {} is not a multiple of 1 MiB",
                active.log_length
            )));
        }

        debug!(
            "Loaded VHDX headers: current={} sequence={} log_guid={}",
            current + 1,
            active.sequence_number,
            active.log_guid
        );

        Ok(Self {
            headers,
            current,
            session_guid: Guid::generate(),
            first_visible_write: true,
        })
    }

    /// Write a fresh pair of headers describing a log at
    /// `log_offset`/`log_length`, and make sure the file covers the log
    pub fn create(file: &mut dyn ImageFile, log_offset: u64, log_length: u32) -> Result<Self> {
        let header = ImageHeader {
            signature: HEADER_SIGNATURE,
            checksum: 0,
            sequence_number: 0,
            file_write_guid: Guid::generate(),
            data_write_guid: Guid::generate(),
            log_guid: Guid::ZERO,
            log_version: LOG_VERSION,
            version: FORMAT_VERSION,
            log_length,
            log_offset,
        };

        file.write_at(0, FILE_IDENTIFIER)?;
        let mut second = header;
        second.sequence_number = 1;
        file.write_at(HEADER1_OFFSET, &header.encode())?;
        file.write_at(HEADER2_OFFSET, &second.encode())?;
        file.extend_file(log_offset + log_length as u64)?;
        file.sync()?;

        Self::load(file)
    }

    /// The header copy currently in effect
    pub fn current(&self) -> &ImageHeader {
        &self.headers[self.current]
    }

    /// Write the non-current copy with the next sequence number and make it
    /// current
    fn update_header(
        &mut self,
        file: &mut dyn ImageFile,
        data_write_guid: Option<Guid>,
        log_guid: Option<Guid>,
    ) -> Result<()> {
        let inactive = 1 - self.current;
        let offset = if inactive == 0 { HEADER1_OFFSET } else { HEADER2_OFFSET };

        let mut header = self.headers[self.current];
        header.sequence_number += 1;
        header.file_write_guid = self.session_guid;
        if let Some(guid) = data_write_guid {
            header.data_write_guid = guid;
        }
        if let Some(guid) = log_guid {
            header.log_guid = guid;
        }

        let bytes = header.encode();
        header.checksum = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        file.write_at(offset, &bytes)?;
        file.sync()?;

        self.headers[inactive] = header;
        self.current = inactive;
        Ok(())
    }

    /// Update both copies so they agree
    fn update_headers(
        &mut self,
        file: &mut dyn ImageFile,
        generate_data_write_guid: bool,
        log_guid: Option<Guid>,
    ) -> Result<()> {
        let data_write_guid = generate_data_write_guid.then(Guid::generate);
        self.update_header(file, data_write_guid, log_guid)?;
        self.update_header(file, data_write_guid, log_guid)
    }
}

impl HeaderStore for VhdxHeaders {
    fn log_guid(&self) -> Guid {
        self.current().log_guid
    }

    fn log_offset(&self) -> u64 {
        self.current().log_offset
    }

    fn log_length(&self) -> u64 {
        self.current().log_length as u64
    }

    fn persist_log_guid(&mut self, file: &mut dyn ImageFile, guid: Guid) -> Result<()> {
        debug!("Persisting log guid {}", guid);
        self.update_headers(file, false, Some(guid))
    }

    fn mark_user_visible_write(&mut self, file: &mut dyn ImageFile) -> Result<()> {
        if self.first_visible_write {
            self.first_visible_write = false;
            self.update_headers(file, true, None)?;
        }
        Ok(())
    }
}
