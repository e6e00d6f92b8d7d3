//! Writer
//!
//! Turns one write (any offset, any length) into one log entry.
//!
//! ## Steps
//! 1. Refuse writes larger than the log, or while a log is still active
//! 2. Stamp a fresh log GUID into the image headers
//! 3. Split the range into sectors, merging partial first/last sectors with
//!    what is on disk
//! 4. Build the header, one data descriptor and one data sector per sector
//! 5. Checksum the whole entry and append it to the circular buffer
//! 6. Bump the sequence number and record the new tail

use tracing::{debug, warn};

use crate::checksum::stamp_checksum;
use crate::error::{LogError, Result};
use crate::format::{
    descriptor_sectors, DataSector, Guid, LogDescriptor, LogEntryHeader, CHECKSUM_OFFSET,
    DESCRIPTOR_SIZE, ENTRY_HEADER_SIZE, LEADING_BYTES, LOG_DATA_SIZE, LOG_SECTOR_SIZE,
    SECTOR_BYTES, TRAILING_BYTES,
};
use crate::image::{HeaderStore, ImageFile};

use super::buffer::write_sectors;
use super::LogRegion;

/// Append `data`, destined for file offset `offset`, as one log entry
///
/// Returns the header of the new entry. On success `region.read` still
/// points at the entry, ready to be flushed.
pub fn write_entry(
    file: &mut dyn ImageFile,
    headers: &mut dyn HeaderStore,
    region: &mut LogRegion,
    data: &[u8],
    offset: u64,
) -> Result<LogEntryHeader> {
    if data.len() as u64 > region.length {
        return Err(LogError::LogTooSmallForWrite {
            requested: data.len() as u64,
            capacity: region.length,
        });
    }

    // Only one unflushed entry at a time
    if !region.guid.is_zero() {
        return Err(LogError::UnsupportedConcurrentLog);
    }

    headers.mark_user_visible_write(file)?;

    let guid = Guid::generate();
    headers.persist_log_guid(file, guid)?;
    region.guid = guid;
    debug!("Started log session {}", guid);

    match append_entry(file, region, data, offset) {
        Ok(header) => Ok(header),
        Err(e) => {
            // Nothing was committed; drop the session again
            warn!("Log write failed, abandoning session {}: {}", guid, e);
            headers.persist_log_guid(file, Guid::ZERO)?;
            region.guid = Guid::ZERO;
            Err(e)
        }
    }
}

fn append_entry(
    file: &mut dyn ImageFile,
    region: &mut LogRegion,
    data: &[u8],
    offset: u64,
) -> Result<LogEntryHeader> {
    // 0 is never a valid sequence number
    if region.sequence == 0 {
        region.sequence = 1;
    }
    let sequence = region.sequence;

    let sectors = split_sectors(file, data, offset)?;
    let file_length = file.file_length()?;

    let mut header = LogEntryHeader {
        tail: region.tail,
        sequence_number: sequence,
        descriptor_count: sectors.len() as u32,
        log_guid: region.guid,
        flushed_file_offset: file_length,
        last_file_offset: file_length,
        ..LogEntryHeader::new()
    };

    let desc_sectors = descriptor_sectors(header.descriptor_count);
    let total_sectors = desc_sectors + header.descriptor_count;
    header.entry_length = total_sectors * LOG_SECTOR_SIZE;

    let mut buffer = vec![0u8; total_sectors as usize * SECTOR_BYTES];
    let data_start = desc_sectors as usize * SECTOR_BYTES;

    for (i, (target, sector)) in sectors.iter().enumerate() {
        let mut leading = [0u8; LEADING_BYTES];
        let mut middle = [0u8; LOG_DATA_SIZE];
        let mut trailing = [0u8; TRAILING_BYTES];
        leading.copy_from_slice(&sector[..LEADING_BYTES]);
        middle.copy_from_slice(&sector[LEADING_BYTES..LEADING_BYTES + LOG_DATA_SIZE]);
        trailing.copy_from_slice(&sector[LEADING_BYTES + LOG_DATA_SIZE..]);

        let desc = LogDescriptor::data(leading, trailing, *target, sequence);
        let desc_offset = ENTRY_HEADER_SIZE + i * DESCRIPTOR_SIZE;
        buffer[desc_offset..desc_offset + DESCRIPTOR_SIZE].copy_from_slice(&desc.encode());

        let sector_offset = data_start + i * SECTOR_BYTES;
        DataSector::new(sequence, &middle).encode_into(&mut buffer[sector_offset..]);
    }

    buffer[..ENTRY_HEADER_SIZE].copy_from_slice(&header.encode());
    header.checksum = stamp_checksum(&mut buffer, CHECKSUM_OFFSET);

    let start = region.write;
    let written = write_sectors(file, region, &buffer)?;
    if written != total_sectors {
        region.write = start;
        return Err(LogError::LogFull {
            needed: total_sectors,
            written,
        });
    }

    region.sequence += 1;
    region.tail = region.write;

    debug!(
        "Appended log entry seq={} ({} sectors) for {} bytes at offset {}",
        sequence,
        total_sectors,
        data.len(),
        offset
    );
    Ok(header)
}

/// Split `data` at `offset` into whole sectors keyed by their file offset
///
/// A partial first or last sector is filled in from the current file
/// contents.
fn split_sectors(
    file: &mut dyn ImageFile,
    data: &[u8],
    offset: u64,
) -> Result<Vec<(u64, Vec<u8>)>> {
    let sector_size = LOG_SECTOR_SIZE as u64;
    let mut sectors = Vec::new();

    let mut file_offset = offset - offset % sector_size;
    let mut in_sector = (offset % sector_size) as usize;
    let mut remaining = data;

    while !remaining.is_empty() {
        let take = (SECTOR_BYTES - in_sector).min(remaining.len());
        let mut sector = vec![0u8; SECTOR_BYTES];

        if take < SECTOR_BYTES {
            // read-modify-write
            file.read_at(file_offset, &mut sector)?;
        }
        sector[in_sector..in_sector + take].copy_from_slice(&remaining[..take]);

        sectors.push((file_offset, sector));
        remaining = &remaining[take..];
        file_offset += sector_size;
        in_sector = 0;
    }

    Ok(sectors)
}
