//! Circular Log Buffer
//!
//! Sector-granular reads and writes over the log region, driven by the
//! `read`/`write` cursors of a [`LogRegion`].
//!
//! Reads stop when they reach `write`. Writes stop before the sector that
//! would make `write == read`, keeping one sector permanently open.

use crate::error::{LogError, Result};
use crate::format::{LogEntryHeader, ENTRY_HEADER_SIZE, LOG_SECTOR_SIZE, SECTOR_BYTES};
use crate::image::ImageFile;

use super::LogRegion;

/// Decode the entry header at `read` without moving the cursor
pub fn peek_header(file: &mut dyn ImageFile, region: &LogRegion) -> Result<LogEntryHeader> {
    if region.is_empty() {
        return Err(LogError::LogEmpty);
    }

    let mut bytes = [0u8; ENTRY_HEADER_SIZE];
    file.read_at(region.sector_offset(region.read), &mut bytes)?;
    LogEntryHeader::decode(&bytes)
}

/// Read up to `count` sectors starting at `read`
///
/// Returns the sectors read and how many there were; fewer than `count`
/// means the read reached `write`. The cursor only moves when `advance` is
/// set.
pub fn read_sectors(
    file: &mut dyn ImageFile,
    region: &mut LogRegion,
    count: u32,
    advance: bool,
) -> Result<(Vec<u8>, u32)> {
    let mut buffer = Vec::with_capacity(count as usize * SECTOR_BYTES);
    let mut read = region.read;
    let mut sectors_read = 0;

    while sectors_read < count {
        if read == region.write {
            break;
        }

        let start = buffer.len();
        buffer.resize(start + SECTOR_BYTES, 0);
        file.read_at(region.sector_offset(read), &mut buffer[start..])?;

        read = region.advance(read);
        sectors_read += 1;
    }

    if advance {
        region.read = read;
    }
    Ok((buffer, sectors_read))
}

/// Append whole sectors from `buffer` at `write`
///
/// Returns how many sectors were written. The count is short when the log
/// filled up; the sectors that did fit are already written and `write` has
/// moved past them.
pub fn write_sectors(
    file: &mut dyn ImageFile,
    region: &mut LogRegion,
    buffer: &[u8],
) -> Result<u32> {
    debug_assert_eq!(buffer.len() % SECTOR_BYTES, 0);

    let mut sectors_written = 0;
    for sector in buffer.chunks_exact(SECTOR_BYTES) {
        let offset = region.sector_offset(region.write);
        let next = region.advance(region.write);
        if next == region.read {
            // full
            break;
        }

        file.write_at(offset, sector)?;
        region.write = next;
        sectors_written += 1;
    }

    Ok(sectors_written)
}

/// Bytes between two cursors, walking forward with wrap-around
pub fn distance(region: &LogRegion, from: u32, to: u32) -> u64 {
    if to >= from {
        (to - from) as u64
    } else {
        region.length - from as u64 + to as u64
    }
}

/// `idx` moved forward by `bytes` (a sector multiple), wrapping around
pub fn advance_by(region: &LogRegion, idx: u32, bytes: u64) -> u32 {
    debug_assert_eq!(bytes % LOG_SECTOR_SIZE as u64, 0);
    ((idx as u64 + bytes) % region.length) as u32
}
