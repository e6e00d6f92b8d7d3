//! Reading and verifying one whole log entry

use tracing::trace;

use crate::checksum::verify_checksum;
use crate::error::{LogError, Result};
use crate::format::{
    descriptor_sectors, DataSector, LogDescriptor, LogEntryHeader, CHECKSUM_OFFSET,
    DESCRIPTOR_SIZE, ENTRY_HEADER_SIZE, LOG_SECTOR_SIZE, SECTOR_BYTES,
};
use crate::image::ImageFile;

use super::buffer::{peek_header, read_sectors};
use super::validate::{descriptor_is_valid, entry_rejection};
use super::LogRegion;

/// A fully read and verified log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub header: LogEntryHeader,
    pub descriptors: Vec<LogDescriptor>,
    /// One per data descriptor, in descriptor order
    pub data_sectors: Vec<DataSector>,
    /// Log offset of the entry's first sector
    pub start: u32,
    /// Log offset just past the entry
    pub end: u32,
}

impl LogEntry {
    /// Descriptors paired with their data sector (`None` for zero runs)
    pub fn changes(&self) -> impl Iterator<Item = (&LogDescriptor, Option<&DataSector>)> {
        let mut data = self.data_sectors.iter();
        self.descriptors
            .iter()
            .map(move |desc| (desc, if desc.is_data() { data.next() } else { None }))
    }
}

/// Read the entry at `cursor.read` and verify it
///
/// Checks the header, every descriptor, the entry checksum and, when
/// `previous` is given, that the entry continues that sequence number.
/// `cursor` is not modified.
pub fn read_entry(
    file: &mut dyn ImageFile,
    cursor: &LogRegion,
    previous: Option<u64>,
) -> Result<LogEntry> {
    let mut cursor = *cursor;
    let start = cursor.read;

    let header = peek_header(file, &cursor)?;
    if let Some(err) = entry_rejection(&cursor, &header) {
        return Err(err);
    }

    if let Some(previous) = previous {
        if header.sequence_number != previous + 1 {
            return Err(LogError::SequenceDiscontinuity {
                expected: previous + 1,
                found: header.sequence_number,
            });
        }
    }

    let desc_sectors = descriptor_sectors(header.descriptor_count);
    let total_sectors = header.entry_length / LOG_SECTOR_SIZE;
    if total_sectors < desc_sectors {
        return Err(LogError::Format(format!(
            "Entry of {} sectors cannot hold {} descriptor sectors",
            total_sectors, desc_sectors
        )));
    }

    let (raw, sectors_read) = read_sectors(file, &mut cursor, total_sectors, true)?;
    if sectors_read != total_sectors {
        return Err(LogError::Format(format!(
            "Entry truncated: {} of {} sectors present",
            sectors_read, total_sectors
        )));
    }

    let mut descriptors = Vec::with_capacity(header.descriptor_count as usize);
    for i in 0..header.descriptor_count as usize {
        let offset = ENTRY_HEADER_SIZE + i * DESCRIPTOR_SIZE;
        let desc = LogDescriptor::decode(&raw[offset..])?;
        if !descriptor_is_valid(&desc, &header) {
            return Err(LogError::Format(format!(
                "Descriptor {} of entry {} is invalid",
                i, header.sequence_number
            )));
        }
        descriptors.push(desc);
    }

    verify_checksum(&raw, CHECKSUM_OFFSET, header.checksum)?;

    let data_count = descriptors.iter().filter(|d| d.is_data()).count();
    let data_start = desc_sectors as usize * SECTOR_BYTES;
    if data_count > (total_sectors - desc_sectors) as usize {
        return Err(LogError::Format(format!(
            "Entry has {} data descriptors but only {} data sectors",
            data_count,
            total_sectors - desc_sectors
        )));
    }

    let data_sectors = raw[data_start..]
        .chunks_exact(SECTOR_BYTES)
        .take(data_count)
        .map(DataSector::decode)
        .collect::<Result<Vec<_>>>()?;

    trace!(
        "Read log entry seq={} at {} ({} descriptors, {} bytes)",
        header.sequence_number,
        start,
        header.descriptor_count,
        header.entry_length
    );

    Ok(LogEntry {
        header,
        descriptors,
        data_sectors,
        start,
        end: cursor.read,
    })
}
