//! Flusher
//!
//! Replays an active sequence onto the image file and then marks the log
//! empty.
//!
//! ## Per Entry
//! 1. Refuse to continue if the entry expects a larger file than exists
//! 2. Re-read and re-verify the entry (descriptors and checksum)
//! 3. Apply each descriptor: data sectors are reassembled from the
//!    descriptor and its data sector, zero runs are written out in full
//! 4. Grow the file if the entry says it should be larger
//!
//! Afterwards the file is synced and the log GUID is cleared. If anything
//! fails the log is left untouched, so the next open replays it again.
//! Replaying twice is harmless: every descriptor overwrites its whole target.

use tracing::{debug, info};

use crate::config::{Config, ReplaySync};
use crate::error::{LogError, Result};
use crate::format::{
    DataSector, DescriptorKind, Guid, LogDescriptor, DATA_SIGNATURE, LEADING_BYTES,
    LOG_DATA_SIZE, LOG_SECTOR_SIZE, SECTOR_BYTES,
};
use crate::image::{HeaderStore, ImageFile};

use super::buffer::{advance_by, peek_header};
use super::entry::read_entry;
use super::{ActiveSequence, LogRegion};

/// Replay `sequence` and reset `region` to an empty log
pub fn flush(
    file: &mut dyn ImageFile,
    headers: &mut dyn HeaderStore,
    region: &mut LogRegion,
    sequence: &ActiveSequence,
    config: &Config,
) -> Result<()> {
    debug!(
        "Replaying {} log entries from {} (last seq={})",
        sequence.count,
        sequence.log.read,
        sequence.last_sequence()
    );

    headers.mark_user_visible_write(file)?;

    let mut cursor = sequence.log;
    for _ in 0..sequence.count {
        let header = peek_header(file, &cursor)?;
        let file_length = file.file_length()?;

        // The image was truncated behind the log's back
        if header.flushed_file_offset > file_length {
            return Err(LogError::CorruptImage(format!(
                "log entry {} expects at least {} bytes, file has {}",
                header.sequence_number, header.flushed_file_offset, file_length
            )));
        }

        let entry = read_entry(file, &cursor, None)?;

        // Every range is checked before the first byte of the entry lands
        let new_length = if entry.header.last_file_offset > file_length {
            Some(checked_file_end(
                align_up(entry.header.last_file_offset, config.allocation_granularity),
                entry.header.sequence_number,
            )?)
        } else {
            None
        };
        for desc in &entry.descriptors {
            checked_file_end(replay_end(desc), entry.header.sequence_number)?;
        }

        for (desc, data) in entry.changes() {
            replay_descriptor(file, desc, data, config.replay_sync)?;
        }

        if let Some(new_length) = new_length {
            debug!("Extending image from {} to {} bytes", file_length, new_length);
            file.extend_file(new_length)?;
        }

        cursor.read = advance_by(&cursor, entry.start, entry.header.entry_length as u64);
    }

    file.sync()?;

    headers.persist_log_guid(file, Guid::ZERO)?;
    region.reset();

    info!("Log replayed: {} entries applied", sequence.count);
    Ok(())
}

/// Apply one descriptor to the image
fn replay_descriptor(
    file: &mut dyn ImageFile,
    desc: &LogDescriptor,
    data: Option<&DataSector>,
    sync: ReplaySync,
) -> Result<()> {
    let mut sector = vec![0u8; SECTOR_BYTES];

    let count = match (&desc.kind, data) {
        (DescriptorKind::Data { leading, trailing }, Some(data)) => {
            if data.signature != DATA_SIGNATURE {
                return Err(LogError::Format(format!(
                    "Bad data sector signature: 0x{:08x}",
                    data.signature
                )));
            }
            if data.sequence() != desc.sequence_number {
                return Err(LogError::SequenceDiscontinuity {
                    expected: desc.sequence_number,
                    found: data.sequence(),
                });
            }

            sector[..LEADING_BYTES].copy_from_slice(leading);
            sector[LEADING_BYTES..LEADING_BYTES + LOG_DATA_SIZE].copy_from_slice(&data.data[..]);
            sector[LEADING_BYTES + LOG_DATA_SIZE..].copy_from_slice(trailing);
            1
        }
        (DescriptorKind::Data { .. }, None) => {
            return Err(LogError::Format(
                "Data descriptor without a data sector".to_string(),
            ))
        }
        (DescriptorKind::Zero { length }, _) => length / LOG_SECTOR_SIZE as u64,
    };

    let mut offset = desc.target_offset;
    for _ in 0..count {
        file.write_at(offset, &sector)?;
        if sync == ReplaySync::EverySector {
            file.sync()?;
        }
        offset += LOG_SECTOR_SIZE as u64;
    }
    Ok(())
}

/// Round `value` up to a multiple of `granularity` (a power of two)
fn align_up(value: u64, granularity: u64) -> Option<u64> {
    value
        .checked_add(granularity - 1)
        .map(|v| v & !(granularity - 1))
}

/// End offset of the bytes `desc` writes, `None` on overflow
fn replay_end(desc: &LogDescriptor) -> Option<u64> {
    let length = match desc.kind {
        DescriptorKind::Data { .. } => LOG_SECTOR_SIZE as u64,
        DescriptorKind::Zero { length } => length,
    };
    desc.target_offset.checked_add(length)
}

/// Accept `end` only if it fits a signed 64-bit file offset
fn checked_file_end(end: Option<u64>, sequence_number: u64) -> Result<u64> {
    match end {
        Some(end) if end <= i64::MAX as u64 => Ok(end),
        _ => Err(LogError::CorruptImage(format!(
            "log entry {} reaches beyond the largest possible file offset",
            sequence_number
        ))),
    }
}
