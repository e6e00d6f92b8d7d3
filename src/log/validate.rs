//! Entry & Descriptor Validator
//!
//! Pure structural checks, shared by the scanner and the flusher.

use crate::error::LogError;
use crate::format::{
    DescriptorKind, LogDescriptor, LogEntryHeader, DESCRIPTOR_SIZE, ENTRY_SIGNATURE,
    LOG_SECTOR_SIZE,
};

use super::LogRegion;

/// Whether `hdr` is a well-formed entry header for `region`
pub fn entry_is_valid(region: &LogRegion, hdr: &LogEntryHeader) -> bool {
    entry_rejection(region, hdr).is_none()
}

/// The reason `hdr` is not a valid entry header for `region`, if any
pub fn entry_rejection(region: &LogRegion, hdr: &LogEntryHeader) -> Option<LogError> {
    if hdr.signature != ENTRY_SIGNATURE {
        return Some(LogError::Format(format!(
            "Bad entry signature: 0x{:08x}",
            hdr.signature
        )));
    }

    // An entry larger than the whole log cannot be real
    if hdr.entry_length as u64 > region.length {
        return Some(LogError::Format(format!(
            "Entry length {} exceeds log length {}",
            hdr.entry_length, region.length
        )));
    }

    if hdr.entry_length % LOG_SECTOR_SIZE != 0 {
        return Some(LogError::Format(format!(
            "Entry length {} is not sector aligned",
            hdr.entry_length
        )));
    }

    if hdr.sequence_number == 0 {
        return Some(LogError::Format("Entry sequence number is zero".to_string()));
    }

    if hdr.log_guid != region.guid {
        return Some(LogError::GuidMismatch {
            found: hdr.log_guid.to_string(),
        });
    }

    if hdr.descriptor_count as u64 * DESCRIPTOR_SIZE as u64 > hdr.entry_length as u64 {
        return Some(LogError::Format(format!(
            "{} descriptors do not fit in an entry of {} bytes",
            hdr.descriptor_count, hdr.entry_length
        )));
    }

    None
}

/// Whether `desc` is a well-formed descriptor of the entry `hdr`
pub fn descriptor_is_valid(desc: &LogDescriptor, hdr: &LogEntryHeader) -> bool {
    if desc.sequence_number != hdr.sequence_number {
        return false;
    }

    if desc.target_offset % LOG_SECTOR_SIZE as u64 != 0 {
        return false;
    }

    match desc.kind {
        DescriptorKind::Zero { length } => length % LOG_SECTOR_SIZE as u64 == 0,
        // The signature was recognized when the variant was decoded
        DescriptorKind::Data { .. } => true,
    }
}
