//! Shared helpers for building images and hand-crafted log entries

#![allow(dead_code)]

use vhdxlog::checksum::stamp_checksum;
use vhdxlog::format::{
    descriptor_sectors, DataSector, Guid, LogDescriptor, LogEntryHeader, CHECKSUM_OFFSET,
    DESCRIPTOR_SIZE, ENTRY_HEADER_SIZE, LOG_DATA_SIZE, SECTOR_BYTES,
};
use vhdxlog::{ImageFile, LogRegion, MemHeaders, MemImage};

pub const SECTOR: usize = SECTOR_BYTES;

/// Log region placement used by most tests: 1 MiB at 1 MiB
pub const LOG_OFFSET: u64 = 1 << 20;
pub const LOG_LENGTH: u64 = 1 << 20;

/// Image size covering the header area, the log, and some data space
pub const IMAGE_SIZE: usize = 3 << 20;

/// One change carried by a crafted entry
pub enum Change {
    Data { target: u64, sector: Vec<u8> },
    Zero { target: u64, length: u64 },
}

/// A deterministic, non-repeating byte pattern
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u32).wrapping_mul(31).wrapping_add(seed as u32 * 7) as u8)
        .collect()
}

/// A zeroed in-memory image with headers describing the standard log
pub fn mem_image() -> (MemImage, MemHeaders) {
    (MemImage::new(IMAGE_SIZE), MemHeaders::new(LOG_OFFSET, LOG_LENGTH))
}

/// The standard region with `guid` as the active log
pub fn region(guid: Guid) -> LogRegion {
    LogRegion::new(LOG_OFFSET, LOG_LENGTH, guid).unwrap()
}

/// Build a complete, checksummed entry
pub fn build_entry(guid: Guid, sequence: u64, changes: &[Change], file_length: u64) -> Vec<u8> {
    let count = changes.len() as u32;
    let desc_sectors = descriptor_sectors(count) as usize;
    let data_count = changes
        .iter()
        .filter(|c| matches!(c, Change::Data { .. }))
        .count();
    let total = desc_sectors + data_count;

    let mut buf = vec![0u8; total * SECTOR];
    let header = LogEntryHeader {
        entry_length: (total * SECTOR) as u32,
        sequence_number: sequence,
        descriptor_count: count,
        log_guid: guid,
        flushed_file_offset: file_length,
        last_file_offset: file_length,
        ..LogEntryHeader::new()
    };
    buf[..ENTRY_HEADER_SIZE].copy_from_slice(&header.encode());

    let mut data_index = 0;
    for (i, change) in changes.iter().enumerate() {
        let desc = match change {
            Change::Data { target, sector } => {
                assert_eq!(sector.len(), SECTOR);
                let mut leading = [0u8; 8];
                let mut middle = [0u8; LOG_DATA_SIZE];
                let mut trailing = [0u8; 4];
                leading.copy_from_slice(&sector[..8]);
                middle.copy_from_slice(&sector[8..SECTOR - 4]);
                trailing.copy_from_slice(&sector[SECTOR - 4..]);

                let offset = (desc_sectors + data_index) * SECTOR;
                DataSector::new(sequence, &middle).encode_into(&mut buf[offset..]);
                data_index += 1;
                LogDescriptor::data(leading, trailing, *target, sequence)
            }
            Change::Zero { target, length } => LogDescriptor::zero(*length, *target, sequence),
        };
        let offset = ENTRY_HEADER_SIZE + i * DESCRIPTOR_SIZE;
        buf[offset..offset + DESCRIPTOR_SIZE].copy_from_slice(&desc.encode());
    }

    stamp_checksum(&mut buf, CHECKSUM_OFFSET);
    buf
}

/// An entry writing one sector of `fill` at `target`
pub fn data_entry(guid: Guid, sequence: u64, target: u64, fill: u8) -> Vec<u8> {
    build_entry(
        guid,
        sequence,
        &[Change::Data {
            target,
            sector: vec![fill; SECTOR],
        }],
        IMAGE_SIZE as u64,
    )
}

/// Copy `bytes` into the log region starting at sector `sector`, wrapping
pub fn place(image: &mut MemImage, sector: u64, bytes: &[u8]) {
    let sectors_in_log = LOG_LENGTH / SECTOR as u64;
    for (i, chunk) in bytes.chunks(SECTOR).enumerate() {
        let idx = (sector + i as u64) % sectors_in_log;
        image
            .write_at(LOG_OFFSET + idx * SECTOR as u64, chunk)
            .unwrap();
    }
}

/// Read `len` bytes of the image at `offset`
pub fn read(image: &mut MemImage, offset: u64, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    image.read_at(offset, &mut buf).unwrap();
    buf
}
