//! Tests for the on-disk codec
//!
//! These tests verify:
//! - Hand-assembled byte images decode to the expected fields
//! - Short buffers and unknown signatures are rejected
//! - Checksums ignore the bytes of their own field

use vhdxlog::checksum::{checksum, stamp_checksum, verify_checksum};
use vhdxlog::format::{
    DataSector, DescriptorKind, Guid, LogDescriptor, LogEntryHeader,
    CHECKSUM_OFFSET, DATA_SIGNATURE, ENTRY_SIGNATURE,
};
use vhdxlog::LogError;

fn sample_guid() -> Guid {
    Guid {
        data1: 0xdead_beef,
        data2: 0x0102,
        data3: 0x0304,
        data4: [1, 2, 3, 4, 5, 6, 7, 8],
    }
}

// =============================================================================
// Signature Tests
// =============================================================================

#[test]
fn test_signatures_are_ascii_tags() {
    assert_eq!(&ENTRY_SIGNATURE.to_le_bytes(), b"loge");
    assert_eq!(&LogDescriptor::zero(0, 0, 1).signature().to_le_bytes(), b"zero");
    assert_eq!(
        &LogDescriptor::data([0; 8], [0; 4], 0, 1).signature().to_le_bytes(),
        b"desc"
    );
}

// =============================================================================
// Entry Header Tests
// =============================================================================

#[test]
fn test_decode_hand_built_header() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"loge");
    bytes.extend_from_slice(&0x1122_3344u32.to_le_bytes());
    bytes.extend_from_slice(&(3 * 4096u32).to_le_bytes());
    bytes.extend_from_slice(&8192u32.to_le_bytes());
    bytes.extend_from_slice(&0x0000_0001_0000_0002u64.to_le_bytes());
    bytes.extend_from_slice(&2u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&sample_guid().encode());
    bytes.extend_from_slice(&(4u64 << 20).to_le_bytes());
    bytes.extend_from_slice(&(5u64 << 20).to_le_bytes());
    assert_eq!(bytes.len(), 64);

    let header = LogEntryHeader::decode(&bytes).unwrap();
    assert_eq!(header.signature, ENTRY_SIGNATURE);
    assert_eq!(header.checksum, 0x1122_3344);
    assert_eq!(header.entry_length, 3 * 4096);
    assert_eq!(header.tail, 8192);
    assert_eq!(header.sequence_number, (1 << 32) | 2);
    assert_eq!(header.descriptor_count, 2);
    assert_eq!(header.log_guid, sample_guid());
    assert_eq!(header.flushed_file_offset, 4 << 20);
    assert_eq!(header.last_file_offset, 5 << 20);

    assert_eq!(&header.encode()[..], &bytes[..]);
}

#[test]
fn test_header_short_buffer() {
    let result = LogEntryHeader::decode(&[0u8; 63]);
    assert!(matches!(result, Err(LogError::Format(_))));
}

// =============================================================================
// Descriptor Tests
// =============================================================================

#[test]
fn test_decode_hand_built_zero_descriptor() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"zero");
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&(16 * 4096u64).to_le_bytes());
    bytes.extend_from_slice(&(1u64 << 21).to_le_bytes());
    bytes.extend_from_slice(&77u64.to_le_bytes());

    let desc = LogDescriptor::decode(&bytes).unwrap();
    assert_eq!(desc.kind, DescriptorKind::Zero { length: 16 * 4096 });
    assert_eq!(desc.target_offset, 1 << 21);
    assert_eq!(desc.sequence_number, 77);
    assert!(!desc.is_data());
}

#[test]
fn test_decode_hand_built_data_descriptor() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"desc");
    bytes.extend_from_slice(&[0xf1, 0xf2, 0xf3, 0xf4]);
    bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    bytes.extend_from_slice(&4096u64.to_le_bytes());
    bytes.extend_from_slice(&9u64.to_le_bytes());

    let desc = LogDescriptor::decode(&bytes).unwrap();
    assert_eq!(
        desc.kind,
        DescriptorKind::Data {
            leading: [1, 2, 3, 4, 5, 6, 7, 8],
            trailing: [0xf1, 0xf2, 0xf3, 0xf4],
        }
    );
    assert_eq!(desc.target_offset, 4096);
    assert_eq!(desc.sequence_number, 9);
    assert_eq!(&desc.encode()[..], &bytes[..]);
}

#[test]
fn test_descriptor_unknown_signature() {
    let mut bytes = [0u8; 32];
    bytes[..4].copy_from_slice(b"data");
    assert!(matches!(
        LogDescriptor::decode(&bytes),
        Err(LogError::Format(_))
    ));
}

#[test]
fn test_descriptor_short_buffer() {
    assert!(LogDescriptor::decode(b"zero").is_err());
}

// =============================================================================
// Data Sector Tests
// =============================================================================

#[test]
fn test_decode_hand_built_data_sector() {
    let mut bytes = vec![0u8; 4096];
    bytes[..4].copy_from_slice(b"data");
    bytes[4..8].copy_from_slice(&3u32.to_le_bytes());
    bytes[8] = 0xaa;
    bytes[4091] = 0xbb;
    bytes[4092..].copy_from_slice(&5u32.to_le_bytes());

    let sector = DataSector::decode(&bytes).unwrap();
    assert_eq!(sector.signature, DATA_SIGNATURE);
    assert_eq!(sector.sequence(), (3 << 32) | 5);
    assert_eq!(sector.data[0], 0xaa);
    assert_eq!(sector.data[4083], 0xbb);
    assert_eq!(sector.encode(), bytes);
}

#[test]
fn test_data_sector_short_buffer() {
    assert!(DataSector::decode(&[0u8; 4095]).is_err());
}

// =============================================================================
// GUID Tests
// =============================================================================

#[test]
fn test_guid_display() {
    assert_eq!(
        sample_guid().to_string(),
        "deadbeef-0102-0304-0102-030405060708"
    );
    assert_eq!(
        Guid::ZERO.to_string(),
        "00000000-0000-0000-0000-000000000000"
    );
}

#[test]
fn test_generated_guids_differ() {
    let a = Guid::generate();
    let b = Guid::generate();
    assert_ne!(a, b);
    assert!(!a.is_zero());
}

// =============================================================================
// Checksum Tests
// =============================================================================

#[test]
fn test_checksum_skips_its_own_field() {
    let mut entry = vec![0x5au8; 4096];
    let stored = stamp_checksum(&mut entry, CHECKSUM_OFFSET);
    assert_eq!(&entry[4..8], &stored.to_le_bytes());

    // Whatever sits in the field does not change the result
    assert_eq!(checksum(&entry, CHECKSUM_OFFSET), stored);
    verify_checksum(&entry, CHECKSUM_OFFSET, stored).unwrap();

    entry[4000] ^= 1;
    assert!(matches!(
        verify_checksum(&entry, CHECKSUM_OFFSET, stored),
        Err(LogError::ChecksumMismatch { .. })
    ));
}
