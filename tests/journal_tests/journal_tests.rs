//! Tests for the Journal
//!
//! These tests verify:
//! - Write-and-flush applies exactly the written bytes and leaves no log
//! - A journaled but unflushed write is replayed on the next open
//! - Read-only opens report a pending log instead of replaying it
//! - Sequence numbers continue after a replay
//! - Concurrent writers are serialized

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::thread;

use common::*;
use vhdxlog::format::{Guid, LOG_SECTOR_SIZE};
use vhdxlog::{Config, HeaderStore, Journal, LogError, MemHeaders, MemImage};

const S: u64 = LOG_SECTOR_SIZE as u64;
const DATA_AREA: u64 = 2 << 20;

fn journal(image: MemImage, headers: MemHeaders) -> Journal<MemImage, MemHeaders> {
    Journal::new(image, headers, Config::default()).unwrap()
}

fn read_only() -> Config {
    Config::builder()
        .read_only(true)
        .image_name("disk.vhdx")
        .build()
        .unwrap()
}

// =============================================================================
// Write-and-Flush Tests
// =============================================================================

#[test]
fn test_write_and_flush_small_log() {
    // Log of 4 sectors; the entry needs 3 of them
    let mut image = MemImage::new(IMAGE_SIZE);
    let original = pattern(2 * SECTOR, 0x21);
    image.as_bytes_mut()[..2 * SECTOR].copy_from_slice(&original);
    let headers = MemHeaders::new(LOG_OFFSET, 4 * S);
    let journal = journal(image, headers);

    let data = pattern(5000, 0x99);
    journal.append_write_and_flush(&data, 1000).unwrap();

    let region = journal.region();
    assert!(region.is_empty());
    assert!(region.guid.is_zero());

    let (image, headers) = journal.into_parts();
    let bytes = image.as_bytes();
    assert_eq!(&bytes[..1000], &original[..1000]);
    assert_eq!(&bytes[1000..6000], &data[..]);
    assert_eq!(&bytes[6000..2 * SECTOR], &original[6000..]);

    assert!(headers.log_guid().is_zero());
    assert_eq!(headers.history().len(), 2);
    assert!(!headers.history()[0].is_zero());
}

#[test]
fn test_repeated_write_and_flush() {
    let (image, headers) = mem_image();
    let journal = journal(image, headers);

    for i in 0..20u64 {
        let data = vec![i as u8; 300];
        journal
            .append_write_and_flush(&data, DATA_AREA + i * 1000)
            .unwrap();
    }

    let region = journal.region();
    assert_eq!(region.sequence, 21);
    assert!(region.is_empty());

    journal.with_file(|image| {
        for i in 0..20u64 {
            let stored = read(image, DATA_AREA + i * 1000, 300);
            assert!(stored.iter().all(|&b| b == i as u8));
        }
    });
}

#[test]
fn test_write_spanning_whole_log_fails_then_recovers() {
    let (image, headers) = mem_image();
    let journal = journal(image, headers);

    let data = vec![1u8; LOG_LENGTH as usize];
    let result = journal.append_write_and_flush(&data, DATA_AREA);
    assert!(matches!(result, Err(LogError::LogFull { .. })));
    assert!(journal.region().guid.is_zero());

    journal.append_write_and_flush(&[2u8; 10], DATA_AREA).unwrap();
    journal.with_file(|image| {
        assert_eq!(read(image, DATA_AREA, 10), vec![2u8; 10]);
    });
}

#[test]
fn test_write_larger_than_log() {
    let (image, headers) = mem_image();
    let journal = journal(image, headers);

    let data = vec![1u8; LOG_LENGTH as usize + 1];
    assert!(matches!(
        journal.append_write_and_flush(&data, 0),
        Err(LogError::LogTooSmallForWrite { .. })
    ));
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_unflushed_write_replayed_on_open() {
    let (image, headers) = mem_image();
    let journal = journal(image, headers);

    let data = pattern(3 * SECTOR, 4);
    journal.append_write(&data, DATA_AREA).unwrap();
    assert!(journal.scan().unwrap().is_some());

    let (mut image, headers) = journal.into_parts();
    assert!(read(&mut image, DATA_AREA, 3 * SECTOR).iter().all(|&b| b == 0));
    assert!(!headers.log_guid().is_zero());

    let (journal, replayed) = Journal::open(image, headers, Config::default()).unwrap();
    assert!(replayed);

    let (mut image, headers) = journal.into_parts();
    assert_eq!(read(&mut image, DATA_AREA, 3 * SECTOR), data);
    assert!(headers.log_guid().is_zero());
}

#[test]
fn test_replay_in_same_session() {
    let (image, headers) = mem_image();
    let journal = journal(image, headers);

    journal.append_write(&[7u8; 64], DATA_AREA).unwrap();
    assert!(journal.parse_and_replay_log(false).unwrap());
    assert!(!journal.parse_and_replay_log(false).unwrap());

    journal.with_file(|image| {
        assert_eq!(read(image, DATA_AREA, 64), vec![7u8; 64]);
    });
}

#[test]
fn test_second_append_without_flush_refused() {
    let (image, headers) = mem_image();
    let journal = journal(image, headers);

    journal.append_write(&[1u8; 10], DATA_AREA).unwrap();
    assert!(matches!(
        journal.append_write(&[2u8; 10], DATA_AREA),
        Err(LogError::UnsupportedConcurrentLog)
    ));
}

#[test]
fn test_sequence_continues_after_replay() {
    let guid = Guid::generate();
    let (mut image, headers) = mem_image();
    place(&mut image, 10, &data_entry(guid, 41, DATA_AREA, 1));
    place(&mut image, 12, &data_entry(guid, 42, DATA_AREA + S, 2));

    let (journal, replayed) =
        Journal::open(image, headers.with_log_guid(guid), Config::default()).unwrap();
    assert!(replayed);
    assert_eq!(journal.region().sequence, 43);

    journal.append_write(&[3u8; 10], DATA_AREA).unwrap();
    let active = journal.scan().unwrap().unwrap();
    assert_eq!(active.last_sequence(), 43);
    assert_eq!(journal.region().sequence, 44);
}

#[test]
fn test_stale_guid_cleared() {
    let guid = Guid::generate();
    let (image, headers) = mem_image();

    let (journal, replayed) =
        Journal::open(image, headers.with_log_guid(guid), Config::default()).unwrap();
    assert!(!replayed);

    let (_, headers) = journal.into_parts();
    assert!(headers.log_guid().is_zero());
    assert_eq!(headers.history(), &[Guid::ZERO]);
}

// =============================================================================
// Read-Only Tests
// =============================================================================

#[test]
fn test_read_only_with_pending_log() {
    let (image, headers) = mem_image();
    let journal = journal(image, headers);
    journal.append_write(&[5u8; 10], DATA_AREA).unwrap();
    let (image, headers) = journal.into_parts();

    let err = match Journal::open(image, headers, read_only()) {
        Err(e) => e,
        Ok(_) => panic!("read-only open replayed a pending log"),
    };
    assert!(matches!(err, LogError::ReadOnlyWithPendingLog { ref image } if image == "disk.vhdx"));
    assert!(err.to_string().contains("vhdxlog replay 'disk.vhdx'"));
}

#[test]
fn test_read_only_leaves_log_untouched() {
    let guid = Guid::generate();
    let (mut image, headers) = mem_image();
    place(&mut image, 0, &data_entry(guid, 1, DATA_AREA, 9));
    let journal = Journal::new(image, headers.with_log_guid(guid), read_only()).unwrap();

    assert!(journal.parse_and_replay_log(true).is_err());

    let (mut image, headers) = journal.into_parts();
    assert_eq!(headers.log_guid(), guid);
    assert!(headers.history().is_empty());
    assert!(read(&mut image, DATA_AREA, SECTOR).iter().all(|&b| b == 0));
}

#[test]
fn test_read_only_without_log() {
    let (image, headers) = mem_image();
    let (journal, replayed) = Journal::open(image, headers, read_only()).unwrap();
    assert!(!replayed);

    assert!(matches!(
        journal.append_write(&[1u8; 10], 0),
        Err(LogError::ReadOnly { .. })
    ));
}

#[test]
fn test_read_only_keeps_stale_guid() {
    let guid = Guid::generate();
    let (image, headers) = mem_image();

    let (journal, replayed) =
        Journal::open(image, headers.with_log_guid(guid), read_only()).unwrap();
    assert!(!replayed);

    let (_, headers) = journal.into_parts();
    assert_eq!(headers.log_guid(), guid);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_writers() {
    let (image, headers) = mem_image();
    let journal = Arc::new(journal(image, headers));

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let journal = Arc::clone(&journal);
            thread::spawn(move || {
                for i in 0..8u64 {
                    let target = DATA_AREA + (t * 8 + i) * S;
                    let fill = (t * 8 + i) as u8 + 1;
                    journal
                        .append_write_and_flush(&vec![fill; SECTOR], target)
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(journal.region().sequence, 33);
    journal.with_file(|image| {
        for n in 0..32u64 {
            let stored = read(image, DATA_AREA + n * S, SECTOR);
            assert!(stored.iter().all(|&b| b == n as u8 + 1));
        }
    });
}
