//! Sequence Scanner
//!
//! Finds the active sequence after a crash or unclean shutdown.
//!
//! ## Algorithm
//! 1. Treat the whole region as full (`read = 0`, `write = length`)
//! 2. At each position, try to read a valid entry; on failure move one
//!    sector forward (stale and torn sectors are expected)
//! 3. From a valid entry, extend the chain while the next entry is valid and
//!    carries the next sequence number
//! 4. Keep the chain ending at the highest sequence number
//! 5. Stop once the cursor wraps back behind where the iteration started

use tracing::{debug, trace};

use crate::error::{LogError, Result};
use crate::image::ImageFile;

use super::entry::{read_entry, LogEntry};
use super::{ActiveSequence, LogRegion};

/// Scan the whole log region of `region` once
///
/// Invalid entries are skipped; only I/O errors are returned.
pub fn scan(file: &mut dyn ImageFile, region: &LogRegion) -> Result<Option<ActiveSequence>> {
    let mut cursor = *region;
    cursor.read = 0;
    cursor.write = region.length as u32;

    let mut winner: Option<ActiveSequence> = None;

    loop {
        let start = cursor.read;

        match try_entry(file, &cursor, None)? {
            // An entry spanning the whole region can never have been written
            Some(first) if (first.header.entry_length as u64) < region.length => {
                let mut covered = first.header.entry_length as u64;
                let mut current = ActiveSequence {
                    log: LogRegion {
                        read: start,
                        write: first.end,
                        ..*region
                    },
                    count: 1,
                    last: first.header,
                };
                cursor.read = first.end;

                while let Some(next) =
                    try_entry(file, &cursor, Some(current.last.sequence_number))?
                {
                    // A chain can never cover the whole region
                    covered += next.header.entry_length as u64;
                    if covered >= region.length {
                        break;
                    }

                    cursor.read = next.end;
                    current.log.write = next.end;
                    current.count += 1;
                    current.last = next.header;
                }

                trace!(
                    "Candidate chain at {}: {} entries ending at seq={}",
                    start,
                    current.count,
                    current.last_sequence()
                );

                // Equal ends mean one chain is a suffix of the other (the scan
                // began inside a wrapped chain); the longer one is complete
                let better = winner.as_ref().map_or(true, |w| {
                    current.last_sequence() > w.last_sequence()
                        || (current.last_sequence() == w.last_sequence() && current.count > w.count)
                });
                if better {
                    winner = Some(current);
                }
            }
            _ => cursor.read = cursor.advance(cursor.read),
        }

        // One revolution done
        if cursor.read <= start {
            break;
        }
    }

    match &winner {
        Some(seq) => debug!(
            "Active log sequence: {} entries, read={} write={} last seq={}",
            seq.count,
            seq.log.read,
            seq.log.write,
            seq.last_sequence()
        ),
        None => debug!("No active log sequence found"),
    }

    Ok(winner)
}

/// Read an entry, turning anything other than an I/O failure into `None`
fn try_entry(
    file: &mut dyn ImageFile,
    cursor: &LogRegion,
    previous: Option<u64>,
) -> Result<Option<LogEntry>> {
    match read_entry(file, cursor, previous) {
        Ok(entry) => Ok(Some(entry)),
        Err(LogError::Io(e)) => Err(LogError::Io(e)),
        Err(reason) => {
            trace!("No entry at {}: {}", cursor.read, reason);
            Ok(None)
        }
    }
}
