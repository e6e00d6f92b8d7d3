//! Journal Module
//!
//! The log engine of one open image, coordinating all log components.
//!
//! ## Responsibilities
//! - Own the [`LogRegion`] and the image collaborators
//! - Replay (or refuse) a pending log when the image is opened
//! - Journal writes, optionally flushing each one straight away

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LogError, Result};
use crate::format::Guid;
use crate::image::{HeaderStore, ImageFile};
use crate::log::{flusher, scanner, writer, ActiveSequence, LogRegion};

/// State guarded by the journal lock
struct JournalState<F, H> {
    file: F,
    headers: H,
    region: LogRegion,
}

/// Write-ahead log of one open image
///
/// ## Concurrency Model: Single Writer
///
/// Every operation holds `state` for its whole duration, so scanning,
/// replaying and writing never interleave. Concurrent callers block.
pub struct Journal<F: ImageFile, H: HeaderStore> {
    /// Journal configuration
    config: Config,

    /// Region cursors, sequence counter and collaborators
    state: Mutex<JournalState<F, H>>,
}

impl<F: ImageFile, H: HeaderStore> Journal<F, H> {
    /// Attach a journal to an opened image
    ///
    /// Reads the log location and GUID from `headers`. Does not look at the
    /// log contents; call [`Journal::parse_and_replay_log`] for that.
    pub fn new(file: F, headers: H, config: Config) -> Result<Self> {
        let region = LogRegion::new(headers.log_offset(), headers.log_length(), headers.log_guid())?;

        Ok(Self {
            config,
            state: Mutex::new(JournalState {
                file,
                headers,
                region,
            }),
        })
    }

    /// Attach a journal and replay any pending log
    ///
    /// Replay is refused when `config.read_only` is set and a log is
    /// pending. Returns the journal and whether a log was replayed.
    pub fn open(file: F, headers: H, config: Config) -> Result<(Self, bool)> {
        let read_only = config.read_only;
        let journal = Self::new(file, headers, config)?;
        let replayed = journal.parse_and_replay_log(read_only)?;
        Ok((journal, replayed))
    }

    /// Find the active log sequence and replay it
    ///
    /// Steps:
    /// 1. A zero log GUID means there is no log: nothing to do
    /// 2. Scan the region for the active sequence
    /// 3. Refuse if read-only, otherwise replay it
    ///
    /// Returns whether anything was replayed.
    pub fn parse_and_replay_log(&self, read_only: bool) -> Result<bool> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.region.guid.is_zero() {
            return Ok(false);
        }

        let Some(sequence) = scanner::scan(&mut state.file, &state.region)? else {
            if !read_only {
                // A session was started but no entry ever made it to disk
                warn!("Log guid {} set but no valid entries found; clearing", state.region.guid);
                state.headers.persist_log_guid(&mut state.file, Guid::ZERO)?;
                state.region.reset();
            }
            return Ok(false);
        };

        state.region.sequence = sequence.last_sequence() + 1;

        if read_only {
            return Err(LogError::ReadOnlyWithPendingLog {
                image: self.config.image_name.clone(),
            });
        }

        info!(
            "Replaying pending log for '{}' ({} entries)",
            self.config.image_name, sequence.count
        );
        flusher::flush(
            &mut state.file,
            &mut state.headers,
            &mut state.region,
            &sequence,
            &self.config,
        )?;
        Ok(true)
    }

    /// Journal a write without applying it to the image
    ///
    /// The entry stays in the log until the next replay.
    pub fn append_write(&self, data: &[u8], offset: u64) -> Result<()> {
        self.ensure_writable()?;

        let mut guard = self.state.lock();
        let state = &mut *guard;

        writer::write_entry(
            &mut state.file,
            &mut state.headers,
            &mut state.region,
            data,
            offset,
        )?;
        Ok(())
    }

    /// Journal a write and apply it to the image immediately
    ///
    /// Steps:
    /// 1. Sync the image so the bytes about to be overwritten are stable
    /// 2. Append the log entry
    /// 3. Sync so the entry itself is durable
    /// 4. Replay the entry, leaving the log empty
    pub fn append_write_and_flush(&self, data: &[u8], offset: u64) -> Result<()> {
        self.ensure_writable()?;

        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.file.sync()?;

        let header = writer::write_entry(
            &mut state.file,
            &mut state.headers,
            &mut state.region,
            data,
            offset,
        )?;
        let sequence = ActiveSequence {
            log: state.region,
            count: 1,
            last: header,
        };

        state.file.sync()?;

        flusher::flush(
            &mut state.file,
            &mut state.headers,
            &mut state.region,
            &sequence,
            &self.config,
        )?;

        debug!("Write of {} bytes at {} flushed through the log", data.len(), offset);
        Ok(())
    }

    /// Look for an active sequence without replaying it
    pub fn scan(&self) -> Result<Option<ActiveSequence>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.region.guid.is_zero() {
            return Ok(None);
        }
        scanner::scan(&mut state.file, &state.region)
    }

    /// Run `f` with the image file, under the journal lock
    pub fn with_file<R>(&self, f: impl FnOnce(&mut F) -> R) -> R {
        f(&mut self.state.lock().file)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Snapshot of the log region
    pub fn region(&self) -> LogRegion {
        self.state.lock().region
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Take back the image file and header store
    pub fn into_parts(self) -> (F, H) {
        let state = self.state.into_inner();
        (state.file, state.headers)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.config.read_only {
            return Err(LogError::ReadOnly {
                image: self.config.image_name.clone(),
            });
        }
        Ok(())
    }
}
