//! In-memory image and header backends

use crate::error::Result;
use crate::format::Guid;

use super::{HeaderStore, ImageFile};

/// An image held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemImage {
    data: Vec<u8>,
    sync_count: u64,
}

impl MemImage {
    /// An image of `len` zero bytes
    pub fn new(len: usize) -> Self {
        Self {
            data: vec![0u8; len],
            sync_count: 0,
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            data,
            sync_count: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Number of `sync()` calls so far
    pub fn sync_count(&self) -> u64 {
        self.sync_count
    }
}

impl ImageFile for MemImage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        buf.fill(0);
        let start = offset.min(self.data.len() as u64) as usize;
        let end = (start + buf.len()).min(self.data.len());
        buf[..end - start].copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.sync_count += 1;
        Ok(())
    }

    fn file_length(&mut self) -> Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn extend_file(&mut self, new_len: u64) -> Result<()> {
        if new_len as usize > self.data.len() {
            self.data.resize(new_len as usize, 0);
        }
        Ok(())
    }
}

/// Header store kept in memory, recording every persisted log GUID
#[derive(Debug, Clone)]
pub struct MemHeaders {
    log_guid: Guid,
    log_offset: u64,
    log_length: u64,
    history: Vec<Guid>,
    visible_writes: u32,
}

impl MemHeaders {
    pub fn new(log_offset: u64, log_length: u64) -> Self {
        Self {
            log_guid: Guid::ZERO,
            log_offset,
            log_length,
            history: Vec::new(),
            visible_writes: 0,
        }
    }

    /// Start with `guid` as the active log GUID
    pub fn with_log_guid(mut self, guid: Guid) -> Self {
        self.log_guid = guid;
        self
    }

    /// Every GUID persisted so far, oldest first
    pub fn history(&self) -> &[Guid] {
        &self.history
    }

    pub fn visible_writes(&self) -> u32 {
        self.visible_writes
    }
}

impl HeaderStore for MemHeaders {
    fn log_guid(&self) -> Guid {
        self.log_guid
    }

    fn log_offset(&self) -> u64 {
        self.log_offset
    }

    fn log_length(&self) -> u64 {
        self.log_length
    }

    fn persist_log_guid(&mut self, _file: &mut dyn ImageFile, guid: Guid) -> Result<()> {
        self.log_guid = guid;
        self.history.push(guid);
        Ok(())
    }

    fn mark_user_visible_write(&mut self, _file: &mut dyn ImageFile) -> Result<()> {
        self.visible_writes += 1;
        Ok(())
    }
}
