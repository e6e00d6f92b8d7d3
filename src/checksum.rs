//! CRC32C checksums with a zeroed checksum field
//!
//! VHDX checksums cover a structure whose own 4-byte checksum field is
//! treated as zero while computing.

use crate::error::{LogError, Result};

/// Incremental CRC32C (Castagnoli)
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32c {
    crc: u32,
}

impl Crc32c {
    pub fn new() -> Self {
        Self { crc: 0 }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.crc = crc32c::crc32c_append(self.crc, data);
    }

    /// Feed `data` as if the four bytes at `zero_at` were zero
    pub fn update_zeroed(&mut self, data: &[u8], zero_at: usize) {
        let start = zero_at.min(data.len());
        let end = (zero_at + 4).min(data.len());
        self.update(&data[..start]);
        self.update(&[0u8; 4][..end - start]);
        self.update(&data[end..]);
    }

    pub fn finish(&self) -> u32 {
        self.crc
    }
}

/// CRC32C of `buf` with the 4-byte field at `zero_at` treated as zero
pub fn checksum(buf: &[u8], zero_at: usize) -> u32 {
    let mut crc = Crc32c::new();
    crc.update_zeroed(buf, zero_at);
    crc.finish()
}

/// Compute the checksum of `buf` and store it little-endian at `zero_at`
pub fn stamp_checksum(buf: &mut [u8], zero_at: usize) -> u32 {
    let crc = checksum(buf, zero_at);
    buf[zero_at..zero_at + 4].copy_from_slice(&crc.to_le_bytes());
    crc
}

/// Compare a stored checksum against the one computed over `buf`
pub fn verify_checksum(buf: &[u8], zero_at: usize, stored: u32) -> Result<()> {
    let computed = checksum(buf, zero_at);
    if computed != stored {
        return Err(LogError::ChecksumMismatch { stored, computed });
    }
    Ok(())
}
