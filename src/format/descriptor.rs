//! Log descriptor codec
//!
//! ```text
//! ┌───────────┬──────────────────────┬──────────────────────┬────────────────┬──────────────┐
//! │ Sig (4)   │ Reserved / Trailing  │ ZeroLength / Leading │ FileOffset (8) │ Sequence (8) │
//! │           │ (4)                  │ (8)                  │                │              │
//! └───────────┴──────────────────────┴──────────────────────┴────────────────┴──────────────┘
//! ```
//!
//! The signature decides how the middle twelve bytes are read, so decoding
//! produces a [`DescriptorKind`] once instead of reinterpreting the bytes on
//! every access.

use bytes::{Buf, BufMut};

use crate::error::{LogError, Result};

use super::{
    ensure_len, DESCRIPTOR_SIZE, DESC_SIGNATURE, LEADING_BYTES, TRAILING_BYTES, ZERO_SIGNATURE,
};

/// What a descriptor asks the replay to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    /// Fill `length` bytes (sector multiple) with zeros
    Zero { length: u64 },

    /// Write one sector; the first 8 and last 4 bytes live here, the rest in
    /// the paired data sector
    Data {
        leading: [u8; LEADING_BYTES],
        trailing: [u8; TRAILING_BYTES],
    },
}

/// One sector-granular change described by a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogDescriptor {
    pub kind: DescriptorKind,
    /// Equal to the owning entry's sequence number
    pub sequence_number: u64,
    /// Sector-aligned offset in the image file
    pub target_offset: u64,
}

impl LogDescriptor {
    pub fn zero(length: u64, target_offset: u64, sequence_number: u64) -> Self {
        Self {
            kind: DescriptorKind::Zero { length },
            sequence_number,
            target_offset,
        }
    }

    pub fn data(
        leading: [u8; LEADING_BYTES],
        trailing: [u8; TRAILING_BYTES],
        target_offset: u64,
        sequence_number: u64,
    ) -> Self {
        Self {
            kind: DescriptorKind::Data { leading, trailing },
            sequence_number,
            target_offset,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self.kind, DescriptorKind::Data { .. })
    }

    pub fn signature(&self) -> u32 {
        match self.kind {
            DescriptorKind::Zero { .. } => ZERO_SIGNATURE,
            DescriptorKind::Data { .. } => DESC_SIGNATURE,
        }
    }

    /// Decode a descriptor from the first 32 bytes of `bytes`
    ///
    /// Fails on an unknown signature, since the variant cannot be chosen.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, DESCRIPTOR_SIZE, "log descriptor")?;

        let mut buf = &bytes[..DESCRIPTOR_SIZE];
        let signature = buf.get_u32_le();

        let kind = match signature {
            ZERO_SIGNATURE => {
                let _reserved = buf.get_u32_le();
                DescriptorKind::Zero {
                    length: buf.get_u64_le(),
                }
            }
            DESC_SIGNATURE => {
                let mut trailing = [0u8; TRAILING_BYTES];
                buf.copy_to_slice(&mut trailing);
                let mut leading = [0u8; LEADING_BYTES];
                buf.copy_to_slice(&mut leading);
                DescriptorKind::Data { leading, trailing }
            }
            other => {
                return Err(LogError::Format(format!(
                    "Unknown descriptor signature: 0x{:08x}",
                    other
                )))
            }
        };

        let target_offset = buf.get_u64_le();
        let sequence_number = buf.get_u64_le();

        Ok(Self {
            kind,
            sequence_number,
            target_offset,
        })
    }

    /// Encode to the 32-byte on-disk form
    pub fn encode(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mut out = [0u8; DESCRIPTOR_SIZE];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.signature());
        match &self.kind {
            DescriptorKind::Zero { length } => {
                buf.put_u32_le(0);
                buf.put_u64_le(*length);
            }
            DescriptorKind::Data { leading, trailing } => {
                buf.put_slice(trailing);
                buf.put_slice(leading);
            }
        }
        buf.put_u64_le(self.target_offset);
        buf.put_u64_le(self.sequence_number);
        out
    }
}
