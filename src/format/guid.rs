//! 128-bit GUID codec
//!
//! GUIDs are stored in the Microsoft mixed-endian layout: the first three
//! fields are little-endian integers, the last eight bytes are stored as-is.

use std::fmt;

use bytes::{Buf, BufMut};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::error::Result;

use super::ensure_len;

/// A 128-bit GUID as stored in VHDX headers and log entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// Encoded size in bytes
    pub const SIZE: usize = 16;

    /// The all-zero GUID. As a log GUID it means "no active log".
    pub const ZERO: Guid = Guid {
        data1: 0,
        data2: 0,
        data3: 0,
        data4: [0; 8],
    };

    /// Generate a new random (version 4) GUID
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4();
        let (data1, data2, data3, data4) = uuid.as_fields();
        Self {
            data1,
            data2,
            data3,
            data4: *data4,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Decode a GUID from the first 16 bytes of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, Self::SIZE, "GUID")?;

        let mut buf = &bytes[..Self::SIZE];
        let data1 = buf.get_u32_le();
        let data2 = buf.get_u16_le();
        let data3 = buf.get_u16_le();
        let mut data4 = [0u8; 8];
        buf.copy_to_slice(&mut data4);

        Ok(Self {
            data1,
            data2,
            data3,
            data4,
        })
    }

    /// Encode to the 16-byte on-disk form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let mut buf = &mut out[..];
        buf.put_u32_le(self.data1);
        buf.put_u16_le(self.data2);
        buf.put_u16_le(self.data3);
        buf.put_slice(&self.data4);
        out
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-",
            self.data1, self.data2, self.data3, self.data4[0], self.data4[1]
        )?;
        for byte in &self.data4[2..] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
