//! Data sector codec
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────────┬─────────────┐
//! │"data" (4)│ SeqHigh (4)  │ Payload (4084)   │ SeqLow (4)  │
//! └──────────┴──────────────┴──────────────────┴─────────────┘
//! ```

use bytes::{Buf, BufMut};

use crate::error::Result;

use super::{ensure_len, DATA_SIGNATURE, LOG_DATA_SIZE, SECTOR_BYTES};

/// The bulk of one logged payload sector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSector {
    pub signature: u32,
    pub sequence_high: u32,
    pub data: Box<[u8; LOG_DATA_SIZE]>,
    pub sequence_low: u32,
}

impl DataSector {
    /// Build a data sector for `sequence_number` carrying `data`
    pub fn new(sequence_number: u64, data: &[u8; LOG_DATA_SIZE]) -> Self {
        Self {
            signature: DATA_SIGNATURE,
            sequence_high: (sequence_number >> 32) as u32,
            data: Box::new(*data),
            sequence_low: sequence_number as u32,
        }
    }

    /// Sequence number reassembled from its two halves
    pub fn sequence(&self) -> u64 {
        ((self.sequence_high as u64) << 32) | self.sequence_low as u64
    }

    /// Decode a data sector from the first 4096 bytes of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ensure_len(bytes, SECTOR_BYTES, "data sector")?;

        let mut buf = &bytes[..SECTOR_BYTES];
        let signature = buf.get_u32_le();
        let sequence_high = buf.get_u32_le();
        let mut data = Box::new([0u8; LOG_DATA_SIZE]);
        buf.copy_to_slice(&mut data[..]);
        let sequence_low = buf.get_u32_le();

        Ok(Self {
            signature,
            sequence_high,
            data,
            sequence_low,
        })
    }

    /// Encode into `out`, which must be at least one sector long
    pub fn encode_into(&self, out: &mut [u8]) {
        let mut buf = &mut out[..SECTOR_BYTES];
        buf.put_u32_le(self.signature);
        buf.put_u32_le(self.sequence_high);
        buf.put_slice(&self.data[..]);
        buf.put_u32_le(self.sequence_low);
    }

    /// Encode to the 4096-byte on-disk form
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; SECTOR_BYTES];
        self.encode_into(&mut out);
        out
    }
}
