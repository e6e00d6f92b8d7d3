//! # vhdxlog
//!
//! The write-ahead log (journal) of the VHDX virtual-disk image format:
//! - Crash-safe journaling of image writes
//! - Recovery scan over the circular log region
//! - Replay of a pending log before the image is used
//! - CRC32C-checksummed, bit-exact on-disk structures
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Journal                             │
//! │              (one lock per open image)                      │
//! └──────┬──────────────────┬──────────────────────┬────────────┘
//!        │ open             │ write                │
//!        ▼                  ▼                      │
//!   ┌──────────┐      ┌──────────┐                 │
//!   │ Scanner  │      │  Writer  │                 │
//!   └────┬─────┘      └────┬─────┘                 │
//!        │                 │                       ▼
//!        │    ┌────────────▼───────────┐     ┌──────────┐
//!        └───►│  Circular Log Buffer   │◄────┤ Flusher  │
//!             │  + Validator + Codec   │     └────┬─────┘
//!             └────────────┬───────────┘          │
//!                          ▼                      ▼
//!             ┌────────────────────────────────────────────┐
//!             │      Image file  +  redundant headers      │
//!             └────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod checksum;
pub mod format;
pub mod image;
pub mod log;
pub mod journal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LogError, Result};
pub use config::{Config, ReplaySync};
pub use format::Guid;
pub use image::{FileImage, HeaderStore, ImageFile, MemHeaders, MemImage, VhdxHeaders};
pub use journal::Journal;
pub use log::{ActiveSequence, LogRegion};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of vhdxlog
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
