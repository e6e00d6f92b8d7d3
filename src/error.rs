//! Error types for vhdxlog
//!
//! Provides a unified error type for all log operations.

use thiserror::Error;

/// Result type alias using LogError
pub type Result<T> = std::result::Result<T, LogError>;

/// Unified error type for vhdxlog operations
#[derive(Debug, Error)]
pub enum LogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Format error: {0}")]
    Format(String),

    #[error("Checksum mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("Sequence discontinuity: expected {expected}, found {found}")]
    SequenceDiscontinuity { expected: u64, found: u64 },

    #[error("Log entry belongs to a different log session (guid {found})")]
    GuidMismatch { found: String },

    // -------------------------------------------------------------------------
    // Circular Buffer Errors
    // -------------------------------------------------------------------------
    #[error("Log is empty")]
    LogEmpty,

    #[error("Log is full: needed {needed} sectors, wrote {written}")]
    LogFull { needed: u32, written: u32 },

    #[error("Invalid log region: {0}")]
    InvalidRegion(String),

    // -------------------------------------------------------------------------
    // Write Path Errors
    // -------------------------------------------------------------------------
    #[error("Write of {requested} bytes does not fit in a log of {capacity} bytes")]
    LogTooSmallForWrite { requested: u64, capacity: u64 },

    #[error("A log is still active; it must be flushed before another write")]
    UnsupportedConcurrentLog,

    #[error("Image '{image}' is opened read-only")]
    ReadOnly { image: String },

    // -------------------------------------------------------------------------
    // Open Path Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt image: {0}")]
    CorruptImage(String),

    #[error(
        "Image '{image}' opened read-only, but contains a log that needs to be replayed. \
         To replay the log, run: vhdxlog replay '{image}'"
    )]
    ReadOnlyWithPendingLog { image: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
