//! Error types for the zipdelta library

use std::io;
use thiserror::Error;

/// Result type alias for zipdelta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for zipdelta operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed patch stream (bad magic, unknown tag, truncation, BEGIN violations)
    #[error("Malformed patch: {0}")]
    MalformedPatch(String),

    /// A copy length or entry reference falls outside the old archive
    #[error("Reference outside old archive: offset {offset} + length {length} exceeds size {archive_size}")]
    ArchiveBounds {
        /// Starting byte offset of the reference
        offset: u64,
        /// Length of the reference in bytes
        length: u64,
        /// Actual size of the old archive
        archive_size: u64,
    },

    /// A directive names an old entry index past the end of the archive
    #[error("Old entry index {index} out of range: archive has {entry_count} entries")]
    EntryIndexOutOfRange {
        /// Zero-based index named by the directive
        index: u32,
        /// Number of entries in the old archive
        entry_count: u32,
    },

    /// Recompression did not reproduce the stored entry bytes exactly
    #[error("Cannot reproduce entry {name} exactly: {reason}")]
    Reproducibility {
        /// Entry name (lossy UTF-8)
        name: String,
        /// What failed to reproduce
        reason: String,
    },

    /// Invalid ZIP structure in a source archive
    #[error("Invalid ZIP archive: {0}")]
    InvalidArchive(String),

    /// Compression method this library cannot decompress
    #[error("Unsupported compression method: {method}")]
    UnsupportedMethod {
        /// Raw ZIP compression method tag
        method: u16,
    },

    /// CRC-32 of a reconstructed payload does not match the declared value
    #[error("CRC mismatch for {name}: expected {expected:08x}, got {actual:08x}")]
    CrcMismatch {
        /// Entry name (lossy UTF-8)
        name: String,
        /// CRC-32 declared in the entry metadata
        expected: u32,
        /// CRC-32 of the reconstructed payload
        actual: u32,
    },

    /// Deflate codec failure
    #[error("Compression error: {0}")]
    Compression(String),
}

impl Error {
    /// Create a new MalformedPatch error
    pub fn malformed_patch<S: Into<String>>(msg: S) -> Self {
        Error::MalformedPatch(msg.into())
    }

    /// Create a new InvalidArchive error
    pub fn invalid_archive<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArchive(msg.into())
    }

    /// Create a new Compression error
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Error::Compression(msg.into())
    }

    /// Create a new ArchiveBounds error
    pub fn bounds(offset: u64, length: u64, archive_size: u64) -> Self {
        Error::ArchiveBounds {
            offset,
            length,
            archive_size,
        }
    }

    /// Check if this error indicates a corrupt patch or archive
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::MalformedPatch(_)
                | Error::ArchiveBounds { .. }
                | Error::EntryIndexOutOfRange { .. }
                | Error::InvalidArchive(_)
                | Error::CrcMismatch { .. }
        )
    }
}
