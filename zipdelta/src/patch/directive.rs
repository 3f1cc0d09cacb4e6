//! Patch directives and their metadata records
//!
//! Pure data. Directives perform no I/O or computation themselves; equality
//! is structural because the codec's correctness is verified by round-trip
//! equality.

use crate::compression::DeflateOption;
use crate::zip::{DataDescriptor, LocalFileHeader};

/// One unit of transformation in a patch stream
///
/// Directives are order-significant: the applier replays them in stream
/// order against forward-only cursors into the old archive and the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchDirective {
    /// Copy raw bytes verbatim from the old archive's read cursor
    Copy {
        /// Number of bytes to copy
        bytes: u64,
    },
    /// Write an entry that has no counterpart in the old archive
    New(NewMetadata),
    /// Rewrite an entry's header while copying its data from the old archive
    Refresh {
        /// Zero-based index of the source entry in the old archive
        old_index: u32,
        /// Replacement metadata
        meta: RefreshMetadata,
    },
    /// Transform an old entry's decompressed data via a diff script
    Patch {
        /// Zero-based index of the source entry in the old archive
        old_index: u32,
        /// Diff script and reconstruction parameters
        meta: PatchMetadata,
    },
    /// Append the new archive's central directory; terminal, exactly one per stream
    Begin(CentralDirectorySection),
}

impl PatchDirective {
    /// Short name of this directive variant, for logs and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            PatchDirective::Copy { .. } => "COPY",
            PatchDirective::New(_) => "NEW",
            PatchDirective::Refresh { .. } => "REFRESH",
            PatchDirective::Patch { .. } => "PATCH",
            PatchDirective::Begin(_) => "BEGIN",
        }
    }
}

/// Verbatim central-directory-and-end-record byte image of the new archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectorySection(pub Vec<u8>);

/// Where a new entry's payload bytes live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    /// Payload carried inside the patch stream
    Inline(Vec<u8>),
    /// Payload taken verbatim from the old archive (renamed entries)
    CopyRange {
        /// Absolute byte offset in the old archive
        offset: u64,
        /// Length in bytes
        length: u64,
    },
}

impl FileData {
    /// Length of the referenced payload in bytes
    pub fn len(&self) -> u64 {
        match self {
            FileData::Inline(bytes) => bytes.len() as u64,
            FileData::CopyRange { length, .. } => *length,
        }
    }

    /// Whether the referenced payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Metadata for an entry that exists only in the new archive
///
/// `recompress: Some(_)` means `data` holds the uncompressed payload and the
/// applier deflates it with the given option; `None` means the bytes are
/// written verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMetadata {
    /// Local file header to write
    pub header: LocalFileHeader,
    /// Entry payload
    pub data: FileData,
    /// Trailing data descriptor, when the entry uses one
    pub descriptor: Option<DataDescriptor>,
    /// Deflate option for recompression, or `None` for verbatim bytes
    pub recompress: Option<DeflateOption>,
}

/// Metadata for an entry whose data is unchanged but whose header differs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshMetadata {
    /// Replacement local file header
    pub header: LocalFileHeader,
    /// Trailing data descriptor, when the entry uses one
    pub descriptor: Option<DataDescriptor>,
}

/// Metadata for an entry whose decompressed data changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchMetadata {
    /// Replacement local file header
    pub header: LocalFileHeader,
    /// Trailing data descriptor, when the entry uses one
    pub descriptor: Option<DataDescriptor>,
    /// Deflate option for recompression, or `None` for verbatim storage
    pub recompress: Option<DeflateOption>,
    /// Edit script transforming the old decompressed payload into the new one
    pub diff_script: Vec<u8>,
}
