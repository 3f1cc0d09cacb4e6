//! # zipdelta - Entry-Granular ZIP Delta Patching
//!
//! Computes and applies compact binary patches between two versions of a
//! ZIP-structured archive, producing a byte-identical reconstruction of the
//! new archive from the old archive plus the patch.
//!
//! Patches operate at the granularity of individual archive entries: unchanged
//! entries are copied verbatim, entries whose metadata changed get their local
//! header refreshed, changed entries are diffed on their *decompressed* form
//! and recompressed identically on apply, and entries without an old
//! counterpart travel inside the patch. The central directory of the new
//! archive is carried wholesale and appended last.
//!
//! ## Examples
//!
//! ### Generating and applying a patch
//!
//! ```no_run
//! use zipdelta::{ApplyOptions, GeneratorOptions, apply_patch, generate_patch};
//!
//! # fn main() -> Result<(), zipdelta::Error> {
//! // Produce app-v1-to-v2.zpd from two builds of the same package
//! let summary = generate_patch(
//!     "app-v1.zip",
//!     "app-v2.zip",
//!     "app-v1-to-v2.zpd",
//!     &GeneratorOptions::default(),
//! )?;
//! println!("{} entries patched", summary.entries_patched);
//!
//! // Reconstruct app-v2.zip byte-for-byte from the old build plus the patch
//! apply_patch(
//!     "app-v1.zip",
//!     "app-v1-to-v2.zpd",
//!     "app-v2-rebuilt.zip",
//!     &ApplyOptions::default(),
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Working with in-memory archives
//!
//! ```no_run
//! use std::io::Cursor;
//! use zipdelta::{GeneratorOptions, generate};
//!
//! # fn main() -> Result<(), zipdelta::Error> {
//! # let (old_bytes, new_bytes) = (vec![], vec![]);
//! let mut old = Cursor::new(old_bytes);
//! let mut new = Cursor::new(new_bytes);
//! let mut patch = Vec::new();
//! generate(&mut old, &mut new, &mut patch, &GeneratorOptions::default())?;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod applier;
pub mod compression;
pub mod diff;
pub mod error;
pub mod generator;
pub mod io;
pub mod patch;
pub mod zip;

#[cfg(any(test, feature = "test-utils", doc))]
pub mod test_utils;

// Re-export commonly used types
pub use applier::{ApplyOptions, ApplySummary, apply, apply_patch};
pub use compression::{CompressionMethod, DeflateOption, compress, decompress, infer_option};
pub use error::{Error, Result};
pub use generator::{GenerateSummary, GeneratorOptions, generate, generate_patch};
pub use io::ArchiveSource;
pub use patch::{
    CentralDirectorySection, FileData, NewMetadata, PatchDirective, PatchMetadata, PatchParser,
    PatchWriter, RefreshMetadata,
};
pub use zip::{ArchiveMap, DataDescriptor, EntryLayout, LocalFileHeader};

/// Signature constants for the patch stream and the ZIP records it embeds
pub mod signatures {
    /// Patch stream magic ('ZPD\x1A')
    pub const PATCH_MAGIC: u32 = 0x1A44_505A;

    /// Patch stream format version understood by this crate
    pub const PATCH_VERSION: u16 = 1;

    /// ZIP local file header signature ('PK\x03\x04')
    pub const LOCAL_FILE_HEADER: u32 = 0x0403_4B50;

    /// ZIP data descriptor signature ('PK\x07\x08')
    pub const DATA_DESCRIPTOR: u32 = 0x0807_4B50;

    /// ZIP central directory file header signature ('PK\x01\x02')
    pub const CENTRAL_FILE_HEADER: u32 = 0x0201_4B50;

    /// ZIP end of central directory signature ('PK\x05\x06')
    pub const END_OF_CENTRAL_DIRECTORY: u32 = 0x0605_4B50;
}
