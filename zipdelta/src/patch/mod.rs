//! Patch stream model and codec
//!
//! A patch is a self-describing stream: a magic/version header followed by
//! an ordered sequence of encoded directives, ending with the single
//! `Begin` directive that carries the new archive's central directory.

pub mod directive;
pub mod parser;
pub mod writer;

pub use directive::{
    CentralDirectorySection, FileData, NewMetadata, PatchDirective, PatchMetadata, RefreshMetadata,
};
pub use parser::PatchParser;
pub use writer::PatchWriter;

/// Wire tags shared by the writer and the parser
pub(crate) mod wire {
    pub(crate) const TAG_COPY: u8 = 1;
    pub(crate) const TAG_NEW: u8 = 2;
    pub(crate) const TAG_REFRESH: u8 = 3;
    pub(crate) const TAG_PATCH: u8 = 4;
    pub(crate) const TAG_BEGIN: u8 = 5;

    pub(crate) const FILE_DATA_INLINE: u8 = 0;
    pub(crate) const FILE_DATA_COPY_RANGE: u8 = 1;
}
