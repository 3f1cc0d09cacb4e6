//! ZIP structural layer: local headers, central directory, entry enumeration

pub mod central;
pub mod local;
pub mod scan;

pub use central::{CentralDirectory, CentralRecord, EndOfCentralDirectory};
pub use local::{DataDescriptor, LocalFileHeader};
pub use scan::{ArchiveMap, EntryLayout};
