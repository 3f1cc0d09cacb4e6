//! Patch stream writer
//!
//! Serializes directives to the wire format: a one-byte variant tag followed
//! by fixed-width fields and length-prefixed blobs, all little-endian. The
//! encoding is deterministic and symmetric with [`crate::PatchParser`].

use crate::compression::DeflateOption;
use crate::patch::directive::{FileData, PatchDirective};
use crate::patch::wire;
use crate::zip::{DataDescriptor, LocalFileHeader};
use crate::{Error, Result, signatures};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Serializes a directive stream to a byte sink
#[derive(Debug)]
pub struct PatchWriter<W> {
    inner: W,
    initialized: bool,
    finished: bool,
}

impl<W: Write> PatchWriter<W> {
    /// Create a writer over a sink; call [`init`](Self::init) before writing
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            initialized: false,
            finished: false,
        }
    }

    /// Emit the stream magic and format version
    pub fn init(&mut self) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(signatures::PATCH_MAGIC)?;
        self.inner
            .write_u16::<LittleEndian>(signatures::PATCH_VERSION)?;
        self.initialized = true;
        Ok(())
    }

    /// Append one encoded directive
    ///
    /// `Begin` is terminal: writing anything after it is a protocol
    /// violation and is rejected here before it can corrupt the stream.
    pub fn write(&mut self, directive: &PatchDirective) -> Result<()> {
        if !self.initialized {
            return Err(Error::malformed_patch("writer used before init"));
        }
        if self.finished {
            return Err(Error::malformed_patch("directive after BEGIN"));
        }
        match directive {
            PatchDirective::Copy { bytes } => {
                self.inner.write_u8(wire::TAG_COPY)?;
                self.inner.write_u64::<LittleEndian>(*bytes)?;
            }
            PatchDirective::New(meta) => {
                self.inner.write_u8(wire::TAG_NEW)?;
                self.write_header(&meta.header)?;
                self.write_descriptor(meta.descriptor.as_ref())?;
                self.write_recompress(meta.recompress)?;
                self.write_file_data(&meta.data)?;
            }
            PatchDirective::Refresh { old_index, meta } => {
                self.inner.write_u8(wire::TAG_REFRESH)?;
                self.inner.write_u32::<LittleEndian>(*old_index)?;
                self.write_header(&meta.header)?;
                self.write_descriptor(meta.descriptor.as_ref())?;
            }
            PatchDirective::Patch { old_index, meta } => {
                self.inner.write_u8(wire::TAG_PATCH)?;
                self.inner.write_u32::<LittleEndian>(*old_index)?;
                self.write_header(&meta.header)?;
                self.write_descriptor(meta.descriptor.as_ref())?;
                self.write_recompress(meta.recompress)?;
                self.inner
                    .write_u32::<LittleEndian>(meta.diff_script.len() as u32)?;
                self.inner.write_all(&meta.diff_script)?;
            }
            PatchDirective::Begin(section) => {
                self.inner.write_u8(wire::TAG_BEGIN)?;
                self.inner.write_u32::<LittleEndian>(section.0.len() as u32)?;
                self.inner.write_all(&section.0)?;
                self.finished = true;
            }
        }
        Ok(())
    }

    /// Flush and return the inner sink
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_header(&mut self, header: &LocalFileHeader) -> Result<()> {
        let image = header.to_bytes();
        self.inner.write_u32::<LittleEndian>(image.len() as u32)?;
        self.inner.write_all(&image)?;
        Ok(())
    }

    fn write_descriptor(&mut self, descriptor: Option<&DataDescriptor>) -> Result<()> {
        match descriptor {
            None => self.inner.write_u8(0)?,
            Some(d) => {
                self.inner.write_u8(1)?;
                self.inner.write_u8(u8::from(d.has_signature))?;
                self.inner.write_u32::<LittleEndian>(d.crc32)?;
                self.inner.write_u32::<LittleEndian>(d.compressed_size)?;
                self.inner.write_u32::<LittleEndian>(d.uncompressed_size)?;
            }
        }
        Ok(())
    }

    fn write_recompress(&mut self, option: Option<DeflateOption>) -> Result<()> {
        self.inner
            .write_u8(option.map_or(0, |o| o.as_wire_tag()))?;
        Ok(())
    }

    fn write_file_data(&mut self, data: &FileData) -> Result<()> {
        match data {
            FileData::Inline(bytes) => {
                self.inner.write_u8(wire::FILE_DATA_INLINE)?;
                self.inner.write_u32::<LittleEndian>(bytes.len() as u32)?;
                self.inner.write_all(bytes)?;
            }
            FileData::CopyRange { offset, length } => {
                self.inner.write_u8(wire::FILE_DATA_COPY_RANGE)?;
                self.inner.write_u64::<LittleEndian>(*offset)?;
                self.inner.write_u64::<LittleEndian>(*length)?;
            }
        }
        Ok(())
    }
}
