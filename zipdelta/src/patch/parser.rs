//! Patch stream parser
//!
//! Symmetric counterpart of [`crate::PatchWriter`]. Every structural
//! violation (bad magic or version, unknown tag, truncation mid-directive,
//! a directive after `Begin`) surfaces as [`Error::MalformedPatch`].

use crate::compression::DeflateOption;
use crate::patch::directive::{
    CentralDirectorySection, FileData, NewMetadata, PatchDirective, PatchMetadata, RefreshMetadata,
};
use crate::patch::wire;
use crate::zip::local::LOCAL_HEADER_FIXED_LEN;
use crate::zip::{DataDescriptor, LocalFileHeader};
use crate::{Error, Result, signatures};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{ErrorKind, Read};

/// Largest legal embedded local header image (fixed part + max name + max extra)
const MAX_HEADER_IMAGE: u32 = (LOCAL_HEADER_FIXED_LEN + 0xFFFF + 0xFFFF) as u32;

/// Deserializes a directive stream from a byte source
#[derive(Debug)]
pub struct PatchParser<R> {
    inner: R,
    initialized: bool,
    begun: bool,
}

impl<R: Read> PatchParser<R> {
    /// Create a parser over a source; call [`init`](Self::init) before reading
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            initialized: false,
            begun: false,
        }
    }

    /// Consume and validate the stream magic and format version
    pub fn init(&mut self) -> Result<()> {
        let magic = self
            .inner
            .read_u32::<LittleEndian>()
            .map_err(map_truncation)?;
        if magic != signatures::PATCH_MAGIC {
            return Err(Error::malformed_patch(format!(
                "bad patch magic: 0x{magic:08x}"
            )));
        }
        let version = self
            .inner
            .read_u16::<LittleEndian>()
            .map_err(map_truncation)?;
        if version != signatures::PATCH_VERSION {
            return Err(Error::malformed_patch(format!(
                "unsupported patch format version {version}, expected {}",
                signatures::PATCH_VERSION
            )));
        }
        self.initialized = true;
        Ok(())
    }

    /// Decode the next directive, or `None` at clean end-of-stream
    pub fn read(&mut self) -> Result<Option<PatchDirective>> {
        if !self.initialized {
            return Err(Error::malformed_patch("parser used before init"));
        }
        let Some(tag) = self.next_tag()? else {
            return Ok(None);
        };
        if self.begun {
            return Err(Error::malformed_patch(format!(
                "directive (tag {tag}) after BEGIN"
            )));
        }

        let directive = match tag {
            wire::TAG_COPY => PatchDirective::Copy {
                bytes: self.read_u64()?,
            },
            wire::TAG_NEW => {
                let header = self.read_header()?;
                let descriptor = self.read_descriptor()?;
                let recompress = self.read_recompress()?;
                let data = self.read_file_data()?;
                PatchDirective::New(NewMetadata {
                    header,
                    data,
                    descriptor,
                    recompress,
                })
            }
            wire::TAG_REFRESH => {
                let old_index = self.read_u32()?;
                let header = self.read_header()?;
                let descriptor = self.read_descriptor()?;
                PatchDirective::Refresh {
                    old_index,
                    meta: RefreshMetadata { header, descriptor },
                }
            }
            wire::TAG_PATCH => {
                let old_index = self.read_u32()?;
                let header = self.read_header()?;
                let descriptor = self.read_descriptor()?;
                let recompress = self.read_recompress()?;
                let script_len = self.read_u32()?;
                let diff_script = self.read_blob(script_len as u64)?;
                PatchDirective::Patch {
                    old_index,
                    meta: PatchMetadata {
                        header,
                        descriptor,
                        recompress,
                        diff_script,
                    },
                }
            }
            wire::TAG_BEGIN => {
                let len = self.read_u32()?;
                let image = self.read_blob(len as u64)?;
                self.begun = true;
                PatchDirective::Begin(CentralDirectorySection(image))
            }
            other => {
                return Err(Error::malformed_patch(format!(
                    "unknown directive tag {other}"
                )));
            }
        };
        Ok(Some(directive))
    }

    /// Whether the terminal `Begin` directive has been read
    pub fn has_begun(&self) -> bool {
        self.begun
    }

    /// Read the next directive tag, or `None` at end-of-stream
    fn next_tag(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.inner
            .read_u32::<LittleEndian>()
            .map_err(map_truncation)
    }

    fn read_u64(&mut self) -> Result<u64> {
        self.inner
            .read_u64::<LittleEndian>()
            .map_err(map_truncation)
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.inner.read_u8().map_err(map_truncation)
    }

    /// Read a length-delimited blob without trusting the length for allocation
    fn read_blob(&mut self, len: u64) -> Result<Vec<u8>> {
        let mut blob = Vec::new();
        let read = (&mut self.inner)
            .take(len)
            .read_to_end(&mut blob)
            .map_err(map_truncation)?;
        if (read as u64) < len {
            return Err(Error::malformed_patch(format!(
                "length prefix {len} exceeds remaining stream ({read} bytes left)"
            )));
        }
        Ok(blob)
    }

    fn read_header(&mut self) -> Result<LocalFileHeader> {
        let len = self.read_u32()?;
        if len < LOCAL_HEADER_FIXED_LEN as u32 || len > MAX_HEADER_IMAGE {
            return Err(Error::malformed_patch(format!(
                "implausible embedded header length {len}"
            )));
        }
        let image = self.read_blob(len as u64)?;
        LocalFileHeader::from_bytes(&image)
            .map_err(|e| Error::malformed_patch(format!("embedded local header: {e}")))
    }

    fn read_descriptor(&mut self) -> Result<Option<DataDescriptor>> {
        match self.read_u8()? {
            0 => Ok(None),
            1 => {
                let has_signature = match self.read_u8()? {
                    0 => false,
                    1 => true,
                    other => {
                        return Err(Error::malformed_patch(format!(
                            "bad descriptor signature flag {other}"
                        )));
                    }
                };
                Ok(Some(DataDescriptor {
                    has_signature,
                    crc32: self.read_u32()?,
                    compressed_size: self.read_u32()?,
                    uncompressed_size: self.read_u32()?,
                }))
            }
            other => Err(Error::malformed_patch(format!(
                "bad descriptor presence byte {other}"
            ))),
        }
    }

    fn read_recompress(&mut self) -> Result<Option<DeflateOption>> {
        match self.read_u8()? {
            0 => Ok(None),
            tag => DeflateOption::from_wire_tag(tag)
                .map(Some)
                .ok_or_else(|| Error::malformed_patch(format!("bad recompression tag {tag}"))),
        }
    }

    fn read_file_data(&mut self) -> Result<FileData> {
        match self.read_u8()? {
            wire::FILE_DATA_INLINE => {
                let len = self.read_u32()?;
                Ok(FileData::Inline(self.read_blob(len as u64)?))
            }
            wire::FILE_DATA_COPY_RANGE => Ok(FileData::CopyRange {
                offset: self.read_u64()?,
                length: self.read_u64()?,
            }),
            other => Err(Error::malformed_patch(format!(
                "bad file data kind {other}"
            ))),
        }
    }
}

fn map_truncation(e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::UnexpectedEof {
        Error::malformed_patch("truncated patch stream")
    } else {
        Error::Io(e)
    }
}
