//! ZIP local file header and data descriptor records
//!
//! Both records serialize to and from their exact on-disk byte image. That
//! exactness carries the whole patch format: a rewritten header that differs
//! from the original by a single byte produces a corrupt archive.

use crate::{Error, Result, signatures};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

/// Fixed portion of a local file header (signature through extra length)
pub const LOCAL_HEADER_FIXED_LEN: usize = 30;

/// Per-entry metadata block preceding entry data in a ZIP archive
///
/// Entry names are kept as raw bytes; ZIP does not guarantee UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader {
    /// Version needed to extract
    pub version_needed: u16,
    /// General purpose bit flags
    pub flags: u16,
    /// Compression method tag
    pub method: u16,
    /// Last modification time (DOS format)
    pub mod_time: u16,
    /// Last modification date (DOS format)
    pub mod_date: u16,
    /// CRC-32 of the uncompressed data (zero when flag bit 3 is set)
    pub crc32: u32,
    /// Compressed data size (zero when flag bit 3 is set)
    pub compressed_size: u32,
    /// Uncompressed data size (zero when flag bit 3 is set)
    pub uncompressed_size: u32,
    /// Entry name bytes
    pub name: Vec<u8>,
    /// Extra field bytes
    pub extra: Vec<u8>,
}

impl LocalFileHeader {
    /// Parse a header from its exact byte image
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < LOCAL_HEADER_FIXED_LEN {
            return Err(Error::invalid_archive(format!(
                "local file header truncated: {} bytes",
                bytes.len()
            )));
        }
        let mut cursor = Cursor::new(bytes);
        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != signatures::LOCAL_FILE_HEADER {
            return Err(Error::invalid_archive(format!(
                "bad local file header signature: 0x{signature:08x}"
            )));
        }
        let version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let method = cursor.read_u16::<LittleEndian>()?;
        let mod_time = cursor.read_u16::<LittleEndian>()?;
        let mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()? as usize;
        let extra_len = cursor.read_u16::<LittleEndian>()? as usize;

        let expected = LOCAL_HEADER_FIXED_LEN + name_len + extra_len;
        if bytes.len() != expected {
            return Err(Error::invalid_archive(format!(
                "local file header image is {} bytes, expected {expected}",
                bytes.len()
            )));
        }
        let name = bytes[LOCAL_HEADER_FIXED_LEN..LOCAL_HEADER_FIXED_LEN + name_len].to_vec();
        let extra = bytes[LOCAL_HEADER_FIXED_LEN + name_len..].to_vec();

        Ok(LocalFileHeader {
            version_needed,
            flags,
            method,
            mod_time,
            mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            name,
            extra,
        })
    }

    /// Serialize to the exact byte image this header was parsed from
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        // Writes to a Vec cannot fail
        let _ = self.write(&mut out);
        out
    }

    /// Write the header image to a sink
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(signatures::LOCAL_FILE_HEADER)?;
        writer.write_u16::<LittleEndian>(self.version_needed)?;
        writer.write_u16::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.method)?;
        writer.write_u16::<LittleEndian>(self.mod_time)?;
        writer.write_u16::<LittleEndian>(self.mod_date)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u16::<LittleEndian>(self.name.len() as u16)?;
        writer.write_u16::<LittleEndian>(self.extra.len() as u16)?;
        writer.write_all(&self.name)?;
        writer.write_all(&self.extra)?;
        Ok(())
    }

    /// Size of the serialized header image in bytes
    pub fn encoded_len(&self) -> usize {
        LOCAL_HEADER_FIXED_LEN + self.name.len() + self.extra.len()
    }

    /// Entry name for display purposes
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Whether flag bit 3 is set (sizes and CRC live in a trailing descriptor)
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & 0x0008 != 0
    }
}

/// Optional trailer carrying CRC and sizes when flag bit 3 is set
///
/// The descriptor appears on disk both with and without its `PK\x07\x08`
/// signature; `has_signature` preserves whichever form the source archive
/// used so the record re-serializes identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDescriptor {
    /// Whether the on-disk form carries the leading signature
    pub has_signature: bool,
    /// CRC-32 of the uncompressed data
    pub crc32: u32,
    /// Compressed data size
    pub compressed_size: u32,
    /// Uncompressed data size
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    /// Serialized size: 12 bytes, or 16 with the signature
    pub fn encoded_len(&self) -> usize {
        if self.has_signature { 16 } else { 12 }
    }

    /// Serialize to the exact on-disk form
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        let _ = self.write(&mut out);
        out
    }

    /// Write the descriptor image to a sink
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.has_signature {
            writer.write_u32::<LittleEndian>(signatures::DATA_DESCRIPTOR)?;
        }
        writer.write_u32::<LittleEndian>(self.crc32)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        Ok(())
    }

    /// Parse a descriptor from the bytes following an entry's data
    ///
    /// `expected_crc` (from the central directory) disambiguates the
    /// signatureless form from data that happens to start with the
    /// descriptor signature.
    pub fn parse(bytes: &[u8], expected_crc: u32) -> Result<Self> {
        let read_fields = |chunk: &[u8], has_signature: bool| -> Result<Self> {
            let mut cursor = Cursor::new(chunk);
            Ok(DataDescriptor {
                has_signature,
                crc32: cursor.read_u32::<LittleEndian>()?,
                compressed_size: cursor.read_u32::<LittleEndian>()?,
                uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            })
        };

        if bytes.len() >= 16 {
            let mut cursor = Cursor::new(bytes);
            let first = cursor.read_u32::<LittleEndian>()?;
            let second = cursor.read_u32::<LittleEndian>()?;
            if first == signatures::DATA_DESCRIPTOR && second == expected_crc {
                return read_fields(&bytes[4..16], true);
            }
        }
        if bytes.len() >= 12 {
            let descriptor = read_fields(&bytes[..12], false)?;
            if descriptor.crc32 == expected_crc {
                return Ok(descriptor);
            }
            return Err(Error::invalid_archive(format!(
                "data descriptor CRC 0x{:08x} does not match central directory 0x{expected_crc:08x}",
                descriptor.crc32
            )));
        }
        Err(Error::invalid_archive(format!(
            "truncated data descriptor: {} bytes",
            bytes.len()
        )))
    }
}
