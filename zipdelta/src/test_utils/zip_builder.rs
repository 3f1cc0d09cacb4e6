//! Fabricates small, valid ZIP archives for tests
//!
//! Produces archives in exactly the layout the scanner and generator expect:
//! local headers, entry data, optional data descriptors, then the central
//! directory and end record. Deflated payloads are produced with the same
//! codec the library uses, so recompression inference succeeds by
//! construction.

use crate::compression::{CompressionMethod, DeflateOption, compress};
use crate::zip::{DataDescriptor, LocalFileHeader};
use crate::{Result, signatures};
use byteorder::{LittleEndian, WriteBytesExt};

#[derive(Debug, Clone)]
struct PendingEntry {
    name: Vec<u8>,
    data: Vec<u8>,
    method: CompressionMethod,
    option: DeflateOption,
    descriptor: Option<bool>,
    mod_time: u16,
    mod_date: u16,
    extra: Vec<u8>,
}

/// Builder for test ZIP archives
#[derive(Debug, Clone)]
pub struct ZipBuilder {
    entries: Vec<PendingEntry>,
    comment: Vec<u8>,
    mod_time: u16,
    mod_date: u16,
}

impl Default for ZipBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            comment: Vec::new(),
            // 2024-06-15 12:00:00 in DOS format
            mod_time: 0x6000,
            mod_date: 0x58CF,
        }
    }

    /// Set the DOS timestamp applied to entries added afterwards
    pub fn timestamps(mut self, mod_time: u16, mod_date: u16) -> Self {
        self.mod_time = mod_time;
        self.mod_date = mod_date;
        self
    }

    /// Set the archive comment
    pub fn comment(mut self, comment: Vec<u8>) -> Self {
        self.comment = comment;
        self
    }

    /// Add an uncompressed entry
    pub fn add_stored(self, name: &str, data: &[u8]) -> Self {
        self.push(name, data, CompressionMethod::Stored, DeflateOption::Normal, None, Vec::new())
    }

    /// Add a deflated entry
    pub fn add_deflated(self, name: &str, data: &[u8], option: DeflateOption) -> Self {
        self.push(name, data, CompressionMethod::Deflate, option, None, Vec::new())
    }

    /// Add a deflated entry that uses a trailing data descriptor
    pub fn add_deflated_with_descriptor(
        self,
        name: &str,
        data: &[u8],
        option: DeflateOption,
        with_signature: bool,
    ) -> Self {
        self.push(
            name,
            data,
            CompressionMethod::Deflate,
            option,
            Some(with_signature),
            Vec::new(),
        )
    }

    /// Add an uncompressed entry carrying extra field bytes
    pub fn add_stored_with_extra(self, name: &str, data: &[u8], extra: Vec<u8>) -> Self {
        self.push(name, data, CompressionMethod::Stored, DeflateOption::Normal, None, extra)
    }

    fn push(
        mut self,
        name: &str,
        data: &[u8],
        method: CompressionMethod,
        option: DeflateOption,
        descriptor: Option<bool>,
        extra: Vec<u8>,
    ) -> Self {
        self.entries.push(PendingEntry {
            name: name.as_bytes().to_vec(),
            data: data.to_vec(),
            method,
            option,
            descriptor,
            mod_time: self.mod_time,
            mod_date: self.mod_date,
            extra,
        });
        self
    }

    /// Assemble the archive bytes
    pub fn build(self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut central = Vec::new();
        let entry_count = self.entries.len() as u16;

        for entry in self.entries {
            let payload = compress(&entry.data, entry.method, entry.option)?;
            let crc32 = crc32fast::hash(&entry.data);
            let mut flags = match entry.method {
                CompressionMethod::Deflate => match entry.option {
                    DeflateOption::Normal => 0x0000,
                    DeflateOption::Maximum => 0x0002,
                    DeflateOption::Fast => 0x0004,
                    DeflateOption::Superfast => 0x0006,
                },
                _ => 0x0000,
            };
            if entry.descriptor.is_some() {
                flags |= 0x0008;
            }

            let header_offset = out.len() as u32;
            let in_header = |v: u32| if entry.descriptor.is_some() { 0 } else { v };
            let header = LocalFileHeader {
                version_needed: 20,
                flags,
                method: entry.method.as_raw(),
                mod_time: entry.mod_time,
                mod_date: entry.mod_date,
                crc32: in_header(crc32),
                compressed_size: in_header(payload.len() as u32),
                uncompressed_size: in_header(entry.data.len() as u32),
                name: entry.name.clone(),
                extra: entry.extra.clone(),
            };
            header.write(&mut out)?;
            out.extend_from_slice(&payload);
            if let Some(has_signature) = entry.descriptor {
                DataDescriptor {
                    has_signature,
                    crc32,
                    compressed_size: payload.len() as u32,
                    uncompressed_size: entry.data.len() as u32,
                }
                .write(&mut out)?;
            }

            // Matching central directory file header
            central.write_u32::<LittleEndian>(signatures::CENTRAL_FILE_HEADER)?;
            central.write_u16::<LittleEndian>(20)?; // version made by
            central.write_u16::<LittleEndian>(20)?; // version needed
            central.write_u16::<LittleEndian>(flags)?;
            central.write_u16::<LittleEndian>(entry.method.as_raw())?;
            central.write_u16::<LittleEndian>(entry.mod_time)?;
            central.write_u16::<LittleEndian>(entry.mod_date)?;
            central.write_u32::<LittleEndian>(crc32)?;
            central.write_u32::<LittleEndian>(payload.len() as u32)?;
            central.write_u32::<LittleEndian>(entry.data.len() as u32)?;
            central.write_u16::<LittleEndian>(entry.name.len() as u16)?;
            central.write_u16::<LittleEndian>(entry.extra.len() as u16)?;
            central.write_u16::<LittleEndian>(0)?; // comment length
            central.write_u16::<LittleEndian>(0)?; // disk number start
            central.write_u16::<LittleEndian>(0)?; // internal attributes
            central.write_u32::<LittleEndian>(0)?; // external attributes
            central.write_u32::<LittleEndian>(header_offset)?;
            central.extend_from_slice(&entry.name);
            central.extend_from_slice(&entry.extra);
        }

        let cd_offset = out.len() as u32;
        let cd_size = central.len() as u32;
        out.extend_from_slice(&central);

        out.write_u32::<LittleEndian>(signatures::END_OF_CENTRAL_DIRECTORY)?;
        out.write_u16::<LittleEndian>(0)?; // this disk
        out.write_u16::<LittleEndian>(0)?; // central directory disk
        out.write_u16::<LittleEndian>(entry_count)?;
        out.write_u16::<LittleEndian>(entry_count)?;
        out.write_u32::<LittleEndian>(cd_size)?;
        out.write_u32::<LittleEndian>(cd_offset)?;
        out.write_u16::<LittleEndian>(self.comment.len() as u16)?;
        out.extend_from_slice(&self.comment);

        Ok(out)
    }
}
