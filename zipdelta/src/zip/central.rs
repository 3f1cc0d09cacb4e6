//! Central directory parsing and capture
//!
//! The patch format rebuilds the central directory wholesale: the generator
//! captures the `[central directory start, EOF)` region of the new archive
//! verbatim and the applier appends it unchanged. Parsing here extracts only
//! what entry enumeration needs.

use crate::io::ArchiveSource;
use crate::{Error, Result, signatures};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Minimum size of an end of central directory record
const EOCD_MIN_LEN: u64 = 22;

/// Fixed portion of a central directory file header
const CENTRAL_HEADER_FIXED_LEN: usize = 46;

/// End of central directory record, minimally parsed
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    /// Number of entries in the central directory
    pub entry_count: u16,
    /// Size of the central directory in bytes
    pub cd_size: u32,
    /// Offset of the central directory from the start of the archive
    pub cd_offset: u32,
    /// Archive comment bytes
    pub comment: Vec<u8>,
    /// Absolute offset where this record was found
    pub offset: u64,
}

/// One central directory file header, minimally parsed
///
/// Central directory sizes and CRC are authoritative: when flag bit 3 is
/// set the corresponding local header fields are zeroed.
#[derive(Debug, Clone)]
pub struct CentralRecord {
    /// Entry name bytes
    pub name: Vec<u8>,
    /// General purpose bit flags
    pub flags: u16,
    /// Compression method tag
    pub method: u16,
    /// CRC-32 of the uncompressed data
    pub crc32: u32,
    /// Compressed data size
    pub compressed_size: u32,
    /// Uncompressed data size
    pub uncompressed_size: u32,
    /// Offset of the entry's local file header
    pub local_header_offset: u32,
}

/// Parsed central directory plus its location
#[derive(Debug, Clone)]
pub struct CentralDirectory {
    /// Entry records in central directory order
    pub records: Vec<CentralRecord>,
    /// Absolute offset where the central directory starts
    pub start: u64,
    /// Absolute offset of the end of central directory record
    pub eocd_offset: u64,
}

/// Locate the end of central directory record by backwards signature scan
pub fn locate_eocd<S: ArchiveSource + ?Sized>(source: &mut S) -> Result<EndOfCentralDirectory> {
    let size = source.size()?;
    if size < EOCD_MIN_LEN {
        return Err(Error::invalid_archive(format!(
            "archive too small for an end of central directory record: {size} bytes"
        )));
    }

    // The comment is at most 65535 bytes, bounding the scan window
    let window = (EOCD_MIN_LEN + 0xFFFF).min(size);
    let window_start = size - window;
    let buf = source.read_range(window_start, window)?;

    for i in (0..=buf.len() - EOCD_MIN_LEN as usize).rev() {
        let mut cursor = Cursor::new(&buf[i..]);
        if cursor.read_u32::<LittleEndian>()? != signatures::END_OF_CENTRAL_DIRECTORY {
            continue;
        }
        let disk_number = cursor.read_u16::<LittleEndian>()?;
        let cd_disk = cursor.read_u16::<LittleEndian>()?;
        let disk_entries = cursor.read_u16::<LittleEndian>()?;
        let entry_count = cursor.read_u16::<LittleEndian>()?;
        let cd_size = cursor.read_u32::<LittleEndian>()?;
        let cd_offset = cursor.read_u32::<LittleEndian>()?;
        let comment_len = cursor.read_u16::<LittleEndian>()? as usize;

        // The record must extend exactly to end of file
        if i + EOCD_MIN_LEN as usize + comment_len != buf.len() {
            continue;
        }
        if disk_number != 0 || cd_disk != 0 || disk_entries != entry_count {
            return Err(Error::invalid_archive(
                "multi-disk archives are not supported".to_string(),
            ));
        }
        if entry_count == 0xFFFF || cd_size == 0xFFFF_FFFF || cd_offset == 0xFFFF_FFFF {
            return Err(Error::invalid_archive(
                "ZIP64 archives are not supported".to_string(),
            ));
        }

        let comment = buf[i + EOCD_MIN_LEN as usize..].to_vec();
        return Ok(EndOfCentralDirectory {
            entry_count,
            cd_size,
            cd_offset,
            comment,
            offset: window_start + i as u64,
        });
    }

    Err(Error::invalid_archive(
        "end of central directory record not found".to_string(),
    ))
}

/// Parse the central directory records of an archive
pub fn read_central_directory<S: ArchiveSource + ?Sized>(
    source: &mut S,
) -> Result<CentralDirectory> {
    let eocd = locate_eocd(source)?;
    let start = eocd.cd_offset as u64;
    if start + eocd.cd_size as u64 > eocd.offset {
        return Err(Error::invalid_archive(format!(
            "central directory [{start}, +{}] overlaps its end record at {}",
            eocd.cd_size, eocd.offset
        )));
    }

    let buf = source.read_range(start, eocd.cd_size as u64)?;
    let mut records = Vec::with_capacity(eocd.entry_count as usize);
    let mut pos = 0usize;
    for _ in 0..eocd.entry_count {
        if pos + CENTRAL_HEADER_FIXED_LEN > buf.len() {
            return Err(Error::invalid_archive(
                "central directory truncated".to_string(),
            ));
        }
        let mut cursor = Cursor::new(&buf[pos..]);
        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != signatures::CENTRAL_FILE_HEADER {
            return Err(Error::invalid_archive(format!(
                "bad central file header signature: 0x{signature:08x}"
            )));
        }
        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let method = cursor.read_u16::<LittleEndian>()?;
        let _mod_time = cursor.read_u16::<LittleEndian>()?;
        let _mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let compressed_size = cursor.read_u32::<LittleEndian>()?;
        let uncompressed_size = cursor.read_u32::<LittleEndian>()?;
        let name_len = cursor.read_u16::<LittleEndian>()? as usize;
        let extra_len = cursor.read_u16::<LittleEndian>()? as usize;
        let comment_len = cursor.read_u16::<LittleEndian>()? as usize;
        let _disk_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let local_header_offset = cursor.read_u32::<LittleEndian>()?;

        if local_header_offset == 0xFFFF_FFFF
            || compressed_size == 0xFFFF_FFFF
            || uncompressed_size == 0xFFFF_FFFF
        {
            return Err(Error::invalid_archive(
                "ZIP64 archives are not supported".to_string(),
            ));
        }

        let name_start = pos + CENTRAL_HEADER_FIXED_LEN;
        let record_end = name_start + name_len + extra_len + comment_len;
        if record_end > buf.len() {
            return Err(Error::invalid_archive(
                "central directory record overruns directory".to_string(),
            ));
        }
        records.push(CentralRecord {
            name: buf[name_start..name_start + name_len].to_vec(),
            flags,
            method,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
        });
        pos = record_end;
    }

    Ok(CentralDirectory {
        records,
        start,
        eocd_offset: eocd.offset,
    })
}

/// Capture the verbatim `[central directory start, EOF)` byte image
pub fn central_section_image<S: ArchiveSource + ?Sized>(
    source: &mut S,
    cd_start: u64,
) -> Result<Vec<u8>> {
    let size = source.size()?;
    source.read_range(cd_start, size - cd_start)
}
