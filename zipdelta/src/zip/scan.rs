//! Archive entry enumeration with byte spans
//!
//! [`ArchiveMap`] walks the central directory and lays out every entry as a
//! contiguous byte span `[header_offset, span_end)` in on-disk order. Spans
//! tile the region before the central directory, so generator and applier
//! can reason about verbatim copies without re-parsing anything.

use crate::compression::CompressionMethod;
use crate::io::ArchiveSource;
use crate::zip::central::{self, CentralRecord};
use crate::zip::local::{DataDescriptor, LOCAL_HEADER_FIXED_LEN, LocalFileHeader};
use crate::{Error, Result};

/// One enumerated entry with its parsed local header and byte layout
#[derive(Debug, Clone)]
pub struct EntryLayout {
    /// Parsed local file header
    pub header: LocalFileHeader,
    /// Absolute offset of the local file header
    pub header_offset: u64,
    /// Absolute offset where entry data starts
    pub data_offset: u64,
    /// Compressed data length (central directory, authoritative)
    pub data_len: u64,
    /// CRC-32 of the uncompressed data (central directory, authoritative)
    pub crc32: u32,
    /// Uncompressed data length (central directory, authoritative)
    pub uncompressed_size: u64,
    /// Trailing data descriptor, when flag bit 3 is set
    pub descriptor: Option<DataDescriptor>,
    /// Absolute offset where this entry's span ends (next entry or central directory)
    pub span_end: u64,
}

impl EntryLayout {
    /// Absolute offset just past the entry data
    pub fn data_end(&self) -> u64 {
        self.data_offset + self.data_len
    }

    /// Total span length including header, data, descriptor and any gap bytes
    pub fn span_len(&self) -> u64 {
        self.span_end - self.header_offset
    }

    /// Compression method of this entry
    pub fn method(&self) -> CompressionMethod {
        CompressionMethod::from_raw(self.header.method)
    }
}

/// Complete entry map of one archive
#[derive(Debug, Clone)]
pub struct ArchiveMap {
    /// Entries sorted by header offset
    pub entries: Vec<EntryLayout>,
    /// Absolute offset where the central directory starts
    pub central_start: u64,
    /// Total archive size in bytes
    pub archive_size: u64,
}

impl ArchiveMap {
    /// Enumerate all entries of an archive
    pub fn scan<S: ArchiveSource + ?Sized>(source: &mut S) -> Result<Self> {
        let archive_size = source.size()?;
        let directory = central::read_central_directory(source)?;

        let mut records: Vec<CentralRecord> = directory.records;
        records.sort_by_key(|r| r.local_header_offset);

        let mut entries = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let header_offset = record.local_header_offset as u64;
            let span_end = records
                .get(i + 1)
                .map_or(directory.start, |next| next.local_header_offset as u64);
            entries.push(read_entry(source, record, header_offset, span_end)?);
        }

        Ok(ArchiveMap {
            entries,
            central_start: directory.start,
            archive_size,
        })
    }

    /// Look up an entry by zero-based archive-order index
    pub fn entry(&self, index: u32) -> Option<&EntryLayout> {
        self.entries.get(index as usize)
    }

    /// Capture the verbatim central directory section of this archive
    pub fn central_section<S: ArchiveSource + ?Sized>(&self, source: &mut S) -> Result<Vec<u8>> {
        central::central_section_image(source, self.central_start)
    }
}

fn read_entry<S: ArchiveSource + ?Sized>(
    source: &mut S,
    record: &CentralRecord,
    header_offset: u64,
    span_end: u64,
) -> Result<EntryLayout> {
    let fixed = source.read_range(header_offset, LOCAL_HEADER_FIXED_LEN as u64)?;
    let name_len = u16::from_le_bytes([fixed[26], fixed[27]]) as u64;
    let extra_len = u16::from_le_bytes([fixed[28], fixed[29]]) as u64;
    let header_len = LOCAL_HEADER_FIXED_LEN as u64 + name_len + extra_len;

    let image = source.read_range(header_offset, header_len)?;
    let header = LocalFileHeader::from_bytes(&image)?;
    if header.name != record.name {
        return Err(Error::invalid_archive(format!(
            "local header name {:?} does not match central directory {:?}",
            header.name_lossy(),
            String::from_utf8_lossy(&record.name)
        )));
    }

    let data_offset = header_offset + header_len;
    let data_len = record.compressed_size as u64;
    let data_end = data_offset + data_len;
    if data_end > span_end {
        return Err(Error::invalid_archive(format!(
            "entry {} data [{data_offset}, {data_end}) overruns its span end {span_end}",
            header.name_lossy()
        )));
    }

    let descriptor = if header.has_data_descriptor() {
        let trailer = source.read_range(data_end, span_end - data_end)?;
        Some(DataDescriptor::parse(&trailer, record.crc32)?)
    } else {
        None
    };

    Ok(EntryLayout {
        header,
        header_offset,
        data_offset,
        data_len,
        crc32: record.crc32,
        uncompressed_size: record.uncompressed_size as u64,
        descriptor,
        span_end,
    })
}
