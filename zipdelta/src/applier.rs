//! Delta applier
//!
//! Replays a directive stream against the old archive, reconstructing the
//! new archive byte-for-byte. The read cursor into the old archive and the
//! write cursor into the output only ever move forward; any decode or
//! application failure aborts the run, leaving the output sink in an
//! undefined state the caller must discard.

use crate::compression::{self, CompressionMethod};
use crate::diff;
use crate::io::{ArchiveSource, CountingWriter};
use crate::patch::{FileData, NewMetadata, PatchDirective, PatchMetadata, PatchParser, RefreshMetadata};
use crate::zip::{ArchiveMap, EntryLayout};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tempfile::TempDir;

/// Copy chunk size for streaming old-archive bytes
const COPY_CHUNK: usize = 64 * 1024;

/// Options for patch application
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Verify the CRC-32 of reconstructed payloads against the entry metadata
    pub verify_crc: bool,

    /// Payloads at or above this size stage through the scratch directory
    /// before being written to the output
    pub spill_threshold: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            verify_crc: true,
            spill_threshold: 4 * 1024 * 1024,
        }
    }
}

/// Summary of a patch application run
#[derive(Debug, Default, Clone)]
pub struct ApplySummary {
    /// COPY directives replayed
    pub entries_copied: usize,
    /// Entries whose header was refreshed over copied data
    pub entries_refreshed: usize,
    /// Entries reconstructed via diff scripts
    pub entries_patched: usize,
    /// Entries written from patch-carried data
    pub entries_new: usize,
    /// Total bytes written to the output
    pub bytes_written: u64,
}

/// Scratch area for staging reconstructed payloads
///
/// The directory is created lazily on first spill and removed on every exit
/// path, including panics, by the `TempDir` RAII guard.
#[derive(Debug, Default)]
struct ScratchDir {
    dir: Option<TempDir>,
    counter: u64,
}

impl ScratchDir {
    /// Stage a payload and stream it into the output
    fn write_payload<W: Write>(
        &mut self,
        payload: &[u8],
        out: &mut W,
        spill_threshold: usize,
    ) -> Result<()> {
        if payload.len() >= spill_threshold {
            if self.dir.is_none() {
                self.dir = Some(tempfile::tempdir()?);
            }
            let dir = self.dir.as_ref().ok_or_else(|| {
                Error::Io(std::io::Error::other("scratch directory unavailable"))
            })?;
            let path = dir.path().join(format!("payload-{}", self.counter));
            self.counter += 1;
            std::fs::write(&path, payload)?;
            let mut staged = File::open(&path)?;
            std::io::copy(&mut staged, out)?;
            std::fs::remove_file(&path)?;
        } else {
            out.write_all(payload)?;
        }
        Ok(())
    }
}

/// Apply a directive stream to `old`, writing the new archive to `out`
pub fn apply<R, P, W>(
    old: &mut R,
    patch: &mut P,
    out: W,
    options: &ApplyOptions,
) -> Result<ApplySummary>
where
    R: ArchiveSource + ?Sized,
    P: Read,
    W: Write,
{
    let old_map = ArchiveMap::scan(old)?;
    let old_size = old_map.archive_size;
    log::info!(
        "Applying patch against old archive: {} entries, {} bytes",
        old_map.entries.len(),
        old_size
    );

    let mut parser = PatchParser::new(patch);
    parser.init()?;

    let mut out = CountingWriter::new(out);
    let mut scratch = ScratchDir::default();
    let mut summary = ApplySummary::default();
    let mut old_cursor = 0u64;

    while let Some(directive) = parser.read()? {
        log::debug!("Applying {}", directive.kind());
        match directive {
            PatchDirective::Copy { bytes } => {
                if old_cursor.checked_add(bytes).is_none_or(|end| end > old_size) {
                    return Err(Error::bounds(old_cursor, bytes, old_size));
                }
                copy_bytes(old, old_cursor, bytes, &mut out)?;
                old_cursor += bytes;
                summary.entries_copied += 1;
            }
            PatchDirective::Refresh { old_index, meta } => {
                let entry = resolve_entry(&old_map, old_index)?;
                apply_refresh(old, entry, &meta, &mut out)?;
                old_cursor = advance_cursor(old_cursor, entry.span_end)?;
                summary.entries_refreshed += 1;
            }
            PatchDirective::Patch { old_index, meta } => {
                let entry = resolve_entry(&old_map, old_index)?;
                apply_diff(old, entry, &meta, &mut out, &mut scratch, options)?;
                old_cursor = advance_cursor(old_cursor, entry.span_end)?;
                summary.entries_patched += 1;
            }
            PatchDirective::New(meta) => {
                apply_new(old, old_size, &meta, &mut out, &mut scratch, options)?;
                summary.entries_new += 1;
            }
            PatchDirective::Begin(section) => {
                out.write_all(&section.0)?;
                // The parser enforces that nothing follows
            }
        }
    }

    if !parser.has_begun() {
        return Err(Error::malformed_patch(
            "patch stream ended without a BEGIN directive",
        ));
    }

    out.flush()?;
    summary.bytes_written = out.written();
    log::info!("Reconstructed archive: {} bytes", summary.bytes_written);
    Ok(summary)
}

/// Apply a patch file to an old archive file, producing the new archive file
pub fn apply_patch<P: AsRef<Path>>(
    old_path: P,
    patch_path: P,
    new_path: P,
    options: &ApplyOptions,
) -> Result<ApplySummary> {
    let mut old = BufReader::new(File::open(old_path.as_ref())?);
    let mut patch = BufReader::new(File::open(patch_path.as_ref())?);
    let out = BufWriter::new(File::create(new_path.as_ref())?);
    apply(&mut old, &mut patch, out, options)
}

fn resolve_entry(map: &ArchiveMap, index: u32) -> Result<&EntryLayout> {
    map.entry(index).ok_or_else(|| Error::EntryIndexOutOfRange {
        index,
        entry_count: map.entries.len() as u32,
    })
}

fn advance_cursor(old_cursor: u64, span_end: u64) -> Result<u64> {
    if span_end < old_cursor {
        return Err(Error::malformed_patch(format!(
            "read cursor would move backwards: {old_cursor} -> {span_end}"
        )));
    }
    Ok(span_end)
}

fn copy_bytes<R, W>(old: &mut R, offset: u64, length: u64, out: &mut W) -> Result<()>
where
    R: ArchiveSource + ?Sized,
    W: Write,
{
    let mut buf = vec![0u8; COPY_CHUNK.min(length as usize).max(1)];
    let mut pos = offset;
    let mut remaining = length;
    while remaining > 0 {
        let take = (remaining as usize).min(buf.len());
        old.read_at(pos, &mut buf[..take])?;
        out.write_all(&buf[..take])?;
        pos += take as u64;
        remaining -= take as u64;
    }
    Ok(())
}

fn apply_refresh<R, W>(
    old: &mut R,
    entry: &EntryLayout,
    meta: &RefreshMetadata,
    out: &mut W,
) -> Result<()>
where
    R: ArchiveSource + ?Sized,
    W: Write,
{
    meta.header.write(out)?;
    copy_bytes(old, entry.data_offset, entry.data_len, out)?;
    if let Some(descriptor) = &meta.descriptor {
        descriptor.write(out)?;
    }
    Ok(())
}

fn apply_diff<R, W>(
    old: &mut R,
    entry: &EntryLayout,
    meta: &PatchMetadata,
    out: &mut W,
    scratch: &mut ScratchDir,
    options: &ApplyOptions,
) -> Result<()>
where
    R: ArchiveSource + ?Sized,
    W: Write,
{
    let old_data = old.read_range(entry.data_offset, entry.data_len)?;
    let old_plain = compression::decompress(
        &old_data,
        entry.method(),
        entry.uncompressed_size as usize,
    )?;
    let new_plain = diff::apply(&old_plain, &meta.diff_script)?;

    if options.verify_crc {
        check_crc(meta.descriptor.as_ref().map_or(meta.header.crc32, |d| d.crc32), &new_plain, &meta.header)?;
    }

    let payload = match meta.recompress {
        Some(option) => compression::compress(&new_plain, CompressionMethod::Deflate, option)?,
        None => new_plain,
    };

    meta.header.write(out)?;
    scratch.write_payload(&payload, out, options.spill_threshold)?;
    if let Some(descriptor) = &meta.descriptor {
        descriptor.write(out)?;
    }
    Ok(())
}

fn apply_new<R, W>(
    old: &mut R,
    old_size: u64,
    meta: &NewMetadata,
    out: &mut W,
    scratch: &mut ScratchDir,
    options: &ApplyOptions,
) -> Result<()>
where
    R: ArchiveSource + ?Sized,
    W: Write,
{
    let data = match &meta.data {
        FileData::Inline(bytes) => bytes.clone(),
        FileData::CopyRange { offset, length } => {
            if offset.checked_add(*length).is_none_or(|end| end > old_size) {
                return Err(Error::bounds(*offset, *length, old_size));
            }
            old.read_range(*offset, *length)?
        }
    };

    let payload = match meta.recompress {
        Some(option) => {
            // Data carried uncompressed; verify before recompressing
            if options.verify_crc {
                check_crc(
                    meta.descriptor.as_ref().map_or(meta.header.crc32, |d| d.crc32),
                    &data,
                    &meta.header,
                )?;
            }
            compression::compress(&data, CompressionMethod::Deflate, option)?
        }
        None => data,
    };

    meta.header.write(out)?;
    scratch.write_payload(&payload, out, options.spill_threshold)?;
    if let Some(descriptor) = &meta.descriptor {
        descriptor.write(out)?;
    }
    Ok(())
}

fn check_crc(expected: u32, payload: &[u8], header: &crate::zip::LocalFileHeader) -> Result<()> {
    let actual = crc32fast::hash(payload);
    if actual != expected {
        return Err(Error::CrcMismatch {
            name: header.name_lossy(),
            expected,
            actual,
        });
    }
    Ok(())
}
