//! Delta generator
//!
//! Walks the old and new archives entry-by-entry, decides which directive
//! reproduces each new entry, and emits the directive stream. Every emitted
//! directive is render-verified against the actual new-archive bytes first;
//! anything that cannot be reproduced exactly falls back to carrying the
//! entry raw. Correctness over patch size.

use crate::compression::{self, CompressionMethod};
use crate::diff;
use crate::io::{ArchiveSource, CountingWriter};
use crate::patch::{
    CentralDirectorySection, FileData, NewMetadata, PatchDirective, PatchMetadata, PatchWriter,
    RefreshMetadata,
};
use crate::zip::{ArchiveMap, DataDescriptor, EntryLayout, LocalFileHeader};
use crate::{Error, Result};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Options for patch generation
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Render every planned directive locally and byte-compare it against
    /// the new archive before emission, falling back to raw storage on any
    /// mismatch
    pub verify: bool,

    /// Reuse old-archive payload bytes for new entries whose stored data
    /// already exists under a different name
    pub detect_renames: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            verify: true,
            detect_renames: true,
        }
    }
}

/// Summary of a patch generation run
#[derive(Debug, Default, Clone)]
pub struct GenerateSummary {
    /// Entries reproduced by verbatim copy from the old archive
    pub entries_copied: usize,
    /// Entries whose header was refreshed over unchanged data
    pub entries_refreshed: usize,
    /// Entries reproduced by applying a diff script
    pub entries_patched: usize,
    /// Entries carried inside the patch
    pub entries_new: usize,
    /// Number of COPY directives emitted after coalescing
    pub copy_directives: usize,
    /// Total bytes covered by COPY directives
    pub bytes_copied: u64,
    /// Size of the written patch stream in bytes
    pub patch_size: u64,
}

/// Per-entry work product of the planning phase
#[derive(Debug)]
struct EntryPlan {
    action: PlanAction,
    layout: EntryLayout,
    span: Vec<u8>,
}

#[derive(Debug)]
enum PlanAction {
    /// Old and new spans are byte-identical; coalesced into COPY when the
    /// read cursor lines up, downgraded to REFRESH otherwise
    CopyEligible {
        old_offset: u64,
        old_span_end: u64,
        refresh: RefreshMetadata,
        old_index: u32,
    },
    Refresh {
        old_index: u32,
        old_span_end: u64,
        meta: RefreshMetadata,
    },
    Patch {
        old_index: u32,
        old_span_end: u64,
        meta: PatchMetadata,
    },
    New(NewMetadata),
}

/// Input gathered sequentially for one new entry before parallel planning
#[derive(Debug)]
struct PlanInput {
    layout: EntryLayout,
    span: Vec<u8>,
    old: Option<OldSide>,
    rename: Option<(u64, u64)>,
}

#[derive(Debug)]
struct OldSide {
    index: u32,
    layout: EntryLayout,
    span: Vec<u8>,
}

/// Generate a patch transforming `old` into `new`, writing it to `out`
pub fn generate<RO, RN, W>(
    old: &mut RO,
    new: &mut RN,
    out: W,
    options: &GeneratorOptions,
) -> Result<GenerateSummary>
where
    RO: ArchiveSource + ?Sized,
    RN: ArchiveSource + ?Sized,
    W: Write,
{
    let old_map = ArchiveMap::scan(old)?;
    let new_map = ArchiveMap::scan(new)?;
    log::info!(
        "Generating patch: {} old entries, {} new entries",
        old_map.entries.len(),
        new_map.entries.len()
    );

    let inputs = gather_inputs(old, &old_map, new, &new_map, options)?;

    // Decompression, diffing and render verification are CPU-bound and
    // independent per entry; order is restored by the indexed collect.
    let plans: Vec<EntryPlan> = inputs
        .into_par_iter()
        .map(|input| plan_entry(input, options))
        .collect::<Result<Vec<_>>>()?;

    let central = new_map.central_section(new)?;
    emit(plans, central, out)
}

/// Generate a patch between two archive files
pub fn generate_patch<P: AsRef<Path>>(
    old_path: P,
    new_path: P,
    patch_path: P,
    options: &GeneratorOptions,
) -> Result<GenerateSummary> {
    let mut old = BufReader::new(File::open(old_path.as_ref())?);
    let mut new = BufReader::new(File::open(new_path.as_ref())?);
    let out = BufWriter::new(File::create(patch_path.as_ref())?);
    generate(&mut old, &mut new, out, options)
}

/// Sequential I/O phase: read every span the planners will need
fn gather_inputs<RO, RN>(
    old: &mut RO,
    old_map: &ArchiveMap,
    new: &mut RN,
    new_map: &ArchiveMap,
    options: &GeneratorOptions,
) -> Result<Vec<PlanInput>>
where
    RO: ArchiveSource + ?Sized,
    RN: ArchiveSource + ?Sized,
{
    // Match entries primarily by name; first occurrence wins on duplicates
    let mut by_name: HashMap<&[u8], u32> = HashMap::new();
    for (i, entry) in old_map.entries.iter().enumerate() {
        by_name.entry(&entry.header.name).or_insert(i as u32);
    }

    // Rename candidates keyed by content identity from the central directory
    let mut by_content: HashMap<(u32, u64, u16), Vec<u32>> = HashMap::new();
    if options.detect_renames {
        for (i, entry) in old_map.entries.iter().enumerate() {
            by_content
                .entry((entry.crc32, entry.data_len, entry.header.method))
                .or_default()
                .push(i as u32);
        }
    }

    let mut inputs = Vec::with_capacity(new_map.entries.len());
    for layout in &new_map.entries {
        let span = new.read_range(layout.header_offset, layout.span_len())?;
        let old_side = match by_name.get(layout.header.name.as_slice()) {
            Some(&index) => {
                let old_layout = old_map.entries[index as usize].clone();
                let old_span = old.read_range(old_layout.header_offset, old_layout.span_len())?;
                Some(OldSide {
                    index,
                    layout: old_layout,
                    span: old_span,
                })
            }
            None => None,
        };

        let rename = if old_side.is_none() && options.detect_renames {
            find_rename(old, old_map, &by_content, layout, &span)?
        } else {
            None
        };

        inputs.push(PlanInput {
            layout: layout.clone(),
            span,
            old: old_side,
            rename,
        });
    }
    Ok(inputs)
}

/// Look for an old entry whose stored payload equals the new entry's
fn find_rename<RO>(
    old: &mut RO,
    old_map: &ArchiveMap,
    by_content: &HashMap<(u32, u64, u16), Vec<u32>>,
    layout: &EntryLayout,
    span: &[u8],
) -> Result<Option<(u64, u64)>>
where
    RO: ArchiveSource + ?Sized,
{
    let key = (layout.crc32, layout.data_len, layout.header.method);
    let Some(candidates) = by_content.get(&key) else {
        return Ok(None);
    };
    let new_data = data_slice(layout, span);
    for &index in candidates {
        let candidate = &old_map.entries[index as usize];
        let old_data = old.read_range(candidate.data_offset, candidate.data_len)?;
        if old_data == new_data {
            log::debug!(
                "Entry {} reuses stored bytes of old entry {}",
                layout.header.name_lossy(),
                candidate.header.name_lossy()
            );
            return Ok(Some((candidate.data_offset, candidate.data_len)));
        }
    }
    Ok(None)
}

/// CPU phase: decide one directive per new entry
fn plan_entry(input: PlanInput, options: &GeneratorOptions) -> Result<EntryPlan> {
    let PlanInput {
        layout,
        span,
        old,
        rename,
    } = input;

    if let Some(old_side) = old {
        if old_side.span == span {
            let refresh = RefreshMetadata {
                header: layout.header.clone(),
                descriptor: layout.descriptor.clone(),
            };
            return Ok(EntryPlan {
                action: PlanAction::CopyEligible {
                    old_offset: old_side.layout.header_offset,
                    old_span_end: old_side.layout.span_end,
                    refresh,
                    old_index: old_side.index,
                },
                layout,
                span,
            });
        }

        let new_data = data_slice(&layout, &span);
        let old_data = data_slice(&old_side.layout, &old_side.span);

        if new_data == old_data {
            return plan_refresh(layout, span, &old_side, options);
        }
        return plan_patch(layout, span, &old_side, options);
    }

    plan_new(layout, span, rename, options)
}

fn plan_refresh(
    layout: EntryLayout,
    span: Vec<u8>,
    old_side: &OldSide,
    options: &GeneratorOptions,
) -> Result<EntryPlan> {
    let meta = RefreshMetadata {
        header: layout.header.clone(),
        descriptor: layout.descriptor.clone(),
    };
    let old_data = data_slice(&old_side.layout, &old_side.span);
    if options.verify {
        if let Err(e) = verify_render(&layout, &span, &meta.header, old_data, meta.descriptor.as_ref())
        {
            log::warn!("Refresh fallback for {}: {e}", layout.header.name_lossy());
            return Ok(raw_fallback(layout, span));
        }
    }
    let action = PlanAction::Refresh {
        old_index: old_side.index,
        old_span_end: old_side.layout.span_end,
        meta,
    };
    Ok(EntryPlan {
        action,
        layout,
        span,
    })
}

fn plan_patch(
    layout: EntryLayout,
    span: Vec<u8>,
    old_side: &OldSide,
    options: &GeneratorOptions,
) -> Result<EntryPlan> {
    let new_data = data_slice(&layout, &span);
    let old_data = data_slice(&old_side.layout, &old_side.span);

    let old_plain = match compression::decompress(
        old_data,
        old_side.layout.method(),
        old_side.layout.uncompressed_size as usize,
    ) {
        Ok(plain) => plain,
        Err(e) => {
            log::warn!(
                "Patch fallback for {}: old entry not decompressible ({e})",
                layout.header.name_lossy()
            );
            return Ok(raw_fallback(layout, span));
        }
    };
    let new_plain = match compression::decompress(
        new_data,
        layout.method(),
        layout.uncompressed_size as usize,
    ) {
        Ok(plain) => plain,
        Err(e) => {
            log::warn!(
                "Patch fallback for {}: new entry not decompressible ({e})",
                layout.header.name_lossy()
            );
            return Ok(raw_fallback(layout, span));
        }
    };

    let recompress = match layout.method() {
        CompressionMethod::Stored => None,
        CompressionMethod::Deflate => match compression::infer_option(new_data, &new_plain) {
            Some(option) => Some(option),
            None => {
                let e = Error::Reproducibility {
                    name: layout.header.name_lossy(),
                    reason: "no deflate option reproduces the stored bytes".to_string(),
                };
                log::warn!("Patch fallback: {e}");
                return Ok(raw_fallback(layout, span));
            }
        },
        CompressionMethod::Other(_) => return Ok(raw_fallback(layout, span)),
    };

    let diff_script = diff::compute(&old_plain, &new_plain)?;
    let meta = PatchMetadata {
        header: layout.header.clone(),
        descriptor: layout.descriptor.clone(),
        recompress,
        diff_script,
    };

    if options.verify {
        let payload = match recompress {
            Some(option) => compression::compress(&new_plain, CompressionMethod::Deflate, option)?,
            None => new_plain.clone(),
        };
        if let Err(e) =
            verify_render(&layout, &span, &meta.header, &payload, meta.descriptor.as_ref())
        {
            log::warn!("Patch fallback for {}: {e}", layout.header.name_lossy());
            return Ok(raw_fallback(layout, span));
        }
    }

    let action = PlanAction::Patch {
        old_index: old_side.index,
        old_span_end: old_side.layout.span_end,
        meta,
    };
    Ok(EntryPlan {
        action,
        layout,
        span,
    })
}

fn plan_new(
    layout: EntryLayout,
    span: Vec<u8>,
    rename: Option<(u64, u64)>,
    options: &GeneratorOptions,
) -> Result<EntryPlan> {
    let new_data = data_slice(&layout, &span);

    if let Some((offset, length)) = rename {
        let meta = NewMetadata {
            header: layout.header.clone(),
            data: FileData::CopyRange { offset, length },
            descriptor: layout.descriptor.clone(),
            recompress: None,
        };
        // Rename reuse writes the old stored bytes verbatim, which equal
        // the new stored bytes by construction of the candidate match
        if !options.verify
            || verify_render(&layout, &span, &meta.header, new_data, meta.descriptor.as_ref())
                .is_ok()
        {
            return Ok(EntryPlan {
                action: PlanAction::New(meta),
                layout,
                span,
            });
        }
    }

    let meta = match layout.method() {
        CompressionMethod::Stored => NewMetadata {
            header: layout.header.clone(),
            data: FileData::Inline(new_data.to_vec()),
            descriptor: layout.descriptor.clone(),
            recompress: None,
        },
        CompressionMethod::Deflate => {
            let plain = match compression::decompress(
                new_data,
                layout.method(),
                layout.uncompressed_size as usize,
            ) {
                Ok(plain) => plain,
                Err(e) => {
                    log::warn!(
                        "New-entry fallback for {}: {e}",
                        layout.header.name_lossy()
                    );
                    return Ok(raw_fallback(layout, span));
                }
            };
            match compression::infer_option(new_data, &plain) {
                Some(option) => NewMetadata {
                    header: layout.header.clone(),
                    data: FileData::Inline(plain),
                    descriptor: layout.descriptor.clone(),
                    recompress: Some(option),
                },
                None => {
                    let e = Error::Reproducibility {
                        name: layout.header.name_lossy(),
                        reason: "no deflate option reproduces the stored bytes".to_string(),
                    };
                    log::warn!("New-entry fallback: {e}");
                    return Ok(raw_fallback(layout, span));
                }
            }
        }
        CompressionMethod::Other(_) => return Ok(raw_fallback(layout, span)),
    };

    if options.verify {
        if let Err(e) =
            verify_render(&layout, &span, &meta.header, new_data, meta.descriptor.as_ref())
        {
            log::warn!("New-entry fallback for {}: {e}", layout.header.name_lossy());
            return Ok(raw_fallback(layout, span));
        }
    }
    Ok(EntryPlan {
        action: PlanAction::New(meta),
        layout,
        span,
    })
}

/// Last-resort plan: carry the entry's span bytes verbatim
///
/// Exact by construction: the header image re-serializes to the bytes it
/// was parsed from, and everything after it (data, descriptor, gap bytes)
/// travels inline untouched.
fn raw_fallback(layout: EntryLayout, span: Vec<u8>) -> EntryPlan {
    let header_len = layout.header.encoded_len();
    let meta = NewMetadata {
        header: layout.header.clone(),
        data: FileData::Inline(span[header_len..].to_vec()),
        descriptor: None,
        recompress: None,
    };
    EntryPlan {
        action: PlanAction::New(meta),
        layout,
        span,
    }
}

/// Byte-compare a locally rendered entry against its span in the new archive
fn verify_render(
    layout: &EntryLayout,
    span: &[u8],
    header: &LocalFileHeader,
    payload: &[u8],
    descriptor: Option<&DataDescriptor>,
) -> Result<()> {
    let mut rendered = header.to_bytes();
    rendered.extend_from_slice(payload);
    if let Some(d) = descriptor {
        rendered.extend_from_slice(&d.to_bytes());
    }
    if rendered == span {
        Ok(())
    } else {
        Err(Error::Reproducibility {
            name: layout.header.name_lossy(),
            reason: format!(
                "rendered entry is {} bytes, archive span is {}",
                rendered.len(),
                span.len()
            ),
        })
    }
}

/// Whether replaying `meta` as header, data and descriptor reproduces the
/// entry's full span
fn refresh_reproduces_span(layout: &EntryLayout, span: &[u8], meta: &RefreshMetadata) -> bool {
    verify_render(
        layout,
        span,
        &meta.header,
        data_slice(layout, span),
        meta.descriptor.as_ref(),
    )
    .is_ok()
}

/// Stored payload bytes of an entry within its own span
fn data_slice<'a>(layout: &EntryLayout, span: &'a [u8]) -> &'a [u8] {
    let start = (layout.data_offset - layout.header_offset) as usize;
    &span[start..start + layout.data_len as usize]
}

/// Sequential emission phase: serialize plans in archive order, coalescing
/// adjacent copy-eligible spans and keeping the old-archive read cursor
/// monotonic
fn emit<W: Write>(
    plans: Vec<EntryPlan>,
    central: Vec<u8>,
    out: W,
) -> Result<GenerateSummary> {
    let mut summary = GenerateSummary::default();
    let mut writer = PatchWriter::new(CountingWriter::new(out));
    writer.init()?;

    let mut old_cursor = 0u64;
    let mut pending_copy = 0u64;

    let flush_copy =
        |writer: &mut PatchWriter<CountingWriter<W>>,
         old_cursor: &mut u64,
         pending: &mut u64,
         summary: &mut GenerateSummary|
         -> Result<()> {
            if *pending > 0 {
                writer.write(&PatchDirective::Copy { bytes: *pending })?;
                summary.copy_directives += 1;
                summary.bytes_copied += *pending;
                *old_cursor += *pending;
                *pending = 0;
            }
            Ok(())
        };

    for plan in plans {
        match plan.action {
            PlanAction::CopyEligible {
                old_offset,
                old_span_end,
                refresh,
                old_index,
            } => {
                if old_offset == old_cursor + pending_copy {
                    pending_copy += plan.layout.span_len();
                    summary.entries_copied += 1;
                } else {
                    // Identical bytes but the read cursor does not line up
                    // (an intervening old entry was dropped or reordered)
                    flush_copy(&mut writer, &mut old_cursor, &mut pending_copy, &mut summary)?;
                    // A refresh replays header + data + descriptor only, so a
                    // span carrying trailing gap bytes must travel raw instead
                    if old_span_end >= old_cursor
                        && refresh_reproduces_span(&plan.layout, &plan.span, &refresh)
                    {
                        writer.write(&PatchDirective::Refresh {
                            old_index,
                            meta: refresh,
                        })?;
                        summary.entries_refreshed += 1;
                        old_cursor = old_span_end;
                    } else {
                        let fallback = raw_fallback(plan.layout, plan.span);
                        let PlanAction::New(meta) = fallback.action else {
                            return Err(Error::malformed_patch("raw fallback must be NEW"));
                        };
                        writer.write(&PatchDirective::New(meta))?;
                        summary.entries_new += 1;
                    }
                }
            }
            PlanAction::Refresh {
                old_index,
                old_span_end,
                meta,
            } => {
                flush_copy(&mut writer, &mut old_cursor, &mut pending_copy, &mut summary)?;
                if old_span_end >= old_cursor {
                    writer.write(&PatchDirective::Refresh { old_index, meta })?;
                    summary.entries_refreshed += 1;
                    old_cursor = old_span_end;
                } else {
                    let fallback = raw_fallback(plan.layout, plan.span);
                    let PlanAction::New(meta) = fallback.action else {
                        return Err(Error::malformed_patch("raw fallback must be NEW"));
                    };
                    writer.write(&PatchDirective::New(meta))?;
                    summary.entries_new += 1;
                }
            }
            PlanAction::Patch {
                old_index,
                old_span_end,
                meta,
            } => {
                flush_copy(&mut writer, &mut old_cursor, &mut pending_copy, &mut summary)?;
                if old_span_end >= old_cursor {
                    writer.write(&PatchDirective::Patch { old_index, meta })?;
                    summary.entries_patched += 1;
                    old_cursor = old_span_end;
                } else {
                    let fallback = raw_fallback(plan.layout, plan.span);
                    let PlanAction::New(meta) = fallback.action else {
                        return Err(Error::malformed_patch("raw fallback must be NEW"));
                    };
                    writer.write(&PatchDirective::New(meta))?;
                    summary.entries_new += 1;
                }
            }
            PlanAction::New(meta) => {
                flush_copy(&mut writer, &mut old_cursor, &mut pending_copy, &mut summary)?;
                writer.write(&PatchDirective::New(meta))?;
                summary.entries_new += 1;
            }
        }
    }
    flush_copy(&mut writer, &mut old_cursor, &mut pending_copy, &mut summary)?;

    writer.write(&PatchDirective::Begin(CentralDirectorySection(central)))?;
    let counting = writer.finish()?;
    summary.patch_size = counting.written();

    log::info!(
        "Patch written: {} bytes, {} copied / {} refreshed / {} patched / {} new entries",
        summary.patch_size,
        summary.entries_copied,
        summary.entries_refreshed,
        summary.entries_patched,
        summary.entries_new
    );
    Ok(summary)
}
