//! Patch inspection command

use anyhow::{Context, Result};
use humansize::{BINARY, format_size};
use std::fs::File;
use std::io::BufReader;
use zipdelta::{FileData, PatchDirective, PatchParser};

use crate::cli::InfoArgs;

#[derive(Default)]
struct Totals {
    copies: usize,
    copy_bytes: u64,
    refreshes: usize,
    patches: usize,
    script_bytes: u64,
    new_inline: usize,
    inline_bytes: u64,
    new_ranges: usize,
    range_bytes: u64,
    central_bytes: u64,
    has_begin: bool,
}

pub fn execute(args: InfoArgs) -> Result<()> {
    let file = File::open(&args.patch)
        .with_context(|| format!("failed to open {}", args.patch.display()))?;
    let patch_size = file.metadata()?.len();

    let mut parser = PatchParser::new(BufReader::new(file));
    parser
        .init()
        .with_context(|| format!("{} is not a zipdelta patch", args.patch.display()))?;

    let mut totals = Totals::default();
    while let Some(directive) = parser
        .read()
        .with_context(|| format!("failed to read {}", args.patch.display()))?
    {
        tally(&mut totals, &directive);
    }

    println!("Patch: {}", args.patch.display());
    println!("  Size:          {}", format_size(patch_size, BINARY));
    println!(
        "  Copy:          {} directive(s), {}",
        totals.copies,
        format_size(totals.copy_bytes, BINARY)
    );
    println!("  Refresh:       {} directive(s)", totals.refreshes);
    println!(
        "  Patch:         {} directive(s), {} of diff scripts",
        totals.patches,
        format_size(totals.script_bytes, BINARY)
    );
    println!(
        "  New (inline):  {} directive(s), {}",
        totals.new_inline,
        format_size(totals.inline_bytes, BINARY)
    );
    println!(
        "  New (reused):  {} directive(s), {}",
        totals.new_ranges,
        format_size(totals.range_bytes, BINARY)
    );
    println!(
        "  Central:       {}",
        format_size(totals.central_bytes, BINARY)
    );

    if !totals.has_begin {
        anyhow::bail!("patch stream ended without a BEGIN directive");
    }

    Ok(())
}

fn tally(totals: &mut Totals, directive: &PatchDirective) {
    match directive {
        PatchDirective::Copy { bytes } => {
            totals.copies += 1;
            totals.copy_bytes += bytes;
        }
        PatchDirective::Refresh { .. } => totals.refreshes += 1,
        PatchDirective::Patch { meta, .. } => {
            totals.patches += 1;
            totals.script_bytes += meta.diff_script.len() as u64;
        }
        PatchDirective::New(meta) => match &meta.data {
            FileData::Inline(data) => {
                totals.new_inline += 1;
                totals.inline_bytes += data.len() as u64;
            }
            FileData::CopyRange { length, .. } => {
                totals.new_ranges += 1;
                totals.range_bytes += length;
            }
        },
        PatchDirective::Begin(section) => {
            totals.has_begin = true;
            totals.central_bytes = section.0.len() as u64;
        }
    }
}
