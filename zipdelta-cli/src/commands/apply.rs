//! Patch application command

use anyhow::{Context, Result};
use humansize::{BINARY, format_size};
use zipdelta::{ApplyOptions, apply_patch};

use crate::cli::ApplyArgs;

pub fn execute(args: ApplyArgs) -> Result<()> {
    let options = ApplyOptions {
        verify_crc: !args.no_crc_check,
        ..ApplyOptions::default()
    };

    let summary = apply_patch(&args.old, &args.patch, &args.new, &options)
        .with_context(|| format!("failed to apply patch {}", args.patch.display()))?;

    println!("Rebuilt archive written to {}", args.new.display());
    println!(
        "  Output size:  {}",
        format_size(summary.bytes_written, BINARY)
    );
    println!(
        "  Directives:   {} copy, {} refresh, {} patch, {} new",
        summary.entries_copied,
        summary.entries_refreshed,
        summary.entries_patched,
        summary.entries_new
    );

    Ok(())
}
