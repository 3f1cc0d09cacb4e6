//! Patch generation command

use anyhow::{Context, Result};
use humansize::{BINARY, format_size};
use std::fs;
use zipdelta::{GeneratorOptions, generate_patch};

use crate::cli::GenerateArgs;

pub fn execute(args: GenerateArgs) -> Result<()> {
    let options = GeneratorOptions {
        verify: !args.no_verify,
        detect_renames: !args.no_renames,
    };

    let summary = generate_patch(&args.old, &args.new, &args.patch, &options)
        .with_context(|| format!("failed to generate patch {}", args.patch.display()))?;

    let old_size = fs::metadata(&args.old)
        .with_context(|| format!("failed to stat {}", args.old.display()))?
        .len();
    let new_size = fs::metadata(&args.new)
        .with_context(|| format!("failed to stat {}", args.new.display()))?
        .len();

    println!("Patch written to {}", args.patch.display());
    println!("  Old archive:  {}", format_size(old_size, BINARY));
    println!("  New archive:  {}", format_size(new_size, BINARY));
    println!("  Patch size:   {}", format_size(summary.patch_size, BINARY));
    println!(
        "  Entries:      {} copied, {} refreshed, {} patched, {} new",
        summary.entries_copied,
        summary.entries_refreshed,
        summary.entries_patched,
        summary.entries_new
    );
    println!(
        "  Copy reuse:   {} across {} directive(s)",
        format_size(summary.bytes_copied, BINARY),
        summary.copy_directives
    );

    Ok(())
}
