//! Generate a patch between two small archives and apply it back.
//!
//! Run with: `cargo run --example round_trip --features test-utils`

use std::io::Cursor;
use zipdelta::test_utils::{ZipBuilder, compressible_data};
use zipdelta::{ApplyOptions, DeflateOption, GeneratorOptions, apply, generate};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let old = ZipBuilder::new()
        .add_stored("readme.txt", b"version 1")
        .add_deflated("data/blob.bin", &compressible_data(32 * 1024), DeflateOption::Normal)
        .build()?;

    let new = ZipBuilder::new()
        .add_stored("readme.txt", b"version 2")
        .add_deflated("data/blob.bin", &compressible_data(33 * 1024), DeflateOption::Normal)
        .add_stored("changelog.txt", b"added one entry")
        .build()?;

    let mut patch = Vec::new();
    let summary = generate(
        &mut Cursor::new(&old[..]),
        &mut Cursor::new(&new[..]),
        &mut patch,
        &GeneratorOptions::default(),
    )?;

    println!("old archive:  {} bytes", old.len());
    println!("new archive:  {} bytes", new.len());
    println!("patch:        {} bytes", patch.len());
    println!(
        "directives:   {} copied, {} refreshed, {} patched, {} new",
        summary.entries_copied,
        summary.entries_refreshed,
        summary.entries_patched,
        summary.entries_new
    );

    let mut rebuilt = Vec::new();
    apply(
        &mut Cursor::new(&old[..]),
        &mut Cursor::new(&patch[..]),
        &mut rebuilt,
        &ApplyOptions::default(),
    )?;

    assert_eq!(rebuilt, new);
    println!("rebuilt archive matches the new archive byte for byte");

    Ok(())
}
