//! Identical archives should reduce to a single copy plus the central section

use crate::common::{generate_with_summary, parse_directives, round_trip};
use pretty_assertions::assert_eq;
use zipdelta::test_utils::{ZipBuilder, compressible_data, random_data};
use zipdelta::{DeflateOption, PatchDirective};

fn sample_archive() -> Vec<u8> {
    let mut builder = ZipBuilder::new();
    for i in 0..10u64 {
        let name = format!("dir/file-{i}.bin");
        builder = if i % 2 == 0 {
            builder.add_deflated(&name, &compressible_data(600 + i as usize * 31), DeflateOption::Normal)
        } else {
            builder.add_stored(&name, &random_data(i, 200 + i as usize * 13))
        };
    }
    builder.build().unwrap()
}

#[test]
fn identical_archives_produce_one_copy() {
    let archive = sample_archive();
    let (patch, summary) = generate_with_summary(&archive, &archive);

    assert_eq!(summary.entries_copied, 10);
    assert_eq!(summary.copy_directives, 1);
    assert_eq!(summary.entries_refreshed, 0);
    assert_eq!(summary.entries_patched, 0);
    assert_eq!(summary.entries_new, 0);

    let directives = parse_directives(&patch);
    assert_eq!(directives.len(), 2);
    let PatchDirective::Copy { bytes } = directives[0] else {
        panic!("expected COPY, got {}", directives[0].kind());
    };
    let PatchDirective::Begin(section) = &directives[1] else {
        panic!("expected BEGIN, got {}", directives[1].kind());
    };
    assert_eq!(bytes as usize + section.0.len(), archive.len());
}

#[test]
fn no_op_patch_rebuilds_byte_for_byte() {
    let archive = sample_archive();
    assert_eq!(round_trip(&archive, &archive), archive);
}

#[test]
fn empty_archive_no_op() {
    let archive = ZipBuilder::new().build().unwrap();
    let (patch, summary) = generate_with_summary(&archive, &archive);
    assert_eq!(summary.copy_directives, 0);
    assert_eq!(parse_directives(&patch).len(), 1);
    assert_eq!(round_trip(&archive, &archive), archive);
}
