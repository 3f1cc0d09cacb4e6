//! End-to-end identity: apply(old, generate(old, new)) == new

use crate::common::{apply_patch_bytes, generate_with_summary, parse_directives, round_trip};
use pretty_assertions::assert_eq;
use zipdelta::test_utils::{ZipBuilder, compressible_data, random_data};
use zipdelta::{DeflateOption, FileData, LocalFileHeader, PatchDirective, signatures};

#[test]
fn single_patched_entry() {
    let old = ZipBuilder::new()
        .add_stored("0.txt", b"prefix entry")
        .add_deflated("a.txt", b"hello", DeflateOption::Normal)
        .add_stored("z.txt", b"suffix entry")
        .build()
        .unwrap();
    let new = ZipBuilder::new()
        .add_stored("0.txt", b"prefix entry")
        .add_deflated("a.txt", b"hello world", DeflateOption::Normal)
        .add_stored("z.txt", b"suffix entry")
        .build()
        .unwrap();

    let (patch, summary) = generate_with_summary(&old, &new);
    assert_eq!(summary.entries_copied, 2);
    assert_eq!(summary.entries_patched, 1);

    let kinds: Vec<_> = parse_directives(&patch).iter().map(|d| d.kind()).collect();
    assert_eq!(kinds, vec!["COPY", "PATCH", "COPY", "BEGIN"]);

    assert_eq!(round_trip(&old, &new), new);
}

#[test]
fn new_entry_appended() {
    let old = ZipBuilder::new()
        .add_stored("a.txt", b"alpha")
        .build()
        .unwrap();
    let new = ZipBuilder::new()
        .add_stored("a.txt", b"alpha")
        .add_deflated("b.txt", b"brand new entry payload", DeflateOption::Normal)
        .build()
        .unwrap();

    let (patch, summary) = generate_with_summary(&old, &new);
    assert_eq!(summary.entries_new, 1);
    assert_eq!(summary.entries_copied, 1);

    let kinds: Vec<_> = parse_directives(&patch).iter().map(|d| d.kind()).collect();
    assert_eq!(kinds, vec!["COPY", "NEW", "BEGIN"]);

    assert_eq!(round_trip(&old, &new), new);
}

#[test]
fn entry_removed() {
    let old = ZipBuilder::new()
        .add_stored("a.txt", b"alpha")
        .add_stored("gone.txt", b"dropped in the new build")
        .add_stored("c.txt", b"gamma")
        .build()
        .unwrap();
    let new = ZipBuilder::new()
        .add_stored("a.txt", b"alpha")
        .add_stored("c.txt", b"gamma")
        .build()
        .unwrap();

    assert_eq!(round_trip(&old, &new), new);
}

#[test]
fn entry_renamed_reuses_old_bytes() {
    let payload = random_data(3, 5000);
    let old = ZipBuilder::new()
        .add_deflated("assets/old.bin", &payload, DeflateOption::Normal)
        .build()
        .unwrap();
    let new = ZipBuilder::new()
        .add_deflated("assets/new.bin", &payload, DeflateOption::Normal)
        .build()
        .unwrap();

    let (patch, _) = generate_with_summary(&old, &new);
    let directives = parse_directives(&patch);
    let PatchDirective::New(meta) = &directives[0] else {
        panic!("expected NEW, got {}", directives[0].kind());
    };
    assert!(matches!(meta.data, FileData::CopyRange { .. }));

    assert_eq!(round_trip(&old, &new), new);
}

#[test]
fn stored_to_deflated_transition() {
    let payload = compressible_data(4000);
    let old = ZipBuilder::new()
        .add_stored("data.bin", &payload)
        .build()
        .unwrap();
    let new = ZipBuilder::new()
        .add_deflated("data.bin", &payload, DeflateOption::Maximum)
        .build()
        .unwrap();

    assert_eq!(round_trip(&old, &new), new);
    assert_eq!(round_trip(&new, &old), old);
}

#[test]
fn deflate_option_change() {
    let payload = compressible_data(8000);
    let old = ZipBuilder::new()
        .add_deflated("data.bin", &payload, DeflateOption::Superfast)
        .build()
        .unwrap();
    let new = ZipBuilder::new()
        .add_deflated("data.bin", &payload, DeflateOption::Maximum)
        .build()
        .unwrap();

    assert_eq!(round_trip(&old, &new), new);
}

#[test]
fn zero_length_entries() {
    let old = ZipBuilder::new()
        .add_stored("keep", b"")
        .add_stored("fill", b"payload")
        .build()
        .unwrap();
    let new = ZipBuilder::new()
        .add_stored("keep", b"")
        .add_stored("fill", b"payload")
        .add_stored("added-empty", b"")
        .build()
        .unwrap();

    assert_eq!(round_trip(&old, &new), new);
}

#[test]
fn empty_old_archive() {
    let old = ZipBuilder::new().build().unwrap();
    let new = ZipBuilder::new()
        .add_stored("a.txt", b"alpha")
        .add_deflated("b.bin", &compressible_data(1500), DeflateOption::Normal)
        .build()
        .unwrap();

    let (patch, summary) = generate_with_summary(&old, &new);
    assert_eq!(summary.entries_new, 2);
    assert_eq!(summary.copy_directives, 0);
    assert_eq!(parse_directives(&patch).len(), 3);

    assert_eq!(round_trip(&old, &new), new);
}

#[test]
fn data_descriptor_entries() {
    for with_signature in [true, false] {
        let old = ZipBuilder::new()
            .add_deflated_with_descriptor(
                "streamed.bin",
                &compressible_data(2000),
                DeflateOption::Normal,
                with_signature,
            )
            .build()
            .unwrap();
        let new = ZipBuilder::new()
            .add_deflated_with_descriptor(
                "streamed.bin",
                &compressible_data(2345),
                DeflateOption::Normal,
                with_signature,
            )
            .build()
            .unwrap();

        assert_eq!(round_trip(&old, &new), new);
    }
}

#[test]
fn extra_field_change_is_a_refresh() {
    let old = ZipBuilder::new()
        .add_stored_with_extra("a.txt", b"alpha", vec![0x01, 0x00, 0x02, 0x00, 0xAA, 0xBB])
        .build()
        .unwrap();
    let new = ZipBuilder::new()
        .add_stored_with_extra("a.txt", b"alpha", vec![0x01, 0x00, 0x02, 0x00, 0xCC, 0xDD])
        .build()
        .unwrap();

    let (patch, summary) = generate_with_summary(&old, &new);
    assert_eq!(summary.entries_refreshed, 1);
    let kinds: Vec<_> = parse_directives(&patch).iter().map(|d| d.kind()).collect();
    assert_eq!(kinds, vec!["REFRESH", "BEGIN"]);

    assert_eq!(round_trip(&old, &new), new);
}

#[test]
fn archive_comment_change_only() {
    let old = ZipBuilder::new()
        .add_stored("a.txt", b"alpha")
        .comment(b"build 1".to_vec())
        .build()
        .unwrap();
    let new = ZipBuilder::new()
        .add_stored("a.txt", b"alpha")
        .comment(b"build 2".to_vec())
        .build()
        .unwrap();

    // Entries are identical; only the central section differs
    let (patch, summary) = generate_with_summary(&old, &new);
    assert_eq!(summary.copy_directives, 1);
    assert_eq!(parse_directives(&patch).len(), 2);
    assert_eq!(round_trip(&old, &new), new);
}

// ZIP readers tolerate unclaimed bytes between one entry's data and the next
// record; ZipBuilder never emits them, so these archives are assembled by hand.
const GAP: &[u8] = &[0xDE, 0xAD, 0xBE, 0xEF];

fn stored_header(name: &[u8], data: &[u8], crc32: u32) -> LocalFileHeader {
    LocalFileHeader {
        version_needed: 20,
        flags: 0,
        method: 0,
        mod_time: 0x6000,
        mod_date: 0x58CF,
        crc32,
        compressed_size: data.len() as u32,
        uncompressed_size: data.len() as u32,
        name: name.to_vec(),
        extra: Vec::new(),
    }
}

fn push_central_record(out: &mut Vec<u8>, header: &LocalFileHeader, offset: u32) {
    out.extend_from_slice(&signatures::CENTRAL_FILE_HEADER.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes()); // version made by
    out.extend_from_slice(&header.version_needed.to_le_bytes());
    out.extend_from_slice(&header.flags.to_le_bytes());
    out.extend_from_slice(&header.method.to_le_bytes());
    out.extend_from_slice(&header.mod_time.to_le_bytes());
    out.extend_from_slice(&header.mod_date.to_le_bytes());
    out.extend_from_slice(&header.crc32.to_le_bytes());
    out.extend_from_slice(&header.compressed_size.to_le_bytes());
    out.extend_from_slice(&header.uncompressed_size.to_le_bytes());
    out.extend_from_slice(&(header.name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // extra field length
    out.extend_from_slice(&0u16.to_le_bytes()); // comment length
    out.extend_from_slice(&0u16.to_le_bytes()); // disk number start
    out.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
    out.extend_from_slice(&0u32.to_le_bytes()); // external attributes
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&header.name);
}

/// Archive whose last entry is followed by gap bytes no record claims
fn gapped_archive(with_predecessor: bool) -> Vec<u8> {
    let mut entries: Vec<(LocalFileHeader, &[u8])> = Vec::new();
    if with_predecessor {
        entries.push((stored_header(b"gone.txt", b"dropped", 0x1111_1111), b"dropped"));
    }
    entries.push((stored_header(b"a.txt", b"alpha", 0x2222_2222), b"alpha"));

    let mut archive = Vec::new();
    let mut offsets = Vec::new();
    for (header, data) in &entries {
        offsets.push(archive.len() as u32);
        archive.extend_from_slice(&header.to_bytes());
        archive.extend_from_slice(data);
    }
    archive.extend_from_slice(GAP);

    let central_start = archive.len() as u32;
    for ((header, _), offset) in entries.iter().zip(&offsets) {
        push_central_record(&mut archive, header, *offset);
    }
    let central_len = archive.len() as u32 - central_start;
    archive.extend_from_slice(&signatures::END_OF_CENTRAL_DIRECTORY.to_le_bytes());
    archive.extend_from_slice(&0u16.to_le_bytes()); // disk number
    archive.extend_from_slice(&0u16.to_le_bytes()); // central directory disk
    archive.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    archive.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    archive.extend_from_slice(&central_len.to_le_bytes());
    archive.extend_from_slice(&central_start.to_le_bytes());
    archive.extend_from_slice(&0u16.to_le_bytes()); // comment length
    archive
}

#[test]
fn gap_bytes_ride_along_with_copy() {
    let archive = gapped_archive(false);
    let (patch, summary) = generate_with_summary(&archive, &archive);
    assert_eq!(summary.copy_directives, 1);

    let kinds: Vec<_> = parse_directives(&patch).iter().map(|d| d.kind()).collect();
    assert_eq!(kinds, vec!["COPY", "BEGIN"]);

    assert_eq!(apply_patch_bytes(&archive, &patch), archive);
}

#[test]
fn gap_bytes_force_raw_new_when_copy_misaligns() {
    // The dropped predecessor throws the read cursor off, and the surviving
    // entry's span ends in gap bytes a refresh replay cannot rebuild
    let old = gapped_archive(true);
    let new = gapped_archive(false);

    let (patch, summary) = generate_with_summary(&old, &new);
    assert_eq!(summary.entries_refreshed, 0);
    assert_eq!(summary.entries_new, 1);

    let kinds: Vec<_> = parse_directives(&patch).iter().map(|d| d.kind()).collect();
    assert_eq!(kinds, vec!["NEW", "BEGIN"]);

    assert_eq!(apply_patch_bytes(&old, &patch), new);
}

#[test]
fn many_entries_mixed_changes() {
    let mut old_builder = ZipBuilder::new();
    let mut new_builder = ZipBuilder::new();
    for i in 0..20 {
        let name = format!("entry-{i:02}.bin");
        let payload = random_data(i, 400 + i as usize * 17);
        old_builder = old_builder.add_deflated(&name, &payload, DeflateOption::Normal);
        let new_payload = if i % 5 == 0 {
            let mut changed = payload.clone();
            changed.extend_from_slice(b"appended tail");
            changed
        } else {
            payload
        };
        new_builder = new_builder.add_deflated(&name, &new_payload, DeflateOption::Normal);
    }
    let old = old_builder.build().unwrap();
    let new = new_builder
        .add_stored("manifest.txt", b"v2 manifest")
        .build()
        .unwrap();

    let (_, summary) = generate_with_summary(&old, &new);
    assert_eq!(summary.entries_patched, 4);
    assert_eq!(summary.entries_copied, 16);
    assert_eq!(summary.entries_new, 1);

    assert_eq!(round_trip(&old, &new), new);
}
