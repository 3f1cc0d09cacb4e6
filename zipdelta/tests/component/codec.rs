//! Codec round-trip and rejection tests

use proptest::prelude::*;
use std::io::Cursor;
use zipdelta::{
    CentralDirectorySection, DataDescriptor, DeflateOption, Error, FileData, LocalFileHeader,
    NewMetadata, PatchDirective, PatchMetadata, PatchParser, PatchWriter, RefreshMetadata,
};

fn encode(directives: &[PatchDirective]) -> Vec<u8> {
    let mut writer = PatchWriter::new(Vec::new());
    writer.init().expect("init failed");
    for directive in directives {
        writer.write(directive).expect("write failed");
    }
    writer.finish().expect("finish failed")
}

fn decode_one(bytes: &[u8]) -> zipdelta::Result<Option<PatchDirective>> {
    let mut parser = PatchParser::new(Cursor::new(bytes.to_vec()));
    parser.init()?;
    parser.read()
}

fn sample_header() -> LocalFileHeader {
    LocalFileHeader {
        version_needed: 20,
        flags: 0x0002,
        method: 8,
        mod_time: 0x6000,
        mod_date: 0x58CF,
        crc32: 0x0102_0304,
        compressed_size: 64,
        uncompressed_size: 256,
        name: b"path/to/entry.dat".to_vec(),
        extra: vec![0x55, 0x54, 0x05, 0x00, 1, 2, 3, 4, 5],
    }
}

fn sample_descriptor() -> DataDescriptor {
    DataDescriptor {
        has_signature: false,
        crc32: 0x0102_0304,
        compressed_size: 64,
        uncompressed_size: 256,
    }
}

#[test]
fn round_trip_every_variant() {
    let directives = vec![
        PatchDirective::Copy { bytes: 17 },
        PatchDirective::New(NewMetadata {
            header: sample_header(),
            data: FileData::Inline(b"inline payload".to_vec()),
            descriptor: None,
            recompress: Some(DeflateOption::Fast),
        }),
        PatchDirective::New(NewMetadata {
            header: sample_header(),
            data: FileData::CopyRange {
                offset: 4096,
                length: 512,
            },
            descriptor: Some(sample_descriptor()),
            recompress: None,
        }),
        PatchDirective::Refresh {
            old_index: 1,
            meta: RefreshMetadata {
                header: sample_header(),
                descriptor: Some(sample_descriptor()),
            },
        },
        PatchDirective::Patch {
            old_index: 2,
            meta: PatchMetadata {
                header: sample_header(),
                descriptor: None,
                recompress: Some(DeflateOption::Maximum),
                diff_script: b"BSDIFF40-ish opaque bytes".to_vec(),
            },
        },
        PatchDirective::Begin(CentralDirectorySection(b"PK\x05\x06rest".to_vec())),
    ];

    let bytes = encode(&directives);
    let mut parser = PatchParser::new(Cursor::new(bytes));
    parser.init().expect("init failed");
    for expected in &directives {
        let decoded = parser.read().expect("read failed").expect("early EOF");
        assert_eq!(&decoded, expected);
    }
    assert_eq!(parser.read().expect("trailing read failed"), None);
}

#[test]
fn empty_stream_after_header_is_clean_eof() {
    let bytes = encode(&[]);
    assert!(matches!(decode_one(&bytes), Ok(None)));
}

#[test]
fn unknown_tag_rejected() {
    let mut bytes = encode(&[]);
    bytes.push(0xEE);
    assert!(matches!(decode_one(&bytes), Err(Error::MalformedPatch(_))));
}

#[test]
fn truncated_stream_rejected() {
    let bytes = encode(&[PatchDirective::Copy { bytes: 1234 }]);
    for cut in 7..bytes.len() {
        let result = decode_one(&bytes[..cut]);
        assert!(
            matches!(result, Err(Error::MalformedPatch(_))),
            "cut at {cut} was not rejected"
        );
    }
}

#[test]
fn bad_magic_rejected() {
    let mut bytes = encode(&[]);
    bytes[0] ^= 0xFF;
    let mut parser = PatchParser::new(Cursor::new(bytes));
    assert!(matches!(parser.init(), Err(Error::MalformedPatch(_))));
}

#[test]
fn future_version_rejected() {
    let mut bytes = encode(&[]);
    bytes[4] = 9;
    let mut parser = PatchParser::new(Cursor::new(bytes));
    assert!(matches!(parser.init(), Err(Error::MalformedPatch(_))));
}

#[test]
fn directive_after_begin_rejected() {
    let mut bytes = encode(&[PatchDirective::Begin(CentralDirectorySection(vec![0]))]);
    bytes.extend_from_slice(&encode(&[PatchDirective::Copy { bytes: 1 }])[6..]);

    let mut parser = PatchParser::new(Cursor::new(bytes));
    parser.init().expect("init failed");
    assert!(matches!(
        parser.read(),
        Ok(Some(PatchDirective::Begin(_)))
    ));
    assert!(matches!(parser.read(), Err(Error::MalformedPatch(_))));
}

#[test]
fn double_begin_rejected() {
    let one = encode(&[PatchDirective::Begin(CentralDirectorySection(vec![7]))]);
    let mut bytes = one.clone();
    bytes.extend_from_slice(&one[6..]);

    let mut parser = PatchParser::new(Cursor::new(bytes));
    parser.init().expect("init failed");
    parser.read().expect("first BEGIN failed");
    assert!(matches!(parser.read(), Err(Error::MalformedPatch(_))));
}

fn header_strategy() -> impl Strategy<Value = LocalFileHeader> {
    (
        any::<u16>(),
        any::<u16>(),
        any::<u16>(),
        any::<u16>(),
        any::<u16>(),
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
        proptest::collection::vec(any::<u8>(), 0..64),
        proptest::collection::vec(any::<u8>(), 0..32),
    )
        .prop_map(
            |(
                version_needed,
                flags,
                method,
                mod_time,
                mod_date,
                crc32,
                compressed_size,
                uncompressed_size,
                name,
                extra,
            )| LocalFileHeader {
                version_needed,
                flags,
                method,
                mod_time,
                mod_date,
                crc32,
                compressed_size,
                uncompressed_size,
                name,
                extra,
            },
        )
}

fn descriptor_strategy() -> impl Strategy<Value = Option<DataDescriptor>> {
    proptest::option::of(
        (any::<bool>(), any::<u32>(), any::<u32>(), any::<u32>()).prop_map(
            |(has_signature, crc32, compressed_size, uncompressed_size)| DataDescriptor {
                has_signature,
                crc32,
                compressed_size,
                uncompressed_size,
            },
        ),
    )
}

fn recompress_strategy() -> impl Strategy<Value = Option<DeflateOption>> {
    prop_oneof![
        Just(None),
        Just(Some(DeflateOption::Normal)),
        Just(Some(DeflateOption::Maximum)),
        Just(Some(DeflateOption::Fast)),
        Just(Some(DeflateOption::Superfast)),
    ]
}

fn directive_strategy() -> impl Strategy<Value = PatchDirective> {
    prop_oneof![
        any::<u64>().prop_map(|bytes| PatchDirective::Copy { bytes }),
        (
            header_strategy(),
            proptest::collection::vec(any::<u8>(), 0..256),
            descriptor_strategy(),
            recompress_strategy(),
        )
            .prop_map(|(header, data, descriptor, recompress)| {
                PatchDirective::New(NewMetadata {
                    header,
                    data: FileData::Inline(data),
                    descriptor,
                    recompress,
                })
            }),
        (header_strategy(), any::<u64>(), any::<u64>(), descriptor_strategy())
            .prop_map(|(header, offset, length, descriptor)| {
                PatchDirective::New(NewMetadata {
                    header,
                    data: FileData::CopyRange { offset, length },
                    descriptor,
                    recompress: None,
                })
            }),
        (any::<u32>(), header_strategy(), descriptor_strategy()).prop_map(
            |(old_index, header, descriptor)| PatchDirective::Refresh {
                old_index,
                meta: RefreshMetadata { header, descriptor },
            }
        ),
        (
            any::<u32>(),
            header_strategy(),
            descriptor_strategy(),
            recompress_strategy(),
            proptest::collection::vec(any::<u8>(), 0..256),
        )
            .prop_map(|(old_index, header, descriptor, recompress, diff_script)| {
                PatchDirective::Patch {
                    old_index,
                    meta: PatchMetadata {
                        header,
                        descriptor,
                        recompress,
                        diff_script,
                    },
                }
            }),
        proptest::collection::vec(any::<u8>(), 0..512)
            .prop_map(|image| PatchDirective::Begin(CentralDirectorySection(image))),
    ]
}

proptest! {
    #[test]
    fn prop_codec_round_trip(directive in directive_strategy()) {
        let bytes = encode(std::slice::from_ref(&directive));
        let decoded = decode_one(&bytes).expect("decode failed").expect("missing directive");
        prop_assert_eq!(decoded, directive);
    }

    #[test]
    fn prop_encoding_deterministic(directive in directive_strategy()) {
        let first = encode(std::slice::from_ref(&directive));
        let second = encode(std::slice::from_ref(&directive));
        prop_assert_eq!(first, second);
    }
}
