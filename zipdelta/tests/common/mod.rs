//! Common test utilities and fixtures

#![allow(dead_code)]

use std::io::Cursor;
use zipdelta::{
    ApplyOptions, GenerateSummary, GeneratorOptions, PatchDirective, PatchParser, apply, generate,
};

/// Generate a patch between two in-memory archives
pub fn generate_patch_bytes(old: &[u8], new: &[u8], options: &GeneratorOptions) -> Vec<u8> {
    let mut old = Cursor::new(old.to_vec());
    let mut new = Cursor::new(new.to_vec());
    let mut patch = Vec::new();
    generate(&mut old, &mut new, &mut patch, options).expect("generate failed");
    patch
}

/// Generate a patch and return the summary alongside the bytes
pub fn generate_with_summary(old: &[u8], new: &[u8]) -> (Vec<u8>, GenerateSummary) {
    let mut old = Cursor::new(old.to_vec());
    let mut new = Cursor::new(new.to_vec());
    let mut patch = Vec::new();
    let summary = generate(&mut old, &mut new, &mut patch, &GeneratorOptions::default())
        .expect("generate failed");
    (patch, summary)
}

/// Apply a patch to an in-memory archive
pub fn apply_patch_bytes(old: &[u8], patch: &[u8]) -> Vec<u8> {
    let mut old = Cursor::new(old.to_vec());
    let mut rebuilt = Vec::new();
    apply(
        &mut old,
        &mut Cursor::new(patch.to_vec()),
        &mut rebuilt,
        &ApplyOptions::default(),
    )
    .expect("apply failed");
    rebuilt
}

/// Full generate-then-apply cycle
pub fn round_trip(old: &[u8], new: &[u8]) -> Vec<u8> {
    let patch = generate_patch_bytes(old, new, &GeneratorOptions::default());
    apply_patch_bytes(old, &patch)
}

/// Decode every directive of a patch stream
pub fn parse_directives(patch: &[u8]) -> Vec<PatchDirective> {
    let mut parser = PatchParser::new(Cursor::new(patch.to_vec()));
    parser.init().expect("init failed");
    let mut directives = Vec::new();
    while let Some(directive) = parser.read().expect("read failed") {
        directives.push(directive);
    }
    directives
}
