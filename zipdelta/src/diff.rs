//! Binary diff primitive boundary
//!
//! Wraps the bsdiff-compatible `qbsdiff` implementation behind two
//! deterministic functions. Scripts are opaque byte blobs to the rest of the
//! crate; they are only ever computed over decompressed (or stored-raw) entry
//! payloads, never over compressed bytes.

use crate::Result;
use qbsdiff::{Bsdiff, Bspatch};
use std::io::Cursor;

/// Compute an edit script transforming `old` into `new`
pub fn compute(old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
    let mut script = Vec::new();
    Bsdiff::new(old, new).compare(Cursor::new(&mut script))?;
    Ok(script)
}

/// Apply an edit script to `old`, producing the new payload
pub fn apply(old: &[u8], script: &[u8]) -> Result<Vec<u8>> {
    let patcher = Bspatch::new(script)?;
    let mut target = Vec::with_capacity(patcher.hint_target_size() as usize);
    patcher.apply(old, Cursor::new(&mut target))?;
    Ok(target)
}
