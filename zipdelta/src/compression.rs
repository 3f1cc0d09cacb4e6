//! Deflate compression service for ZIP entry payloads
//!
//! Entry data is diffed on its decompressed form, so the applier has to
//! recompress patched payloads *identically* to how the new archive stores
//! them. The [`DeflateOption`] enumeration names the four deflate settings
//! the ZIP appnote defines, and [`infer_option`] finds the one that
//! reproduces a stored payload byte-for-byte (or reports that none does).

use crate::{Error, Result};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

/// ZIP compression method tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Method 0 - stored without compression
    Stored,
    /// Method 8 - deflate
    Deflate,
    /// Any other method; payloads are opaque to this library
    Other(u16),
}

impl CompressionMethod {
    /// Create from the raw method tag of a ZIP header
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            other => CompressionMethod::Other(other),
        }
    }

    /// Raw method tag as stored in ZIP headers
    pub fn as_raw(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Other(raw) => *raw,
        }
    }
}

/// Deflate compression options from the ZIP appnote
///
/// The general-purpose flag bits 1-2 of a deflated entry advertise which
/// option the archiver used; that advertisement is a hint, not a guarantee,
/// which is why [`infer_option`] verifies by recompressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeflateOption {
    /// Normal (-en) compression
    Normal,
    /// Maximum (-exx/-ex) compression
    Maximum,
    /// Fast (-ef) compression
    Fast,
    /// Super fast (-es) compression
    Superfast,
}

impl DeflateOption {
    /// All options, in inference order
    pub const ALL: [DeflateOption; 4] = [
        DeflateOption::Normal,
        DeflateOption::Maximum,
        DeflateOption::Fast,
        DeflateOption::Superfast,
    ];

    /// Option advertised by the general-purpose flag bits of a local header
    pub fn from_general_purpose_flags(flags: u16) -> Self {
        match (flags >> 1) & 0x3 {
            1 => DeflateOption::Maximum,
            2 => DeflateOption::Fast,
            3 => DeflateOption::Superfast,
            _ => DeflateOption::Normal,
        }
    }

    /// Flate2 compression level this option maps to
    pub fn level(&self) -> Compression {
        match self {
            DeflateOption::Normal => Compression::new(6),
            DeflateOption::Maximum => Compression::new(9),
            DeflateOption::Fast => Compression::new(3),
            DeflateOption::Superfast => Compression::new(1),
        }
    }

    /// Wire tag used by the patch codec (0 is reserved for "no recompression")
    pub fn as_wire_tag(&self) -> u8 {
        match self {
            DeflateOption::Normal => 1,
            DeflateOption::Maximum => 2,
            DeflateOption::Fast => 3,
            DeflateOption::Superfast => 4,
        }
    }

    /// Decode a codec wire tag
    pub fn from_wire_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(DeflateOption::Normal),
            2 => Some(DeflateOption::Maximum),
            3 => Some(DeflateOption::Fast),
            4 => Some(DeflateOption::Superfast),
            _ => None,
        }
    }
}

/// Decompress a stored entry payload
///
/// `expected_size` is the uncompressed size declared by the archive metadata,
/// used only as an allocation hint. `Other` methods are rejected with
/// [`Error::UnsupportedMethod`]; callers fall back to raw handling.
pub fn decompress(data: &[u8], method: CompressionMethod, expected_size: usize) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(data.to_vec()),
        CompressionMethod::Deflate => {
            let mut decoder = DeflateDecoder::new(data);
            let mut decompressed = Vec::with_capacity(expected_size);
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| Error::compression(format!("deflate decompression failed: {e}")))?;
            if decompressed.len() != expected_size {
                log::debug!(
                    "Decompressed size mismatch: expected {}, got {}",
                    expected_size,
                    decompressed.len()
                );
            }
            Ok(decompressed)
        }
        CompressionMethod::Other(raw) => Err(Error::UnsupportedMethod { method: raw }),
    }
}

/// Compress a payload for storage
///
/// Deterministic for a given `(data, method, option)` triple; the whole
/// recompression story of the patch format depends on that holding.
pub fn compress(data: &[u8], method: CompressionMethod, option: DeflateOption) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(data.to_vec()),
        CompressionMethod::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), option.level());
            encoder
                .write_all(data)
                .map_err(|e| Error::compression(format!("deflate compression failed: {e}")))?;
            encoder
                .finish()
                .map_err(|e| Error::compression(format!("deflate compression failed: {e}")))
        }
        CompressionMethod::Other(raw) => Err(Error::UnsupportedMethod { method: raw }),
    }
}

/// Find the deflate option that reproduces `stored` from `plain` exactly
///
/// Returns `None` when no option matches, which means the payload was
/// produced by a compressor this library cannot imitate; the generator then
/// carries the entry raw instead of risking a non-reproducible patch.
pub fn infer_option(stored: &[u8], plain: &[u8]) -> Option<DeflateOption> {
    for option in DeflateOption::ALL {
        match compress(plain, CompressionMethod::Deflate, option) {
            Ok(candidate) if candidate == stored => return Some(option),
            Ok(_) => {}
            Err(e) => {
                log::debug!("Recompression attempt with {option:?} failed: {e}");
            }
        }
    }
    None
}
