//! Utilities for fabricating test archives
//!
//! Only available in tests, with the `test-utils` feature, or for docs.

mod zip_builder;

pub use zip_builder::ZipBuilder;

use rand::{Rng, SeedableRng, rngs::StdRng};

/// Generate deterministic pseudo-random bytes (poorly compressible)
pub fn random_data(seed: u64, len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(data.as_mut_slice());
    data
}

/// Generate repetitive bytes (highly compressible)
pub fn compressible_data(len: usize) -> Vec<u8> {
    let pattern = b"lorem ipsum dolor sit amet ";
    let mut data = Vec::with_capacity(len);
    while data.len() < len {
        let chunk = (len - data.len()).min(pattern.len());
        data.extend_from_slice(&pattern[..chunk]);
    }
    data
}
