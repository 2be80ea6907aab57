//! License key generation.
//!
//! Keys have the format `AURA-XXXXX-XXXXX-XXXXX`. Each block is the first five
//! hex digits of its own random 128-bit UUID, uppercased.
//!
//! Randomness comes from `rand::rng()`, a cryptographically secure generator
//! seeded from the OS, so unissued keys cannot be predicted from issued ones.
//!
//! # Example
//!
//! ```rust
//! use aura_keygen::key_generation::{generate_unique_key, is_valid_key_format};
//!
//! let key = generate_unique_key();
//! assert!(is_valid_key_format(&key));
//! ```

use lazy_static::lazy_static;
use rand::{CryptoRng, Rng};
use regex::Regex;
use uuid::{Builder, Uuid};

/// Prefix used by [`generate_unique_key`].
pub const DEFAULT_KEY_PREFIX: &str = "AURA";

/// Number of random blocks after the prefix.
pub const KEY_BLOCKS: usize = 3;

/// Hex digits per block.
pub const KEY_BLOCK_LENGTH: usize = 5;

/// Length of a key with the default prefix.
pub const KEY_LENGTH: usize =
    DEFAULT_KEY_PREFIX.len() + KEY_BLOCKS * (KEY_BLOCK_LENGTH + 1);

lazy_static! {
    static ref DEFAULT_KEY_PATTERN: Regex = key_pattern(DEFAULT_KEY_PREFIX);
}

fn key_pattern(prefix: &str) -> Regex {
    Regex::new(&format!(
        r"^{}(-[0-9A-F]{{{}}}){{{}}}$",
        regex::escape(prefix),
        KEY_BLOCK_LENGTH,
        KEY_BLOCKS
    ))
    .expect("escaped key pattern is valid")
}

/// A random version 4 UUID built from `rng`.
fn random_uuid<R: CryptoRng>(rng: &mut R) -> Uuid {
    Builder::from_random_bytes(rng.random::<[u8; 16]>()).into_uuid()
}

/// One uppercase block taken from a fresh random identifier.
fn generate_block<R: CryptoRng>(rng: &mut R) -> String {
    let hex = random_uuid(rng).simple().to_string();
    hex[..KEY_BLOCK_LENGTH].to_uppercase()
}

/// Generate a key with the given prefix using `rng` as the entropy source.
pub fn generate_key_with_prefix<R: CryptoRng>(prefix: &str, rng: &mut R) -> String {
    let blocks: Vec<String> = (0..KEY_BLOCKS).map(|_| generate_block(rng)).collect();
    format!("{}-{}", prefix, blocks.join("-"))
}

/// Generate an `AURA-` key using `rng` as the entropy source.
pub fn generate_unique_key_with<R: CryptoRng>(rng: &mut R) -> String {
    generate_key_with_prefix(DEFAULT_KEY_PREFIX, rng)
}

/// Generate an `AURA-XXXXX-XXXXX-XXXXX` key.
///
/// Uniqueness is probabilistic: each key carries 60 random bits.
pub fn generate_unique_key() -> String {
    generate_unique_key_with(&mut rand::rng())
}

/// Check that `key` matches `AURA-[0-9A-F]{5}-[0-9A-F]{5}-[0-9A-F]{5}`.
///
/// This is a format check only; it says nothing about whether the key was issued.
pub fn is_valid_key_format(key: &str) -> bool {
    DEFAULT_KEY_PATTERN.is_match(key)
}

/// Same as [`is_valid_key_format`] for a custom prefix.
pub fn is_valid_key_format_with_prefix(key: &str, prefix: &str) -> bool {
    if prefix == DEFAULT_KEY_PREFIX {
        return is_valid_key_format(key);
    }
    key_pattern(prefix).is_match(key)
}
