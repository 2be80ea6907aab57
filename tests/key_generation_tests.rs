use std::collections::HashSet;

use aura_keygen::key_generation::{generate_unique_key, is_valid_key_format, KEY_LENGTH};

#[test]
fn every_generated_key_matches_pattern() {
    for _ in 0..10_000 {
        let key = generate_unique_key();
        assert_eq!(key.len(), KEY_LENGTH, "unexpected length: {key}");
        assert!(is_valid_key_format(&key), "bad format: {key}");
    }
}

#[test]
fn hundred_thousand_keys_are_distinct() {
    let mut keys = HashSet::with_capacity(100_000);
    for _ in 0..100_000 {
        let key = generate_unique_key();
        assert!(keys.insert(key.clone()), "Duplicate key generated: {}", key);
    }
}

#[test]
fn keys_use_the_full_hex_alphabet() {
    // 1000 keys = 15000 hex digits; every digit should show up.
    let mut seen = HashSet::new();
    for _ in 0..1000 {
        let key = generate_unique_key();
        seen.extend(key["AURA-".len()..].chars().filter(|c| *c != '-'));
    }
    assert_eq!(seen.len(), 16);
}
