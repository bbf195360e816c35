use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Stable 64-bit content hash.
///
/// Backs on-disk asset hashes and pipeline cache keys, so it must not change
/// between toolchains (std's SipHash keys are randomized and its output is
/// not stable across releases).
pub fn hash_bytes(bytes: &[u8]) -> u64 { xxh3_64_with_seed(bytes, 0) }

/// Folds `bytes` into an existing hash.
pub fn hash_combine(seed: u64, bytes: &[u8]) -> u64 { xxh3_64_with_seed(bytes, seed) }

/// Folds a u64 into an existing hash.
pub fn hash_combine_u64(seed: u64, value: u64) -> u64 {
    hash_combine(seed, &value.to_le_bytes())
}

/// Combines two hashes into one, order dependent.
pub fn combine_hashes(a: u64, b: u64) -> u64 { hash_combine_u64(a, b) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_deterministic() {
        assert_eq!(hash_bytes(b"kestrel"), hash_bytes(b"kestrel"));
        assert_ne!(hash_bytes(b"kestrel"), hash_bytes(b"kestrel "));
    }

    #[test]
    fn combine_is_order_dependent() {
        assert_ne!(combine_hashes(1, 2), combine_hashes(2, 1));
        assert_eq!(combine_hashes(1, 2), combine_hashes(1, 2));
    }

    #[test]
    fn seed_changes_output() {
        assert_ne!(hash_combine(0, b"data"), hash_combine(1, b"data"));
    }
}
