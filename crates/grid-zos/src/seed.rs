//! Hex seed helpers for overlay network keys

use rand::RngCore;

use crate::{Error, Result};

/// Generate a random hex seed of `bytes` random bytes (2 * `bytes` characters).
pub fn generate_hex_seed(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Validate that `seed` is exactly `bytes` bytes of hex.
pub fn validate_hex_seed(seed: &str, bytes: usize) -> Result<()> {
    if seed.len() != bytes * 2 || hex::decode(seed).is_err() {
        return Err(Error::InvalidSeed(seed.to_string(), bytes));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_seed_round_trips() {
        let seed = generate_hex_seed(32);
        assert_eq!(seed.len(), 64);
        validate_hex_seed(&seed, 32).unwrap();
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(validate_hex_seed("abcd", 32).is_err());
    }

    #[test]
    fn rejects_non_hex() {
        let seed = "zz".repeat(32);
        assert!(validate_hex_seed(&seed, 32).is_err());
    }
}
