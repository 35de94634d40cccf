//! Constant-time byte comparison, grounded on `auth_crypto.rs::constant_time_compare`.

use subtle::ConstantTimeEq;

/// Compares two byte strings in time independent of where they first differ.
/// Used for token-hash lookups so a failed auth attempt does not leak how
/// many leading bytes matched.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_slices_match() {
        assert!(constant_time_eq(b"abc123", b"abc123"));
    }

    #[test]
    fn differing_slices_do_not_match() {
        assert!(!constant_time_eq(b"abc123", b"abc124"));
    }

    #[test]
    fn differing_lengths_do_not_match() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
