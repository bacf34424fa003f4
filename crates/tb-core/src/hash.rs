//! Hash functions for TrackerBlock
//!
//! Domains are keyed by a 64-bit composite of two Murmur3 32-bit passes with
//! different seeds; URL tokens use a single 32-bit pass.
//!
//! Zero is reserved in both spaces: `hash64` never yields `(0, 0)` and
//! `hash_token` never yields `0`.

/// 64-bit hash represented as two 32-bit parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash64 {
    pub lo: u32,
    pub hi: u32,
}

impl Hash64 {
    /// Create a new Hash64 from lo and hi parts.
    #[inline]
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// Check if this hash is the empty sentinel (0, 0).
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.lo == 0 && self.hi == 0
    }

    /// Convert to a single u64.
    #[inline]
    pub const fn to_u64(&self) -> u64 {
        ((self.hi as u64) << 32) | (self.lo as u64)
    }
}

const SEED_LO: u32 = 0x9e3779b9; // Golden ratio
const SEED_HI: u32 = 0x85ebca6b; // Murmur3 constant
const SEED_TOKEN: u32 = 0x811c9dc5;

/// Murmur3 32-bit hash.
#[inline]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    let mut chunks = data.chunks_exact(4);

    for chunk in &mut chunks {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        h ^= scramble(k);
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k: u32 = 0;
        for (i, &b) in tail.iter().enumerate() {
            k ^= (b as u32) << (8 * i);
        }
        h ^= scramble(k);
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;

    h
}

#[inline]
fn scramble(k: u32) -> u32 {
    k.wrapping_mul(0xcc9e2d51)
        .rotate_left(15)
        .wrapping_mul(0x1b873593)
}

/// Compute the 64-bit hash as a (lo, hi) pair using two Murmur3 passes.
#[inline]
pub fn hash64(data: &[u8]) -> Hash64 {
    let mut lo = murmur3_32(data, SEED_LO);
    let hi = murmur3_32(data, SEED_HI);

    if lo == 0 && hi == 0 {
        lo = 1;
    }

    Hash64 { lo, hi }
}

/// Hash a domain string, ASCII case-insensitively.
#[inline]
pub fn hash_domain(domain: &str) -> Hash64 {
    with_lowercase(domain.as_bytes(), hash64)
}

/// Hash a token for the token index, ASCII case-insensitively.
#[inline]
pub fn hash_token(token: &str) -> u32 {
    hash_token_bytes(token.as_bytes())
}

/// Hash raw token bytes, ASCII case-insensitively.
#[inline]
pub fn hash_token_bytes(token: &[u8]) -> u32 {
    with_lowercase(token, |bytes| {
        let h = murmur3_32(bytes, SEED_TOKEN);
        if h == 0 {
            1
        } else {
            h
        }
    })
}

/// Run `f` over an ASCII-lowercased copy of `bytes`, on the stack when short.
fn with_lowercase<R>(bytes: &[u8], f: impl FnOnce(&[u8]) -> R) -> R {
    let mut stack_buf = [0u8; 128];
    if bytes.len() <= stack_buf.len() {
        for (dst, &b) in stack_buf.iter_mut().zip(bytes) {
            *dst = b.to_ascii_lowercase();
        }
        f(&stack_buf[..bytes.len()])
    } else {
        f(&bytes.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur3_consistent() {
        assert_eq!(murmur3_32(b"example.com", 0), murmur3_32(b"example.com", 0));
    }

    #[test]
    fn test_murmur3_known_vectors() {
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1), 0x514e28b7);
        assert_eq!(murmur3_32(b"test", 0), 0xba6bd213);
    }

    #[test]
    fn test_murmur3_different_inputs() {
        assert_ne!(murmur3_32(b"example.com", 0), murmur3_32(b"example.org", 0));
        assert_ne!(murmur3_32(b"example.com", 0), murmur3_32(b"example.com", 1));
    }

    #[test]
    fn test_hash64_never_zero() {
        for s in [b"" as &[u8], b"a", b"test", b"example.com"] {
            assert!(!hash64(s).is_empty(), "hash64({:?}) returned empty sentinel", s);
        }
    }

    #[test]
    fn test_hash_domain_case_insensitive() {
        assert_eq!(hash_domain("Example.COM"), hash_domain("example.com"));
    }

    #[test]
    fn test_hash_domain_long_input() {
        let long = "a".repeat(300) + ".com";
        assert_eq!(hash_domain(&long.to_uppercase()), hash_domain(&long));
    }

    #[test]
    fn test_hash_token_case_insensitive_and_nonzero() {
        assert_eq!(hash_token("Tracker"), hash_token("tracker"));
        assert_ne!(hash_token("script"), 0);
        assert_eq!(hash_token_bytes(b"ADS"), hash_token("ads"));
    }
}
