//! Stable hashing and seeded randomness
//!
//! Everything that has to be reproducible across runs (per-property random
//! streams, asset ids) goes through these two primitives. Neither depends on
//! std's `DefaultHasher`, whose output is not guaranteed stable.

use crate::value::Value;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over raw bytes
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Order-sensitive hash over the canonical JSON of each value
pub fn stable_hash(values: &[Value]) -> u32 {
    let mut buffer = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            buffer.push('\u{1f}');
        }
        buffer.push_str(&value.canonical_json());
    }
    fnv1a(buffer.as_bytes())
}

/// Hex form used for derived identifiers
pub fn stable_hash_hex(values: &[Value]) -> String {
    format!("{:08x}", stable_hash(values))
}

/// Mulberry32 pseudorandom generator
///
/// Small, fast and fully determined by its 32-bit seed.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Seed from an arbitrary list of values
    pub fn from_values(values: &[Value]) -> Self {
        Self::new(stable_hash(values))
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    /// Uniform float in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Uniform index in [0, len); `len` must be non-zero
    pub fn next_index(&mut self, len: usize) -> usize {
        let index = (self.next_f64() * len as f64) as usize;
        index.min(len.saturating_sub(1))
    }

    /// Fisher-Yates shuffle in place
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv_known_vectors() {
        assert_eq!(fnv1a(b""), 0x811c9dc5);
        assert_eq!(fnv1a(b"a"), 0xe40c292c);
    }

    #[test]
    fn test_stable_hash_is_order_sensitive() {
        let ab = stable_hash(&[Value::str("a"), Value::str("b")]);
        let ba = stable_hash(&[Value::str("b"), Value::str("a")]);
        assert_ne!(ab, ba);
        assert_eq!(ab, stable_hash(&[Value::str("a"), Value::str("b")]));
    }

    #[test]
    fn test_stable_hash_distinguishes_types() {
        assert_ne!(stable_hash(&[Value::Int(1)]), stable_hash(&[Value::str("1")]));
    }

    #[test]
    fn test_rng_reproducible() {
        let mut a = Mulberry32::new(42);
        let mut b = Mulberry32::new(42);
        for _ in 0..16 {
            let x = a.next_f64();
            assert!((0.0..1.0).contains(&x));
            assert_eq!(x, b.next_f64());
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut rng = Mulberry32::new(7);
        let mut items: Vec<u32> = (0..10).collect();
        rng.shuffle(&mut items);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }
}
