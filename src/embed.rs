//! Deterministic lexical-hash embedding.
//!
//! Maps text into a fixed 384-dimensional vector by hashing tokens into
//! buckets and L2-normalizing the counts. This is a word-overlap proxy, not
//! a learned semantic model: two texts score high only when they share
//! literal tokens after lowercasing. The module boundary is deliberate —
//! callers only see vectors and [`cosine`], so a real embedding service can
//! be swapped in without touching them.

use std::sync::OnceLock;

use regex::Regex;

/// Fixed embedding dimension.
pub const EMBED_DIM: usize = 384;

fn token_splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\W+").expect("valid token regex"))
}

/// Stable 32-bit FNV-1a hash.
///
/// Deliberately not `DefaultHasher`: the bucket assignment must be identical
/// across builds and platforms, since embeddings are persisted.
fn fnv1a_32(token: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in token.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Embed text into a unit-norm 384-dimensional vector.
///
/// Tokenizes on non-word boundaries, lowercases, accumulates +1.0 into
/// `vector[fnv1a(token) % 384]`, then L2-normalizes. Empty (or all-separator)
/// input yields the all-zero vector: its magnitude is treated as 1.0 so no
/// caller has to special-case division by zero.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBED_DIM];
    let lowered = text.to_lowercase();

    for token in token_splitter().split(&lowered) {
        if token.is_empty() {
            continue;
        }
        let bucket = (fnv1a_32(token) as usize) % EMBED_DIM;
        vector[bucket] += 1.0;
    }

    let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for v in &mut vector {
            *v /= magnitude;
        }
    }
    vector
}

/// Cosine similarity between two embeddings.
///
/// Zero vectors (empty input) yield 0.0 against everything, including
/// themselves.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_bit_for_bit() {
        let a = embed("the quick brown fox");
        let b = embed("the quick brown fox");
        assert_eq!(a, b);
    }

    #[test]
    fn empty_input_is_zero_vector() {
        let v = embed("");
        assert_eq!(v.len(), EMBED_DIM);
        assert!(v.iter().all(|&x| x == 0.0));

        // Pure separators behave the same.
        let v = embed("  ,.;!  ");
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn non_empty_input_is_unit_norm() {
        let v = embed("memory retrieval and planning");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm={norm}");
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(embed("Login Form"), embed("login form"));
    }

    #[test]
    fn shared_tokens_score_higher_than_disjoint() {
        let base = embed("fix the login form");
        let overlapping = embed("login form validation");
        let disjoint = embed("orbital mechanics simulation");
        assert!(cosine(&base, &overlapping) > cosine(&base, &disjoint));
    }

    #[test]
    fn zero_vector_similarity_is_zero() {
        let zero = embed("");
        let other = embed("something");
        assert_eq!(cosine(&zero, &other), 0.0);
        assert_eq!(cosine(&zero, &zero), 0.0);
    }

    #[test]
    fn fnv_hash_is_stable() {
        // Pinned constant: persisted embeddings rely on this never changing.
        assert_eq!(fnv1a_32(""), 0x811c_9dc5);
        assert_eq!(fnv1a_32("a"), 0xe40c_292c);
    }
}
