//! Deterministic hashing-trick embedder.
//!
//! No learned weights, no external model: a token's position and sign in the
//! output vector is derived purely from a seeded 64-bit mixing hash, so the
//! same input and dimension always produce the bit-identical vector.

use crate::error::Error;
use crate::vector::Vector;
use base64::Engine;
use std::collections::HashMap;

const STREAMS: u64 = 3;

/// Two-stream 64-bit mixing hash (multiply-xor-shift), seeded by `seed`.
/// Deterministic across runs for the same `(token, seed)` pair.
fn mix_hash(token: &str, seed: u64) -> u64 {
    let mut h: u64 = 0xcbf29ce484222325 ^ seed.wrapping_mul(0x100000001b3);
    for byte in token.as_bytes() {
        h ^= *byte as u64;
        h = h.wrapping_mul(0x100000001b3);
        h ^= h >> 33;
    }
    h = h.wrapping_mul(0xff51afd7ed558ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ceb9fe1a85ec53);
    h ^= h >> 33;
    h
}

/// Lowercase, replace non-word characters with spaces, split on whitespace,
/// drop tokens of length <= 2.
fn tokenize(input: &str) -> Vec<String> {
    let lowered = input.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .map(str::to_owned)
        .collect()
}

/// Term frequencies normalized by total token count.
fn term_frequencies(tokens: &[String]) -> HashMap<&str, f32> {
    let total = tokens.len() as f32;
    let mut counts: HashMap<&str, f32> = HashMap::new();
    for t in tokens {
        *counts.entry(t.as_str()).or_insert(0.0) += 1.0;
    }
    for v in counts.values_mut() {
        *v /= total;
    }
    counts
}

/// Embed `input` into a unit-norm vector of dimension `dim`.
///
/// Determinism contract: two calls with the same `input` and `dim` produce
/// bit-identical vectors.
#[tracing::instrument(skip_all, fields(dim))]
pub fn embed(input: &str, dim: usize) -> Vector {
    let tokens = tokenize(input);
    let mut out = vec![0.0f32; dim];

    if !tokens.is_empty() {
        let tf = term_frequencies(&tokens);
        for (token, freq) in tf {
            for h in 0..STREAMS {
                let bucket_hash = mix_hash(token, h);
                let bucket = (bucket_hash as usize) % dim;
                let sign_hash = mix_hash(token, h + 1000);
                let sign = if sign_hash % 2 == 0 { 1.0 } else { -1.0 };
                out[bucket] += sign * freq / STREAMS as f32;
            }
        }
    }

    l2_normalize(&mut out);
    Vector::new(out)
}

/// In-place L2 normalization; a zero vector is left unchanged.
fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
}

/// Cosine similarity of two embeddings, in `[-1, 1]`. Returns `0` if either
/// vector has zero norm; fails with [`Error::DimensionMismatch`] if the
/// dimensions differ.
pub fn cosine(u: &Vector, v: &Vector) -> Result<f32, Error> {
    crate::distance::cosine_similarity(u.as_slice(), v.as_slice())
}

/// Encode a vector as unpadded base64 over its raw little-endian f32 bytes.
pub fn to_base64(v: &Vector) -> String {
    let mut bytes = Vec::with_capacity(v.dim() * 4);
    for x in v.as_slice() {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    base64::engine::general_purpose::STANDARD_NO_PAD.encode(bytes)
}

/// Decode a base64 string produced by [`to_base64`] back into a [`Vector`].
pub fn from_base64(s: &str) -> Result<Vector, Error> {
    let bytes = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(s)
        .map_err(|_| Error::NotFound(s.to_string()))?;
    if bytes.len() % 4 != 0 {
        return Err(Error::DimensionMismatch {
            expected: bytes.len() / 4 * 4,
            found: bytes.len(),
        });
    }
    let v: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(Vector::new(v))
}
