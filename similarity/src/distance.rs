//! Vector distance functions, SIMD-dispatched via `pulp`.
//!
//! Comparing two differently-sized vectors fails the operation with a
//! [`crate::error::Error::DimensionMismatch`] rather than aborting the
//! process, so length checks return a `Result` instead of `assert_eq!`-panicking.

use crate::error::Error;
use pulp::{Arch, Simd, WithSimd};

fn check_len(first: &[f32], second: &[f32]) -> Result<(), Error> {
    if first.len() != second.len() {
        return Err(Error::DimensionMismatch {
            expected: first.len(),
            found: second.len(),
        });
    }
    Ok(())
}

struct Magnitude<'a> {
    first: &'a [f32],
    second: &'a [f32],
}

impl WithSimd for Magnitude<'_> {
    type Output = f32;

    #[inline(always)]
    fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
        let (first_head, first_tail) = S::as_simd_f32s(self.first);
        let (second_head, second_tail) = S::as_simd_f32s(self.second);

        let mut mag_first = simd.splat_f32s(0.0);
        let mut mag_second = simd.splat_f32s(0.0);

        for (&chunk_first, &chunk_second) in first_head.iter().zip(second_head) {
            mag_first = simd.mul_add_f32s(chunk_first, chunk_first, mag_first);
            mag_second = simd.mul_add_f32s(chunk_second, chunk_second, mag_second);
        }

        let mag_first = simd.reduce_sum_f32s(mag_first);
        let mag_second = simd.reduce_sum_f32s(mag_second);

        let mut scalar_mag_first = 0.0;
        let mut scalar_mag_second = 0.0;
        for (&x, &y) in first_tail.iter().zip(second_tail) {
            scalar_mag_first += x * x;
            scalar_mag_second += y * y;
        }
        let mag_first = mag_first + scalar_mag_first;
        let mag_second = mag_second + scalar_mag_second;

        mag_first.sqrt() * mag_second.sqrt()
    }
}

struct DotProduct<'a> {
    first: &'a [f32],
    second: &'a [f32],
}

impl WithSimd for DotProduct<'_> {
    type Output = f32;

    #[inline(always)]
    fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
        let (first_head, first_tail) = S::as_simd_f32s(self.first);
        let (second_head, second_tail) = S::as_simd_f32s(self.second);

        let mut sum_of_points = simd.splat_f32s(0.0);
        for (&chunk_first, &chunk_second) in first_head.iter().zip(second_head) {
            sum_of_points = simd.mul_add_f32s(chunk_first, chunk_second, sum_of_points);
        }

        let mut dot_product = simd.reduce_sum_f32s(sum_of_points);
        dot_product += first_tail
            .iter()
            .zip(second_tail)
            .map(|(&x, &y)| x * y)
            .sum::<f32>();
        dot_product
    }
}

/// Dot product of two equal-length vectors.
#[tracing::instrument(skip_all)]
pub fn dot_product(first: &[f32], second: &[f32]) -> Result<f32, Error> {
    check_len(first, second)?;
    let arch = Arch::new();
    Ok(arch.dispatch(DotProduct { first, second }))
}

/// Cosine similarity in `[-1, 1]`; `1` means identical direction.
#[tracing::instrument(skip_all)]
pub fn cosine_similarity(first: &[f32], second: &[f32]) -> Result<f32, Error> {
    check_len(first, second)?;
    let dot = dot_product(first, second)?;
    let arch = Arch::new();
    let magnitude = arch.dispatch(Magnitude { first, second });
    if magnitude == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / magnitude)
}

struct EuclideanDistance<'a> {
    first: &'a [f32],
    second: &'a [f32],
}

impl WithSimd for EuclideanDistance<'_> {
    type Output = f32;

    #[inline(always)]
    fn with_simd<S: Simd>(self, simd: S) -> Self::Output {
        let (first_head, first_tail) = S::as_simd_f32s(self.first);
        let (second_head, second_tail) = S::as_simd_f32s(self.second);

        let mut sum_of_squares = simd.splat_f32s(0.0);
        for (&cord_first, &cord_second) in first_head.iter().zip(second_head) {
            let diff = simd.sub_f32s(cord_first, cord_second);
            sum_of_squares = simd.mul_add_f32s(diff, diff, sum_of_squares);
        }

        let mut total = simd.reduce_sum_f32s(sum_of_squares);
        total += first_tail
            .iter()
            .zip(second_tail)
            .map(|(&x, &y)| {
                let diff = x - y;
                diff * diff
            })
            .sum::<f32>();

        total.sqrt()
    }
}

/// Euclidean distance between two equal-length vectors.
#[tracing::instrument(skip_all)]
pub fn euclidean_distance(first: &[f32], second: &[f32]) -> Result<f32, Error> {
    check_len(first, second)?;
    let arch = Arch::new();
    Ok(arch.dispatch(EuclideanDistance { first, second }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(vec![1.0, 0.0], vec![1.0, 0.0], 1.0)]
    #[case(vec![1.0, 0.0], vec![0.0, 1.0], 0.0)]
    #[case(vec![1.0, 0.0], vec![-1.0, 0.0], -1.0)]
    fn cosine_matches_known_angles(#[case] a: Vec<f32>, #[case] b: Vec<f32>, #[case] expected: f32) {
        let got = cosine_similarity(&a, &b).unwrap();
        assert!((got - expected).abs() < 1e-5, "{got} vs {expected}");
    }

    #[test]
    fn mismatched_lengths_error_instead_of_panic() {
        let err = cosine_similarity(&[1.0, 0.0], &[1.0]).unwrap_err();
        assert_eq!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn euclidean_zero_for_identical_vectors() {
        let v = vec![0.5, 0.25, -0.75];
        assert_eq!(euclidean_distance(&v, &v).unwrap(), 0.0);
    }
}
