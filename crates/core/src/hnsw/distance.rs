//! Distance metric for graph construction and search.
//!
//! The graph index orders candidates by Euclidean (L2) distance; lower is
//! closer. No rounding is applied since values only feed comparisons.

use crate::error::{Result, SearchError};

/// Euclidean distance `sqrt(sum((a_i - b_i)^2))`.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(SearchError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(a
        .iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_345() {
        let d = euclidean_distance(&[0.0, 0.0, 0.0], &[3.0, 4.0, 0.0]).unwrap();
        assert!((d - 5.0).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn test_euclidean_self_is_zero() {
        let v = [1.5, -2.0, 7.25];
        assert_eq!(euclidean_distance(&v, &v).unwrap(), 0.0);
    }

    #[test]
    fn test_euclidean_length_mismatch() {
        let err = euclidean_distance(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            SearchError::LengthMismatch { left: 1, right: 2 }
        ));
    }
}
