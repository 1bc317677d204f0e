//! Cosine similarity with decimal precision rounding.

use crate::error::{Result, SearchError};

/// Cosine similarity between two equal-length vectors, rounded to `precision`
/// decimal digits.
///
/// Returns exactly `0.0` when either vector has zero norm. Accumulation is done
/// in `f64`; rounding is round-half-away-from-zero applied to the shortest
/// decimal representation of the raw value, so `0.99228...` at precision 4 is
/// `0.9923`.
pub fn cosine_similarity(a: &[f32], b: &[f32], precision: usize) -> Result<f64> {
    if a.len() != b.len() {
        return Err(SearchError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(round_decimal(dot / (norm_a.sqrt() * norm_b.sqrt()), precision))
}

/// Rejects query vectors with NaN components.
pub fn validate_query(query: &[f32]) -> Result<()> {
    match query.iter().position(|x| x.is_nan()) {
        Some(pos) => Err(SearchError::Validation(format!(
            "query contains NaN at position {pos}"
        ))),
        None => Ok(()),
    }
}

/// Rounds `value` to `precision` decimal digits, half away from zero.
///
/// Operates on the digits of the shortest round-trip decimal string rather
/// than on the binary value, so `0.125` rounds to `0.13` at precision 2.
/// Non-finite values are returned unchanged.
pub fn round_decimal(value: f64, precision: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    // f64 Display never switches to exponent notation
    let repr = value.abs().to_string();
    let (int_part, frac_part) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    if frac_part.len() <= precision {
        return value;
    }

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(frac_part[..precision].bytes())
        .collect();
    if frac_part.as_bytes()[precision] >= b'5' {
        let mut i = digits.len();
        loop {
            if i == 0 {
                digits.insert(0, b'1');
                break;
            }
            i -= 1;
            if digits[i] == b'9' {
                digits[i] = b'0';
            } else {
                digits[i] += 1;
                break;
            }
        }
    }

    let split = digits.len() - precision;
    let mut text = String::with_capacity(digits.len() + 1);
    text.extend(digits[..split].iter().map(|&d| d as char));
    if precision > 0 {
        text.push('.');
        text.extend(digits[split..].iter().map(|&d| d as char));
    }
    text.parse::<f64>()
        .map(|magnitude| magnitude.copysign(value))
        .unwrap_or(value)
}
