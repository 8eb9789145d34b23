//! This is the vector math module
//! Provide magnitude, dot product and cosine similarity

use thiserror::Error;

/// Two vectors were compared that do not share a dimension.
#[derive(Debug, Error, PartialEq)]
#[error("dimension mismatch: {left} vs {right}")]
pub struct DimensionMismatch {
    pub left: usize,
    pub right: usize,
}

/// Euclidean length
/// ||vec|| = sqrt(sum(vec[i]^2))
pub fn magnitude(vector: &[f32]) -> f32 {
    vector.iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt()
}

/// Dot Product
/// dot_prod = sum(a[i] * b[i]) for i = 0..a.len()
/// Can only process vectors with same dimensions
pub fn dot_product(left: &[f32], right: &[f32]) -> Result<f32, DimensionMismatch> {
    if left.len() != right.len() {
        return Err(DimensionMismatch { left: left.len(), right: right.len() });
    }

    let dot_prod = left.iter()
        .zip(right.iter())
        .map(|(x, y)| x * y)
        .sum();

    Ok(dot_prod)
}

/// Cosine similarity
/// cos = dot(a, b) / (||a|| * ||b||)
///
/// A zero-magnitude vector on either side gives `NaN`. Callers must not rank
/// such a score.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Result<f32, DimensionMismatch> {
    let dot = dot_product(left, right)?;
    let denom = magnitude(left) * magnitude(right);

    if denom == 0.0 {
        return Ok(f32::NAN);
    }

    Ok(dot / denom)
}
