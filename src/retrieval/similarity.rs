//! Cosine similarity over raw embedding vectors

use super::RetrievalError;

/// Cosine similarity of two vectors, clamped to [0, 1]
///
/// A zero-norm vector scores 0.0. Vectors of different length are a
/// configuration problem (query and corpus embedded with different models) and
/// are reported as `RetrievalError::Configuration`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, RetrievalError> {
    if a.len() != b.len() {
        return Err(RetrievalError::Configuration(format!(
            "vector dimension mismatch: query has {}, stored entry has {}",
            a.len(),
            b.len()
        )));
    }

    // accumulate in f64
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return Ok(0.0);
    }

    let score = dot / denom;
    if score.is_nan() {
        return Ok(0.0);
    }
    Ok(score.clamp(0.0, 1.0) as f32)
}
