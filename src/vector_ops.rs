use crate::config::{Number, EPSILON};
use crate::error::IndexError;
use wide::f32x8;

/// Cosine similarity `dot(a, b) / (|a| * |b|)` using 8-lane SIMD for the
/// bulk of the vector and a scalar loop for the remainder.
///
/// Returns `0.0` when either vector has zero norm and an error when the
/// lengths differ. The result is clamped into `[-1, 1]`.
pub fn cosine_similarity(a: &[Number], b: &[Number]) -> Result<Number, IndexError> {
    if a.len() != b.len() {
        return Err(IndexError::dimension_mismatch(a.len(), b.len()));
    }

    let mut dot_product = f32x8::splat(0.0);
    let mut mag_a = f32x8::splat(0.0);
    let mut mag_b = f32x8::splat(0.0);

    let lanes_a = a.chunks_exact(8);
    let lanes_b = b.chunks_exact(8);
    let rest_a = lanes_a.remainder();
    let rest_b = lanes_b.remainder();

    for (ca, cb) in lanes_a.zip(lanes_b) {
        let va = f32x8::new([ca[0], ca[1], ca[2], ca[3], ca[4], ca[5], ca[6], ca[7]]);
        let vb = f32x8::new([cb[0], cb[1], cb[2], cb[3], cb[4], cb[5], cb[6], cb[7]]);
        dot_product += va * vb;
        mag_a += va * va;
        mag_b += vb * vb;
    }

    let mut scalar_dot_product = dot_product.reduce_add();
    let mut scalar_mag_a = mag_a.reduce_add();
    let mut scalar_mag_b = mag_b.reduce_add();

    for (&x, &y) in rest_a.iter().zip(rest_b) {
        scalar_dot_product += x * y;
        scalar_mag_a += x * x;
        scalar_mag_b += y * y;
    }

    if scalar_mag_a == 0.0 || scalar_mag_b == 0.0 {
        return Ok(0.0);
    }

    let denominator = scalar_mag_a.sqrt() * scalar_mag_b.sqrt();
    Ok((scalar_dot_product / denominator).clamp(-1.0, 1.0))
}

pub fn normalize_vector(vector: &mut [Number]) {
    let magnitude: Number = vector.iter().map(|&x| x * x).sum::<Number>().sqrt();
    if magnitude > EPSILON {
        for x in vector.iter_mut() {
            *x /= magnitude;
        }
    }
}

pub fn l2_norm(vector: &[Number]) -> Number {
    vector.iter().map(|&x| x * x).sum::<Number>().sqrt()
}
