//! SIMD distance kernels using the `wide` crate.

use wide::f32x8;

const LANES: usize = 8;

fn lanes(chunk: &[f32]) -> f32x8 {
    let mut array = [0.0f32; LANES];
    array.copy_from_slice(chunk);
    f32x8::new(array)
}

/// SIMD-accelerated dot product.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    if a.len() < LANES {
        return a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    }

    let mut acc = f32x8::splat(0.0);
    let chunks_a = a.chunks_exact(LANES);
    let chunks_b = b.chunks_exact(LANES);
    let remainder_a = chunks_a.remainder();
    let remainder_b = chunks_b.remainder();

    for (chunk_a, chunk_b) in chunks_a.zip(chunks_b) {
        acc = acc + lanes(chunk_a) * lanes(chunk_b);
    }

    acc.to_array().iter().sum::<f32>()
        + remainder_a
            .iter()
            .zip(remainder_b.iter())
            .map(|(x, y)| x * y)
            .sum::<f32>()
}

/// SIMD-accelerated squared euclidean distance.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    if a.len() < LANES {
        return a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
    }

    let mut acc = f32x8::splat(0.0);
    let chunks_a = a.chunks_exact(LANES);
    let chunks_b = b.chunks_exact(LANES);
    let remainder_a = chunks_a.remainder();
    let remainder_b = chunks_b.remainder();

    for (chunk_a, chunk_b) in chunks_a.zip(chunks_b) {
        let diff = lanes(chunk_a) - lanes(chunk_b);
        acc = acc + diff * diff;
    }

    acc.to_array().iter().sum::<f32>()
        + remainder_a
            .iter()
            .zip(remainder_b.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
}

/// L2 norm of a vector.
pub fn norm(a: &[f32]) -> f32 {
    dot_product(a, a).sqrt()
}
