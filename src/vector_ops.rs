use crate::config::{Number, EPSILON};
use wide::f32x8;

/// Squared Euclidean distance between two equal-length vectors using SIMD lanes.
/// Returns `None` when the lengths differ.
pub fn squared_l2_simd(a: &[Number], b: &[Number]) -> Option<Number> {
    if a.len() != b.len() {
        return None;
    }

    let mut acc = f32x8::splat(0.0);

    let len = a.len();
    let simd_len = len - (len % 8);

    for i in (0..simd_len).step_by(8) {
        let va = f32x8::new([
            a[i],
            a[i + 1],
            a[i + 2],
            a[i + 3],
            a[i + 4],
            a[i + 5],
            a[i + 6],
            a[i + 7],
        ]);
        let vb = f32x8::new([
            b[i],
            b[i + 1],
            b[i + 2],
            b[i + 3],
            b[i + 4],
            b[i + 5],
            b[i + 6],
            b[i + 7],
        ]);
        let diff = va - vb;
        acc += diff * diff;
    }

    let mut sum = acc.reduce_add();

    // Remaining tail elements
    for i in simd_len..len {
        let diff = a[i] - b[i];
        sum += diff * diff;
    }

    Some(sum)
}

pub fn normalize_vector(vector: &mut [Number]) {
    let magnitude: Number = vector.iter().map(|&x| x * x).sum::<Number>().sqrt();
    if magnitude > EPSILON {
        for x in vector.iter_mut() {
            *x /= magnitude;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_l2(a: &[Number], b: &[Number]) -> Number {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
    }

    #[test]
    fn identical_vectors_have_zero_distance() {
        let v: Vec<Number> = (0..19).map(|i| i as Number * 0.5).collect();
        assert_eq!(squared_l2_simd(&v, &v), Some(0.0));
    }

    #[test]
    fn matches_scalar_with_tail() {
        let a: Vec<Number> = (0..13).map(|i| i as Number).collect();
        let b: Vec<Number> = (0..13).map(|i| (i * 2) as Number - 3.0).collect();
        let simd = squared_l2_simd(&a, &b).unwrap();
        assert!((simd - scalar_l2(&a, &b)).abs() < 1e-3);
    }

    #[test]
    fn short_vectors_skip_simd_loop() {
        assert_eq!(squared_l2_simd(&[1.0, 2.0], &[4.0, 6.0]), Some(25.0));
    }

    #[test]
    fn length_mismatch_is_none() {
        assert_eq!(squared_l2_simd(&[1.0, 2.0], &[1.0]), None);
    }

    #[test]
    fn normalize_produces_unit_length() {
        let mut v = vec![3.0, 4.0];
        normalize_vector(&mut v);
        assert!((v[0] - 0.6).abs() < EPSILON);
        assert!((v[1] - 0.8).abs() < EPSILON);
    }

    #[test]
    fn normalize_leaves_zero_vector_alone() {
        let mut v = vec![0.0; 8];
        normalize_vector(&mut v);
        assert!(v.iter().all(|&x| x == 0.0));
    }
}
