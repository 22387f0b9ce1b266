//! Reference multi-scalar multiplication.
//!
//! Two implementations with very different cost profiles:
//!
//! - [`msm_naive`]: `sum_i k_i * P_i` by independent scalar
//!   multiplications. O(N * 256) group doublings; the gold standard the
//!   GPU pipeline is validated against.
//! - [`msm_windowed`]: Pippenger's bucket method with the same window
//!   decomposition the GPU pipeline uses (`ceil(256/w)` windows of `w`
//!   bits, bucket values `1..2^w`, value 0 contributing nothing).

use crate::bigint::U256;
use crate::curve::{AffinePoint, ProjectivePoint};

/// Extracts window `window` (bits `[window*w, window*w + w)`) of `k`.
/// Windows beyond bit 255 read as zero.
pub fn window_value(k: &U256, window: usize, window_bits: u32) -> u32 {
    let bit = window * window_bits as usize;
    if bit >= 256 {
        return 0;
    }
    let limb = bit / 64;
    let offset = bit % 64;
    let mut v = k.limbs()[limb] >> offset;
    if offset + window_bits as usize > 64 && limb + 1 < 4 {
        v |= k.limbs()[limb + 1] << (64 - offset);
    }
    (v & ((1u64 << window_bits) - 1)) as u32
}

/// Straightforward `sum_i k_i * P_i`.
///
/// # Panics
/// Panics if the slices differ in length.
pub fn msm_naive(scalars: &[U256], points: &[AffinePoint]) -> AffinePoint {
    assert_eq!(scalars.len(), points.len(), "scalar/point length mismatch");
    let mut acc = ProjectivePoint::IDENTITY;
    for (k, p) in scalars.iter().zip(points) {
        acc = acc.add(&ProjectivePoint::from_affine(p).mul(k));
    }
    acc.to_affine()
}

/// Pippenger's algorithm with `window_bits`-wide windows.
///
/// Scalars are treated as plain 256-bit integers, exactly as the GPU
/// pipeline treats them.
///
/// # Panics
/// Panics on length mismatch or `window_bits` outside `[1, 22]`.
pub fn msm_windowed(scalars: &[U256], points: &[AffinePoint], window_bits: u32) -> AffinePoint {
    assert_eq!(scalars.len(), points.len(), "scalar/point length mismatch");
    assert!(
        (1..=22).contains(&window_bits),
        "window_bits must be in [1, 22]"
    );

    let num_windows = (256 + window_bits as usize - 1) / window_bits as usize;
    let num_buckets = 1usize << window_bits;
    let projective: Vec<ProjectivePoint> =
        points.iter().map(ProjectivePoint::from_affine).collect();

    let mut acc = ProjectivePoint::IDENTITY;
    for window in (0..num_windows).rev() {
        for _ in 0..window_bits {
            acc = acc.double();
        }

        let mut buckets = vec![ProjectivePoint::IDENTITY; num_buckets];
        for (k, p) in scalars.iter().zip(&projective) {
            let v = window_value(k, window, window_bits) as usize;
            if v != 0 {
                buckets[v] = buckets[v].add(p);
            }
        }
        // Bucket 0 never accumulates anything.
        debug_assert!(buckets[0].is_identity());

        // sum_v v * bucket[v] via the running-sum trick.
        let mut running = ProjectivePoint::IDENTITY;
        let mut window_sum = ProjectivePoint::IDENTITY;
        for bucket in buckets.iter().skip(1).rev() {
            running = running.add(bucket);
            window_sum = window_sum.add(&running);
        }

        acc = acc.add(&window_sum);
    }
    acc.to_affine()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{generator, scalar_mul, ORDER};
    use rand::{thread_rng, Rng};

    fn random_u256(rng: &mut impl Rng) -> U256 {
        U256::new([rng.gen(), rng.gen(), rng.gen(), rng.gen()])
    }

    /// `n` distinct on-curve points: G, 2G, 3G, ...
    fn generator_multiples(n: usize) -> Vec<AffinePoint> {
        let g = ProjectivePoint::from_affine(&generator());
        let mut acc = ProjectivePoint::IDENTITY;
        (0..n)
            .map(|_| {
                acc = acc.add(&g);
                acc.to_affine()
            })
            .collect()
    }

    #[test]
    fn window_value_extraction() {
        let k = U256::from_hex("ff00000000000000000000000000000000000000000000000000000000000ab3");
        assert_eq!(window_value(&k, 0, 4), 0x3);
        assert_eq!(window_value(&k, 1, 4), 0xb);
        assert_eq!(window_value(&k, 2, 4), 0xa);
        assert_eq!(window_value(&k, 0, 8), 0xb3);
        assert_eq!(window_value(&k, 31, 8), 0xff);
        // A 13-bit window straddling the limb boundary at bit 52.
        let k2 = U256::new([0xfff0_0000_0000_0000, 0x1a5, 0, 0]);
        assert_eq!(window_value(&k2, 4, 13), (0x1a5 << 12 | 0xfff) & 0x1fff);
        // Windows past bit 255 are zero.
        assert_eq!(window_value(&k, 300, 8), 0);
    }

    #[test]
    fn naive_matches_single_scalar_mul() {
        let p = generator();
        let k = U256::from_u64(123456);
        assert_eq!(msm_naive(&[k], &[p]), scalar_mul(&k, &p));
    }

    #[test]
    fn windowed_matches_naive() {
        let mut rng = thread_rng();
        let points = generator_multiples(33);
        let scalars: Vec<U256> = (0..33).map(|_| random_u256(&mut rng)).collect();
        let expected = msm_naive(&scalars, &points);
        for w in [1, 2, 4, 8, 13, 16] {
            assert_eq!(
                msm_windowed(&scalars, &points, w),
                expected,
                "window_bits={w}"
            );
        }
    }

    #[test]
    fn windowed_handles_identity_inputs() {
        let points = vec![AffinePoint::IDENTITY, generator()];
        let scalars = vec![U256::from_u64(999), U256::from_u64(3)];
        assert_eq!(
            msm_windowed(&scalars, &points, 8),
            scalar_mul(&U256::from_u64(3), &generator())
        );
    }

    #[test]
    fn all_zero_scalars_give_identity() {
        let points = generator_multiples(5);
        let scalars = vec![U256::ZERO; 5];
        assert_eq!(msm_windowed(&scalars, &points, 4), AffinePoint::IDENTITY);
        assert_eq!(msm_naive(&scalars, &points), AffinePoint::IDENTITY);
    }

    #[test]
    fn opposite_scalars_cancel() {
        let g = generator();
        let k = U256::from_u64(77777);
        let neg_k = ORDER.sub_with_borrow(&k).0;
        assert_eq!(
            msm_windowed(&[k, neg_k], &[g, g], 8),
            AffinePoint::IDENTITY
        );
    }

    #[test]
    fn permutation_invariance() {
        let mut rng = thread_rng();
        let points = generator_multiples(16);
        let scalars: Vec<U256> = (0..16).map(|_| random_u256(&mut rng)).collect();
        let forward = msm_windowed(&scalars, &points, 8);
        let rev_scalars: Vec<U256> = scalars.iter().rev().copied().collect();
        let rev_points: Vec<AffinePoint> = points.iter().rev().copied().collect();
        assert_eq!(msm_windowed(&rev_scalars, &rev_points, 8), forward);
    }
}
