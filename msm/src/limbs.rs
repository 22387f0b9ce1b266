//! Wire-format limb marshalling.
//!
//! The CPU and GPU exchange 256-bit values as eight little-endian u32
//! limbs (32 bytes, no padding), so an array of N elements is 32*N
//! contiguous bytes.

use bytemuck::{Pod, Zeroable};
use pallas::{AffinePoint, U256};
use rayon::prelude::*;

/// Number of 32-bit limbs per element.
pub const NUM_LIMBS: usize = 8;

/// Bytes per element on the wire.
pub const LIMBS_BYTES: usize = 32;

/// A 256-bit value as it crosses the CPU/GPU boundary.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct Limbs256 {
    pub limbs: [u32; NUM_LIMBS],
}

impl From<&U256> for Limbs256 {
    fn from(v: &U256) -> Self {
        Self {
            limbs: v.to_u32_limbs(),
        }
    }
}

impl From<&Limbs256> for U256 {
    fn from(v: &Limbs256) -> Self {
        U256::from_u32_limbs(v.limbs)
    }
}

/// Inputs above this length are encoded in parallel.
const PAR_THRESHOLD: usize = 1 << 16;

/// Encodes a slice of scalars for upload.
pub fn encode_scalars(scalars: &[U256]) -> Vec<Limbs256> {
    if scalars.len() >= PAR_THRESHOLD {
        scalars.par_iter().map(Limbs256::from).collect()
    } else {
        scalars.iter().map(Limbs256::from).collect()
    }
}

/// Encodes affine points into separate x and y limb arrays, matching the
/// pass-A input layout.
pub fn encode_points(points: &[AffinePoint]) -> (Vec<Limbs256>, Vec<Limbs256>) {
    if points.len() >= PAR_THRESHOLD {
        points
            .par_iter()
            .map(|p| (Limbs256::from(&p.x), Limbs256::from(&p.y)))
            .unzip()
    } else {
        points
            .iter()
            .map(|p| (Limbs256::from(&p.x), Limbs256::from(&p.y)))
            .unzip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limbs_are_32_bytes() {
        assert_eq!(std::mem::size_of::<Limbs256>(), LIMBS_BYTES);
    }

    #[test]
    fn u256_round_trip() {
        let v = U256::from_hex("0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20");
        let wire = Limbs256::from(&v);
        assert_eq!(U256::from(&wire), v);
    }

    #[test]
    fn little_endian_limb_order() {
        let wire = Limbs256::from(&U256::from_u64(0x1_0000_0002));
        assert_eq!(wire.limbs[0], 2);
        assert_eq!(wire.limbs[1], 1);
        let bytes: &[u8] = bytemuck::bytes_of(&wire);
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[4], 1);
    }

    #[test]
    fn encode_points_splits_coordinates() {
        let points = vec![
            AffinePoint::new(U256::from_u64(5), U256::from_u64(7)),
            AffinePoint::IDENTITY,
        ];
        let (xs, ys) = encode_points(&points);
        assert_eq!(xs.len(), 2);
        assert_eq!(U256::from(&xs[0]), U256::from_u64(5));
        assert_eq!(U256::from(&ys[0]), U256::from_u64(7));
        assert_eq!(U256::from(&xs[1]), U256::ZERO);
    }
}
