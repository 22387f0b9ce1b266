//! Pallas curve points and group operations.
//!
//! The curve is `y^2 = x^3 + 5` over the base field. Points move between two
//! representations:
//!
//! - [`AffinePoint`]: canonical `(x, y)` coordinates as `U256` residues,
//!   with `(0, 0)` as the identity sentinel. This is the boundary type.
//! - [`ProjectivePoint`]: Jacobian `(X, Y, Z)` with Montgomery-form
//!   coordinates, `Z = 0` meaning identity, affine `x = X/Z^2`,
//!   `y = Y/Z^3`. All group arithmetic happens here, using the a = 0
//!   doubling (dbl-2009-l) and the add-2007-bl addition with an explicit
//!   same-point check.
//!
//! These are exactly the formulas the GPU kernels run, so CPU and GPU
//! results can be compared limb for limb.

use crate::bigint::U256;
use crate::fp::Fp;

/// Order of the Pallas group (the scalar-field modulus).
pub const ORDER: U256 = U256::new([
    0x8c46eb2100000001,
    0x224698fc0994a8dd,
    0x0000000000000000,
    0x4000000000000000,
]);

/// An affine Pallas point; `(0, 0)` is the identity sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AffinePoint {
    pub x: U256,
    pub y: U256,
}

impl AffinePoint {
    pub const IDENTITY: Self = Self {
        x: U256::ZERO,
        y: U256::ZERO,
    };

    pub const fn new(x: U256, y: U256) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.x.is_zero() && self.y.is_zero()
    }

    /// Checks the curve equation `y^2 = x^3 + 5`. The identity passes.
    pub fn is_on_curve(&self) -> bool {
        if self.is_identity() {
            return true;
        }
        let x = Fp::from_u256(&self.x);
        let y = Fp::from_u256(&self.y);
        let lhs = y.square();
        let rhs = x.square().mul(&x).add(&Fp::from_u64(5));
        lhs == rhs
    }
}

/// The conventional Pallas generator `(-1, 2)`.
pub fn generator() -> AffinePoint {
    let p_minus_1 = crate::fp::MODULUS.sub_with_borrow(&U256::ONE).0;
    AffinePoint::new(p_minus_1, U256::from_u64(2))
}

/// A Jacobian projective point with Montgomery-form coordinates.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProjectivePoint {
    pub x: Fp,
    pub y: Fp,
    pub z: Fp,
}

impl ProjectivePoint {
    pub const IDENTITY: Self = Self {
        x: Fp::ZERO,
        y: Fp::ZERO,
        z: Fp::ZERO,
    };

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.z.is_zero()
    }

    pub fn from_affine(p: &AffinePoint) -> Self {
        if p.is_identity() {
            return Self::IDENTITY;
        }
        Self {
            x: Fp::from_u256(&p.x),
            y: Fp::from_u256(&p.y),
            z: Fp::ONE,
        }
    }

    pub fn to_affine(&self) -> AffinePoint {
        if self.is_identity() {
            return AffinePoint::IDENTITY;
        }
        let zinv = self.z.invert();
        let zinv2 = zinv.square();
        let zinv3 = zinv2.mul(&zinv);
        AffinePoint::new(self.x.mul(&zinv2).to_u256(), self.y.mul(&zinv3).to_u256())
    }

    /// Jacobian doubling for `a = 0` (dbl-2009-l).
    pub fn double(&self) -> Self {
        if self.is_identity() {
            return *self;
        }
        let xx = self.x.square();
        let yy = self.y.square();
        let yyyy = yy.square();
        let zz = self.z.square();

        // S = 2*((X + YY)^2 - XX - YYYY)
        let s = self.x.add(&yy).square().sub(&xx).sub(&yyyy).double();
        // M = 3*XX
        let m = xx.double().add(&xx);
        // X3 = M^2 - 2*S
        let x3 = m.square().sub(&s.double());
        // Y3 = M*(S - X3) - 8*YYYY
        let y3 = m.mul(&s.sub(&x3)).sub(&yyyy.double().double().double());
        // Z3 = (Y + Z)^2 - YY - ZZ
        let z3 = self.y.add(&self.z).square().sub(&yy).sub(&zz);

        Self { x: x3, y: y3, z: z3 }
    }

    /// Jacobian addition (add-2007-bl). Equal points fall through to
    /// doubling; inverse points produce the identity.
    pub fn add(&self, other: &Self) -> Self {
        if self.is_identity() {
            return *other;
        }
        if other.is_identity() {
            return *self;
        }

        let z1z1 = self.z.square();
        let z2z2 = other.z.square();
        let u1 = self.x.mul(&z2z2);
        let u2 = other.x.mul(&z1z1);
        let s1 = self.y.mul(&other.z).mul(&z2z2);
        let s2 = other.y.mul(&self.z).mul(&z1z1);

        if u1 == u2 {
            if s1 == s2 {
                return self.double();
            }
            return Self::IDENTITY;
        }

        let h = u2.sub(&u1);
        let i = h.double().square();
        let j = h.mul(&i);
        let r = s2.sub(&s1).double();
        let v = u1.mul(&i);

        let x3 = r.square().sub(&j).sub(&v.double());
        let y3 = r.mul(&v.sub(&x3)).sub(&s1.mul(&j).double());
        let z3 = self.z.add(&other.z).square().sub(&z1z1).sub(&z2z2).mul(&h);

        Self { x: x3, y: y3, z: z3 }
    }

    /// Double-and-add scalar multiplication, scanning `k` LSB to MSB over
    /// all 256 bits.
    pub fn mul(&self, k: &U256) -> Self {
        let mut acc = Self::IDENTITY;
        let mut base = *self;
        for bit in 0..256 {
            if k.get_bit(bit) {
                acc = acc.add(&base);
            }
            base = base.double();
        }
        acc
    }
}

/// `k * P`, returning affine coordinates.
pub fn scalar_mul(k: &U256, p: &AffinePoint) -> AffinePoint {
    ProjectivePoint::from_affine(p).mul(k).to_affine()
}
