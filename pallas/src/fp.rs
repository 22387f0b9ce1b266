//! The Pallas base field `F_p`.
//!
//! `p = 0x40000000000000000000000000000000224698fc094cf91b992d30ed00000001`
//!
//! Elements are kept in Montgomery form (`a·R mod p`, `R = 2^256`) for the
//! whole lifetime of a value; conversion happens only at the `U256`
//! boundary. Multiplication is CIOS over 4 64-bit limbs with the modulus and
//! `n0 = -p^{-1} mod 2^64` baked in, so no per-context state is carried
//! around. Inversion is Fermat exponentiation by `p - 2`, which maps zero to
//! zero.

use crate::bigint::U256;
use std::cmp::Ordering;
use std::fmt;

/// The Pallas base-field modulus as limbs.
const MODULUS_LIMBS: [u64; 4] = [
    0x992d30ed00000001,
    0x224698fc094cf91b,
    0x0000000000000000,
    0x4000000000000000,
];

/// `-p^{-1} mod 2^64`.
const N0: u64 = 0x992d30ecffffffff;

/// `R mod p`, the Montgomery form of 1.
const R: [u64; 4] = [
    0x34786d38fffffffd,
    0x992c350be41914ad,
    0xffffffffffffffff,
    0x3fffffffffffffff,
];

/// `R^2 mod p`; multiplying by this converts into Montgomery form.
const R2: [u64; 4] = [
    0x8c78ecb30000000f,
    0xd7d30dbd8b0de0e7,
    0x7797a99bc3c95d18,
    0x096d41af7b9cb714,
];

/// `p - 2`, the Fermat inversion exponent.
const P_MINUS_2: [u64; 4] = [
    0x992d30ecffffffff,
    0x224698fc094cf91b,
    0x0000000000000000,
    0x4000000000000000,
];

/// The modulus as a `U256`.
pub const MODULUS: U256 = U256::new(MODULUS_LIMBS);

/// An element of the Pallas base field, stored in Montgomery form.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Fp([u64; 4]);

impl Fp {
    pub const ZERO: Self = Self([0; 4]);
    /// One, i.e. `R mod p`.
    pub const ONE: Self = Self(R);

    /// Reduces an arbitrary 256-bit value mod `p` and converts to Montgomery
    /// form.
    pub fn from_u256(value: &U256) -> Self {
        let mut v = *value;
        // 2^256 < 4p, so at most a few subtractions are needed.
        while v.compare(&MODULUS) != Ordering::Less {
            v = v.sub_with_borrow(&MODULUS).0;
        }
        Self(mont_mul(v.limbs(), &R2))
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_u256(&U256::from_u64(value))
    }

    pub fn from_hex(hex: &str) -> Self {
        Self::from_u256(&U256::from_hex(hex))
    }

    /// Converts back to the canonical residue in `[0, p)`.
    pub fn to_u256(&self) -> U256 {
        U256::new(mont_mul(&self.0, &[1, 0, 0, 0]))
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 4]
    }

    pub fn add(&self, rhs: &Self) -> Self {
        let mut out = [0u64; 4];
        let mut carry = 0u64;
        for i in 0..4 {
            let uv = self.0[i] as u128 + rhs.0[i] as u128 + carry as u128;
            out[i] = uv as u64;
            carry = (uv >> 64) as u64;
        }
        // Inputs are < p < 2^255, so the sum never carries out of 256 bits,
        // but it may still need one reduction.
        reduce_once(&mut out);
        Self(out)
    }

    pub fn sub(&self, rhs: &Self) -> Self {
        if cmp_limbs(&self.0, &rhs.0) != Ordering::Less {
            Self(sub_limbs(&self.0, &rhs.0))
        } else {
            let diff = sub_limbs(&rhs.0, &self.0);
            Self(sub_limbs(&MODULUS_LIMBS, &diff))
        }
    }

    pub fn neg(&self) -> Self {
        if self.is_zero() {
            *self
        } else {
            Self(sub_limbs(&MODULUS_LIMBS, &self.0))
        }
    }

    #[inline]
    pub fn mul(&self, rhs: &Self) -> Self {
        Self(mont_mul(&self.0, &rhs.0))
    }

    #[inline]
    pub fn square(&self) -> Self {
        self.mul(self)
    }

    pub fn double(&self) -> Self {
        self.add(self)
    }

    /// Square-and-multiply exponentiation, scanning the exponent LSB first.
    pub fn pow(&self, exp: &[u64; 4]) -> Self {
        let mut result = Self::ONE;
        let mut base = *self;
        for limb in exp {
            for bit in 0..64 {
                if (limb >> bit) & 1 == 1 {
                    result = result.mul(&base);
                }
                base = base.square();
            }
        }
        result
    }

    /// Multiplicative inverse by Fermat's little theorem (`a^(p-2)`).
    /// Zero has no inverse; this returns zero for it, so callers on a
    /// division path must reject zero themselves.
    pub fn invert(&self) -> Self {
        self.pow(&P_MINUS_2)
    }
}

impl fmt::Debug for Fp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fp({})", self.to_u256())
    }
}

#[inline]
fn cmp_limbs(a: &[u64; 4], b: &[u64; 4]) -> Ordering {
    for i in (0..4).rev() {
        match a[i].cmp(&b[i]) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    Ordering::Equal
}

/// `a - b`, assuming `a >= b`.
#[inline]
fn sub_limbs(a: &[u64; 4], b: &[u64; 4]) -> [u64; 4] {
    let mut out = [0u64; 4];
    let mut borrow = 0u64;
    for i in 0..4 {
        let (d1, b1) = a[i].overflowing_sub(b[i]);
        let (d2, b2) = d1.overflowing_sub(borrow);
        out[i] = d2;
        borrow = (b1 | b2) as u64;
    }
    debug_assert_eq!(borrow, 0);
    out
}

#[inline]
fn reduce_once(limbs: &mut [u64; 4]) {
    if cmp_limbs(limbs, &MODULUS_LIMBS) != Ordering::Less {
        *limbs = sub_limbs(limbs, &MODULUS_LIMBS);
    }
}

/// Montgomery multiplication: returns `a·b·R^{-1} mod p`.
///
/// CIOS with a one-limb shift per round. Because `p < 2^255`, the running
/// accumulator stays below `2p` at round boundaries and five limbs are
/// enough for the intermediate state.
fn mont_mul(a: &[u64; 4], b: &[u64; 4]) -> [u64; 4] {
    let mut t = [0u64; 5];

    for i in 0..4 {
        // t += a * b[i]
        let bi = b[i] as u128;
        let mut carry = 0u64;
        for j in 0..4 {
            let uv = t[j] as u128 + (a[j] as u128) * bi + carry as u128;
            t[j] = uv as u64;
            carry = (uv >> 64) as u64;
        }
        t[4] = t[4].wrapping_add(carry);

        // t += m * p with m chosen so the low limb cancels, then shift down.
        let m = t[0].wrapping_mul(N0) as u128;
        let uv = t[0] as u128 + m * MODULUS_LIMBS[0] as u128;
        let mut carry = (uv >> 64) as u64;
        for j in 1..4 {
            let uv = t[j] as u128 + m * (MODULUS_LIMBS[j] as u128) + carry as u128;
            t[j - 1] = uv as u64;
            carry = (uv >> 64) as u64;
        }
        t[3] = t[4].wrapping_add(carry);
        t[4] = 0;
    }

    let mut out = [t[0], t[1], t[2], t[3]];
    reduce_once(&mut out);
    out
}
