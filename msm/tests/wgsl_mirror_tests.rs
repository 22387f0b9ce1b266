//! CPU mirror of the shader's 32-bit limb arithmetic.
//!
//! The WGSL kernels synthesize 64-bit arithmetic from 32-bit operations;
//! these tests re-run the same algorithms (16-bit-half multiply with
//! explicit wrap checks, CIOS Montgomery reduction with carry ripple) in
//! Rust and pin them against the u64-limb field implementation, so the
//! shader's arithmetic is exercised without needing a GPU.

use pallas::{Fp, U256};

const SHADER: &str = include_str!("../src/gpu/shaders/msm.wgsl");

const N: usize = 8;

// BN-style 32x32 -> 64 via 16-bit halves: (a*b + acc + carry) as (lo, hi).
fn mul_add_carry(a: u32, b: u32, acc: u32, carry: u32) -> (u32, u32) {
    let a_lo = a & 0xffff;
    let a_hi = a >> 16;
    let b_lo = b & 0xffff;
    let b_hi = b >> 16;

    let ll = a_lo.wrapping_mul(b_lo);
    let lh = a_lo.wrapping_mul(b_hi);
    let hl = a_hi.wrapping_mul(b_lo);
    let hh = a_hi.wrapping_mul(b_hi);

    let mut lo = ll;
    let mut hi = hh;

    let lh_shift = lh << 16;
    lo = lo.wrapping_add(lh_shift);
    if lo < lh_shift {
        hi = hi.wrapping_add(1);
    }
    hi = hi.wrapping_add(lh >> 16);

    let hl_shift = hl << 16;
    lo = lo.wrapping_add(hl_shift);
    if lo < hl_shift {
        hi = hi.wrapping_add(1);
    }
    hi = hi.wrapping_add(hl >> 16);

    lo = lo.wrapping_add(acc);
    if lo < acc {
        hi = hi.wrapping_add(1);
    }
    lo = lo.wrapping_add(carry);
    if lo < carry {
        hi = hi.wrapping_add(1);
    }

    (lo, hi)
}

const P_LIMBS: [u32; N] = [
    0x00000001, 0x992d30ed, 0x094cf91b, 0x224698fc, 0x00000000, 0x00000000, 0x00000000, 0x40000000,
];
const R_MOD_P: [u32; N] = [
    0xfffffffd, 0x34786d38, 0xe41914ad, 0x992c350b, 0xffffffff, 0xffffffff, 0xffffffff, 0x3fffffff,
];
const R2_MOD_P: [u32; N] = [
    0x0000000f, 0x8c78ecb3, 0x8b0de0e7, 0xd7d30dbd, 0xc3c95d18, 0x7797a99b, 0x7b9cb714, 0x096d41af,
];
const P_MINUS_2: [u32; N] = [
    0xffffffff, 0x992d30ec, 0x094cf91b, 0x224698fc, 0x00000000, 0x00000000, 0x00000000, 0x40000000,
];
const P_INV: u32 = 0xffffffff;

fn gte(a: &[u32; N], b: &[u32; N]) -> bool {
    for i in (0..N).rev() {
        if a[i] > b[i] {
            return true;
        }
        if a[i] < b[i] {
            return false;
        }
    }
    true
}

fn sub_no_borrow(a: &[u32; N], b: &[u32; N]) -> [u32; N] {
    let mut out = [0u32; N];
    let mut borrow = 0u32;
    for i in 0..N {
        let (ai, bi) = (a[i], b[i]);
        if ai > bi || (ai == bi && borrow == 0) {
            out[i] = ai - bi - borrow;
            borrow = 0;
        } else {
            out[i] = (0xffffffffu32 - bi - borrow + 1).wrapping_add(ai);
            borrow = 1;
        }
    }
    out
}

// The shader's schoolbook multiply + Montgomery reduction, limb for limb.
fn mont_mul32(a: &[u32; N], b: &[u32; N]) -> [u32; N] {
    let mut t = [0u32; 2 * N];

    for i in 0..N {
        let mut carry = 0u32;
        for j in 0..N {
            let (lo, hi) = mul_add_carry(a[i], b[j], t[i + j], carry);
            t[i + j] = lo;
            carry = hi;
        }
        t[i + N] = carry;
    }

    for i in 0..N {
        let m = t[i].wrapping_mul(P_INV);
        let mut carry = 0u32;
        for j in 0..N {
            let (lo, hi) = mul_add_carry(m, P_LIMBS[j], t[i + j], carry);
            t[i + j] = lo;
            carry = hi;
        }
        let mut k = i + N;
        while carry != 0 && k < 2 * N {
            let s = t[k].wrapping_add(carry);
            carry = u32::from(s < carry);
            t[k] = s;
            k += 1;
        }
    }

    let mut out = [0u32; N];
    out.copy_from_slice(&t[N..]);
    if gte(&out, &P_LIMBS) {
        out = sub_no_borrow(&out, &P_LIMBS);
    }
    out
}

fn to_mont32(a: &[u32; N]) -> [u32; N] {
    mont_mul32(a, &R2_MOD_P)
}

fn from_mont32(a: &[u32; N]) -> [u32; N] {
    let mut one = [0u32; N];
    one[0] = 1;
    mont_mul32(a, &one)
}

// The shader's Fermat inversion: a^(p-2), scanning P_MINUS_2 LSB first.
fn mod_inv32(a: &[u32; N]) -> [u32; N] {
    let mut result = R_MOD_P;
    let mut base = *a;
    for limb in P_MINUS_2 {
        for bit in 0..32 {
            if (limb >> bit) & 1 == 1 {
                result = mont_mul32(&result, &base);
            }
            base = mont_mul32(&base, &base);
        }
    }
    result
}

fn sample_values() -> Vec<U256> {
    let p_minus_1 = pallas::fp::MODULUS.sub_with_borrow(&U256::ONE).0;
    vec![
        U256::ZERO,
        U256::ONE,
        U256::from_u64(2),
        U256::from_u64(0xdeadbeef),
        U256::from_hex("123456789abcdef0fedcba9876543210aaaabbbbccccdddd0000111122223333"),
        U256::from_hex("3fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"),
        p_minus_1,
    ]
}

#[test]
fn mul_add_carry_boundary() {
    // 0xFFFFFFFF^2 = 0xFFFFFFFE_00000001.
    assert_eq!(mul_add_carry(0xffffffff, 0xffffffff, 0, 0), (0x00000001, 0xfffffffe));
    assert_eq!(mul_add_carry(0, 0, 0xffffffff, 1), (0, 1));
    assert_eq!(
        mul_add_carry(0xffffffff, 0xffffffff, 0xffffffff, 0xffffffff),
        (0xffffffff, 0xffffffff)
    );
    assert_eq!(mul_add_carry(0x10000, 0x10000, 0, 0), (0, 1));
}

#[test]
fn mont_of_one_is_r_mod_p() {
    let mut one = [0u32; N];
    one[0] = 1;
    assert_eq!(to_mont32(&one), R_MOD_P);
}

#[test]
fn mont_round_trip() {
    for v in sample_values() {
        let limbs = v.to_u32_limbs();
        assert_eq!(from_mont32(&to_mont32(&limbs)), limbs, "value {v}");
    }
}

#[test]
fn mont_mul_matches_u64_field() {
    for a in sample_values() {
        for b in sample_values() {
            let got = mont_mul32(&to_mont32(&a.to_u32_limbs()), &to_mont32(&b.to_u32_limbs()));
            let expected = Fp::from_u256(&a).mul(&Fp::from_u256(&b));
            assert_eq!(
                U256::from_u32_limbs(from_mont32(&got)),
                expected.to_u256(),
                "a={a} b={b}"
            );
        }
    }
}

#[test]
fn sub_no_borrow_wrap_branch() {
    // b limb 0xFFFFFFFF together with an incoming borrow exercises the
    // unsigned wrap arithmetic.
    let a = U256::from_hex("10000000000000000").to_u32_limbs(); // 2^64
    let b = U256::from_hex("ffffffff00000001").to_u32_limbs();
    let expected = U256::from_hex("ffffffff").to_u32_limbs();
    assert_eq!(sub_no_borrow(&a, &b), expected);
}

#[test]
fn fermat_inversion_matches_u64_field() {
    for v in sample_values() {
        if v.is_zero() {
            continue;
        }
        let inv = mod_inv32(&to_mont32(&v.to_u32_limbs()));
        assert_eq!(
            U256::from_u32_limbs(from_mont32(&inv)),
            Fp::from_u256(&v).invert().to_u256(),
            "value {v}"
        );
    }
    // Zero maps to zero under Fermat.
    assert_eq!(mod_inv32(&[0; N]), [0; N]);
}

#[test]
fn baked_constants_are_consistent() {
    assert_eq!(
        U256::from_u32_limbs(P_LIMBS),
        pallas::fp::MODULUS,
        "shader modulus limbs disagree with the field implementation"
    );
    let p_minus_2 = pallas::fp::MODULUS
        .sub_with_borrow(&U256::from_u64(2))
        .0;
    assert_eq!(
        U256::from_u32_limbs(P_MINUS_2),
        p_minus_2,
        "Fermat exponent limbs disagree with p - 2"
    );
    // mont_mul(R^2, 1) = R^2 * R^{-1} = R mod p ties the two baked
    // constants together.
    assert_eq!(from_mont32(&R2_MOD_P), R_MOD_P);
}

/// Renders a limb array the way `msm.wgsl` writes its constants: four
/// limbs per line, `u`-suffixed, trailing comma.
fn wgsl_limb_list(limbs: &[u32; N]) -> String {
    let line = |half: &[u32]| {
        half.iter()
            .map(|v| format!("{v:#010x}u"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("{},\n    {},", line(&limbs[..4]), line(&limbs[4..]))
}

#[test]
fn mirror_constants_match_shader_source() {
    // These tests only prove anything about the GPU if the mirrored
    // constants are the ones actually baked into the shader text.
    for (name, limbs) in [
        ("P_LIMBS", &P_LIMBS),
        ("P_MINUS_2", &P_MINUS_2),
        ("R_MOD_P", &R_MOD_P),
        ("R2_MOD_P", &R2_MOD_P),
    ] {
        assert!(
            SHADER.contains(&wgsl_limb_list(limbs)),
            "shader source does not contain the mirrored {name} limbs"
        );
    }
    assert!(SHADER.contains(&format!("const P_INV : u32 = {P_INV:#010x}u;")));
}
