//! # Pallas arithmetic
//!
//! CPU-side arithmetic for the Pallas curve (`y^2 = x^3 + 5` over a 255-bit
//! prime field), used both as the reference implementation the GPU pipeline
//! is validated against and as the marshalling layer for scalars and points.
//!
//! ## Modules
//!
//! - **bigint**: fixed-width 256-bit integers, 4x64-bit limbs
//! - **fp**: the base field, Montgomery-form residues
//! - **curve**: affine/projective points and the Jacobian group law
//! - **msm**: reference multi-scalar multiplication (naive and windowed)

pub mod bigint;
pub mod curve;
pub mod fp;
pub mod msm;

pub use bigint::U256;
pub use curve::{generator, scalar_mul, AffinePoint, ProjectivePoint, ORDER};
pub use fp::Fp;
pub use msm::{msm_naive, msm_windowed};
