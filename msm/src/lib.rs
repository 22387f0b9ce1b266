//! # Pallas MSM on WebGPU
//!
//! Multi-scalar multiplication `Q = sum_i k_i * P_i` over the Pallas curve,
//! computed on commodity GPUs through WGPU compute shaders.
//!
//! The pipeline is Pippenger's bucket method split across six compute
//! passes: affine-to-projective conversion, per-bucket collection with
//! intra-workgroup tree reduction, cross-workgroup reduction into bucket
//! accumulators, weighted bucket aggregation, per-batch reduction, and a
//! final cross-batch reduction back to affine coordinates. Inputs larger
//! than the device's storage-binding limit are processed in batches.
//!
//! ## Example
//!
//! ```no_run
//! use msm::{GpuContext, MsmConfig, MsmEngine};
//! use pallas::{generator, U256};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = GpuContext::new().await?;
//! let engine = MsmEngine::new(&ctx)?;
//! let scalars = vec![U256::from_u64(42)];
//! let points = vec![generator()];
//! let result = engine
//!     .msm(&ctx, &scalars, &points, &MsmConfig::default())
//!     .await?;
//! println!("42 * G = ({}, {})", result.x, result.y);
//! # Ok(())
//! # }
//! ```

pub mod gpu;
pub mod limbs;
pub mod pippenger;

pub use gpu::{GpuContext, GpuError, GpuResult};
pub use limbs::Limbs256;
pub use pippenger::{MsmConfig, MsmEngine, MsmError};
