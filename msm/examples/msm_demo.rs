//! Small GPU MSM demo with a CPU cross-check.
//!
//! Computes sum_i k_i * P_i for a few thousand random scalars against
//! multiples of the Pallas generator, on the GPU and on the CPU, and
//! compares the results.

use msm::{GpuContext, MsmConfig, MsmEngine};
use pallas::{generator, msm_windowed, AffinePoint, ProjectivePoint, U256};
use pollster::FutureExt;
use rand::{thread_rng, Rng};
use std::time::Instant;

const N: usize = 1 << 12;

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Device acquisition.
    println!("Initializing GPU...");
    let ctx = GpuContext::new().await?;
    let info = ctx.adapter_info();
    println!("✓ Using GPU: {} ({:?})\n", info.name, info.backend);

    let engine = MsmEngine::new(&ctx)?;
    println!("✓ MSM pipelines created\n");

    // 2. Inputs: random 256-bit scalars, points G, 2G, 3G, ...
    let mut rng = thread_rng();
    let scalars: Vec<U256> = (0..N)
        .map(|_| U256::new([rng.gen(), rng.gen(), rng.gen(), rng.gen()]))
        .collect();
    let g = ProjectivePoint::from_affine(&generator());
    let mut acc = ProjectivePoint::IDENTITY;
    let points: Vec<AffinePoint> = (0..N)
        .map(|_| {
            acc = acc.add(&g);
            acc.to_affine()
        })
        .collect();
    println!("Prepared {} scalar/point pairs\n", N);

    // 3. GPU MSM.
    println!("Running MSM on GPU...");
    let start = Instant::now();
    let gpu_result = engine
        .msm(&ctx, &scalars, &points, &MsmConfig::default())
        .await?;
    let gpu_time = start.elapsed();
    println!("✓ GPU result:  ({}, {})", gpu_result.x, gpu_result.y);
    println!("  GPU time:    {:?}\n", gpu_time);

    // 4. CPU cross-check with the windowed reference.
    println!("Running MSM on CPU (windowed reference)...");
    let start = Instant::now();
    let cpu_result = msm_windowed(&scalars, &points, 8);
    let cpu_time = start.elapsed();
    println!("✓ CPU result:  ({}, {})", cpu_result.x, cpu_result.y);
    println!("  CPU time:    {:?}\n", cpu_time);

    if gpu_result == cpu_result {
        println!("✓ GPU and CPU agree!");
        Ok(())
    } else {
        Err("GPU and CPU results differ".into())
    }
}

fn main() {
    println!("=== Pallas MSM Demo ===\n");
    match run().block_on() {
        Ok(_) => println!("\n✓ Success!"),
        Err(e) => {
            eprintln!("\n✗ Error: {}", e);
            std::process::exit(1);
        }
    }
}
