//! MSM timing sweep.
//!
//! Usage:
//!   cargo run --release --example perf_msm -- [log2_n] [window_bits]
//!
//! Runs the GPU pipeline on 2^log2_n pairs and reports wall time alongside
//! the CPU windowed reference. The CPU reference is skipped above 2^16
//! pairs; for larger instances the GPU result is checked against a partial
//! CPU accumulation of the first 1024 pairs plus the remainder.

use msm::{GpuContext, MsmConfig, MsmEngine};
use pallas::{generator, msm_windowed, AffinePoint, ProjectivePoint, U256};
use rand::{thread_rng, Rng};
use std::time::Instant;

fn main() {
    let mut args = std::env::args();
    args.next();
    let log2_n: u32 = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(16);
    let window_bits: u32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(8);
    assert!(log2_n <= 24, "log2_n too large for this demo");
    let n: usize = 1 << log2_n;

    println!("Pallas MSM perf sweep: n=2^{log2_n}, window_bits={window_bits}");

    let start = Instant::now();
    let mut rng = thread_rng();
    let scalars: Vec<U256> = (0..n)
        .map(|_| U256::new([rng.gen(), rng.gen(), rng.gen(), rng.gen()]))
        .collect();
    let g = ProjectivePoint::from_affine(&generator());
    let mut acc = ProjectivePoint::IDENTITY;
    let points: Vec<AffinePoint> = (0..n)
        .map(|_| {
            acc = acc.add(&g);
            acc.to_affine()
        })
        .collect();
    println!("Input generation:     {:?}", start.elapsed());

    let start = Instant::now();
    let ctx = pollster::block_on(GpuContext::new()).expect("no GPU context");
    let engine = MsmEngine::new(&ctx).expect("engine setup failed");
    println!("GPU setup:            {:?}", start.elapsed());

    let config = MsmConfig {
        window_bits,
        verbose: true,
    };
    let start = Instant::now();
    let gpu_result = pollster::block_on(engine.msm(&ctx, &scalars, &points, &config))
        .expect("GPU MSM failed");
    let gpu_time = start.elapsed();
    println!("GPU MSM:              {:?}", gpu_time);
    println!(
        "GPU throughput:       {:.3} Mpairs/s",
        n as f64 / gpu_time.as_secs_f64() / 1e6
    );
    println!("GPU result: ({}, {})", gpu_result.x, gpu_result.y);

    if n <= 1 << 16 {
        let start = Instant::now();
        let cpu_result = msm_windowed(&scalars, &points, window_bits);
        println!("CPU windowed MSM:     {:?}", start.elapsed());
        println!("Match: {}", gpu_result == cpu_result);
    } else {
        // Split cross-check: head and tail accumulated separately on CPU.
        let start = Instant::now();
        let head = msm_windowed(&scalars[..1024], &points[..1024], window_bits);
        let tail = msm_windowed(&scalars[1024..], &points[1024..], window_bits);
        let combined = ProjectivePoint::from_affine(&head)
            .add(&ProjectivePoint::from_affine(&tail))
            .to_affine();
        println!("CPU split cross-check: {:?}", start.elapsed());
        println!("Match: {}", gpu_result == combined);
    }
}
