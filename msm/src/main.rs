fn main() {
    println!("Pallas MSM on WebGPU");
    println!("\nExamples:");
    println!("  cargo run --example msm_demo              # GPU vs CPU on a small instance");
    println!("  cargo run --example perf_msm -- 20 8      # timing sweep: 2^20 pairs, 8-bit windows");
    println!("\nTests:");
    println!("  cargo test                                # Run all tests");
    println!("  cargo bench                               # Run benchmarks");
}
