//! Sanity checks on the bundled WGSL source.
//!
//! The shader is a single versioned resource; these tests pin its entry
//! points and baked curve constants so a stray edit cannot silently
//! desynchronize it from the host. Full parsing is covered by pipeline
//! creation, which validates the module on any machine with an adapter.

use msm::gpu::{GpuContext, GpuError, MsmPipelines};

const SHADER: &str = include_str!("../src/gpu/shaders/msm.wgsl");

#[test]
fn shader_declares_all_entry_points() {
    for entry in [
        "fn affine_to_projective(",
        "fn bucket_collect(",
        "fn reduce_points(",
        "fn reduce_into_bucket(",
        "fn reduce_into_slot(",
        "fn bucket_aggregate(",
        "fn reduce_final_affine(",
    ] {
        assert!(SHADER.contains(entry), "missing entry point: {entry}");
    }
    assert_eq!(
        SHADER.matches("@compute").count(),
        7,
        "unexpected number of compute entry points"
    );
}

#[test]
fn shader_workgroup_size_matches_host() {
    let occurrences = SHADER.matches("@workgroup_size(64)").count();
    assert_eq!(
        occurrences, 7,
        "every kernel must use the host's fixed workgroup size"
    );
}

#[test]
fn shader_bakes_pallas_constants() {
    // Low and high limbs of p, and -p^{-1} mod 2^32.
    assert!(SHADER.contains("0x992d30edu"));
    assert!(SHADER.contains("0x224698fcu"));
    assert!(SHADER.contains("0x40000000u"));
    assert!(SHADER.contains("const P_INV : u32 = 0xffffffffu;"));
    // R^2 mod p, which to_mont multiplies by.
    assert!(SHADER.contains("0x096d41afu"));
    // The Fermat exponent p - 2 differs from p only in its two low limbs;
    // a typo here would corrupt every mod_inv and to_affine result.
    assert!(SHADER.contains("0x992d30ecu"));
    assert!(SHADER.contains("0xffffffffu, 0x992d30ecu, 0x094cf91bu, 0x224698fcu,"));
}

#[test]
fn shader_module_validates_on_device() {
    pollster::block_on(async {
        let ctx = match GpuContext::new().await {
            Ok(ctx) => ctx,
            Err(GpuError::NoAdapter) => {
                eprintln!("skipping: no GPU adapter available");
                return;
            }
            Err(e) => panic!("GPU setup failed: {e}"),
        };
        // Pipeline creation parses and validates the WGSL for every entry
        // point.
        MsmPipelines::new(&ctx).expect("shader failed validation");
    });
}
