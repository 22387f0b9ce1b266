//! Compute pipeline construction for the MSM passes.
//!
//! All kernels live in one WGSL module (`shaders/msm.wgsl`). Binding
//! numbers are disjoint per kernel family, which keeps three explicit
//! bind-group layouts: the affine conversion (pass A), the bucket collector
//! (pass Bi1), and the reduction family shared by Bi2/C/D/E. Pipelines that
//! share a buffer structure share a layout, so the host can reuse bind
//! groups across them.

use super::{GpuContext, GpuResult};

/// Threads per workgroup, fixed across every kernel. The host's dispatch
/// arithmetic (`ceil(n / 64)`) must match the shader's `@workgroup_size`.
pub const WORKGROUP_SIZE: u32 = 64;

/// The single versioned WGSL resource for the whole pipeline.
pub const SHADER_SOURCE: &str = include_str!("shaders/msm.wgsl");

/// Size of the per-dispatch parameter struct, bytes.
pub const PARAMS_SIZE: u64 = 32;

pub struct MsmPipelines {
    pub layout_convert: wgpu::BindGroupLayout,
    pub layout_collect: wgpu::BindGroupLayout,
    pub layout_reduce: wgpu::BindGroupLayout,

    pub convert: wgpu::ComputePipeline,
    pub collect: wgpu::ComputePipeline,
    pub reduce: wgpu::ComputePipeline,
    pub reduce_into_bucket: wgpu::ComputePipeline,
    pub reduce_into_slot: wgpu::ComputePipeline,
    pub aggregate: wgpu::ComputePipeline,
    pub finalize: wgpu::ComputePipeline,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn params_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            // One parameter slot per dispatch, selected by dynamic offset.
            has_dynamic_offset: true,
            min_binding_size: wgpu::BufferSize::new(PARAMS_SIZE),
        },
        count: None,
    }
}

impl MsmPipelines {
    pub fn new(ctx: &GpuContext) -> GpuResult<Self> {
        let shader = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("msm-shader"),
                source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
            });

        let layout_convert =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("msm-convert-layout"),
                    entries: &[
                        storage_entry(0, true),  // affine x
                        storage_entry(1, true),  // affine y
                        storage_entry(2, false), // projective x
                        storage_entry(3, false), // projective y
                        storage_entry(4, false), // projective z
                        params_entry(5),
                    ],
                });

        let layout_collect =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("msm-collect-layout"),
                    entries: &[
                        storage_entry(6, true),   // scalars
                        storage_entry(7, true),   // projective x
                        storage_entry(8, true),   // projective y
                        storage_entry(9, true),   // projective z
                        storage_entry(10, false), // per-workgroup x
                        storage_entry(11, false), // per-workgroup y
                        storage_entry(12, false), // per-workgroup z
                        params_entry(13),
                    ],
                });

        let layout_reduce =
            ctx.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("msm-reduce-layout"),
                    entries: &[
                        storage_entry(14, true),  // input x
                        storage_entry(15, true),  // input y
                        storage_entry(16, true),  // input z
                        storage_entry(17, false), // output x
                        storage_entry(18, false), // output y
                        storage_entry(19, false), // output z
                        params_entry(20),
                    ],
                });

        let make_pipeline = |label: &str,
                             layout: &wgpu::BindGroupLayout,
                             entry_point: &str|
         -> wgpu::ComputePipeline {
            let pipeline_layout =
                ctx.device
                    .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some(label),
                        bind_group_layouts: &[layout],
                        push_constant_ranges: &[],
                    });
            ctx.device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(label),
                    layout: Some(&pipeline_layout),
                    module: &shader,
                    entry_point: Some(entry_point),
                    compilation_options: Default::default(),
                    cache: None,
                })
        };

        let convert = make_pipeline("msm-convert", &layout_convert, "affine_to_projective");
        let collect = make_pipeline("msm-collect", &layout_collect, "bucket_collect");
        let reduce = make_pipeline("msm-reduce", &layout_reduce, "reduce_points");
        let reduce_into_bucket =
            make_pipeline("msm-reduce-bucket", &layout_reduce, "reduce_into_bucket");
        let reduce_into_slot =
            make_pipeline("msm-reduce-slot", &layout_reduce, "reduce_into_slot");
        let aggregate = make_pipeline("msm-aggregate", &layout_reduce, "bucket_aggregate");
        let finalize = make_pipeline("msm-finalize", &layout_reduce, "reduce_final_affine");

        Ok(Self {
            layout_convert,
            layout_collect,
            layout_reduce,
            convert,
            collect,
            reduce,
            reduce_into_bucket,
            reduce_into_slot,
            aggregate,
            finalize,
        })
    }
}
