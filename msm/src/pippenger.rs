//! Pippenger MSM orchestration.
//!
//! The host side of the pipeline: owns the per-call buffer arena, encodes
//! the compute passes in submission order, and reads the final affine point
//! back through staging buffers.
//!
//! Pass flow for one call, per batch:
//!
//! ```text
//! scalars, points
//!   -> A   affine_to_projective
//!   -> per (window, bucket value >= 1):
//!        Bi1 bucket_collect              (intra-workgroup tree reduce)
//!        Bi2 reduce_points rounds        (ping-pong WGG <-> scratch)
//!            reduce_into_bucket          (accumulate the bucket slot)
//!   -> C   bucket_aggregate              (weight = value << (w * window))
//!   -> D   reduce_points rounds + reduce_into_slot -> batch_final[batch]
//! ```
//!
//! and once at the end:
//!
//! ```text
//!   -> E   reduce_points rounds + reduce_final_affine -> (x, y) staging
//! ```
//!
//! All passes for all batches, pass E, and the staging copies are encoded
//! into one command encoder and submitted once per call; every input
//! upload lands on the queue before that submission, which is why each
//! batch gets its own small input-buffer set. Every dispatch reads its
//! parameters from one uniform buffer through a dynamic offset, out of a
//! single table covering the whole call. Cross-workgroup reductions never
//! run in place: slot `j` of a reduction output is some other workgroup's
//! input in the same dispatch, so each round alternates between the two
//! scratch attachments.

use crate::gpu::{GpuContext, GpuError, GpuResult, MsmPipelines, WORKGROUP_SIZE};
use crate::limbs::{encode_points, encode_scalars, Limbs256, LIMBS_BYTES};
use pallas::{AffinePoint, U256};
use std::time::Instant;

/// Options for a single MSM call.
#[derive(Clone, Debug)]
pub struct MsmConfig {
    /// Window width in bits, `1..=22`.
    pub window_bits: u32,
    /// Log phase timings at info level instead of debug.
    pub verbose: bool,
}

impl Default for MsmConfig {
    fn default() -> Self {
        Self {
            window_bits: 8,
            verbose: false,
        }
    }
}

/// Errors surfaced by [`MsmEngine::msm`].
#[derive(Debug)]
pub enum MsmError {
    /// No input pairs were supplied.
    EmptyInput,
    /// The scalar and point slices differ in length.
    LengthMismatch { scalars: usize, points: usize },
    /// `window_bits` outside `[1, 22]`.
    WindowBitsOutOfRange(u32),
    /// Device-side failure (allocation, mapping, device loss).
    Gpu(GpuError),
}

impl std::fmt::Display for MsmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MsmError::EmptyInput => write!(f, "msm called with no input pairs"),
            MsmError::LengthMismatch { scalars, points } => write!(
                f,
                "scalar/point length mismatch: {} scalars, {} points",
                scalars, points
            ),
            MsmError::WindowBitsOutOfRange(w) => {
                write!(f, "window_bits must be in [1, 22], got {}", w)
            }
            MsmError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for MsmError {}

impl From<GpuError> for MsmError {
    fn from(err: GpuError) -> Self {
        MsmError::Gpu(err)
    }
}

/// Per-dispatch parameters; must match `Params` in `msm.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
struct PassParams {
    n: u32,
    win: u32,
    bucket: u32,
    window_bits: u32,
    buckets_per_win: u32,
    _pad: [u32; 3],
}

const PARAMS_SIZE: usize = std::mem::size_of::<PassParams>();

/// Builds the per-submission parameter table. Each slot starts on a
/// dynamic-offset alignment boundary.
struct ParamTable {
    align: usize,
    bytes: Vec<u8>,
}

impl ParamTable {
    fn new(align: usize) -> Self {
        Self {
            align,
            bytes: Vec::new(),
        }
    }

    fn push(&mut self, params: PassParams) -> u32 {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(bytemuck::bytes_of(&params));
        self.bytes.resize(offset + self.align, 0);
        offset as u32
    }
}

/// Sizes derived from `(N, window_bits)` and the device limits, fixed for
/// the duration of one call.
struct Geometry {
    n_total: usize,
    window_bits: u32,
    num_windows: u32,
    buckets_per_win: u32,
    total_buckets: u32,
    chunk: usize,
    num_batches: usize,
    wgg_len: usize,
    f_len: usize,
    scratch_len: usize,
    params_capacity: usize,
}

fn reduce_rounds(mut m: usize) -> usize {
    let mut rounds = 0;
    while m > WORKGROUP_SIZE as usize {
        m = m.div_ceil(WORKGROUP_SIZE as usize);
        rounds += 1;
    }
    rounds
}

/// Input buffers for one batch. Each batch owns its set so every upload
/// can happen before the call's single submission.
struct BatchInputs {
    scalars: wgpu::Buffer,
    ax: wgpu::Buffer,
    ay: wgpu::Buffer,
}

/// All device buffers for one MSM call, allocated on entry (work buffers at
/// maximum per-batch size, one input set per batch) and released together
/// when the call returns.
struct MsmBuffers {
    inputs: Vec<BatchInputs>,
    px: wgpu::Buffer,
    py: wgpu::Buffer,
    pz: wgpu::Buffer,
    wgg: [wgpu::Buffer; 3],
    scratch: [wgpu::Buffer; 3],
    buckets: [wgpu::Buffer; 3],
    f: [wgpu::Buffer; 3],
    batch_final: [wgpu::Buffer; 3],
    out_x: wgpu::Buffer,
    out_y: wgpu::Buffer,
    staging_x: wgpu::Buffer,
    staging_y: wgpu::Buffer,
    params: wgpu::Buffer,
}

fn buffer(device: &wgpu::Device, label: &str, elems: usize, usage: wgpu::BufferUsages) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (elems.max(1) as u64) * LIMBS_BYTES as u64,
        usage,
        mapped_at_creation: false,
    })
}

fn point_buffers(
    device: &wgpu::Device,
    label: &str,
    elems: usize,
    usage: wgpu::BufferUsages,
) -> [wgpu::Buffer; 3] {
    [
        buffer(device, &format!("{label}-x"), elems, usage),
        buffer(device, &format!("{label}-y"), elems, usage),
        buffer(device, &format!("{label}-z"), elems, usage),
    ]
}

impl MsmBuffers {
    fn new(device: &wgpu::Device, geom: &Geometry) -> Self {
        use wgpu::BufferUsages as U;
        let input = U::STORAGE | U::COPY_DST;
        let storage = U::STORAGE;

        let inputs = (0..geom.num_batches)
            .map(|batch| BatchInputs {
                scalars: buffer(device, &format!("msm-scalars-{batch}"), geom.chunk, input),
                ax: buffer(device, &format!("msm-affine-x-{batch}"), geom.chunk, input),
                ay: buffer(device, &format!("msm-affine-y-{batch}"), geom.chunk, input),
            })
            .collect();

        Self {
            inputs,
            px: buffer(device, "msm-proj-x", geom.chunk, storage),
            py: buffer(device, "msm-proj-y", geom.chunk, storage),
            pz: buffer(device, "msm-proj-z", geom.chunk, storage),
            wgg: point_buffers(device, "msm-wgg", geom.wgg_len, storage),
            scratch: point_buffers(device, "msm-scratch", geom.scratch_len, storage),
            // Buckets are cleared to the all-zero identity per batch.
            buckets: point_buffers(
                device,
                "msm-buckets",
                geom.total_buckets as usize,
                U::STORAGE | U::COPY_DST,
            ),
            f: point_buffers(device, "msm-f", geom.f_len, storage),
            batch_final: point_buffers(device, "msm-batch-final", geom.num_batches, storage),
            out_x: buffer(device, "msm-out-x", 1, U::STORAGE | U::COPY_SRC),
            out_y: buffer(device, "msm-out-y", 1, U::STORAGE | U::COPY_SRC),
            staging_x: buffer(device, "msm-staging-x", 1, U::COPY_DST | U::MAP_READ),
            staging_y: buffer(device, "msm-staging-y", 1, U::COPY_DST | U::MAP_READ),
            params: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("msm-params"),
                size: geom.params_capacity as u64,
                usage: U::UNIFORM | U::COPY_DST,
                mapped_at_creation: false,
            }),
        }
    }
}

/// Bind groups are created once per call and reused across every dispatch;
/// the conversion and collection groups are per batch (they reference the
/// batch's input buffers), and ping-pong reductions alternate between the
/// two groups of a pair.
struct MsmBindGroups {
    convert: Vec<wgpu::BindGroup>,
    collect: Vec<wgpu::BindGroup>,
    wgg_to_scratch: wgpu::BindGroup,
    scratch_to_wgg: wgpu::BindGroup,
    bucket_from_wgg: wgpu::BindGroup,
    bucket_from_scratch: wgpu::BindGroup,
    aggregate: wgpu::BindGroup,
    f_to_scratch: wgpu::BindGroup,
    scratch_to_f: wgpu::BindGroup,
    slot_from_f: wgpu::BindGroup,
    slot_from_scratch: wgpu::BindGroup,
    bf_to_scratch: wgpu::BindGroup,
    scratch_to_bf: wgpu::BindGroup,
    final_from_bf: wgpu::BindGroup,
    final_from_scratch: wgpu::BindGroup,
}

fn storage_binding(binding: u32, buf: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buf.as_entire_binding(),
    }
}

fn params_binding(binding: u32, buf: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
            buffer: buf,
            offset: 0,
            size: wgpu::BufferSize::new(PARAMS_SIZE as u64),
        }),
    }
}

fn coords(b: &[wgpu::Buffer; 3]) -> [&wgpu::Buffer; 3] {
    [&b[0], &b[1], &b[2]]
}

impl MsmBindGroups {
    fn new(device: &wgpu::Device, pipelines: &MsmPipelines, bufs: &MsmBuffers) -> Self {
        let reduce_group = |label: &str, input: &[wgpu::Buffer; 3], output: [&wgpu::Buffer; 3]| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &pipelines.layout_reduce,
                entries: &[
                    storage_binding(14, &input[0]),
                    storage_binding(15, &input[1]),
                    storage_binding(16, &input[2]),
                    storage_binding(17, output[0]),
                    storage_binding(18, output[1]),
                    storage_binding(19, output[2]),
                    params_binding(20, &bufs.params),
                ],
            })
        };
        let convert = bufs
            .inputs
            .iter()
            .map(|input| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("msm-convert-bind"),
                    layout: &pipelines.layout_convert,
                    entries: &[
                        storage_binding(0, &input.ax),
                        storage_binding(1, &input.ay),
                        storage_binding(2, &bufs.px),
                        storage_binding(3, &bufs.py),
                        storage_binding(4, &bufs.pz),
                        params_binding(5, &bufs.params),
                    ],
                })
            })
            .collect();

        let collect = bufs
            .inputs
            .iter()
            .map(|input| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("msm-collect-bind"),
                    layout: &pipelines.layout_collect,
                    entries: &[
                        storage_binding(6, &input.scalars),
                        storage_binding(7, &bufs.px),
                        storage_binding(8, &bufs.py),
                        storage_binding(9, &bufs.pz),
                        storage_binding(10, &bufs.wgg[0]),
                        storage_binding(11, &bufs.wgg[1]),
                        storage_binding(12, &bufs.wgg[2]),
                        params_binding(13, &bufs.params),
                    ],
                })
            })
            .collect();

        Self {
            convert,
            collect,
            wgg_to_scratch: reduce_group("msm-red-wgg-scratch", &bufs.wgg, coords(&bufs.scratch)),
            scratch_to_wgg: reduce_group("msm-red-scratch-wgg", &bufs.scratch, coords(&bufs.wgg)),
            bucket_from_wgg: reduce_group("msm-bucket-wgg", &bufs.wgg, coords(&bufs.buckets)),
            bucket_from_scratch: reduce_group(
                "msm-bucket-scratch",
                &bufs.scratch,
                coords(&bufs.buckets),
            ),
            aggregate: reduce_group("msm-aggregate-bind", &bufs.buckets, coords(&bufs.f)),
            f_to_scratch: reduce_group("msm-red-f-scratch", &bufs.f, coords(&bufs.scratch)),
            scratch_to_f: reduce_group("msm-red-scratch-f", &bufs.scratch, coords(&bufs.f)),
            slot_from_f: reduce_group("msm-slot-f", &bufs.f, coords(&bufs.batch_final)),
            slot_from_scratch: reduce_group(
                "msm-slot-scratch",
                &bufs.scratch,
                coords(&bufs.batch_final),
            ),
            bf_to_scratch: reduce_group("msm-red-bf-scratch", &bufs.batch_final, coords(&bufs.scratch)),
            scratch_to_bf: reduce_group("msm-red-scratch-bf", &bufs.scratch, coords(&bufs.batch_final)),
            // The finalize kernel writes only x and y; binding 19 is a
            // placeholder that must not alias the group's other buffers.
            final_from_bf: reduce_group(
                "msm-final-bf",
                &bufs.batch_final,
                [&bufs.out_x, &bufs.out_y, &bufs.scratch[2]],
            ),
            final_from_scratch: reduce_group(
                "msm-final-scratch",
                &bufs.scratch,
                [&bufs.out_x, &bufs.out_y, &bufs.batch_final[2]],
            ),
        }
    }
}

/// Holds the compiled pipelines and device limits; one engine serves many
/// MSM calls on the same context.
pub struct MsmEngine {
    pipelines: MsmPipelines,
    max_chunk: usize,
    max_wg_dim: u32,
    uniform_align: usize,
    max_binding: u64,
    max_buffer: u64,
}

impl MsmEngine {
    pub fn new(ctx: &GpuContext) -> GpuResult<Self> {
        let max_chunk = (ctx.max_storage_binding() / LIMBS_BYTES as u64) as usize;
        Self::with_chunk_size(ctx, max_chunk)
    }

    /// Like [`MsmEngine::new`] but with a narrowed per-batch capacity.
    /// Mostly useful to force the multi-batch path in tests.
    pub fn with_chunk_size(ctx: &GpuContext, max_chunk: usize) -> GpuResult<Self> {
        if max_chunk == 0 {
            return Err(GpuError::BufferError(
                "chunk size must be at least one element".into(),
            ));
        }
        let device_chunk = (ctx.max_storage_binding() / LIMBS_BYTES as u64) as usize;
        Ok(Self {
            pipelines: MsmPipelines::new(ctx)?,
            max_chunk: max_chunk.min(device_chunk),
            max_wg_dim: ctx.max_workgroups_per_dim(),
            uniform_align: (ctx.uniform_offset_alignment() as usize).max(PARAMS_SIZE),
            max_binding: ctx.max_storage_binding(),
            max_buffer: ctx.max_buffer_size(),
        })
    }

    /// Computes `sum_i scalars[i] * points[i]` on the GPU and returns the
    /// affine result; the identity comes back as `(0, 0)`.
    ///
    /// Scalars are plain 256-bit integers; callers wanting group semantics
    /// reduce them mod the group order first.
    pub async fn msm(
        &self,
        ctx: &GpuContext,
        scalars: &[U256],
        points: &[AffinePoint],
        cfg: &MsmConfig,
    ) -> Result<AffinePoint, MsmError> {
        if scalars.is_empty() {
            return Err(MsmError::EmptyInput);
        }
        if scalars.len() != points.len() {
            return Err(MsmError::LengthMismatch {
                scalars: scalars.len(),
                points: points.len(),
            });
        }
        if !(1..=22).contains(&cfg.window_bits) {
            return Err(MsmError::WindowBitsOutOfRange(cfg.window_bits));
        }

        let geom = self.geometry(scalars.len(), cfg.window_bits)?;
        let verbose = cfg.verbose;
        log_timing(verbose, || {
            format!(
                "msm: n={} window_bits={} windows={} buckets={} batches={} chunk={}",
                geom.n_total,
                geom.window_bits,
                geom.num_windows,
                geom.total_buckets,
                geom.num_batches,
                geom.chunk
            )
        });

        let start = Instant::now();
        let bufs = MsmBuffers::new(&ctx.device, &geom);
        let groups = MsmBindGroups::new(&ctx.device, &self.pipelines, &bufs);
        log_timing(verbose, || format!("msm: setup {:?}", start.elapsed()));

        // Upload every batch's inputs; all writes land on the queue ahead
        // of the single submission below.
        let upload_start = Instant::now();
        for (batch, input) in bufs.inputs.iter().enumerate() {
            let lo = batch * geom.chunk;
            let hi = (lo + geom.chunk).min(geom.n_total);

            let enc_scalars = encode_scalars(&scalars[lo..hi]);
            let (enc_x, enc_y) = encode_points(&points[lo..hi]);
            ctx.queue
                .write_buffer(&input.scalars, 0, bytemuck::cast_slice(&enc_scalars));
            ctx.queue
                .write_buffer(&input.ax, 0, bytemuck::cast_slice(&enc_x));
            ctx.queue
                .write_buffer(&input.ay, 0, bytemuck::cast_slice(&enc_y));
        }
        log_timing(verbose, || format!("msm: upload {:?}", upload_start.elapsed()));

        // All passes for all batches go into one command encoder, submitted
        // once; the device preserves submission order between them.
        let encode_start = Instant::now();
        let mut table = ParamTable::new(self.uniform_align);
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("msm-encoder"),
            });
        for batch in 0..geom.num_batches {
            let lo = batch * geom.chunk;
            let n = (lo + geom.chunk).min(geom.n_total) - lo;
            self.encode_batch(&mut encoder, &bufs, &groups, &geom, batch, n, &mut table);
        }
        self.encode_final(&mut encoder, &bufs, &groups, &geom, &mut table);
        debug_assert!(table.bytes.len() <= geom.params_capacity);
        ctx.queue.write_buffer(&bufs.params, 0, &table.bytes);
        ctx.queue.submit(Some(encoder.finish()));
        log_timing(verbose, || {
            format!(
                "msm: {} batches encoded and submitted in {:?}",
                geom.num_batches,
                encode_start.elapsed()
            )
        });

        let result = self.read_result(ctx, &bufs).await?;
        log_timing(verbose, || format!("msm: total {:?}", start.elapsed()));
        Ok(result)
    }

    fn geometry(&self, n_total: usize, window_bits: u32) -> Result<Geometry, MsmError> {
        let num_windows = (256 + window_bits - 1) / window_bits;
        let buckets_per_win = 1u32 << window_bits;
        let total_buckets = num_windows * buckets_per_win;

        let chunk = self.max_chunk.min(n_total);
        let num_batches = n_total.div_ceil(chunk);
        let wgg_len = chunk.div_ceil(WORKGROUP_SIZE as usize);
        let f_len = (total_buckets as usize).div_ceil(WORKGROUP_SIZE as usize);
        let scratch_len = wgg_len
            .div_ceil(WORKGROUP_SIZE as usize)
            .max(f_len.div_ceil(WORKGROUP_SIZE as usize))
            .max(num_batches.div_ceil(WORKGROUP_SIZE as usize));

        // One slot per dispatch, for the whole call: per batch that is A,
        // the shared Bi2 round ladder, two per (window, value) pair, C, and
        // the D ladder and terminal; pass E adds its own ladder at the end.
        let pair_count = (num_windows as usize) * (buckets_per_win as usize - 1).max(1);
        let per_batch_slots = 2
            + reduce_rounds(wgg_len)
            + 2 * pair_count
            + reduce_rounds(f_len)
            + 2;
        let final_slots = reduce_rounds(num_batches) + 1;
        let params_capacity =
            (per_batch_slots * num_batches + final_slots) * self.uniform_align;

        let bucket_bytes = total_buckets as u64 * LIMBS_BYTES as u64;
        if bucket_bytes > self.max_binding {
            return Err(MsmError::Gpu(GpuError::BufferError(format!(
                "bucket storage ({} bytes per coordinate) exceeds the device \
                 binding limit ({}); use a smaller window",
                bucket_bytes, self.max_binding
            ))));
        }
        if params_capacity as u64 > self.max_buffer {
            return Err(MsmError::Gpu(GpuError::BufferError(format!(
                "parameter table ({} bytes) exceeds the device buffer limit \
                 ({}); use a smaller window",
                params_capacity, self.max_buffer
            ))));
        }

        Ok(Geometry {
            n_total,
            window_bits,
            num_windows,
            buckets_per_win,
            total_buckets,
            chunk,
            num_batches,
            wgg_len,
            f_len,
            scratch_len,
            params_capacity,
        })
    }

    fn dispatch(&self, cpass: &mut wgpu::ComputePass<'_>, workgroups: usize) {
        let workgroups = workgroups as u32;
        if workgroups <= self.max_wg_dim {
            cpass.dispatch_workgroups(workgroups, 1, 1);
        } else {
            // Fold oversized grids into two dimensions; kernels linearize
            // workgroup_id against num_workgroups.
            let x = self.max_wg_dim;
            let y = workgroups.div_ceil(x);
            cpass.dispatch_workgroups(x, y, 1);
        }
    }

    /// Encodes every pass of one batch into the call's command encoder.
    fn encode_batch(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bufs: &MsmBuffers,
        groups: &MsmBindGroups,
        geom: &Geometry,
        batch: usize,
        n: usize,
        table: &mut ParamTable,
    ) {
        let wg = WORKGROUP_SIZE as usize;

        // Bucket accumulators start each batch at the identity, which is
        // the all-zero encoding.
        for buf in &bufs.buckets {
            encoder.clear_buffer(buf, 0, None);
        }

        // Pass A: affine -> projective.
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("msm-pass-a"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.pipelines.convert);
            let offset = table.push(PassParams {
                n: n as u32,
                ..Default::default()
            });
            cpass.set_bind_group(0, &groups.convert[batch], &[offset]);
            self.dispatch(&mut cpass, n.div_ceil(wg));
        }

        // The Bi2 round ladder is identical for every bucket of the batch,
        // so its parameter slots are shared.
        let bi1_workgroups = n.div_ceil(wg);
        let mut round_offsets = Vec::new();
        let mut m = bi1_workgroups;
        while m > wg {
            round_offsets.push(table.push(PassParams {
                n: m as u32,
                ..Default::default()
            }));
            m = m.div_ceil(wg);
        }
        let terminal_n = m;

        // Passes Bi1 + Bi2, per (window, bucket value). Value 0 is skipped:
        // its points contribute nothing, and pass C weights its slot by
        // zero, so the cleared slot is already correct.
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("msm-pass-b"),
                timestamp_writes: None,
            });
            for win in 0..geom.num_windows {
                for value in 1..geom.buckets_per_win {
                    let offset = table.push(PassParams {
                        n: n as u32,
                        win,
                        bucket: value,
                        window_bits: geom.window_bits,
                        ..Default::default()
                    });
                    cpass.set_pipeline(&self.pipelines.collect);
                    cpass.set_bind_group(0, &groups.collect[batch], &[offset]);
                    self.dispatch(&mut cpass, bi1_workgroups);

                    let mut src_is_wgg = true;
                    let mut live = bi1_workgroups;
                    for offset in &round_offsets {
                        cpass.set_pipeline(&self.pipelines.reduce);
                        let group = if src_is_wgg {
                            &groups.wgg_to_scratch
                        } else {
                            &groups.scratch_to_wgg
                        };
                        cpass.set_bind_group(0, group, &[*offset]);
                        live = live.div_ceil(wg);
                        self.dispatch(&mut cpass, live);
                        src_is_wgg = !src_is_wgg;
                    }

                    let slot = win * geom.buckets_per_win + value;
                    let offset = table.push(PassParams {
                        n: terminal_n as u32,
                        bucket: slot,
                        ..Default::default()
                    });
                    cpass.set_pipeline(&self.pipelines.reduce_into_bucket);
                    let group = if src_is_wgg {
                        &groups.bucket_from_wgg
                    } else {
                        &groups.bucket_from_scratch
                    };
                    cpass.set_bind_group(0, group, &[offset]);
                    cpass.dispatch_workgroups(1, 1, 1);
                }
            }
        }

        // Passes C + D: weighted aggregation, then per-batch reduction.
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("msm-pass-cd"),
                timestamp_writes: None,
            });

            let offset = table.push(PassParams {
                n: geom.total_buckets,
                window_bits: geom.window_bits,
                buckets_per_win: geom.buckets_per_win,
                ..Default::default()
            });
            cpass.set_pipeline(&self.pipelines.aggregate);
            cpass.set_bind_group(0, &groups.aggregate, &[offset]);
            self.dispatch(&mut cpass, geom.f_len);

            let mut m = geom.f_len;
            let mut src_is_f = true;
            while m > wg {
                let offset = table.push(PassParams {
                    n: m as u32,
                    ..Default::default()
                });
                cpass.set_pipeline(&self.pipelines.reduce);
                let group = if src_is_f {
                    &groups.f_to_scratch
                } else {
                    &groups.scratch_to_f
                };
                cpass.set_bind_group(0, group, &[offset]);
                m = m.div_ceil(wg);
                self.dispatch(&mut cpass, m);
                src_is_f = !src_is_f;
            }

            let offset = table.push(PassParams {
                n: m as u32,
                bucket: batch as u32,
                ..Default::default()
            });
            cpass.set_pipeline(&self.pipelines.reduce_into_slot);
            let group = if src_is_f {
                &groups.slot_from_f
            } else {
                &groups.slot_from_scratch
            };
            cpass.set_bind_group(0, group, &[offset]);
            cpass.dispatch_workgroups(1, 1, 1);
        }
    }

    /// Encodes pass E: cross-batch reduction, affine conversion, and the
    /// staging copies.
    fn encode_final(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bufs: &MsmBuffers,
        groups: &MsmBindGroups,
        geom: &Geometry,
        table: &mut ParamTable,
    ) {
        let wg = WORKGROUP_SIZE as usize;

        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("msm-pass-e"),
                timestamp_writes: None,
            });

            let mut m = geom.num_batches;
            let mut src_is_bf = true;
            while m > wg {
                let offset = table.push(PassParams {
                    n: m as u32,
                    ..Default::default()
                });
                cpass.set_pipeline(&self.pipelines.reduce);
                let group = if src_is_bf {
                    &groups.bf_to_scratch
                } else {
                    &groups.scratch_to_bf
                };
                cpass.set_bind_group(0, group, &[offset]);
                m = m.div_ceil(wg);
                self.dispatch(&mut cpass, m);
                src_is_bf = !src_is_bf;
            }

            let offset = table.push(PassParams {
                n: m as u32,
                ..Default::default()
            });
            cpass.set_pipeline(&self.pipelines.finalize);
            let group = if src_is_bf {
                &groups.final_from_bf
            } else {
                &groups.final_from_scratch
            };
            cpass.set_bind_group(0, group, &[offset]);
            cpass.dispatch_workgroups(1, 1, 1);
        }

        encoder.copy_buffer_to_buffer(&bufs.out_x, 0, &bufs.staging_x, 0, LIMBS_BYTES as u64);
        encoder.copy_buffer_to_buffer(&bufs.out_y, 0, &bufs.staging_y, 0, LIMBS_BYTES as u64);
    }

    /// Maps the two 32-byte staging buffers and decodes the affine result.
    async fn read_result(
        &self,
        ctx: &GpuContext,
        bufs: &MsmBuffers,
    ) -> Result<AffinePoint, MsmError> {
        let slice_x = bufs.staging_x.slice(..);
        let slice_y = bufs.staging_y.slice(..);

        let (tx_x, rx_x) = flume::unbounded();
        slice_x.map_async(wgpu::MapMode::Read, move |result| {
            tx_x.send(result).unwrap();
        });
        let (tx_y, rx_y) = flume::unbounded();
        slice_y.map_async(wgpu::MapMode::Read, move |result| {
            tx_y.send(result).unwrap();
        });

        ctx.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| GpuError::DeviceLost(e.to_string()))?;

        rx_x.recv_async()
            .await
            .map_err(|e| GpuError::MapError(e.to_string()))?
            .map_err(GpuError::from)?;
        rx_y.recv_async()
            .await
            .map_err(|e| GpuError::MapError(e.to_string()))?
            .map_err(GpuError::from)?;

        let x = {
            let data = slice_x.get_mapped_range();
            *bytemuck::from_bytes::<Limbs256>(&data[..LIMBS_BYTES])
        };
        bufs.staging_x.unmap();
        let y = {
            let data = slice_y.get_mapped_range();
            *bytemuck::from_bytes::<Limbs256>(&data[..LIMBS_BYTES])
        };
        bufs.staging_y.unmap();

        Ok(AffinePoint::new(U256::from(&x), U256::from(&y)))
    }
}

fn log_timing(verbose: bool, message: impl FnOnce() -> String) {
    if verbose {
        log::info!("{}", message());
    } else {
        log::debug!("{}", message());
    }
}
