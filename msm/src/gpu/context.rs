//! GPU context management
//!
//! Provides a simple wrapper around WGPU's device, queue, and adapter.

use super::{GpuError, GpuResult};
use wgpu;

/// GPU context that manages the device, queue, and adapter.
///
/// Create it once and reuse it across MSM calls; device acquisition is by
/// far the most expensive step of a cold start.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter: wgpu::Adapter,
}

impl GpuContext {
    /// Create a new GPU context on the best available adapter.
    ///
    /// # Errors
    ///
    /// Returns `GpuError::NoAdapter` if no suitable GPU is found.
    /// Returns `GpuError::DeviceCreation` if device creation fails.
    pub async fn new() -> GpuResult<Self> {
        Self::with_options(wgpu::PowerPreference::HighPerformance).await
    }

    /// Create a new GPU context with a specific power preference.
    pub async fn with_options(power_preference: wgpu::PowerPreference) -> GpuResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
        {
            Ok(adapter) => adapter,
            Err(_) => return Err(GpuError::NoAdapter),
        };

        let info = adapter.get_info();
        log::info!("Selected GPU: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await?;

        Ok(Self {
            device,
            queue,
            adapter,
        })
    }

    /// Get information about the selected GPU adapter.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Largest storage-buffer binding the device accepts, in bytes. This is
    /// what bounds the per-batch element count.
    pub fn max_storage_binding(&self) -> u64 {
        self.device.limits().max_storage_buffer_binding_size as u64
    }

    /// Largest single buffer the device accepts, in bytes.
    pub fn max_buffer_size(&self) -> u64 {
        self.device.limits().max_buffer_size
    }

    /// Required alignment for dynamic uniform-buffer offsets.
    pub fn uniform_offset_alignment(&self) -> u64 {
        self.device.limits().min_uniform_buffer_offset_alignment as u64
    }

    /// Workgroup-count ceiling per dispatch dimension.
    pub fn max_workgroups_per_dim(&self) -> u32 {
        self.device.limits().max_compute_workgroups_per_dimension
    }
}
