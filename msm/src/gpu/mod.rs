//! GPU plumbing for the MSM pipeline.
//!
//! Wraps WGPU device acquisition and the compute pipelines behind a small
//! API. The device and queue are always passed explicitly; nothing here is
//! a singleton.

mod context;
mod pipelines;

pub use context::GpuContext;
pub use pipelines::{MsmPipelines, WORKGROUP_SIZE};

/// Result type for GPU operations
pub type GpuResult<T> = Result<T, GpuError>;

/// Error types for GPU operations
#[derive(Debug)]
pub enum GpuError {
    /// Failed to find a suitable GPU adapter
    NoAdapter,
    /// Failed to create device or queue
    DeviceCreation(String),
    /// Buffer allocation or sizing error
    BufferError(String),
    /// Mapping a staging buffer for readback failed
    MapError(String),
    /// The device was lost mid-submission
    DeviceLost(String),
}

impl std::fmt::Display for GpuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuError::NoAdapter => write!(f, "Failed to find a suitable GPU adapter"),
            GpuError::DeviceCreation(msg) => write!(f, "Device creation failed: {}", msg),
            GpuError::BufferError(msg) => write!(f, "Buffer operation failed: {}", msg),
            GpuError::MapError(msg) => write!(f, "Buffer mapping failed: {}", msg),
            GpuError::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(err: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(err.to_string())
    }
}

impl From<wgpu::BufferAsyncError> for GpuError {
    fn from(err: wgpu::BufferAsyncError) -> Self {
        GpuError::MapError(err.to_string())
    }
}
