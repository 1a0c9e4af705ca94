//! Render device errors
//!
//! Only initialization can fail hard. Everything after device creation
//! degrades locally (placeholder textures, dropped primitives, swap-chain
//! recreation) and is invisible to the simulation layer.

/// Hard failure during render device creation.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create rendering surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("no suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}
