//! Relic render device (wgpu)
//!
//! Reimplements the legacy engine's rendering layer as a frame-sequenced
//! resource and draw-batching device on top of wgpu.
//!
//! # Architecture
//!
//! The simulation issues immediate-mode draw calls between `lock` and
//! `unlock`. Each call resolves its textures through the [`texture`] cache,
//! reserves space in the [`geometry`] ring, and feeds the [`batch`]
//! coalescer, which folds runs of identical render state into single
//! indexed draw ranges. At `unlock` the [`frame`] layer uploads the staged
//! geometry, replays the batch queue in one render pass over the offscreen
//! color / hit-ID / depth targets, blits to the window, submits, and
//! applies the frames-in-flight wait policy. Picking readback rides the
//! same draw stream through the [`hit`] subsystem.
//!
//! All of this runs on the thread that owns the device; the GPU alone
//! executes asynchronously.

pub mod batch;
pub mod codec;
mod device;
pub mod diag;
mod error;
pub mod frame;
pub mod geometry;
pub mod hit;
pub mod pipeline;
mod settings;
pub mod state;
pub mod texture;
pub mod vertex;

pub use device::{
    ComplexSurface, FrameInputs, GouraudVertex, HitProbe, RenderDevice, TileRect, TileUv,
};
pub use error::RenderError;
pub use settings::{BindingMode, RenderSettings};

// The draw-flag vocabulary is shared with the simulation side.
pub use relic_common::flags;
pub use relic_common::{FacetMapping, PixelFormat, SurfaceDesc, SurfaceMip};
