//! The engine-facing render device
//!
//! [`RenderDevice`] owns the wgpu device, the offscreen targets, and every
//! cache. The simulation brackets each frame with `lock`/`unlock` and
//! issues draw calls in between; everything else on this surface is
//! texture residency management and picking.

mod draw;
mod init;

pub use draw::{ComplexSurface, GouraudVertex, TileRect, TileUv};

use std::collections::VecDeque;

use relic_common::flags::FLAG_MASKED;
use relic_common::formats::PixelFormat;
use relic_common::surface::SurfaceDesc;

use crate::batch::BatchQueue;
use crate::diag::{DiagLog, FrameStats};
use crate::frame::FrameResources;
use crate::geometry::{GeometryRing, RingBuffers};
use crate::hit::HitStack;
use crate::pipeline::{PipelineSet, TextureBinder};
use crate::settings::{BindingMode, RenderSettings};
use crate::texture::TextureCache;

pub use init::RenderTargets;

/// Screen rectangle to resolve for picking after the frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitProbe {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Per-frame inputs captured at `lock`.
#[derive(Debug, Clone)]
pub struct FrameInputs {
    pub clear_color: [f32; 4],
    /// Screen flash: rgb color, alpha = lerp strength (0 disables)
    pub flash_tint: [f32; 4],
    /// Screen fog overlay: rgb color, alpha > 0 enables
    pub fog_tint: [f32; 4],
    /// World-to-clip transform for 3-D draws
    pub projection: glam::Mat4,
    /// Picking rectangle resolved by `unlock`
    pub hit_probe: Option<HitProbe>,
}

impl Default for FrameInputs {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            flash_tint: [0.0; 4],
            fog_tint: [0.0; 4],
            projection: glam::Mat4::IDENTITY,
            hit_probe: None,
        }
    }
}

/// Batched wgpu render device for the legacy engine's draw stream.
pub struct RenderDevice {
    pub(crate) surface: wgpu::Surface<'static>,
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) config: wgpu::SurfaceConfiguration,
    pub(crate) settings: RenderSettings,

    // Offscreen targets (game renders at a fixed resolution)
    pub(crate) targets: RenderTargets,

    // Blit pipeline scaling the color target to the window
    pub(crate) blit_pipeline: wgpu::RenderPipeline,
    pub(crate) blit_bind_group: wgpu::BindGroup,

    // Precompiled state-table pipelines and the binding strategy
    pub(crate) pipelines: PipelineSet,
    pub(crate) binding_mode: BindingMode,
    pub(crate) binder: TextureBinder,
    pub(crate) frame_layout: wgpu::BindGroupLayout,
    pub(crate) frame_resources: FrameResources,

    // Frame-sequenced caches
    pub(crate) textures: TextureCache,
    pub(crate) ring: GeometryRing,
    pub(crate) ring_buffers: RingBuffers,
    pub(crate) batches: BatchQueue,
    pub(crate) hits: HitStack,

    // Diagnostics
    pub(crate) diag: DiagLog,
    pub(crate) stats: FrameStats,
    pub(crate) frame_index: u64,

    // Frame state
    pub(crate) frame_open: bool,
    pub(crate) inputs: FrameInputs,
    /// Ring segments written this frame, for fence bookkeeping
    pub(crate) touched_segments: Vec<u32>,
    pub(crate) in_flight: VecDeque<wgpu::SubmissionIndex>,
}

impl RenderDevice {
    /// Begin a frame. A second `lock` without an `unlock` is ignored.
    pub fn lock(&mut self, inputs: &FrameInputs) {
        if self.frame_open {
            tracing::warn!("lock called with a frame already open");
            return;
        }
        self.frame_open = true;
        self.inputs = inputs.clone();
        self.stats.reset();
        self.hits.clear();
        self.batches.reset();

        // Select the frame's first ring segment, gated on the GPU having
        // released it.
        let next = self.ring.next_segment();
        self.ring_buffers.wait_for_segment(&self.device, next);
        self.ring.advance();
        self.touched_segments.clear();
        self.touched_segments.push(self.ring.segment());
    }

    // =================================================================
    // HIT TESTING
    // =================================================================

    /// Open a hit query; subsequently drawn primitives resolve to these
    /// bytes under the cursor.
    pub fn push_hit(&mut self, bytes: &[u8]) {
        if !self.frame_open {
            return;
        }
        self.hits.push(bytes);
    }

    /// Close the innermost hit query, popping `count` bytes. With
    /// `force_hit`, the closed query wins when nothing was drawn under
    /// the probe.
    pub fn pop_hit(&mut self, count: u32, force_hit: bool) {
        if !self.frame_open {
            return;
        }
        self.hits.pop(count, force_hit);
    }

    // =================================================================
    // TEXTURE MANAGEMENT
    // =================================================================

    /// Upload a surface ahead of its first draw.
    pub fn precache_texture(&mut self, desc: &SurfaceDesc, flags: u32) {
        let masked_hint = flags & FLAG_MASKED != 0;
        let _ = self.textures.get(
            &self.device,
            &self.queue,
            Some(desc),
            masked_hint,
            &mut self.diag,
        );
    }

    /// Partial re-upload of a surface's top mip, for procedural textures.
    pub fn update_texture_rect(&mut self, desc: &SurfaceDesc, x: u32, y: u32, w: u32, h: u32) {
        self.textures
            .update_rect(&self.queue, desc, x, y, w, h, &mut self.diag);
    }

    pub fn supports_texture_format(&self, format: PixelFormat) -> bool {
        self.textures.supports_format(format)
    }

    /// Drop every cached texture and binding (level change, mode change).
    /// Must be called between frames.
    pub fn flush_resources(&mut self) {
        self.textures.clear();
        self.binder.clear();
        tracing::info!("flushed cached render resources");
    }

    // =================================================================
    // SURFACE / WINDOW
    // =================================================================

    /// Track a window resize; swap-chain-dependent resources are
    /// reconfigured. The offscreen game resolution is unaffected.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
        tracing::debug!("surface resized to {}x{}", self.config.width, self.config.height);
    }

    // =================================================================
    // ACCESSORS
    // =================================================================

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Game-resolution render target dimensions
    pub fn render_dimensions(&self) -> (u32, u32) {
        (self.targets.width, self.targets.height)
    }

    pub fn vram_used(&self) -> usize {
        self.textures.vram_used()
    }

    /// Binding strategy the device resolved to at creation
    pub fn binding_mode(&self) -> BindingMode {
        self.binding_mode
    }

    /// Counters for the frame currently being built (or the last one)
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }
}
