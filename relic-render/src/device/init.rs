//! Render device initialization
//!
//! Device creation is the only operation that can fail hard; everything
//! downstream degrades locally. Initialization resolves the texture
//! binding strategy against the adapter's features, builds the full
//! pipeline table, and allocates the fixed-resolution offscreen targets.

use std::collections::VecDeque;

use crate::batch::BatchQueue;
use crate::diag::{DiagLog, FrameStats};
use crate::error::RenderError;
use crate::frame::FrameResources;
use crate::geometry::{GeometryRing, RingBuffers};
use crate::hit::HitStack;
use crate::pipeline::{
    self, create_frame_layout, PipelineSet, TextureBinder, COLOR_FORMAT, DEPTH_FORMAT, HIT_FORMAT,
};
use crate::settings::{BindingMode, RenderSettings};
use crate::texture::TextureCache;

use super::{FrameInputs, RenderDevice};

/// Offscreen render targets at the fixed game resolution.
///
/// The textures are kept alive here because the views do not own them;
/// the color and hit textures are additionally copy sources for
/// `read_pixels` and hit resolution.
pub struct RenderTargets {
    pub(crate) color_texture: wgpu::Texture,
    pub(crate) color_view: wgpu::TextureView,
    pub(crate) hit_texture: wgpu::Texture,
    pub(crate) hit_view: wgpu::TextureView,
    #[allow(dead_code)] // Keeps the depth texture alive for its view
    pub(crate) depth_texture: wgpu::Texture,
    pub(crate) depth_view: wgpu::TextureView,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl RenderDevice {
    /// Create a render device over a window-like surface target.
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        settings: &RenderSettings,
    ) -> Result<Self, RenderError> {
        let settings = settings.sanitized();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(target)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        tracing::info!("using GPU adapter: {:?}", adapter.get_info().name);

        let binding_mode = resolve_binding_mode(settings.binding_mode, &adapter);
        let (required_features, required_limits) = if binding_mode == BindingMode::Bindless {
            (
                wgpu::Features::TEXTURE_BINDING_ARRAY
                    | wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING,
                adapter.limits(),
            )
        } else {
            (wgpu::Features::empty(), wgpu::Limits::default())
        };

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Relic Render Device"),
                required_features,
                required_limits,
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: if settings.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: settings.frames_in_flight.clamp(1, 3),
        };
        surface.configure(&device, &config);

        let targets = create_render_targets(&device, settings.game_width, settings.game_height);

        let mut textures = TextureCache::new(&device, &queue);
        let binder = match binding_mode {
            BindingMode::Bindless => TextureBinder::bindless(
                &device,
                textures.placeholder().view.clone(),
                settings.bindless_table_size,
            ),
            _ => TextureBinder::cached_sets(&device),
        };

        let frame_layout = create_frame_layout(&device);
        let pipelines = PipelineSet::new(&device, &frame_layout, binder.layout(), binding_mode);
        let frame_resources = FrameResources::new(&device);

        let (blit_pipeline, blit_bind_group) =
            create_blit_pipeline(&device, surface_format, &targets.color_view);

        let segment_count = settings.segment_count();
        let ring = GeometryRing::new(
            settings.vertex_capacity,
            settings.index_capacity,
            segment_count,
        );
        let ring_buffers = RingBuffers::new(
            &device,
            settings.vertex_capacity,
            settings.index_capacity,
            segment_count,
        );

        tracing::info!(
            "render device ready: {}x{} game target, {} frames in flight, {:?} binding",
            settings.game_width,
            settings.game_height,
            settings.frames_in_flight,
            binding_mode,
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            settings,
            targets,
            blit_pipeline,
            blit_bind_group,
            pipelines,
            binding_mode,
            binder,
            frame_layout,
            frame_resources,
            textures,
            ring,
            ring_buffers,
            batches: BatchQueue::new(),
            hits: HitStack::new(),
            diag: DiagLog::new(),
            stats: FrameStats::default(),
            frame_index: 0,
            frame_open: false,
            inputs: FrameInputs::default(),
            touched_segments: Vec::new(),
            in_flight: VecDeque::new(),
        })
    }

    /// Blocking wrapper for sync contexts.
    pub fn new_blocking(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        settings: &RenderSettings,
    ) -> Result<Self, RenderError> {
        pollster::block_on(Self::new(target, width, height, settings))
    }
}

/// Resolve the requested binding strategy against adapter features.
fn resolve_binding_mode(requested: BindingMode, adapter: &wgpu::Adapter) -> BindingMode {
    let features = adapter.features();
    let bindless_supported = features.contains(wgpu::Features::TEXTURE_BINDING_ARRAY)
        && features.contains(
            wgpu::Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING,
        );
    match requested {
        BindingMode::CachedSets => BindingMode::CachedSets,
        BindingMode::Bindless | BindingMode::Auto => {
            if bindless_supported {
                BindingMode::Bindless
            } else {
                if requested == BindingMode::Bindless {
                    tracing::warn!(
                        "adapter lacks binding-array features; falling back to cached sets"
                    );
                }
                BindingMode::CachedSets
            }
        }
    }
}

fn create_render_targets(device: &wgpu::Device, width: u32, height: u32) -> RenderTargets {
    let color_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Game Color Target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let hit_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Hit ID Target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: HIT_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let hit_view = hit_texture.create_view(&wgpu::TextureViewDescriptor::default());

    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Game Depth Target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

    RenderTargets {
        color_texture,
        color_view,
        hit_texture,
        hit_view,
        depth_texture,
        depth_view,
        width,
        height,
    }
}

fn create_blit_pipeline(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    color_view: &wgpu::TextureView,
) -> (wgpu::RenderPipeline, wgpu::BindGroup) {
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Blit Sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    });

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Blit Shader"),
        source: wgpu::ShaderSource::Wgsl(pipeline::shaders::BLIT_SOURCE.into()),
    });

    let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Blit Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Blit Bind Group"),
        layout: &layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(color_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Blit Pipeline Layout"),
        bind_group_layouts: &[&layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Blit Pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    });

    (pipeline, bind_group)
}
