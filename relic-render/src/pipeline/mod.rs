//! Pipeline and descriptor state caches
//!
//! Every state-table entry compiles to two pipelines (triangle list and
//! line list), all built eagerly at device creation; lookup at draw time
//! is a direct array index, never a hash probe or a pipeline build.

mod binding;
pub mod shaders;

#[cfg(test)]
mod tests;

pub use binding::{BindKey, TextureBinder};

use crate::settings::BindingMode;
use crate::state::{state_desc, STATE_COUNT};
use crate::vertex::vertex_layout;

/// Format of the offscreen color target
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
/// Format of the integer hit-ID target
pub const HIT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Uint;
/// Format of the depth target
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Create the group 0 layout shared by every world pipeline: frame
/// globals, the per-batch data array, and the four static samplers.
pub fn create_frame_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Frame Bind Group Layout"),
        entries: &[
            // Binding 0: frame globals (projection, screen size)
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Binding 1: per-batch data array, indexed by instance index
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            // Bindings 2-5: repeat/clamp × nearest/linear samplers
            sampler_entry(2),
            sampler_entry(3),
            sampler_entry(4),
            sampler_entry(5),
        ],
    })
}

/// The full precompiled pipeline table.
pub struct PipelineSet {
    pipelines: Vec<wgpu::RenderPipeline>,
}

impl PipelineSet {
    /// Build all `STATE_COUNT` × {triangles, lines} pipelines.
    pub fn new(
        device: &wgpu::Device,
        frame_layout: &wgpu::BindGroupLayout,
        texture_layout: &wgpu::BindGroupLayout,
        binding_mode: BindingMode,
    ) -> Self {
        let source = shaders::world_shader_source(binding_mode);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("World Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("World Pipeline Layout"),
            bind_group_layouts: &[frame_layout, texture_layout],
            push_constant_ranges: &[],
        });

        tracing::info!(
            "building {} world pipelines ({:?} binding)",
            STATE_COUNT * 2,
            binding_mode
        );

        let mut pipelines = Vec::with_capacity(STATE_COUNT * 2);
        for state in 0..STATE_COUNT {
            for lines in [false, true] {
                pipelines.push(create_world_pipeline(
                    device, &module, &layout, state, lines,
                ));
            }
        }
        Self { pipelines }
    }

    /// Direct-index lookup; `state` must come from
    /// [`crate::state::state_index`].
    pub fn get(&self, state: usize, lines: bool) -> &wgpu::RenderPipeline {
        &self.pipelines[state * 2 + lines as usize]
    }

    /// Flat table position for replay's pipeline-change elision.
    pub fn table_index(state: usize, lines: bool) -> usize {
        state * 2 + lines as usize
    }
}

fn create_world_pipeline(
    device: &wgpu::Device,
    module: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    state: usize,
    lines: bool,
) -> wgpu::RenderPipeline {
    let desc = state_desc(state);
    let fragment_entry = if desc.masked { "fs_masked" } else { "fs_main" };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!(
            "World Pipeline {}{}",
            state,
            if lines { " Lines" } else { "" }
        )),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers: &[vertex_layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            targets: &[
                Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: desc.blend,
                    write_mask: desc.color_writes,
                }),
                // The hit-ID target is written even by invisible draws
                Some(wgpu::ColorTargetState {
                    format: HIT_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                }),
            ],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: if lines {
                wgpu::PrimitiveTopology::LineList
            } else {
                wgpu::PrimitiveTopology::TriangleList
            },
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: desc.depth_write,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}
