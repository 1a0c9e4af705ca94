//! Frame submission and GPU synchronization
//!
//! `unlock` drains the frame: close the open batch, upload the staged
//! geometry and per-batch data, replay the batch queue in one render pass
//! over the offscreen targets, blit to the window, submit, present, and
//! apply the frames-in-flight wait policy.
//!
//! Ordering relies on two wgpu guarantees: `queue.write_*` operations
//! complete before any subsequently submitted command buffer, and draws
//! within one command stream execute in submission order.

use bytemuck::{Pod, Zeroable};

use crate::batch::BatchEntry;
use crate::hit::read_id_region;
use crate::pipeline::PipelineSet;
use crate::state::state_desc;

use super::device::RenderDevice;

/// Group 0 uniform contents.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub(crate) struct Globals {
    pub proj: [[f32; 4]; 4],
    pub screen_size: [f32; 2],
    pub _pad: [f32; 2],
}

/// Initial per-batch data array capacity (entries)
const INITIAL_BATCH_CAPACITY: usize = 256;

/// Frame-global GPU resources: the globals uniform, the per-batch data
/// array, and the four static samplers.
pub(crate) struct FrameResources {
    globals_buffer: wgpu::Buffer,
    batch_buffer: wgpu::Buffer,
    batch_capacity: usize,
    samplers: [wgpu::Sampler; 4],
    /// Rebuilt only when the batch buffer is reallocated
    bind_group: Option<wgpu::BindGroup>,
}

impl FrameResources {
    pub fn new(device: &wgpu::Device) -> Self {
        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let batch_buffer = Self::create_batch_buffer(device, INITIAL_BATCH_CAPACITY);
        let sampler = |label, address_mode, filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: address_mode,
                address_mode_v: address_mode,
                address_mode_w: address_mode,
                mag_filter: filter,
                min_filter: filter,
                mipmap_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            })
        };
        let samplers = [
            sampler(
                "Sampler Repeat Nearest",
                wgpu::AddressMode::Repeat,
                wgpu::FilterMode::Nearest,
            ),
            sampler(
                "Sampler Repeat Linear",
                wgpu::AddressMode::Repeat,
                wgpu::FilterMode::Linear,
            ),
            sampler(
                "Sampler Clamp Nearest",
                wgpu::AddressMode::ClampToEdge,
                wgpu::FilterMode::Nearest,
            ),
            sampler(
                "Sampler Clamp Linear",
                wgpu::AddressMode::ClampToEdge,
                wgpu::FilterMode::Linear,
            ),
        ];
        Self {
            globals_buffer,
            batch_buffer,
            batch_capacity: INITIAL_BATCH_CAPACITY,
            samplers,
            bind_group: None,
        }
    }

    fn create_batch_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Batch Data"),
            size: (capacity * std::mem::size_of::<crate::batch::BatchData>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    pub fn upload_globals(&self, queue: &wgpu::Queue, globals: &Globals) {
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(globals));
    }

    /// Upload the frame's batch records, growing the array if needed.
    pub fn upload_batches(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &[crate::batch::BatchData],
    ) {
        if data.len() > self.batch_capacity {
            let mut capacity = self.batch_capacity * 2;
            while capacity < data.len() {
                capacity *= 2;
            }
            tracing::debug!(
                "growing batch data array: {} -> {} entries",
                self.batch_capacity,
                capacity
            );
            self.batch_buffer = Self::create_batch_buffer(device, capacity);
            self.batch_capacity = capacity;
            self.bind_group = None;
        }
        if !data.is_empty() {
            queue.write_buffer(&self.batch_buffer, 0, bytemuck::cast_slice(data));
        }
    }

    pub fn ensure_bind_group(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
    ) -> &wgpu::BindGroup {
        if self.bind_group.is_none() {
            self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Frame Bind Group"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: self.globals_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self.batch_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.samplers[0]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(&self.samplers[1]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::Sampler(&self.samplers[2]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::Sampler(&self.samplers[3]),
                    },
                ],
            }));
        }
        self.bind_group.as_ref().expect("frame bind group ensured")
    }
}

impl RenderDevice {
    /// End the frame: submit everything drawn since `lock`, optionally
    /// present, and resolve the hit probe if one was requested. A no-op
    /// returning `None` when no frame is open.
    pub fn unlock(&mut self, present: bool) -> Option<Vec<u8>> {
        if !self.frame_open {
            return None;
        }
        self.apply_screen_overlays();
        self.frame_open = false;
        self.frame_index += 1;

        self.batches.close(self.ring.index_pos());
        self.ring_buffers.upload_segment(&self.queue, &self.ring);

        let entries = self.batches.take();
        let batch_data: Vec<crate::batch::BatchData> =
            entries.iter().map(|entry| entry.data).collect();
        self.frame_resources
            .upload_batches(&self.device, &self.queue, &batch_data);
        self.frame_resources.upload_globals(
            &self.queue,
            &Globals {
                proj: self.inputs.projection.to_cols_array_2d(),
                screen_size: [self.targets.width as f32, self.targets.height as f32],
                _pad: [0.0; 2],
            },
        );

        let (uploads, upload_bytes) = self.textures.take_upload_stats();
        self.stats.texture_uploads += uploads;
        self.stats.upload_bytes += upload_bytes;
        self.stats.batches += entries.len() as u32;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        self.encode_world_pass(&mut encoder, &entries);

        let surface_texture = if present { self.acquire_surface() } else { None };
        if let Some(surface_texture) = &surface_texture {
            let view = surface_texture
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            self.blit_to_surface(&mut encoder, &view);
        }

        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.ring_buffers
            .record_submission(&self.touched_segments, submission.clone());
        if let Some(surface_texture) = surface_texture {
            surface_texture.present();
        }

        // Hit resolution is a synchronous readback of what was just drawn
        let hit_data = match self.inputs.hit_probe {
            Some(probe) => {
                let ids = read_id_region(
                    &self.device,
                    &self.queue,
                    &self.targets.hit_texture,
                    probe.x,
                    probe.y,
                    probe.width,
                    probe.height,
                );
                Some(self.hits.resolve(&ids).to_vec())
            }
            None => None,
        };

        self.apply_frame_wait(submission);
        self.stats.maybe_log(self.frame_index);
        hit_data
    }

    /// Flush pending batches and move the CPU cursor to the next ring
    /// segment. Returns false when every segment was already written this
    /// frame, in which case the caller drops its primitive.
    pub(crate) fn advance_segment(&mut self) -> bool {
        let next = self.ring.next_segment();
        if self.touched_segments.contains(&next) {
            self.diag.report(
                "geometry ring exhausted within one frame",
                "every segment already written; raise the ring capacities",
            );
            return false;
        }
        self.batches.close(self.ring.index_pos());
        self.ring_buffers.upload_segment(&self.queue, &self.ring);
        self.ring_buffers.wait_for_segment(&self.device, next);
        self.ring.advance();
        self.touched_segments.push(next);
        self.stats.segment_advances += 1;
        true
    }

    /// Replay the batch queue in one pass over the offscreen targets,
    /// eliding redundant pipeline, buffer, bind-group, and blend-constant
    /// changes.
    fn encode_world_pass(&mut self, encoder: &mut wgpu::CommandEncoder, entries: &[BatchEntry]) {
        // Bind groups must exist before the pass starts recording
        if self.binder.is_bindless() && !entries.is_empty() {
            let _ = self.binder.group_for(&self.device, 0);
        }
        let frame_bind_group = self
            .frame_resources
            .ensure_bind_group(&self.device, &self.frame_layout);

        let clear = self.inputs.clear_color;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("World Pass"),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0] as f64,
                            g: clear[1] as f64,
                            b: clear[2] as f64,
                            a: clear[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
                // Hit IDs clear to the reserved "no hit" value
                Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.hit_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if entries.is_empty() {
            return;
        }
        pass.set_bind_group(0, frame_bind_group, &[]);

        let mut bound_pipeline = None;
        let mut bound_segment = None;
        let mut bound_bind = None;
        let mut bound_constant = None;

        for (instance, entry) in entries.iter().enumerate() {
            let table = PipelineSet::table_index(entry.key.state_index as usize, entry.key.lines);
            if bound_pipeline != Some(table) {
                pass.set_pipeline(self.pipelines.get(entry.key.state_index as usize, entry.key.lines));
                bound_pipeline = Some(table);
            }
            if bound_segment != Some(entry.segment) {
                pass.set_vertex_buffer(
                    0,
                    self.ring_buffers
                        .vertex_buffer
                        .slice(self.ring_buffers.vertex_offset(entry.segment)..),
                );
                pass.set_index_buffer(
                    self.ring_buffers
                        .index_buffer
                        .slice(self.ring_buffers.index_offset(entry.segment)..),
                    wgpu::IndexFormat::Uint32,
                );
                bound_segment = Some(entry.segment);
            }
            // Bindless binds the shared table once; cached sets rebind
            // per distinct texture combination
            let bind = if self.binder.is_bindless() { 0 } else { entry.bind };
            if bound_bind != Some(bind) {
                pass.set_bind_group(1, self.binder.group_for(&self.device, bind), &[]);
                bound_bind = Some(bind);
            }
            if state_desc(entry.key.state_index as usize).uses_blend_constant
                && bound_constant != Some(entry.key.tint)
            {
                let [r, g, b, a] = entry.key.tint;
                pass.set_blend_constant(wgpu::Color {
                    r: r as f64 / 255.0,
                    g: g as f64 / 255.0,
                    b: b as f64 / 255.0,
                    a: a as f64 / 255.0,
                });
                bound_constant = Some(entry.key.tint);
            }
            pass.draw_indexed(
                entry.index_start..entry.index_end,
                0,
                instance as u32..instance as u32 + 1,
            );
        }
    }

    /// Scale the offscreen color target onto the window, letterboxed to
    /// preserve the game aspect ratio.
    fn blit_to_surface(&self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let render_width = self.targets.width as f32;
        let render_height = self.targets.height as f32;
        let window_width = self.config.width as f32;
        let window_height = self.config.height as f32;
        let scale = (window_width / render_width).min(window_height / render_height);
        let scaled_width = render_width * scale;
        let scaled_height = render_height * scale;
        let x = (window_width - scaled_width) / 2.0;
        let y = (window_height - scaled_height) / 2.0;

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Blit Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.blit_pipeline);
        pass.set_bind_group(0, &self.blit_bind_group, &[]);
        pass.set_viewport(x, y, scaled_width, scaled_height, 0.0, 1.0);
        pass.draw(0..3, 0..1);
    }

    /// Acquire the presentable surface image, recreating the swap chain
    /// and retrying once on a lost or outdated surface.
    fn acquire_surface(&mut self) -> Option<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(texture) => Some(texture),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated; reconfiguring swap chain");
                self.surface.configure(&self.device, &self.config);
                match self.surface.get_current_texture() {
                    Ok(texture) => Some(texture),
                    Err(error) => {
                        self.diag.report(
                            "surface acquire failed after reconfigure",
                            &error.to_string(),
                        );
                        None
                    }
                }
            }
            Err(error) => {
                self.diag.report("surface acquire failed", &error.to_string());
                None
            }
        }
    }

    /// Enforce the frames-in-flight bound. With the default of one frame
    /// in flight this blocks on the submission just made.
    fn apply_frame_wait(&mut self, submission: wgpu::SubmissionIndex) {
        self.in_flight.push_back(submission);
        while self.in_flight.len() >= self.settings.frames_in_flight.max(1) as usize {
            let Some(oldest) = self.in_flight.pop_front() else {
                break;
            };
            let _ = self.device.poll(wgpu::PollType::Wait {
                submission_index: Some(oldest),
                timeout: None,
            });
        }
    }

    /// Synchronous full-frame readback of the offscreen color target as
    /// tightly packed RGBA bytes.
    pub fn read_pixels(&self) -> Vec<u8> {
        let (width, height) = (self.targets.width, self.targets.height);
        let bytes_per_pixel = 4u32;
        let unpadded_bytes_per_row = width * bytes_per_pixel;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pixel Readback Staging"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Pixel Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.targets.color_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        if rx.recv().map(|result| result.is_err()).unwrap_or(true) {
            tracing::warn!("pixel readback mapping failed");
            return Vec::new();
        }

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((width * height * bytes_per_pixel) as usize);
        for row in 0..height {
            let start = (row * padded_bytes_per_row) as usize;
            pixels.extend_from_slice(&mapped[start..start + unpadded_bytes_per_row as usize]);
        }
        drop(mapped);
        staging.unmap();
        pixels
    }
}
