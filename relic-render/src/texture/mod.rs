//! Texture cache and upload pipeline
//!
//! Maps engine surface identities to GPU-resident textures, uploading on
//! first reference and re-uploading in place when the surface reports a
//! change. Masked and unmasked variants of the same surface are distinct
//! cache entries because their expanded texel data differs.
//!
//! Uploads go through `queue.write_texture`, which wgpu orders before any
//! subsequently submitted command buffer; that ordering is what guarantees
//! a frame's uploads complete before its draws sample them.

use anyhow::{Context, Result};
use hashbrown::hash_map::Entry;
use hashbrown::HashMap;

use relic_common::formats::PixelFormat;
use relic_common::surface::{SurfaceDesc, SurfaceMip};

use crate::codec::{dummy_mip_count, Codec};
use crate::diag::DiagLog;

#[cfg(test)]
mod tests;

/// Sampler mode count: (repeat | clamp) × (nearest | linear)
pub const SAMPLER_MODE_COUNT: usize = 4;

/// One GPU-resident texture bound to one (surface, maskedness) pair.
pub struct CachedTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    /// Bindless table slot per sampler mode, assigned on first use
    pub slots: [Option<u32>; SAMPLER_MODE_COUNT],
    /// Synthetic leading mip levels the sampled view skips
    pub dummy_mips: u32,
    /// UV pan in texture-plane units (complex-surface path)
    pub pan: [f32; 2],
    /// Texture-plane units to normalized UV (complex-surface path)
    pub mult: [f32; 2],
    /// Texels to normalized UV (tile/polygon path)
    pub inv_size: [f32; 2],
    pub id: u64,
    pub masked: bool,
    /// In-place re-uploads performed on this entry
    pub realtime_changes: u64,
    change_serial: u64,
    size_bytes: usize,
}

/// Masked rendering is only meaningful for index-color formats; within
/// those, the surface's own policy can force it on.
pub fn resolve_masked(format: PixelFormat, masked_policy: bool, hint: bool) -> bool {
    if !format.is_indexed() {
        return false;
    }
    hint || masked_policy
}

/// Derive the cached UV transform from a surface's metadata.
///
/// `pan`/`mult` map texture-plane units (facet mapping output) to
/// normalized UV; `inv_size` maps plain texel coordinates.
pub fn uv_transform(desc: &SurfaceDesc, top: &SurfaceMip) -> ([f32; 2], [f32; 2], [f32; 2]) {
    let u_scale = if desc.u_scale != 0.0 { desc.u_scale } else { 1.0 };
    let v_scale = if desc.v_scale != 0.0 { desc.v_scale } else { 1.0 };
    let (w, h) = (top.width.max(1) as f32, top.height.max(1) as f32);
    let pan = [desc.u_pan * u_scale, desc.v_pan * v_scale];
    let mult = [1.0 / (u_scale * w), 1.0 / (v_scale * h)];
    let inv_size = [1.0 / w, 1.0 / h];
    (pan, mult, inv_size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastLookup {
    id: u64,
    masked: bool,
    serial: u64,
}

/// Owns every cached texture plus the shared 1×1 white placeholder.
pub struct TextureCache {
    unmasked: HashMap<u64, CachedTexture>,
    masked: HashMap<u64, CachedTexture>,
    placeholder: CachedTexture,
    /// One-entry memo short-circuiting repeated lookups of the same surface
    last_lookup: Option<LastLookup>,
    max_dimension: u32,
    vram_used: usize,
    upload_count: u32,
    upload_bytes: u64,
}

impl TextureCache {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            unmasked: HashMap::new(),
            masked: HashMap::new(),
            placeholder: create_placeholder(device, queue),
            last_lookup: None,
            max_dimension: device.limits().max_texture_dimension_2d,
            vram_used: 0,
            upload_count: 0,
            upload_bytes: 0,
        }
    }

    /// Look up (and if needed create or refresh) the texture for a
    /// surface. Never fails: a missing descriptor, an unsupported format,
    /// an oversized surface, or a conversion error all yield the shared
    /// placeholder.
    pub fn get(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        desc: Option<&SurfaceDesc>,
        masked_hint: bool,
        diag: &mut DiagLog,
    ) -> &mut CachedTexture {
        let Some(desc) = desc else {
            return &mut self.placeholder;
        };
        let Some(top) = desc.top_mip() else {
            diag.report("surface without mip data", &format!("surface {:#x}", desc.id));
            return &mut self.placeholder;
        };
        let Some(codec) = Codec::for_format(desc.format) else {
            diag.report(
                "unsupported pixel format",
                &format!("surface {:#x} format {:?}", desc.id, desc.format),
            );
            return &mut self.placeholder;
        };
        if top.width > self.max_dimension || top.height > self.max_dimension {
            diag.report(
                "surface exceeds device texture limit",
                &format!(
                    "surface {:#x} is {}x{}, limit {}",
                    desc.id, top.width, top.height, self.max_dimension
                ),
            );
            return &mut self.placeholder;
        }

        let masked = resolve_masked(desc.format, desc.masked_policy, masked_hint);

        // Repeated draws of the same clean surface skip revalidation.
        let memo = LastLookup {
            id: desc.id,
            masked,
            serial: desc.change_serial,
        };
        let fresh = self.last_lookup == Some(memo);
        self.last_lookup = Some(memo);

        let (map, vram_used) = if masked {
            (&mut self.masked, &mut self.vram_used)
        } else {
            (&mut self.unmasked, &mut self.vram_used)
        };

        let entry = match map.entry(desc.id) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                match create_entry(device, queue, codec, desc, masked) {
                    Ok(created) => {
                        *vram_used += created.size_bytes;
                        self.upload_count += 1;
                        self.upload_bytes += created.size_bytes as u64;
                        tracing::debug!(
                            "cached surface {:#x} ({}x{} {:?}, masked={}), VRAM {} bytes",
                            desc.id,
                            top.width,
                            top.height,
                            desc.format,
                            masked,
                            *vram_used,
                        );
                        slot.insert(created)
                    }
                    Err(error) => {
                        diag.report("texture upload failed", &format!("{error:#}"));
                        return &mut self.placeholder;
                    }
                }
            }
        };

        if !fresh && entry.change_serial != desc.change_serial {
            match upload_levels(queue, &entry.texture, codec, desc, masked, entry.dummy_mips) {
                Ok(bytes) => {
                    entry.change_serial = desc.change_serial;
                    entry.realtime_changes += 1;
                    self.upload_count += 1;
                    self.upload_bytes += bytes;
                }
                Err(error) => {
                    diag.report("texture re-upload failed", &format!("{error:#}"));
                }
            }
        }

        entry
    }

    /// Re-upload a sub-rectangle of a surface's top authored mip,
    /// bypassing the change-serial check. Both maskedness variants are
    /// refreshed if cached.
    pub fn update_rect(
        &mut self,
        queue: &wgpu::Queue,
        desc: &SurfaceDesc,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        diag: &mut DiagLog,
    ) {
        let Some(top) = desc.top_mip() else {
            return;
        };
        let Some(codec) = Codec::for_format(desc.format) else {
            return;
        };
        for map in [&mut self.unmasked, &mut self.masked] {
            let Some(entry) = map.get_mut(&desc.id) else {
                continue;
            };
            match codec.convert_rect(top, desc.palette, entry.masked, x, y, w, h) {
                Ok((x0, y0, converted)) => {
                    queue.write_texture(
                        wgpu::TexelCopyTextureInfo {
                            texture: &entry.texture,
                            mip_level: entry.dummy_mips,
                            origin: wgpu::Origin3d { x: x0, y: y0, z: 0 },
                            aspect: wgpu::TextureAspect::All,
                        },
                        &converted.data,
                        wgpu::TexelCopyBufferLayout {
                            offset: 0,
                            bytes_per_row: Some(converted.bytes_per_row),
                            rows_per_image: Some(converted.rows),
                        },
                        wgpu::Extent3d {
                            width: converted.width,
                            height: converted.height,
                            depth_or_array_layers: 1,
                        },
                    );
                    entry.realtime_changes += 1;
                    self.upload_count += 1;
                    self.upload_bytes += converted.data.len() as u64;
                }
                Err(error) => {
                    diag.report("texture rect update failed", &format!("{error:#}"));
                }
            }
        }
    }

    /// True when the device can draw surfaces of this format.
    pub fn supports_format(&self, format: PixelFormat) -> bool {
        Codec::for_format(format).is_some()
    }

    /// Drop every cached entry (level change, mode change). Bindless
    /// slots die with the entries; the caller resets the binder table.
    pub fn clear(&mut self) {
        let dropped = self.unmasked.len() + self.masked.len();
        self.unmasked.clear();
        self.masked.clear();
        self.last_lookup = None;
        tracing::debug!(
            "cleared texture cache: {} entries, {} bytes released",
            dropped,
            self.vram_used
        );
        self.vram_used = 0;
        self.placeholder.slots = [None; SAMPLER_MODE_COUNT];
    }

    /// The shared 1×1 white fallback texture.
    pub fn placeholder(&mut self) -> &mut CachedTexture {
        &mut self.placeholder
    }

    pub fn vram_used(&self) -> usize {
        self.vram_used
    }

    /// Drain the per-frame upload counters into the frame stats.
    pub fn take_upload_stats(&mut self) -> (u32, u64) {
        let stats = (self.upload_count, self.upload_bytes);
        self.upload_count = 0;
        self.upload_bytes = 0;
        stats
    }

    /// Number of live cache entries across both maps.
    pub fn entry_count(&self) -> usize {
        self.unmasked.len() + self.masked.len()
    }
}

/// Allocate GPU storage for a surface and upload its mip chain.
///
/// Block-compressed surfaces whose top mip is smaller than one block get
/// 1-2 zeroed leading mips so the base level satisfies the block-size
/// constraint; the sampled view starts past them.
fn create_entry(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    codec: Codec,
    desc: &SurfaceDesc,
    masked: bool,
) -> Result<CachedTexture> {
    let top = desc.top_mip().context("surface without mip data")?;
    let dummy_mips = dummy_mip_count(desc.format, top.width, top.height);
    let (base_w, base_h) = desc
        .format
        .physical_extent(top.width << dummy_mips, top.height << dummy_mips);
    let mip_count = dummy_mips + desc.mips.len() as u32;

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Surface Texture"),
        size: wgpu::Extent3d {
            width: base_w,
            height: base_h,
            depth_or_array_layers: 1,
        },
        mip_level_count: mip_count,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: codec.gpu_format(),
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    let size_bytes = upload_levels(queue, &texture, codec, desc, masked, dummy_mips)? as usize;

    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("Surface View"),
        base_mip_level: dummy_mips,
        mip_level_count: Some(mip_count - dummy_mips),
        ..Default::default()
    });

    let (pan, mult, inv_size) = uv_transform(desc, top);

    Ok(CachedTexture {
        texture,
        view,
        slots: [None; SAMPLER_MODE_COUNT],
        dummy_mips,
        pan,
        mult,
        inv_size,
        id: desc.id,
        masked,
        realtime_changes: 0,
        change_serial: desc.change_serial,
        size_bytes,
    })
}

/// Convert and upload every authored level; returns the converted bytes.
fn upload_levels(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    codec: Codec,
    desc: &SurfaceDesc,
    masked: bool,
    dummy_mips: u32,
) -> Result<u64> {
    let mut total = 0u64;
    for (level, mip) in desc.mips.iter().enumerate() {
        let converted = codec
            .convert_level(mip, desc.palette, masked)
            .with_context(|| format!("level {level} of surface {:#x}", desc.id))?;
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: dummy_mips + level as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &converted.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(converted.bytes_per_row),
                rows_per_image: Some(converted.rows),
            },
            wgpu::Extent3d {
                width: converted.width,
                height: converted.height,
                depth_or_array_layers: 1,
            },
        );
        total += converted.data.len() as u64;
    }
    Ok(total)
}

/// 1×1 opaque white stand-in for null or failed surfaces.
fn create_placeholder(device: &wgpu::Device, queue: &wgpu::Queue) -> CachedTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Placeholder Texture"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255, 255, 255, 255],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    CachedTexture {
        texture,
        view,
        slots: [None; SAMPLER_MODE_COUNT],
        dummy_mips: 0,
        pan: [0.0, 0.0],
        mult: [1.0, 1.0],
        inv_size: [1.0, 1.0],
        id: 0,
        masked: false,
        realtime_changes: 0,
        change_serial: 0,
        size_bytes: 4,
    }
}
