//! Immediate-mode draw calls
//!
//! Every entry point resolves its textures, normalizes the flag word,
//! feeds the batch coalescer, and writes fixed triangulation templates
//! into the geometry ring: triangle fans for surfaces and polygons,
//! two-triangle quads for tiles and points, index pairs for lines.
//!
//! Draws that do not fit the remaining ring segment force one flush and
//! segment advance; draws larger than a whole segment are dropped and
//! counted.

use glam::{Vec2, Vec3};

use relic_common::flags::{FLAG_MASKED, FLAG_RENDER_FOG};
use relic_common::packing::pack_color_rgba_unorm8;
use relic_common::surface::{FacetMapping, SurfaceDesc};

use crate::batch::{
    BatchData, BatchKey, BATCH_FLAG_DETAIL, BATCH_FLAG_LIGHTMAP, BATCH_FLAG_MACRO,
    BATCH_FLAG_SCREEN_SPACE,
};
use crate::geometry::ReserveError;
use crate::pipeline::BindKey;
use crate::state;
use crate::vertex::FrameVertex;

use super::RenderDevice;

/// A complex (BSP) surface draw: up to four texture layers sharing one
/// facet mapping, drawn as a set of convex polygons.
pub struct ComplexSurface<'a> {
    pub flags: u32,
    pub base: &'a SurfaceDesc<'a>,
    pub light_map: Option<&'a SurfaceDesc<'a>>,
    pub macro_texture: Option<&'a SurfaceDesc<'a>>,
    pub detail_texture: Option<&'a SurfaceDesc<'a>>,
    pub mapping: FacetMapping,
}

/// One vertex of a gouraud-shaded polygon. UVs are in texels.
#[derive(Debug, Clone, Copy)]
pub struct GouraudVertex {
    pub position: Vec3,
    pub uv: Vec2,
    pub color: [f32; 4],
    pub fog: [f32; 4],
}

/// Screen-space tile rectangle, in pixels; `z` is the depth written.
#[derive(Debug, Clone, Copy)]
pub struct TileRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub z: f32,
}

/// Tile source rectangle, in texels.
#[derive(Debug, Clone, Copy)]
pub struct TileUv {
    pub u: f32,
    pub v: f32,
    pub w: f32,
    pub h: f32,
}

/// Texture state captured per layer at draw time. Values are copied out
/// of the cache entry so no borrow outlives the call.
pub(crate) struct ResolvedLayer {
    id: u64,
    masked: bool,
    pan: [f32; 2],
    mult: [f32; 2],
    inv_size: [f32; 2],
    slot: u32,
    view: wgpu::TextureView,
}

/// Sampler mode for the lightmap layer: clamp + linear
const LIGHTMAP_MODE: u32 = 3;
/// Sampler mode for macro/detail layers: repeat + linear
const OVERLAY_MODE: u32 = 1;

fn splat_sampler(mode: u32) -> u8 {
    (mode | mode << 2 | mode << 4 | mode << 6) as u8
}

/// Per-layer sampler bits: base, lightmap, macro, detail.
fn layer_sampler_bits(base_mode: u32) -> u8 {
    (base_mode | LIGHTMAP_MODE << 2 | OVERLAY_MODE << 4 | OVERLAY_MODE << 6) as u8
}

impl RenderDevice {
    /// Resolve one texture layer through the cache and binder.
    pub(crate) fn resolve_layer(
        &mut self,
        desc: Option<&SurfaceDesc>,
        masked_hint: bool,
        mode: u32,
    ) -> ResolvedLayer {
        let texture = self.textures.get(
            &self.device,
            &self.queue,
            desc,
            masked_hint,
            &mut self.diag,
        );
        let slot = self.binder.slot_for(texture, mode);
        ResolvedLayer {
            id: texture.id,
            masked: texture.masked,
            pan: texture.pan,
            mult: texture.mult,
            inv_size: texture.inv_size,
            slot,
            view: texture.view.clone(),
        }
    }

    /// Cached-set bind index for a resolved layer set (0 under bindless).
    fn bind_for_layers(&mut self, layers: &[ResolvedLayer; 4], sampler_bits: u8) -> u32 {
        if self.binder.is_bindless() {
            return 0;
        }
        let mut masked_bits = 0u8;
        for (bit, layer) in layers.iter().enumerate() {
            if layer.masked {
                masked_bits |= 1 << bit;
            }
        }
        let key = BindKey {
            ids: [layers[0].id, layers[1].id, layers[2].id, layers[3].id],
            masked_bits,
            sampler_bits,
        };
        self.binder.bind_for(
            &self.device,
            key,
            [
                &layers[0].view,
                &layers[1].view,
                &layers[2].view,
                &layers[3].view,
            ],
        )
    }

    /// Ensure a reservation of this size can succeed, advancing the ring
    /// segment once if needed. Returns false when the draw must be
    /// dropped.
    fn prepare(&mut self, vertex_count: u32, index_count: u32) -> bool {
        match self.ring.reserve(vertex_count, index_count) {
            Ok(_) => true,
            Err(ReserveError::TooLarge) => {
                self.stats.dropped_primitives += 1;
                self.diag.report(
                    "primitive exceeds geometry ring capacity",
                    &format!(
                        "{vertex_count} vertices / {index_count} indices vs segment capacity {}/{}",
                        self.ring.vertex_capacity(),
                        self.ring.index_capacity()
                    ),
                );
                false
            }
            Err(ReserveError::NeedsAdvance) => {
                if !self.advance_segment() {
                    self.stats.dropped_primitives += 1;
                    return false;
                }
                self.ring.reserve(vertex_count, index_count).is_ok()
            }
        }
    }

    /// The blend-constant tint for states that use one: the vertex
    /// color's alpha as a lerp factor, replicated across channels.
    fn state_tint(state_index: usize, color: [f32; 4]) -> [u8; 4] {
        if state::state_desc(state_index).uses_blend_constant {
            let strength = pack_color_rgba_unorm8(color)[3];
            [strength; 4]
        } else {
            [0; 4]
        }
    }

    // =================================================================
    // DRAW CALLS
    // =================================================================

    /// Draw a complex surface: convex polygons fanned into triangles,
    /// textured by up to four layers through the facet mapping.
    pub fn draw_complex_surface(&mut self, surface: &ComplexSurface, polys: &[&[Vec3]]) {
        if !self.frame_open {
            return;
        }
        self.stats.draw_calls += 1;
        let flags = state::normalize(surface.flags);
        let base_mode = state::sampler_mode(flags);
        let masked_hint = flags & FLAG_MASKED != 0;

        let layers = [
            self.resolve_layer(Some(surface.base), masked_hint, base_mode),
            self.resolve_layer(surface.light_map, false, LIGHTMAP_MODE),
            self.resolve_layer(surface.macro_texture, false, OVERLAY_MODE),
            self.resolve_layer(surface.detail_texture, false, OVERLAY_MODE),
        ];
        let sampler_bits = layer_sampler_bits(base_mode);

        let mut batch_flags = 0;
        if surface.light_map.is_some() {
            batch_flags |= BATCH_FLAG_LIGHTMAP;
        }
        if surface.macro_texture.is_some() {
            batch_flags |= BATCH_FLAG_MACRO;
        }
        if surface.detail_texture.is_some() {
            batch_flags |= BATCH_FLAG_DETAIL;
        }

        let state_index = state::state_index(flags);
        let key = BatchKey {
            state_index: state_index as u8,
            lines: false,
            screen_space: false,
            textures: [layers[0].id, layers[1].id, layers[2].id, layers[3].id],
            sampler_bits,
            tint: [0; 4],
        };
        let data = BatchData {
            slots: [layers[0].slot, layers[1].slot, layers[2].slot, layers[3].slot],
            sampler_bits: sampler_bits as u32,
            flags: batch_flags,
            _pad: [0; 2],
        };
        let bind = self.bind_for_layers(&layers, sampler_bits);

        for points in polys {
            let vertex_count = points.len() as u32;
            if vertex_count < 3 {
                continue;
            }
            let index_count = (vertex_count - 2) * 3;
            if !self.prepare(vertex_count, index_count) {
                continue;
            }
            self.batches
                .set_state(key, data, bind, self.ring.segment(), self.ring.index_pos());
            let hit_id = self.hits.current_id();

            let Ok(reservation) = self.ring.reserve(vertex_count, index_count) else {
                continue;
            };
            for (vertex, point) in reservation.vertices.iter_mut().zip(points.iter()) {
                let plane = surface.mapping.uv_at(*point);
                *vertex = FrameVertex {
                    position: point.to_array(),
                    hit_id,
                    color: [255; 4],
                    fog: [0; 4],
                    uv: layer_uv(plane, &layers[0]),
                    uv_light: layer_uv(plane, &layers[1]),
                    uv_macro: layer_uv(plane, &layers[2]),
                    uv_detail: layer_uv(plane, &layers[3]),
                };
            }
            write_fan_indices(reservation.indices, reservation.base_vertex, vertex_count);
            self.ring.commit(vertex_count, index_count);
        }
    }

    /// Draw a gouraud-shaded polygon as a triangle fan. Fewer than three
    /// vertices is rejected without error.
    pub fn draw_gouraud_polygon(
        &mut self,
        texture: &SurfaceDesc,
        vertices: &[GouraudVertex],
        flags: u32,
    ) {
        if !self.frame_open {
            return;
        }
        self.stats.draw_calls += 1;
        let vertex_count = vertices.len() as u32;
        if vertex_count < 3 {
            return;
        }
        let flags = state::normalize(flags);
        let mode = state::sampler_mode(flags);
        let fog_on = flags & FLAG_RENDER_FOG != 0;

        let layers = [
            self.resolve_layer(Some(texture), flags & FLAG_MASKED != 0, mode),
            self.resolve_layer(None, false, mode),
            self.resolve_layer(None, false, mode),
            self.resolve_layer(None, false, mode),
        ];
        let sampler_bits = splat_sampler(mode);
        let state_index = state::state_index(flags);
        let tint = Self::state_tint(state_index, vertices[0].color);

        let key = BatchKey {
            state_index: state_index as u8,
            lines: false,
            screen_space: false,
            textures: [layers[0].id, 0, 0, 0],
            sampler_bits,
            tint,
        };
        let data = BatchData {
            slots: [layers[0].slot, layers[1].slot, layers[2].slot, layers[3].slot],
            sampler_bits: sampler_bits as u32,
            flags: 0,
            _pad: [0; 2],
        };
        let bind = self.bind_for_layers(&layers, sampler_bits);

        let index_count = (vertex_count - 2) * 3;
        if !self.prepare(vertex_count, index_count) {
            return;
        }
        self.batches
            .set_state(key, data, bind, self.ring.segment(), self.ring.index_pos());
        let hit_id = self.hits.current_id();

        let Ok(reservation) = self.ring.reserve(vertex_count, index_count) else {
            return;
        };
        let inv_size = layers[0].inv_size;
        for (out, v) in reservation.vertices.iter_mut().zip(vertices.iter()) {
            *out = FrameVertex {
                position: v.position.to_array(),
                hit_id,
                color: pack_color_rgba_unorm8(v.color),
                fog: if fog_on {
                    pack_color_rgba_unorm8(v.fog)
                } else {
                    [0; 4]
                },
                uv: [v.uv.x * inv_size[0], v.uv.y * inv_size[1]],
                uv_light: [0.0; 2],
                uv_macro: [0.0; 2],
                uv_detail: [0.0; 2],
            };
        }
        write_fan_indices(reservation.indices, reservation.base_vertex, vertex_count);
        self.ring.commit(vertex_count, index_count);
    }

    /// Draw a screen-space tile (sprite, HUD element, font glyph).
    pub fn draw_tile(
        &mut self,
        texture: Option<&SurfaceDesc>,
        rect: TileRect,
        uv: TileUv,
        color: [f32; 4],
        fog: [f32; 4],
        flags: u32,
    ) {
        if !self.frame_open {
            return;
        }
        self.stats.draw_calls += 1;
        let flags = state::normalize(flags);
        let mode = state::sampler_mode(flags);

        let layers = [
            self.resolve_layer(texture, flags & FLAG_MASKED != 0, mode),
            self.resolve_layer(None, false, mode),
            self.resolve_layer(None, false, mode),
            self.resolve_layer(None, false, mode),
        ];
        let sampler_bits = splat_sampler(mode);
        let state_index = state::state_index(flags);
        let tint = Self::state_tint(state_index, color);

        let key = BatchKey {
            state_index: state_index as u8,
            lines: false,
            screen_space: true,
            textures: [layers[0].id, 0, 0, 0],
            sampler_bits,
            tint,
        };
        let data = BatchData {
            slots: [layers[0].slot, layers[1].slot, layers[2].slot, layers[3].slot],
            sampler_bits: sampler_bits as u32,
            flags: BATCH_FLAG_SCREEN_SPACE,
            _pad: [0; 2],
        };
        let bind = self.bind_for_layers(&layers, sampler_bits);

        if !self.prepare(4, 6) {
            return;
        }
        self.batches
            .set_state(key, data, bind, self.ring.segment(), self.ring.index_pos());
        let hit_id = self.hits.current_id();

        let Ok(reservation) = self.ring.reserve(4, 6) else {
            return;
        };
        let packed_color = pack_color_rgba_unorm8(color);
        let packed_fog = if flags & FLAG_RENDER_FOG != 0 {
            pack_color_rgba_unorm8(fog)
        } else {
            [0; 4]
        };
        let inv_size = layers[0].inv_size;
        let (u0, v0) = (uv.u * inv_size[0], uv.v * inv_size[1]);
        let (u1, v1) = (
            (uv.u + uv.w) * inv_size[0],
            (uv.v + uv.h) * inv_size[1],
        );
        let corners = [
            ([rect.x, rect.y, rect.z], [u0, v0]),
            ([rect.x + rect.w, rect.y, rect.z], [u1, v0]),
            ([rect.x + rect.w, rect.y + rect.h, rect.z], [u1, v1]),
            ([rect.x, rect.y + rect.h, rect.z], [u0, v1]),
        ];
        for (vertex, (position, uv)) in reservation.vertices.iter_mut().zip(corners) {
            *vertex = FrameVertex {
                position,
                hit_id,
                color: packed_color,
                fog: packed_fog,
                uv,
                uv_light: [0.0; 2],
                uv_macro: [0.0; 2],
                uv_detail: [0.0; 2],
            };
        }
        write_quad_indices(reservation.indices, reservation.base_vertex);
        self.ring.commit(4, 6);
    }

    /// Draw a world-space line segment.
    pub fn draw_line_3d(&mut self, a: Vec3, b: Vec3, color: [f32; 4], flags: u32) {
        self.draw_line_internal(a.to_array(), b.to_array(), color, flags, false);
    }

    /// Draw a screen-space line segment; `z` is the depth written.
    pub fn draw_line_2d(&mut self, a: Vec2, b: Vec2, z: f32, color: [f32; 4], flags: u32) {
        self.draw_line_internal([a.x, a.y, z], [b.x, b.y, z], color, flags, true);
    }

    fn draw_line_internal(
        &mut self,
        a: [f32; 3],
        b: [f32; 3],
        color: [f32; 4],
        flags: u32,
        screen_space: bool,
    ) {
        if !self.frame_open {
            return;
        }
        self.stats.draw_calls += 1;
        let flags = state::normalize(flags);
        let mode = state::sampler_mode(flags);

        let layers = [
            self.resolve_layer(None, false, mode),
            self.resolve_layer(None, false, mode),
            self.resolve_layer(None, false, mode),
            self.resolve_layer(None, false, mode),
        ];
        let sampler_bits = splat_sampler(mode);
        let state_index = state::state_index(flags);
        let tint = Self::state_tint(state_index, color);

        let key = BatchKey {
            state_index: state_index as u8,
            lines: true,
            screen_space,
            textures: [0; 4],
            sampler_bits,
            tint,
        };
        let data = BatchData {
            slots: [layers[0].slot, layers[1].slot, layers[2].slot, layers[3].slot],
            sampler_bits: sampler_bits as u32,
            flags: if screen_space {
                BATCH_FLAG_SCREEN_SPACE
            } else {
                0
            },
            _pad: [0; 2],
        };
        let bind = self.bind_for_layers(&layers, sampler_bits);

        if !self.prepare(2, 2) {
            return;
        }
        self.batches
            .set_state(key, data, bind, self.ring.segment(), self.ring.index_pos());
        let hit_id = self.hits.current_id();

        let Ok(reservation) = self.ring.reserve(2, 2) else {
            return;
        };
        let packed_color = pack_color_rgba_unorm8(color);
        for (vertex, position) in reservation.vertices.iter_mut().zip([a, b]) {
            *vertex = FrameVertex {
                position,
                hit_id,
                color: packed_color,
                fog: [0; 4],
                uv: [0.0; 2],
                uv_light: [0.0; 2],
                uv_macro: [0.0; 2],
                uv_detail: [0.0; 2],
            };
        }
        reservation.indices[0] = reservation.base_vertex;
        reservation.indices[1] = reservation.base_vertex + 1;
        self.ring.commit(2, 2);
    }

    /// Draw a screen-space point as an axis-aligned quad spanning
    /// `(x1, y1)`-`(x2, y2)`.
    pub fn draw_point_2d(
        &mut self,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        z: f32,
        color: [f32; 4],
        flags: u32,
    ) {
        self.draw_tile(
            None,
            TileRect {
                x: x1,
                y: y1,
                w: x2 - x1,
                h: y2 - y1,
                z,
            },
            TileUv {
                u: 0.0,
                v: 0.0,
                w: 1.0,
                h: 1.0,
            },
            color,
            [0.0; 4],
            flags,
        );
    }

    /// Full-screen flash and fog overlays, applied through the ordinary
    /// tile path at the end of the frame so readbacks observe them.
    pub(crate) fn apply_screen_overlays(&mut self) {
        let (w, h) = (self.targets.width as f32, self.targets.height as f32);
        let rect = TileRect {
            x: 0.0,
            y: 0.0,
            w,
            h,
            z: 0.0,
        };
        let uv = TileUv {
            u: 0.0,
            v: 0.0,
            w: 1.0,
            h: 1.0,
        };
        let fog = self.inputs.fog_tint;
        if fog[3] > 0.0 {
            self.draw_tile(
                None,
                rect,
                uv,
                [fog[0], fog[1], fog[2], 1.0],
                [0.0; 4],
                relic_common::flags::FLAG_TRANSLUCENT,
            );
        }
        let flash = self.inputs.flash_tint;
        if flash[3] > 0.0 {
            self.draw_tile(
                None,
                rect,
                uv,
                flash,
                [0.0; 4],
                relic_common::flags::FLAG_HIGHLIGHTED,
            );
        }
    }
}

/// Normalize a texture-plane coordinate for one layer.
fn layer_uv(plane: Vec2, layer: &ResolvedLayer) -> [f32; 2] {
    [
        (plane.x - layer.pan[0]) * layer.mult[0],
        (plane.y - layer.pan[1]) * layer.mult[1],
    ]
}

/// Triangle-fan index template: (0, i+1, i+2) per triangle.
fn write_fan_indices(indices: &mut [u32], base_vertex: u32, vertex_count: u32) {
    for triangle in 0..vertex_count.saturating_sub(2) {
        let slot = (triangle * 3) as usize;
        indices[slot] = base_vertex;
        indices[slot + 1] = base_vertex + triangle + 1;
        indices[slot + 2] = base_vertex + triangle + 2;
    }
}

/// Two-triangle quad index template.
fn write_quad_indices(indices: &mut [u32], base_vertex: u32) {
    indices.copy_from_slice(&[
        base_vertex,
        base_vertex + 1,
        base_vertex + 2,
        base_vertex,
        base_vertex + 2,
        base_vertex + 3,
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_indices() {
        let mut indices = [0u32; 9];
        write_fan_indices(&mut indices, 10, 5);
        assert_eq!(indices, [10, 11, 12, 10, 12, 13, 10, 13, 14]);
    }

    #[test]
    fn test_fan_indices_degenerate() {
        let mut indices: [u32; 0] = [];
        write_fan_indices(&mut indices, 0, 2);
    }

    #[test]
    fn test_quad_indices() {
        let mut indices = [0u32; 6];
        write_quad_indices(&mut indices, 4);
        assert_eq!(indices, [4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn test_sampler_splat() {
        assert_eq!(splat_sampler(0), 0);
        assert_eq!(splat_sampler(1), 0b01010101);
        assert_eq!(splat_sampler(3), 0b11111111);
    }

    #[test]
    fn test_layer_sampler_bits() {
        // Base nearest-repeat, lightmap clamp-linear, overlays linear-repeat
        assert_eq!(layer_sampler_bits(0), 0b01_01_11_00);
    }
}
