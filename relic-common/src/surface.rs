//! Surface descriptors
//!
//! A [`SurfaceDesc`] is the opaque texture-info record the simulation hands
//! to the renderer with each draw call. The renderer only interprets the
//! cache identity, the pixel data, and the UV metadata; everything else
//! about the asset stays on the engine side.

use glam::{Vec2, Vec3};

use crate::formats::PixelFormat;

/// One authored mip level of a surface.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceMip<'a> {
    pub width: u32,
    pub height: u32,
    /// Texel data in the surface's [`PixelFormat`]
    pub data: &'a [u8],
}

/// Engine-supplied texture descriptor, valid for the duration of one call.
///
/// `id` is the stable cache key; the renderer never inspects what it means.
/// `change_serial` increases whenever the engine rewrites the texel data,
/// which triggers an in-place re-upload on the next lookup.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceDesc<'a> {
    pub id: u64,
    pub format: PixelFormat,
    /// Mip chain, largest first; must not be empty for a drawable surface
    pub mips: &'a [SurfaceMip<'a>],
    /// 256-entry RGBA palette for index-color formats
    pub palette: Option<&'a [[u8; 4]]>,
    /// UV pan in texels
    pub u_pan: f32,
    pub v_pan: f32,
    /// World units per texel along each axis
    pub u_scale: f32,
    pub v_scale: f32,
    pub change_serial: u64,
    /// The texture asset's own policy forcing masked rendering on
    pub masked_policy: bool,
}

impl<'a> SurfaceDesc<'a> {
    /// The authored top mip, if any
    pub fn top_mip(&self) -> Option<&SurfaceMip<'a>> {
        self.mips.first()
    }
}

/// Texture-plane basis for a complex surface.
///
/// Maps a world-space point onto the surface's texture plane, yielding
/// texel coordinates that the renderer normalizes against the bound
/// texture's pan/scale metadata.
#[derive(Debug, Clone, Copy)]
pub struct FacetMapping {
    pub origin: Vec3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
    pub pan: Vec2,
}

impl FacetMapping {
    /// Project a world-space point to texel coordinates.
    pub fn uv_at(&self, point: Vec3) -> Vec2 {
        let rel = point - self.origin;
        Vec2::new(rel.dot(self.u_axis) - self.pan.x, rel.dot(self.v_axis) - self.pan.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_mapping_axis_projection() {
        let mapping = FacetMapping {
            origin: Vec3::new(10.0, 0.0, 0.0),
            u_axis: Vec3::X,
            v_axis: Vec3::Y,
            pan: Vec2::ZERO,
        };
        let uv = mapping.uv_at(Vec3::new(14.0, 3.0, 7.0));
        assert_eq!(uv, Vec2::new(4.0, 3.0));
    }

    #[test]
    fn test_facet_mapping_pan_offset() {
        let mapping = FacetMapping {
            origin: Vec3::ZERO,
            u_axis: Vec3::X,
            v_axis: Vec3::Z,
            pan: Vec2::new(16.0, -8.0),
        };
        let uv = mapping.uv_at(Vec3::new(16.0, 99.0, 0.0));
        assert_eq!(uv, Vec2::new(0.0, 8.0));
    }

    #[test]
    fn test_top_mip() {
        let mips = [
            SurfaceMip { width: 8, height: 8, data: &[] },
            SurfaceMip { width: 4, height: 4, data: &[] },
        ];
        let desc = SurfaceDesc {
            id: 1,
            format: PixelFormat::Rgba8,
            mips: &mips,
            palette: None,
            u_pan: 0.0,
            v_pan: 0.0,
            u_scale: 1.0,
            v_scale: 1.0,
            change_serial: 0,
            masked_policy: false,
        };
        assert_eq!(desc.top_mip().unwrap().width, 8);

        let empty = SurfaceDesc { mips: &[], ..desc };
        assert!(empty.top_mip().is_none());
    }
}
