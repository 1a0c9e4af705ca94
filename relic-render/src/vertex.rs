//! Frame vertex layout
//!
//! One vertex format serves every primitive class; unused UV sets stay
//! zero. The hit ID rides as a flat integer attribute so the fragment
//! stage can write it into the picking target unmodified.

use bytemuck::{Pod, Zeroable};

/// CPU-side vertex written into the geometry ring.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameVertex {
    pub position: [f32; 3],
    /// Hit-query ID (entry index + 1), 0 when untagged
    pub hit_id: u32,
    /// Vertex color, unorm8
    pub color: [u8; 4],
    /// Additive fog color, unorm8
    pub fog: [u8; 4],
    /// Base texture UV, normalized
    pub uv: [f32; 2],
    /// Lightmap UV
    pub uv_light: [f32; 2],
    /// Macro texture UV
    pub uv_macro: [f32; 2],
    /// Detail texture UV
    pub uv_detail: [f32; 2],
}

pub const VERTEX_STRIDE: u64 = std::mem::size_of::<FrameVertex>() as u64;

const ATTRIBUTES: [wgpu::VertexAttribute; 8] = wgpu::vertex_attr_array![
    0 => Float32x3,
    1 => Uint32,
    2 => Unorm8x4,
    3 => Unorm8x4,
    4 => Float32x2,
    5 => Float32x2,
    6 => Float32x2,
    7 => Float32x2,
];

/// Vertex buffer layout matching [`FrameVertex`]
pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

impl FrameVertex {
    /// An untagged, untextured vertex; draw helpers start from this and
    /// fill in what their primitive uses.
    pub fn blank() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_matches_attributes() {
        // position(12) + hit(4) + color(4) + fog(4) + 4 × uv(8)
        assert_eq!(VERTEX_STRIDE, 56);
        let last = ATTRIBUTES.last().unwrap();
        assert_eq!(last.offset + 8, VERTEX_STRIDE);
    }

    #[test]
    fn test_attribute_offsets_are_packed() {
        let mut expected = 0u64;
        for (attribute, size) in ATTRIBUTES.iter().zip([12u64, 4, 4, 4, 8, 8, 8, 8]) {
            assert_eq!(attribute.offset, expected);
            expected += size;
        }
    }
}
