//! Source pixel formats
//!
//! These are the texel layouts the engine's asset system hands to the
//! renderer. Block-compressed formats carry their block arithmetic here so
//! the upload path and the allocator agree on physical extents.

/// Pixel format of an engine-supplied surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit palettized (index-color), expanded against a 256-entry RGBA palette
    P8,
    /// 32-bit BGRA, swizzled to RGBA on upload
    Bgra8,
    /// 32-bit RGBA, uploaded as-is
    Rgba8,
    /// BC1 (DXT1) block compression, 8 bytes per 4×4 block
    Bc1,
    /// BC3 (DXT5) block compression, 16 bytes per 4×4 block
    Bc3,
}

impl PixelFormat {
    /// Texel dimensions of one compression block (1×1 for uncompressed formats)
    pub const fn block_dim(self) -> (u32, u32) {
        match self {
            PixelFormat::P8 | PixelFormat::Bgra8 | PixelFormat::Rgba8 => (1, 1),
            PixelFormat::Bc1 | PixelFormat::Bc3 => (4, 4),
        }
    }

    /// Bytes per block (per texel for uncompressed formats)
    pub const fn bytes_per_block(self) -> u32 {
        match self {
            PixelFormat::P8 => 1,
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Bc1 => 8,
            PixelFormat::Bc3 => 16,
        }
    }

    /// True for block-compressed formats
    pub const fn is_compressed(self) -> bool {
        matches!(self, PixelFormat::Bc1 | PixelFormat::Bc3)
    }

    /// True for index-color formats (the only formats that may be masked)
    pub const fn is_indexed(self) -> bool {
        matches!(self, PixelFormat::P8)
    }

    /// Source data size in bytes for one mip level of the given dimensions
    pub const fn level_size_bytes(self, width: u32, height: u32) -> usize {
        let (bw, bh) = self.block_dim();
        let blocks_x = width.div_ceil(bw);
        let blocks_y = height.div_ceil(bh);
        (blocks_x * blocks_y * self.bytes_per_block()) as usize
    }

    /// Dimensions rounded up to whole compression blocks
    pub const fn physical_extent(self, width: u32, height: u32) -> (u32, u32) {
        let (bw, bh) = self.block_dim();
        (width.div_ceil(bw) * bw, height.div_ceil(bh) * bh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_dims() {
        assert_eq!(PixelFormat::P8.block_dim(), (1, 1));
        assert_eq!(PixelFormat::Rgba8.block_dim(), (1, 1));
        assert_eq!(PixelFormat::Bc1.block_dim(), (4, 4));
        assert_eq!(PixelFormat::Bc3.block_dim(), (4, 4));
    }

    #[test]
    fn test_level_sizes() {
        // 8×8 P8 = 64 bytes, BGRA = 256 bytes
        assert_eq!(PixelFormat::P8.level_size_bytes(8, 8), 64);
        assert_eq!(PixelFormat::Bgra8.level_size_bytes(8, 8), 256);
        // 8×8 BC1 = 2×2 blocks × 8 bytes
        assert_eq!(PixelFormat::Bc1.level_size_bytes(8, 8), 32);
        // Sub-block levels still occupy one whole block
        assert_eq!(PixelFormat::Bc1.level_size_bytes(2, 2), 8);
        assert_eq!(PixelFormat::Bc3.level_size_bytes(1, 1), 16);
        // Non-multiple dimensions round up to whole blocks
        assert_eq!(PixelFormat::Bc1.level_size_bytes(6, 10), 2 * 3 * 8);
    }

    #[test]
    fn test_physical_extent() {
        assert_eq!(PixelFormat::Rgba8.physical_extent(5, 3), (5, 3));
        assert_eq!(PixelFormat::Bc1.physical_extent(5, 3), (8, 4));
        assert_eq!(PixelFormat::Bc3.physical_extent(4, 4), (4, 4));
        assert_eq!(PixelFormat::Bc1.physical_extent(1, 1), (4, 4));
    }

    #[test]
    fn test_masked_eligibility() {
        assert!(PixelFormat::P8.is_indexed());
        assert!(!PixelFormat::Bgra8.is_indexed());
        assert!(!PixelFormat::Bc1.is_indexed());
    }
}
