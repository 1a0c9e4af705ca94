//! Tests for the texture upload codecs

use super::*;

fn test_palette() -> Vec<[u8; 4]> {
    let mut palette = vec![[0u8, 0, 0, 255]; 256];
    palette[0] = [10, 20, 30, 255];
    palette[1] = [255, 0, 0, 255];
    palette[2] = [0, 255, 0, 255];
    palette
}

#[test]
fn test_registry_is_total() {
    for format in [
        PixelFormat::P8,
        PixelFormat::Bgra8,
        PixelFormat::Rgba8,
        PixelFormat::Bc1,
        PixelFormat::Bc3,
    ] {
        assert!(Codec::for_format(format).is_some());
    }
}

#[test]
fn test_palette_expansion() {
    let palette = test_palette();
    let mip = SurfaceMip {
        width: 2,
        height: 1,
        data: &[1, 2],
    };
    let converted = Codec::PaletteExpand
        .convert_level(&mip, Some(&palette), false)
        .unwrap();
    assert_eq!(converted.data, [255, 0, 0, 255, 0, 255, 0, 255]);
    assert_eq!(converted.bytes_per_row, 8);
    assert_eq!(converted.rows, 1);
}

#[test]
fn test_masked_palette_forces_index_zero_transparent() {
    let palette = test_palette();
    let mip = SurfaceMip {
        width: 2,
        height: 1,
        data: &[0, 1],
    };
    let masked = Codec::PaletteExpand
        .convert_level(&mip, Some(&palette), true)
        .unwrap();
    assert_eq!(&masked.data[0..4], [0, 0, 0, 0]);
    assert_eq!(&masked.data[4..8], [255, 0, 0, 255]);

    // Unmasked keeps the palette's own entry 0
    let unmasked = Codec::PaletteExpand
        .convert_level(&mip, Some(&palette), false)
        .unwrap();
    assert_eq!(&unmasked.data[0..4], [10, 20, 30, 255]);
}

#[test]
fn test_missing_palette_degrades_to_grayscale() {
    let mip = SurfaceMip {
        width: 1,
        height: 1,
        data: &[77],
    };
    let converted = Codec::PaletteExpand.convert_level(&mip, None, false).unwrap();
    assert_eq!(converted.data, [77, 77, 77, 255]);
}

#[test]
fn test_bgra_swizzle() {
    let mip = SurfaceMip {
        width: 1,
        height: 1,
        data: &[1, 2, 3, 4], // B G R A
    };
    let converted = Codec::BgraSwizzle.convert_level(&mip, None, false).unwrap();
    assert_eq!(converted.data, [3, 2, 1, 4]);
}

#[test]
fn test_rgba_passthrough() {
    let source = [9u8, 8, 7, 6, 5, 4, 3, 2];
    let mip = SurfaceMip {
        width: 2,
        height: 1,
        data: &source,
    };
    let converted = Codec::RgbaCopy.convert_level(&mip, None, false).unwrap();
    assert_eq!(converted.data, source);
}

#[test]
fn test_bc1_block_layout() {
    // 8×8 = 2×2 blocks × 8 bytes
    let data = vec![0xABu8; 32];
    let mip = SurfaceMip {
        width: 8,
        height: 8,
        data: &data,
    };
    let converted = Codec::Bc1Blocks.convert_level(&mip, None, false).unwrap();
    assert_eq!(converted.bytes_per_row, 16);
    assert_eq!(converted.rows, 2);
    assert_eq!(converted.width, 8);
    assert_eq!(converted.height, 8);
}

#[test]
fn test_bc_sub_block_level_pads_to_one_block() {
    let data = vec![0u8; 16];
    let mip = SurfaceMip {
        width: 2,
        height: 2,
        data: &data,
    };
    let converted = Codec::Bc3Blocks.convert_level(&mip, None, false).unwrap();
    assert_eq!((converted.width, converted.height), (4, 4));
    assert_eq!(converted.bytes_per_row, 16);
    assert_eq!(converted.rows, 1);
}

#[test]
fn test_size_mismatch_is_an_error() {
    let mip = SurfaceMip {
        width: 4,
        height: 4,
        data: &[0u8; 3],
    };
    assert!(Codec::RgbaCopy.convert_level(&mip, None, false).is_err());
    assert!(Codec::Bc1Blocks.convert_level(&mip, None, false).is_err());
}

#[test]
fn test_dummy_mip_counts() {
    assert_eq!(dummy_mip_count(PixelFormat::Rgba8, 1, 1), 0);
    assert_eq!(dummy_mip_count(PixelFormat::Bc1, 8, 8), 0);
    assert_eq!(dummy_mip_count(PixelFormat::Bc1, 4, 4), 0);
    assert_eq!(dummy_mip_count(PixelFormat::Bc1, 2, 2), 1);
    assert_eq!(dummy_mip_count(PixelFormat::Bc3, 1, 1), 2);
    // Non-square: the narrow axis drives the count
    assert_eq!(dummy_mip_count(PixelFormat::Bc1, 8, 2), 1);
}

#[test]
fn test_rect_conversion_uncompressed() {
    // 4×2 P8 surface, update the right 2×1 corner of the top row
    let palette = test_palette();
    let mip = SurfaceMip {
        width: 4,
        height: 2,
        data: &[0, 0, 1, 2, 0, 0, 0, 0],
    };
    let (x, y, converted) = Codec::PaletteExpand
        .convert_rect(&mip, Some(&palette), false, 2, 0, 2, 1)
        .unwrap();
    assert_eq!((x, y), (2, 0));
    assert_eq!((converted.width, converted.height), (2, 1));
    assert_eq!(converted.data, [255, 0, 0, 255, 0, 255, 0, 255]);
}

#[test]
fn test_rect_conversion_clamps_to_level() {
    let data = vec![5u8; 4 * 4 * 4];
    let mip = SurfaceMip {
        width: 4,
        height: 4,
        data: &data,
    };
    let (x, y, converted) = Codec::RgbaCopy
        .convert_rect(&mip, None, false, 2, 2, 100, 100)
        .unwrap();
    assert_eq!((x, y), (2, 2));
    assert_eq!((converted.width, converted.height), (2, 2));
}

#[test]
fn test_rect_conversion_block_aligned() {
    // 8×8 BC1: rect (5,5,1,1) expands to the containing 4×4 block
    let mut data = vec![0u8; 32];
    // Second block row, second block = block index (1,1) → offset (1*2+1)*8
    data[24..32].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
    let mip = SurfaceMip {
        width: 8,
        height: 8,
        data: &data,
    };
    let (x, y, converted) = Codec::Bc1Blocks
        .convert_rect(&mip, None, false, 5, 5, 1, 1)
        .unwrap();
    assert_eq!((x, y), (4, 4));
    assert_eq!((converted.width, converted.height), (4, 4));
    assert_eq!(converted.data, [1, 2, 3, 4, 5, 6, 7, 8]);
}

#[test]
fn test_empty_rect_is_an_error() {
    let data = vec![0u8; 16];
    let mip = SurfaceMip {
        width: 2,
        height: 2,
        data: &data,
    };
    assert!(Codec::RgbaCopy
        .convert_rect(&mip, None, false, 2, 2, 1, 1)
        .is_err());
}
