//! Tests for the GPU-free texture cache logic

use super::*;

fn desc<'a>(format: PixelFormat, mips: &'a [SurfaceMip<'a>]) -> SurfaceDesc<'a> {
    SurfaceDesc {
        id: 0x1234,
        format,
        mips,
        palette: None,
        u_pan: 0.0,
        v_pan: 0.0,
        u_scale: 1.0,
        v_scale: 1.0,
        change_serial: 0,
        masked_policy: false,
    }
}

#[test]
fn test_masked_forced_off_for_non_indexed() {
    assert!(!resolve_masked(PixelFormat::Rgba8, true, true));
    assert!(!resolve_masked(PixelFormat::Bc1, true, true));
    assert!(!resolve_masked(PixelFormat::Bgra8, false, true));
}

#[test]
fn test_masked_follows_hint_for_indexed() {
    assert!(resolve_masked(PixelFormat::P8, false, true));
    assert!(!resolve_masked(PixelFormat::P8, false, false));
}

#[test]
fn test_masked_policy_forces_on() {
    assert!(resolve_masked(PixelFormat::P8, true, false));
}

#[test]
fn test_uv_transform_plain() {
    let mips = [SurfaceMip { width: 64, height: 32, data: &[] }];
    let d = desc(PixelFormat::Rgba8, &mips);
    let (pan, mult, inv_size) = uv_transform(&d, &mips[0]);
    assert_eq!(pan, [0.0, 0.0]);
    assert_eq!(mult, [1.0 / 64.0, 1.0 / 32.0]);
    assert_eq!(inv_size, [1.0 / 64.0, 1.0 / 32.0]);
}

#[test]
fn test_uv_transform_scale_and_pan() {
    let mips = [SurfaceMip { width: 16, height: 16, data: &[] }];
    let d = SurfaceDesc {
        u_pan: 8.0,
        v_pan: -4.0,
        u_scale: 2.0,
        v_scale: 0.5,
        ..desc(PixelFormat::Rgba8, &mips)
    };
    let (pan, mult, inv_size) = uv_transform(&d, &mips[0]);
    // Pan converts texels to plane units
    assert_eq!(pan, [16.0, -2.0]);
    assert_eq!(mult, [1.0 / 32.0, 1.0 / 8.0]);
    // Texel-space draws ignore the scale
    assert_eq!(inv_size, [1.0 / 16.0, 1.0 / 16.0]);
}

#[test]
fn test_uv_transform_zero_scale_does_not_blow_up() {
    let mips = [SurfaceMip { width: 8, height: 8, data: &[] }];
    let d = SurfaceDesc {
        u_scale: 0.0,
        v_scale: 0.0,
        ..desc(PixelFormat::Rgba8, &mips)
    };
    let (_, mult, _) = uv_transform(&d, &mips[0]);
    assert!(mult[0].is_finite());
    assert!(mult[1].is_finite());
}
