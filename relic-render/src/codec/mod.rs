//! Texture upload codecs
//!
//! Per-format converters that repack authored texel data into the layout
//! `queue.write_texture` expects. The registry is a total match over
//! [`PixelFormat`]; a format without an entry is unsupported and degrades
//! to the placeholder texture upstream.

use anyhow::{bail, Result};

use relic_common::formats::PixelFormat;
use relic_common::surface::SurfaceMip;

#[cfg(test)]
mod tests;

/// One converted mip level (or sub-rectangle), ready for `write_texture`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub data: Vec<u8>,
    /// Bytes per physical row (block row for compressed formats)
    pub bytes_per_row: u32,
    /// Physical row count (block rows for compressed formats)
    pub rows: u32,
    /// Physical extent of the converted region
    pub width: u32,
    pub height: u32,
}

/// Upload codec for one source pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// P8 → RGBA8 via palette expansion
    PaletteExpand,
    /// BGRA8 → RGBA8 channel swizzle
    BgraSwizzle,
    /// RGBA8 passthrough
    RgbaCopy,
    /// BC1 block passthrough
    Bc1Blocks,
    /// BC3 block passthrough
    Bc3Blocks,
}

impl Codec {
    /// Registry lookup. Every format the device advertises support for has
    /// an entry here; `None` means the format is not drawable.
    pub fn for_format(format: PixelFormat) -> Option<Codec> {
        match format {
            PixelFormat::P8 => Some(Codec::PaletteExpand),
            PixelFormat::Bgra8 => Some(Codec::BgraSwizzle),
            PixelFormat::Rgba8 => Some(Codec::RgbaCopy),
            PixelFormat::Bc1 => Some(Codec::Bc1Blocks),
            PixelFormat::Bc3 => Some(Codec::Bc3Blocks),
        }
    }

    /// GPU texture format this codec produces.
    pub fn gpu_format(self) -> wgpu::TextureFormat {
        match self {
            Codec::PaletteExpand | Codec::BgraSwizzle | Codec::RgbaCopy => {
                wgpu::TextureFormat::Rgba8Unorm
            }
            Codec::Bc1Blocks => wgpu::TextureFormat::Bc1RgbaUnorm,
            Codec::Bc3Blocks => wgpu::TextureFormat::Bc3RgbaUnorm,
        }
    }

    /// Source format this codec consumes.
    fn source_format(self) -> PixelFormat {
        match self {
            Codec::PaletteExpand => PixelFormat::P8,
            Codec::BgraSwizzle => PixelFormat::Bgra8,
            Codec::RgbaCopy => PixelFormat::Rgba8,
            Codec::Bc1Blocks => PixelFormat::Bc1,
            Codec::Bc3Blocks => PixelFormat::Bc3,
        }
    }

    /// Convert one whole mip level.
    pub fn convert_level(
        self,
        mip: &SurfaceMip,
        palette: Option<&[[u8; 4]]>,
        masked: bool,
    ) -> Result<Converted> {
        let format = self.source_format();
        let expected = format.level_size_bytes(mip.width, mip.height);
        if mip.data.len() != expected {
            bail!(
                "level data size mismatch: expected {} bytes for {}x{} {:?}, got {}",
                expected,
                mip.width,
                mip.height,
                format,
                mip.data.len()
            );
        }

        match self {
            Codec::PaletteExpand => Ok(expand_palette(mip, palette, masked)),
            Codec::BgraSwizzle => Ok(swizzle_bgra(mip)),
            Codec::RgbaCopy => Ok(Converted {
                data: mip.data.to_vec(),
                bytes_per_row: mip.width * 4,
                rows: mip.height,
                width: mip.width,
                height: mip.height,
            }),
            Codec::Bc1Blocks | Codec::Bc3Blocks => {
                let (width, height) = format.physical_extent(mip.width, mip.height);
                let (bw, bh) = format.block_dim();
                Ok(Converted {
                    data: mip.data.to_vec(),
                    bytes_per_row: width / bw * format.bytes_per_block(),
                    rows: height / bh,
                    width,
                    height,
                })
            }
        }
    }

    /// Convert a sub-rectangle of a mip level. The rectangle is clamped to
    /// the level and, for compressed formats, expanded outward to whole
    /// blocks; the returned extent reflects the adjustment.
    pub fn convert_rect(
        self,
        mip: &SurfaceMip,
        palette: Option<&[[u8; 4]]>,
        masked: bool,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> Result<(u32, u32, Converted)> {
        let format = self.source_format();
        let expected = format.level_size_bytes(mip.width, mip.height);
        if mip.data.len() != expected {
            bail!(
                "level data size mismatch: expected {} bytes for {}x{} {:?}, got {}",
                expected,
                mip.width,
                mip.height,
                format,
                mip.data.len()
            );
        }

        let (bw, bh) = format.block_dim();
        let x0 = (x.min(mip.width) / bw) * bw;
        let y0 = (y.min(mip.height) / bh) * bh;
        let x1 = (x.saturating_add(w).min(mip.width)).div_ceil(bw) * bw;
        let y1 = (y.saturating_add(h).min(mip.height)).div_ceil(bh) * bh;
        if x1 <= x0 || y1 <= y0 {
            bail!("empty update rectangle");
        }
        let (rw, rh) = (x1 - x0, y1 - y0);

        let converted = match self {
            Codec::PaletteExpand => {
                let mut data = Vec::with_capacity((rw * rh * 4) as usize);
                let palette = palette.unwrap_or(&[]);
                for row in y0..y1 {
                    let start = (row * mip.width + x0) as usize;
                    for &index in &mip.data[start..start + rw as usize] {
                        data.extend_from_slice(&expand_entry(palette, index, masked));
                    }
                }
                Converted {
                    data,
                    bytes_per_row: rw * 4,
                    rows: rh,
                    width: rw,
                    height: rh,
                }
            }
            Codec::BgraSwizzle | Codec::RgbaCopy => {
                let swizzle = self == Codec::BgraSwizzle;
                let mut data = Vec::with_capacity((rw * rh * 4) as usize);
                for row in y0..y1 {
                    let start = ((row * mip.width + x0) * 4) as usize;
                    let src = &mip.data[start..start + (rw * 4) as usize];
                    if swizzle {
                        for texel in src.chunks_exact(4) {
                            data.extend_from_slice(&[texel[2], texel[1], texel[0], texel[3]]);
                        }
                    } else {
                        data.extend_from_slice(src);
                    }
                }
                Converted {
                    data,
                    bytes_per_row: rw * 4,
                    rows: rh,
                    width: rw,
                    height: rh,
                }
            }
            Codec::Bc1Blocks | Codec::Bc3Blocks => {
                let bpb = format.bytes_per_block() as usize;
                let blocks_per_src_row = mip.width.div_ceil(bw) as usize;
                let (bx0, bx1) = ((x0 / bw) as usize, (x1 / bw) as usize);
                let mut data = Vec::with_capacity((bx1 - bx0) * ((y1 - y0) / bh) as usize * bpb);
                for block_row in (y0 / bh)..(y1 / bh) {
                    let start = (block_row as usize * blocks_per_src_row + bx0) * bpb;
                    data.extend_from_slice(&mip.data[start..start + (bx1 - bx0) * bpb]);
                }
                Converted {
                    data,
                    bytes_per_row: (bx1 - bx0) as u32 * format.bytes_per_block(),
                    rows: rh / bh,
                    width: rw,
                    height: rh,
                }
            }
        };

        Ok((x0, y0, converted))
    }
}

/// Synthetic mip levels prepended so a block-compressed texture's base
/// level is never smaller than one block. The sampled view skips them.
pub fn dummy_mip_count(format: PixelFormat, top_width: u32, top_height: u32) -> u32 {
    if !format.is_compressed() {
        return 0;
    }
    let (bw, bh) = format.block_dim();
    let (mut w, mut h) = (top_width.max(1), top_height.max(1));
    let mut count = 0;
    while w < bw || h < bh {
        w *= 2;
        h *= 2;
        count += 1;
    }
    count
}

fn expand_entry(palette: &[[u8; 4]], index: u8, masked: bool) -> [u8; 4] {
    if masked && index == 0 {
        return [0, 0, 0, 0];
    }
    // Missing palette degrades to a grayscale ramp
    palette
        .get(index as usize)
        .copied()
        .unwrap_or([index, index, index, 255])
}

fn expand_palette(mip: &SurfaceMip, palette: Option<&[[u8; 4]]>, masked: bool) -> Converted {
    let palette = palette.unwrap_or(&[]);
    let mut data = Vec::with_capacity(mip.data.len() * 4);
    for &index in mip.data {
        data.extend_from_slice(&expand_entry(palette, index, masked));
    }
    Converted {
        data,
        bytes_per_row: mip.width * 4,
        rows: mip.height,
        width: mip.width,
        height: mip.height,
    }
}

fn swizzle_bgra(mip: &SurfaceMip) -> Converted {
    let mut data = Vec::with_capacity(mip.data.len());
    for texel in mip.data.chunks_exact(4) {
        data.extend_from_slice(&[texel[2], texel[1], texel[0], texel[3]]);
    }
    Converted {
        data,
        bytes_per_row: mip.width * 4,
        rows: mip.height,
        width: mip.width,
        height: mip.height,
    }
}
