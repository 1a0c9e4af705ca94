//! Per-draw render-state flags
//!
//! Every draw call carries a flag word combining one blend select with
//! modifier bits. The renderer normalizes mutually exclusive combinations
//! before mapping the word to a precompiled pipeline (see
//! `relic_render::state`).

/// Framebuffer blend: `out = src + dst * (1 - src)`
pub const FLAG_TRANSLUCENT: u32 = 1 << 0;
/// Framebuffer blend: `out = src * dst * 2`
pub const FLAG_MODULATED: u32 = 1 << 1;
/// Framebuffer blend against a caller-supplied constant tint instead of vertex color
pub const FLAG_HIGHLIGHTED: u32 = 1 << 2;
/// Alpha-test against the texture's transparent palette entry (index-color only)
pub const FLAG_MASKED: u32 = 1 << 3;
/// Suppress color output; the primitive still writes the hit-ID target
pub const FLAG_INVISIBLE: u32 = 1 << 4;
/// Write the depth buffer (implied for non-blended draws)
pub const FLAG_OCCLUDE: u32 = 1 << 5;
/// Nearest-neighbor filtering instead of bilinear
pub const FLAG_NO_SMOOTH: u32 = 1 << 6;
/// Clamp UVs at the texture edge instead of wrapping
pub const FLAG_CLAMP_UV: u32 = 1 << 7;
/// Screen-space font glyph state (alpha-blended, no depth write)
pub const FLAG_FONT_GLYPH: u32 = 1 << 8;
/// Add the per-vertex fog color after texturing
pub const FLAG_RENDER_FOG: u32 = 1 << 9;

/// All blend-select bits
pub const FLAG_BLEND_MASK: u32 = FLAG_TRANSLUCENT | FLAG_MODULATED | FLAG_HIGHLIGHTED;
