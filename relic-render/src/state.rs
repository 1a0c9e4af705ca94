//! Render-state normalization and the pipeline state table
//!
//! The draw-flag word maps onto a small table of precompiled pipelines.
//! Before the lookup, mutually exclusive flag combinations are normalized
//! so every caller-visible word lands on exactly one table entry:
//!
//! - blend selects are exclusive with priority translucent > modulated >
//!   highlighted
//! - translucent clears masked
//! - occlude is implied whenever no blending is requested
//!
//! The table has 32 entries for the 5-bit (blend, masked, occlude,
//! invisible) pattern plus one extra entry for screen-space font glyphs.

use relic_common::flags::*;

/// Number of state-table entries (32 flag patterns + the font glyph state)
pub const STATE_COUNT: usize = 33;

/// Table index of the screen-space font glyph state
pub const FONT_GLYPH_STATE: usize = 32;

/// Normalize mutually exclusive flag combinations.
pub fn normalize(mut flags: u32) -> u32 {
    if flags & FLAG_TRANSLUCENT != 0 {
        flags &= !(FLAG_MODULATED | FLAG_HIGHLIGHTED | FLAG_MASKED);
    } else if flags & FLAG_MODULATED != 0 {
        flags &= !FLAG_HIGHLIGHTED;
    }
    if flags & (FLAG_TRANSLUCENT | FLAG_MODULATED) == 0 {
        flags |= FLAG_OCCLUDE;
    }
    flags
}

/// Map a normalized flag word to its state-table index.
pub fn state_index(flags: u32) -> usize {
    if flags & FLAG_FONT_GLYPH != 0 {
        return FONT_GLYPH_STATE;
    }
    let blend = if flags & FLAG_TRANSLUCENT != 0 {
        1
    } else if flags & FLAG_MODULATED != 0 {
        2
    } else if flags & FLAG_HIGHLIGHTED != 0 {
        3
    } else {
        0
    };
    let mut index = blend;
    if flags & FLAG_MASKED != 0 {
        index |= 1 << 2;
    }
    if flags & FLAG_OCCLUDE != 0 {
        index |= 1 << 3;
    }
    if flags & FLAG_INVISIBLE != 0 {
        index |= 1 << 4;
    }
    index
}

/// Fixed-function state one table entry compiles into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateDesc {
    /// Blend state for the color target; `None` is opaque
    pub blend: Option<wgpu::BlendState>,
    /// Whether the entry writes the depth buffer
    pub depth_write: bool,
    /// Color-target write mask (empty for invisible draws; the hit-ID
    /// target is always written)
    pub color_writes: wgpu::ColorWrites,
    /// Whether the fragment stage alpha-tests against the texture
    pub masked: bool,
    /// Whether replay must set the blend constant from the batch tint
    pub uses_blend_constant: bool,
}

const BLEND_TRANSLUCENT: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrc,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent::REPLACE,
};

const BLEND_MODULATED: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Dst,
        dst_factor: wgpu::BlendFactor::Src,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent::REPLACE,
};

const BLEND_HIGHLIGHTED: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Constant,
        dst_factor: wgpu::BlendFactor::OneMinusConstant,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent::REPLACE,
};

const BLEND_FONT_GLYPH: wgpu::BlendState = wgpu::BlendState::ALPHA_BLENDING;

/// Decode a table index back into its fixed-function state.
pub fn state_desc(index: usize) -> StateDesc {
    if index == FONT_GLYPH_STATE {
        return StateDesc {
            blend: Some(BLEND_FONT_GLYPH),
            depth_write: false,
            color_writes: wgpu::ColorWrites::ALL,
            masked: false,
            uses_blend_constant: false,
        };
    }
    let blend_select = index & 3;
    let masked = index & (1 << 2) != 0;
    let occlude = index & (1 << 3) != 0;
    let invisible = index & (1 << 4) != 0;

    let (blend, uses_blend_constant) = match blend_select {
        1 => (Some(BLEND_TRANSLUCENT), false),
        2 => (Some(BLEND_MODULATED), false),
        3 => (Some(BLEND_HIGHLIGHTED), true),
        _ => (None, false),
    };

    StateDesc {
        blend,
        depth_write: occlude,
        color_writes: if invisible {
            wgpu::ColorWrites::empty()
        } else {
            wgpu::ColorWrites::ALL
        },
        masked,
        uses_blend_constant,
    }
}

/// Per-slot sampler mode bits matching the WGSL sampler switch:
/// bit 0 = linear filtering, bit 1 = clamp addressing.
pub fn sampler_mode(flags: u32) -> u32 {
    let mut mode = 0;
    if flags & FLAG_NO_SMOOTH == 0 {
        mode |= 1;
    }
    if flags & FLAG_CLAMP_UV != 0 {
        mode |= 2;
    }
    mode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occlude_implied_without_blend() {
        assert_ne!(normalize(0) & FLAG_OCCLUDE, 0);
        assert_ne!(normalize(FLAG_HIGHLIGHTED) & FLAG_OCCLUDE, 0);
        // Blended draws keep whatever the caller asked for
        assert_eq!(normalize(FLAG_TRANSLUCENT) & FLAG_OCCLUDE, 0);
        assert_eq!(normalize(FLAG_MODULATED) & FLAG_OCCLUDE, 0);
    }

    #[test]
    fn test_translucent_clears_masked() {
        let flags = normalize(FLAG_TRANSLUCENT | FLAG_MASKED);
        assert_eq!(flags & FLAG_MASKED, 0);
        assert_ne!(flags & FLAG_TRANSLUCENT, 0);
    }

    #[test]
    fn test_blend_priority() {
        let flags = normalize(FLAG_TRANSLUCENT | FLAG_MODULATED | FLAG_HIGHLIGHTED);
        assert_eq!(flags & FLAG_BLEND_MASK, FLAG_TRANSLUCENT);

        let flags = normalize(FLAG_MODULATED | FLAG_HIGHLIGHTED);
        assert_eq!(flags & FLAG_BLEND_MASK, FLAG_MODULATED);
    }

    #[test]
    fn test_state_index_stability() {
        // The same normalized word always maps to the same entry, and
        // distinct normalized words map to distinct entries.
        let flags = normalize(FLAG_MODULATED | FLAG_MASKED);
        assert_eq!(state_index(flags), state_index(flags));

        let mut seen = std::collections::HashSet::new();
        for word in 0..64u32 {
            let blend = word & 3;
            let flags = match blend {
                1 => FLAG_TRANSLUCENT,
                2 => FLAG_MODULATED,
                3 => FLAG_HIGHLIGHTED,
                _ => 0,
            } | if word & 4 != 0 { FLAG_MASKED } else { 0 }
                | if word & 8 != 0 { FLAG_OCCLUDE } else { 0 }
                | if word & 16 != 0 { FLAG_INVISIBLE } else { 0 };
            let index = state_index(flags);
            assert!(index < FONT_GLYPH_STATE);
            seen.insert(index);
        }
        assert_eq!(seen.len(), 32);
    }

    #[test]
    fn test_font_glyph_entry() {
        assert_eq!(state_index(FLAG_FONT_GLYPH | FLAG_OCCLUDE), FONT_GLYPH_STATE);
        let desc = state_desc(FONT_GLYPH_STATE);
        assert!(!desc.depth_write);
        assert_eq!(desc.blend, Some(wgpu::BlendState::ALPHA_BLENDING));
    }

    #[test]
    fn test_state_desc_decoding() {
        let opaque = state_desc(state_index(normalize(0)));
        assert!(opaque.blend.is_none());
        assert!(opaque.depth_write);
        assert!(!opaque.masked);

        let masked = state_desc(state_index(normalize(FLAG_MASKED)));
        assert!(masked.masked);

        let invisible = state_desc(state_index(normalize(FLAG_INVISIBLE)));
        assert_eq!(invisible.color_writes, wgpu::ColorWrites::empty());

        let highlight = state_desc(state_index(normalize(FLAG_HIGHLIGHTED)));
        assert!(highlight.uses_blend_constant);
    }

    #[test]
    fn test_sampler_mode_bits() {
        assert_eq!(sampler_mode(0), 1); // linear repeat by default
        assert_eq!(sampler_mode(FLAG_NO_SMOOTH), 0);
        assert_eq!(sampler_mode(FLAG_CLAMP_UV), 3);
        assert_eq!(sampler_mode(FLAG_NO_SMOOTH | FLAG_CLAMP_UV), 2);
    }
}
