//! Shader source assembly
//!
//! The world shader differs between binding strategies only in its group 1
//! declarations and the `layer` fetch function; both blocks are spliced
//! into the shared template before compilation.

use crate::settings::BindingMode;

const WORLD_TEMPLATE: &str = include_str!("../../shaders/world.wgsl");

pub const BLIT_SOURCE: &str = include_str!("../../shaders/blit.wgsl");

const BINDINGS_MARKER: &str = "//[TEXTURE_BINDINGS]";
const LAYER_MARKER: &str = "//[LAYER_FETCH]";

const DISCRETE_BINDINGS: &str = "\
@group(1) @binding(0) var tex_base: texture_2d<f32>;
@group(1) @binding(1) var tex_light: texture_2d<f32>;
@group(1) @binding(2) var tex_macro: texture_2d<f32>;
@group(1) @binding(3) var tex_detail: texture_2d<f32>;
";

const DISCRETE_LAYER: &str = "\
fn layer(bd: BatchData, slot: u32, uv: vec2<f32>) -> vec4<f32> {
    let mode = (bd.sampler_bits >> (slot * 2u)) & 3u;
    let ddx = dpdx(uv);
    let ddy = dpdy(uv);
    switch slot {
        case 0u: {
            return sample_mode(tex_base, mode, uv, ddx, ddy);
        }
        case 1u: {
            return sample_mode(tex_light, mode, uv, ddx, ddy);
        }
        case 2u: {
            return sample_mode(tex_macro, mode, uv, ddx, ddy);
        }
        default: {
            return sample_mode(tex_detail, mode, uv, ddx, ddy);
        }
    }
}
";

const BINDLESS_BINDINGS: &str = "\
@group(1) @binding(0) var texture_table: binding_array<texture_2d<f32>>;
";

const BINDLESS_LAYER: &str = "\
fn layer(bd: BatchData, slot: u32, uv: vec2<f32>) -> vec4<f32> {
    let mode = (bd.sampler_bits >> (slot * 2u)) & 3u;
    let ddx = dpdx(uv);
    let ddy = dpdy(uv);
    return sample_mode(texture_table[bd.slots[slot]], mode, uv, ddx, ddy);
}
";

/// Assemble the world shader for the chosen binding strategy.
/// `Auto` must be resolved to a concrete mode before this point.
pub fn world_shader_source(mode: BindingMode) -> String {
    let (bindings, layer) = match mode {
        BindingMode::Bindless => (BINDLESS_BINDINGS, BINDLESS_LAYER),
        _ => (DISCRETE_BINDINGS, DISCRETE_LAYER),
    };
    WORLD_TEMPLATE
        .replace(BINDINGS_MARKER, bindings)
        .replace(LAYER_MARKER, layer)
}
