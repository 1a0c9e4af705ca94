//! Shader validation tests
//!
//! Both world shader variants and the blit shader must parse and
//! validate under naga before they ever reach a device.

use super::shaders::{world_shader_source, BLIT_SOURCE};
use super::PipelineSet;
use crate::settings::BindingMode;
use crate::state::STATE_COUNT;

fn validate(label: &str, source: &str) {
    let module = naga::front::wgsl::parse_str(source)
        .unwrap_or_else(|e| panic!("{label} failed to parse: {e}"));
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .unwrap_or_else(|e| panic!("{label} failed to validate: {e:?}"));
}

#[test]
fn test_world_shader_cached_sets_validates() {
    validate("world (cached sets)", &world_shader_source(BindingMode::CachedSets));
}

#[test]
fn test_world_shader_bindless_validates() {
    validate("world (bindless)", &world_shader_source(BindingMode::Bindless));
}

#[test]
fn test_blit_shader_validates() {
    validate("blit", BLIT_SOURCE);
}

#[test]
fn test_template_markers_are_spliced() {
    for mode in [BindingMode::CachedSets, BindingMode::Bindless] {
        let source = world_shader_source(mode);
        assert!(!source.contains("//[TEXTURE_BINDINGS]"));
        assert!(!source.contains("//[LAYER_FETCH]"));
        assert!(source.contains("fn layer("));
    }
    assert!(world_shader_source(BindingMode::Bindless).contains("binding_array"));
    assert!(world_shader_source(BindingMode::CachedSets).contains("tex_base"));
}

#[test]
fn test_table_index_covers_all_states() {
    let mut seen = std::collections::HashSet::new();
    for state in 0..STATE_COUNT {
        for lines in [false, true] {
            seen.insert(PipelineSet::table_index(state, lines));
        }
    }
    assert_eq!(seen.len(), STATE_COUNT * 2);
    assert_eq!(seen.iter().max(), Some(&(STATE_COUNT * 2 - 1)));
}
