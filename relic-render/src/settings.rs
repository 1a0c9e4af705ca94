//! Render device settings
//!
//! Hosts embed [`RenderSettings`] in their own config files; every field
//! has a default so a partial table deserializes cleanly.

use serde::{Deserialize, Serialize};

/// Texture binding strategy, selected once at device creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BindingMode {
    /// Use the bindless texture table when the adapter supports it,
    /// otherwise fall back to cached descriptor sets
    #[default]
    Auto,
    /// Bind-group-per-texture-combination, created on first use and cached
    CachedSets,
    /// One large indexed texture table; each texture gets a stable slot
    Bindless,
}

/// Render device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// How many frames may be in flight on the GPU (1-3).
    /// 1 blocks on each frame's fence right after submission.
    pub frames_in_flight: u32,
    /// Texture binding strategy
    pub binding_mode: BindingMode,
    /// Geometry ring vertex capacity per segment
    pub vertex_capacity: u32,
    /// Geometry ring index capacity per segment
    pub index_capacity: u32,
    /// Offscreen render target width (game resolution)
    pub game_width: u32,
    /// Offscreen render target height (game resolution)
    pub game_height: u32,
    /// Capacity of the bindless texture table
    pub bindless_table_size: u32,
    /// Present with vsync
    pub vsync: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: 1,
            binding_mode: BindingMode::default(),
            vertex_capacity: 64 * 1024,
            index_capacity: 128 * 1024,
            game_width: 1024,
            game_height: 768,
            bindless_table_size: 2048,
            vsync: true,
        }
    }
}

impl RenderSettings {
    /// Clamp every field into its supported range.
    pub fn sanitized(&self) -> Self {
        Self {
            frames_in_flight: self.frames_in_flight.clamp(1, 3),
            binding_mode: self.binding_mode,
            vertex_capacity: self.vertex_capacity.max(1024),
            index_capacity: self.index_capacity.max(1024),
            game_width: self.game_width.max(1),
            game_height: self.game_height.max(1),
            bindless_table_size: self.bindless_table_size.clamp(16, 64 * 1024),
            vsync: self.vsync,
        }
    }

    /// Geometry ring segment count: one per frame in flight, plus the
    /// segment currently being written by the CPU.
    pub fn segment_count(&self) -> u32 {
        self.frames_in_flight.clamp(1, 3) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RenderSettings::default();
        assert_eq!(settings.frames_in_flight, 1);
        assert_eq!(settings.binding_mode, BindingMode::Auto);
        assert_eq!(settings.segment_count(), 2);
    }

    #[test]
    fn test_partial_table_deserializes() {
        let settings: RenderSettings =
            serde_json::from_str(r#"{ "frames_in_flight": 2 }"#).unwrap();
        assert_eq!(settings.frames_in_flight, 2);
        assert_eq!(settings.vertex_capacity, RenderSettings::default().vertex_capacity);
        assert_eq!(settings.segment_count(), 3);
    }

    #[test]
    fn test_sanitize_clamps() {
        let settings = RenderSettings {
            frames_in_flight: 9,
            vertex_capacity: 0,
            game_width: 0,
            bindless_table_size: 1,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(settings.frames_in_flight, 3);
        assert_eq!(settings.vertex_capacity, 1024);
        assert_eq!(settings.game_width, 1);
        assert_eq!(settings.bindless_table_size, 16);
    }
}
