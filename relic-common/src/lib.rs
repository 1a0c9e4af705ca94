//! Shared types for the Relic renderer
//!
//! This crate provides the GPU-free types exchanged between the game
//! simulation and the render device:
//!
//! - [`formats`] - Source pixel formats and their block/size arithmetic
//! - [`flags`] - The per-draw render-state flag word
//! - [`surface`] - Texture surface descriptors and facet UV mappings
//! - [`packing`] - f32 → unorm8 color packing shared by the vertex writer

pub mod flags;
pub mod formats;
pub mod packing;
pub mod surface;

pub use formats::PixelFormat;
pub use packing::{pack_color_rgb_unorm8, pack_color_rgba_unorm8};
pub use surface::{FacetMapping, SurfaceDesc, SurfaceMip};
