//! Multi-pass pipelines built from full-screen quads.
//!
//! - [`ibl`]: one-time precomputation of the lighting textures
//! - [`bloom`]: per-frame brightness, blur and composite
//! - [`fill`]: render-to-texture helpers used by both

pub mod bloom;
pub mod fill;
pub mod ibl;

pub use bloom::BloomPipeline;
pub use fill::{fill, fill_mipmap};
pub use ibl::{IblTextures, PBR_TEXTURE_NAMES};
