//! Asset loading.
//!
//! - [`load_image`] / [`load_texture`]: decoded images and 2D material textures
//! - [`load_environment`]: HDR environment images resampled into cube maps
//! - [`save_png`]: writes frames back to disk

pub mod environment;
pub mod loader;

pub use environment::{EnvironmentLayout, cube_faces_from_image, load_environment};
pub use loader::{load_image, load_texture, save_png};
