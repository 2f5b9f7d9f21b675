//! Backend independent resource definitions.
//!
//! - [`Texture`]: shared texture handle and its description
//! - [`ImageData`]: CPU pixel buffer used for upload, readback and rasterizing
//! - [`cube`]: cube map face addressing
//! - [`TextureManager`]: name → texture bindings for one pass
//! - [`program`]: program kinds, uniform schemas and the active-program guard

pub mod cube;
pub mod image;
pub mod program;
pub mod texture;
pub mod texture_manager;

pub use image::ImageData;
pub use program::{ActiveProgram, Program, ProgramHandle, ProgramKind, UniformType, UniformValue};
pub use texture::{PixelElementSize, PixelStructure, Texture, TextureDesc, TextureId, TextureKind};
pub use texture_manager::TextureManager;
