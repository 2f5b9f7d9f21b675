//! Rendering Module
//!
//! The render core is written once against the [`Backend`] trait:
//!
//! - [`RenderTarget`]: off-screen destination holding one or more attachments
//! - [`Quad`]: full-screen pass bound to a program and named input textures
//! - [`ProgramRegistry`]: compiles programs once per backend
//!
//! Two backends implement the trait. [`SoftwareBackend`] rasterizes every
//! program on the CPU and records the draws it executed. [`WgpuBackend`]
//! drives a headless GPU device.

pub mod program_registry;
pub mod quad;
pub mod render_target;
pub mod software;
pub mod wgpu_backend;

use glam::Vec4;

use crate::errors::Result;
use crate::resources::image::ImageData;
use crate::resources::program::{Program, ProgramKind};
use crate::resources::texture::{Texture, TextureDesc};

pub use program_registry::ProgramRegistry;
pub use quad::Quad;
pub use render_target::RenderTarget;
pub use software::{DrawRecord, SoftwareBackend};
pub use wgpu_backend::WgpuBackend;

/// One mip level of a texture used as a draw destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub texture: Texture,
    pub level: u32,
}

impl Attachment {
    #[must_use]
    pub fn new(texture: Texture, level: u32) -> Self {
        Self { texture, level }
    }

    /// Size of the attached level.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.texture.desc().level_size(self.level)
    }
}

/// Everything a backend needs to execute one full-screen draw.
pub struct DrawCall<'a> {
    /// Active program; its current uniform values are used.
    pub program: &'a Program,
    /// Textures in slot order.
    pub inputs: &'a [Texture],
    pub target: &'a Attachment,
    pub depth: Option<&'a Texture>,
    /// Cube face being written (0 for 2D targets).
    pub layer: u32,
}

/// A device able to store textures and run the renderer's programs.
///
/// Draws execute in submission order, so the writes of one pass are visible
/// to the next.
pub trait Backend {
    /// Short human readable name used in logs.
    fn name(&self) -> &'static str;

    /// Allocates storage for a texture. Contents start zeroed.
    fn create_texture(&mut self, desc: TextureDesc) -> Result<Texture>;

    /// Replaces one level/layer of a texture.
    fn write_texture(
        &mut self,
        texture: &Texture,
        level: u32,
        layer: u32,
        data: &ImageData,
    ) -> Result<()>;

    /// Reads one level/layer of a texture back to the CPU.
    fn read_texture(&mut self, texture: &Texture, level: u32, layer: u32) -> Result<ImageData>;

    /// Prepares a program for drawing. Called once per kind.
    fn compile_program(&mut self, kind: ProgramKind) -> Result<()>;

    /// Clears every layer of the attached level to `color` and the depth
    /// store, if any, to the far plane.
    fn clear(&mut self, target: &Attachment, depth: Option<&Texture>, color: Vec4) -> Result<()>;

    /// Resets a depth store to the far plane, leaving colour untouched.
    fn clear_depth(&mut self, depth: &Texture) -> Result<()>;

    /// Runs the program once per texel of `call.target`.
    fn draw(&mut self, call: &DrawCall<'_>) -> Result<()>;

    /// Releases storage of textures whose handles were all dropped. Returns
    /// the number of textures freed.
    fn prune(&mut self) -> usize;
}
