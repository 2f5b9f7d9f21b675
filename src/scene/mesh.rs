use crate::errors::Result;
use crate::renderer::{Backend, Quad, RenderTarget};
use crate::resources::program::ProgramHandle;
use crate::resources::texture_manager::TextureManager;

/// A drawable scene element.
///
/// Geometry is reconstructed analytically by the mesh program from the
/// `projection`, `view` and `model` uniforms, so a mesh is a quad bound to a
/// program plus its texture names.
#[derive(Debug, Clone)]
pub struct Mesh {
    quad: Quad,
    clear_depth: bool,
}

impl Mesh {
    #[must_use]
    pub fn new(program: ProgramHandle) -> Self {
        Self {
            quad: Quad::new(program),
            clear_depth: false,
        }
    }

    #[must_use]
    pub fn program(&self) -> &ProgramHandle {
        self.quad.program()
    }

    pub fn set_textures<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quad.set_textures(names);
    }

    #[must_use]
    pub fn texture_names(&self) -> &[String] {
        self.quad.texture_names()
    }

    /// When set, the depth store is cleared after this mesh is drawn so
    /// later meshes are never hidden behind it.
    pub fn set_clear_depth(&mut self, clear_depth: bool) {
        self.clear_depth = clear_depth;
    }

    #[must_use]
    pub fn clear_depth(&self) -> bool {
        self.clear_depth
    }

    pub fn draw(
        &self,
        backend: &mut dyn Backend,
        target: &RenderTarget,
        manager: &TextureManager,
    ) -> Result<()> {
        self.quad.draw(backend, target, manager)?;
        if self.clear_depth {
            target.clear_depth(backend)?;
        }
        Ok(())
    }
}
