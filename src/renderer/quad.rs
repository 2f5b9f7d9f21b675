//! Full-screen quad pass.

use crate::errors::{PbrError, Result};
use crate::renderer::render_target::RenderTarget;
use crate::renderer::{Backend, DrawCall};
use crate::resources::program::{ProgramHandle, ProgramKind};
use crate::resources::texture::Texture;
use crate::resources::texture_manager::TextureManager;

/// Checks bound textures against the slots a program declares.
pub(crate) fn check_inputs(kind: ProgramKind, inputs: &[Texture]) -> Result<()> {
    let slots = kind.textures();
    if slots.len() != inputs.len() {
        return Err(PbrError::TextureCountMismatch {
            program: kind.name(),
            expected: slots.len(),
            actual: inputs.len(),
        });
    }
    for (slot, texture) in slots.iter().zip(inputs) {
        if slot.kind != texture.kind() {
            return Err(PbrError::TextureKindMismatch {
                program: kind.name(),
                slot: slot.name,
                expected: slot.kind,
            });
        }
    }
    Ok(())
}

/// A full-screen draw of one program over named input textures.
///
/// The names given to [`set_textures`](Self::set_textures) are resolved
/// against the [`TextureManager`] passed to each [`draw`](Self::draw), in the
/// order the program binds its texture units.
#[derive(Debug, Clone)]
pub struct Quad {
    program: ProgramHandle,
    texture_names: Vec<String>,
}

impl Quad {
    #[must_use]
    pub fn new(program: ProgramHandle) -> Self {
        Self {
            program,
            texture_names: Vec::new(),
        }
    }

    #[must_use]
    pub fn program(&self) -> &ProgramHandle {
        &self.program
    }

    pub fn set_textures<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.texture_names = names.into_iter().map(Into::into).collect();
    }

    #[must_use]
    pub fn texture_names(&self) -> &[String] {
        &self.texture_names
    }

    /// Looks up every declared name and validates the result against the
    /// program's texture slots.
    pub fn resolve(&self, manager: &TextureManager) -> Result<Vec<Texture>> {
        let inputs = self
            .texture_names
            .iter()
            .map(|name| manager.resolve(name).cloned())
            .collect::<Result<Vec<_>>>()?;
        check_inputs(self.program.kind(), &inputs)?;
        Ok(inputs)
    }

    /// Draws into the bound attachment of `target`, once per layer.
    ///
    /// Uniforms must have been set beforehand; the program is active for the
    /// duration of the draw.
    pub fn draw(
        &self,
        backend: &mut dyn Backend,
        target: &RenderTarget,
        manager: &TextureManager,
    ) -> Result<()> {
        let inputs = self.resolve(manager)?;
        let attachment = target.current()?;
        let depth = target.depth_for_current();

        let active = self.program.use_program();
        for layer in 0..attachment.texture.desc().layer_count() {
            backend.draw(&DrawCall {
                program: &*active,
                inputs: &inputs,
                target: attachment,
                depth,
                layer,
            })?;
        }
        Ok(())
    }
}
