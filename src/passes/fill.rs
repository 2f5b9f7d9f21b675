//! Render-to-texture helpers shared by the precomputation passes.

use crate::errors::Result;
use crate::renderer::{Backend, Quad, RenderTarget};
use crate::resources::program::{ActiveProgram, ProgramHandle};
use crate::resources::texture::Texture;
use crate::resources::texture_manager::TextureManager;

/// Renders `program` over level 0 of `output`.
///
/// `inputs` names the textures of `manager` the program samples, in slot
/// order. Cube map outputs get one draw per face.
pub fn fill(
    backend: &mut dyn Backend,
    output: &Texture,
    manager: &TextureManager,
    inputs: &[&str],
    program: &ProgramHandle,
) -> Result<()> {
    let mut target = RenderTarget::new(output.label().to_string());
    target.bind_texture(output)?;

    let mut quad = Quad::new(program.clone());
    quad.set_textures(inputs.iter().copied());
    quad.draw(backend, &target, manager)
}

/// Renders `program` over the first `levels` mip levels of `output`, in
/// order. `per_level` sets the uniforms of each level before it is drawn.
pub fn fill_mipmap(
    backend: &mut dyn Backend,
    output: &Texture,
    manager: &TextureManager,
    inputs: &[&str],
    program: &ProgramHandle,
    levels: u32,
    mut per_level: impl FnMut(u32, &mut ActiveProgram<'_>) -> Result<()>,
) -> Result<()> {
    let mut target = RenderTarget::new(output.label().to_string());
    let mut quad = Quad::new(program.clone());
    quad.set_textures(inputs.iter().copied());

    for level in 0..levels {
        target.bind_texture_level(output, level)?;
        {
            let mut active = program.use_program();
            per_level(level, &mut active)?;
        }
        log::trace!("{}: level {level} {:?}", output.label(), target.viewport()?);
        quad.draw(backend, &target, manager)?;
    }
    Ok(())
}
