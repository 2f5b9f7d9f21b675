//! CPU reference backend.
//!
//! Every program runs as Rust code, one fragment per texel of the bound
//! attachment, with the same face addressing, sampling and depth rules as the
//! GPU backend. Every executed draw is recorded as a [`DrawRecord`] so pass
//! wiring can be inspected after the fact.

pub mod brdf;
pub(crate) mod shaders;

use std::rc::Weak;

use glam::{Vec2, Vec4};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{PbrError, Result};
use crate::renderer::quad::check_inputs;
use crate::renderer::{Attachment, Backend, DrawCall};
use crate::resources::image::ImageData;
use crate::resources::program::ProgramKind;
use crate::resources::texture::{Texture, TextureDesc, TextureId, TextureInner};

use shaders::{FragCoord, FragmentProgram, TextureView};

/// One executed draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    pub program: ProgramKind,
    /// Sampled textures in slot order.
    pub inputs: Vec<TextureId>,
    pub target: TextureId,
    pub level: u32,
    pub layer: u32,
}

struct Storage {
    handle: Weak<TextureInner>,
    desc: TextureDesc,
    /// `[level][layer]`
    levels: Vec<Vec<ImageData>>,
}

impl Storage {
    fn new(texture: &Texture) -> Self {
        let desc = texture.desc().clone();
        let zero = desc.quantize(Vec4::ZERO);
        let levels = (0..desc.mip_levels)
            .map(|level| {
                let (w, h) = desc.level_size(level);
                (0..desc.layer_count())
                    .map(|_| ImageData::filled(w, h, zero))
                    .collect()
            })
            .collect();
        Self {
            handle: texture.downgrade(),
            desc,
            levels,
        }
    }

    fn image_mut(&mut self, level: u32, layer: u32) -> Result<&mut ImageData> {
        check_subresource(&self.desc, level, layer)?;
        Ok(&mut self.levels[level as usize][layer as usize])
    }

    fn fill_level(&mut self, level: u32, value: Vec4) {
        let value = self.desc.quantize(value);
        for image in &mut self.levels[level as usize] {
            image.pixels.fill(value);
        }
    }
}

fn check_subresource(desc: &TextureDesc, level: u32, layer: u32) -> Result<()> {
    if level >= desc.mip_levels {
        return Err(PbrError::InvalidMipLevel {
            level,
            levels: desc.mip_levels,
        });
    }
    if layer >= desc.layer_count() {
        return Err(PbrError::InvalidTexture(format!(
            "{}: layer {layer} out of {}",
            desc.label,
            desc.layer_count()
        )));
    }
    Ok(())
}

/// Reference rasterizer executing every program on the CPU.
#[derive(Default)]
pub struct SoftwareBackend {
    textures: FxHashMap<TextureId, Storage>,
    compiled: FxHashSet<ProgramKind>,
    draws: Vec<DrawRecord>,
}

impl SoftwareBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws executed so far, in submission order.
    #[must_use]
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Returns and forgets the recorded draws.
    pub fn take_draws(&mut self) -> Vec<DrawRecord> {
        std::mem::take(&mut self.draws)
    }

    /// Number of textures with live storage.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn storage_mut(&mut self, texture: &Texture) -> Result<&mut Storage> {
        self.textures
            .get_mut(&texture.id())
            .ok_or(PbrError::UnknownTexture(texture.id()))
    }
}

fn rasterize(
    textures: &FxHashMap<TextureId, Storage>,
    call: &DrawCall<'_>,
    target: &mut Storage,
    depth: Option<&mut Storage>,
) -> Result<()> {
    let views = call
        .inputs
        .iter()
        .map(|texture| {
            textures
                .get(&texture.id())
                .map(|storage| TextureView {
                    levels: &storage.levels,
                })
                .ok_or(PbrError::UnknownTexture(texture.id()))
        })
        .collect::<Result<Vec<_>>>()?;

    let program = FragmentProgram::new(call.program);
    let desc = &target.desc;
    let image = &mut target.levels[call.target.level as usize][call.layer as usize];
    let (width, height) = (image.width, image.height);

    // The depth store only applies when it matches the destination size.
    let mut depth = depth
        .map(|storage| &mut storage.levels[0][0])
        .filter(|d| (d.width, d.height) == (width, height));

    for y in 0..height {
        for x in 0..width {
            let frag = FragCoord {
                uv: Vec2::new(
                    (x as f32 + 0.5) / width as f32,
                    (y as f32 + 0.5) / height as f32,
                ),
                layer: call.layer,
            };
            let Some(fragment) = program.shade(&views, &frag) else {
                continue;
            };
            if let (Some(z), Some(store)) = (fragment.depth, depth.as_mut()) {
                if !(0.0..=1.0).contains(&z) || z >= store.get(x, y).x {
                    continue;
                }
                store.set(x, y, Vec4::new(z, 0.0, 0.0, 1.0));
            }
            image.set(x, y, desc.quantize(fragment.color));
        }
    }
    Ok(())
}

impl Backend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn create_texture(&mut self, desc: TextureDesc) -> Result<Texture> {
        desc.validate()?;
        let texture = Texture::new(desc);
        log::trace!(
            "software: create texture {} ({:?}, {:?})",
            texture.label(),
            texture.id(),
            texture.size()
        );
        self.textures.insert(texture.id(), Storage::new(&texture));
        Ok(texture)
    }

    fn write_texture(
        &mut self,
        texture: &Texture,
        level: u32,
        layer: u32,
        data: &ImageData,
    ) -> Result<()> {
        let storage = self.storage_mut(texture)?;
        let desc = storage.desc.clone();
        let image = storage.image_mut(level, layer)?;
        if (data.width, data.height) != (image.width, image.height) {
            return Err(PbrError::InvalidTexture(format!(
                "{}: level {level} is {}x{}, got {}x{}",
                desc.label, image.width, image.height, data.width, data.height
            )));
        }
        for (dst, src) in image.pixels.iter_mut().zip(&data.pixels) {
            *dst = desc.quantize(*src);
        }
        Ok(())
    }

    fn read_texture(&mut self, texture: &Texture, level: u32, layer: u32) -> Result<ImageData> {
        let storage = self.storage_mut(texture)?;
        Ok(storage.image_mut(level, layer)?.clone())
    }

    fn compile_program(&mut self, kind: ProgramKind) -> Result<()> {
        log::debug!("software: program {} ready", kind.name());
        self.compiled.insert(kind);
        Ok(())
    }

    fn clear(&mut self, target: &Attachment, depth: Option<&Texture>, color: Vec4) -> Result<()> {
        let storage = self.storage_mut(&target.texture)?;
        check_subresource(&storage.desc, target.level, 0)?;
        storage.fill_level(target.level, color);
        if let Some(depth) = depth {
            self.clear_depth(depth)?;
        }
        Ok(())
    }

    fn clear_depth(&mut self, depth: &Texture) -> Result<()> {
        self.storage_mut(depth)?.fill_level(0, Vec4::ONE);
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<()> {
        let kind = call.program.kind();
        if !self.compiled.contains(&kind) {
            return Err(PbrError::UnknownProgram(kind.name().to_string()));
        }
        check_inputs(kind, call.inputs)?;

        let target_id = call.target.texture.id();
        if call.inputs.iter().any(|input| input.id() == target_id) {
            return Err(PbrError::FeedbackLoop(call.target.texture.label().to_string()));
        }
        check_subresource(call.target.texture.desc(), call.target.level, call.layer)?;

        let mut target = self
            .textures
            .remove(&target_id)
            .ok_or(PbrError::UnknownTexture(target_id))?;
        let mut depth = call
            .depth
            .filter(|_| kind.writes_depth())
            .and_then(|d| self.textures.remove(&d.id()).map(|storage| (d.id(), storage)));

        let result = rasterize(
            &self.textures,
            call,
            &mut target,
            depth.as_mut().map(|(_, storage)| storage),
        );

        self.textures.insert(target_id, target);
        if let Some((id, storage)) = depth {
            self.textures.insert(id, storage);
        }
        result?;

        log::trace!(
            "software: {} -> {} (level {}, layer {})",
            kind.name(),
            call.target.texture.label(),
            call.target.level,
            call.layer
        );
        self.draws.push(DrawRecord {
            program: kind,
            inputs: call.inputs.iter().map(Texture::id).collect(),
            target: target_id,
            level: call.target.level,
            layer: call.layer,
        });
        Ok(())
    }

    fn prune(&mut self) -> usize {
        let before = self.textures.len();
        self.textures
            .retain(|_, storage| storage.handle.strong_count() > 0);
        before - self.textures.len()
    }
}
