//! Off-screen render targets.

use glam::Vec4;
use smallvec::SmallVec;

use crate::errors::{PbrError, Result};
use crate::renderer::{Attachment, Backend};
use crate::resources::texture::{Texture, TextureDesc};

/// Destination of draw calls: a set of prebuilt attachments, one of which is
/// bound, plus an optional depth store shared by all of them.
///
/// Binding never clears. Passes that need a clean destination call
/// [`clear`](Self::clear) explicitly.
#[derive(Debug, Clone, Default)]
pub struct RenderTarget {
    label: String,
    attachments: SmallVec<[Attachment; 2]>,
    current: Option<usize>,
    depth: Option<Texture>,
}

impl RenderTarget {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Attaches level 0 of `texture` as the destination of subsequent draws.
    pub fn bind_texture(&mut self, texture: &Texture) -> Result<()> {
        self.bind_texture_level(texture, 0)
    }

    /// Attaches one mip level of `texture`, replacing the bound attachment.
    pub fn bind_texture_level(&mut self, texture: &Texture, level: u32) -> Result<()> {
        let levels = texture.desc().mip_levels;
        if level >= levels {
            return Err(PbrError::InvalidMipLevel { level, levels });
        }
        let attachment = Attachment::new(texture.clone(), level);
        match self.current {
            Some(index) => self.attachments[index] = attachment,
            None => {
                self.attachments.push(attachment);
                self.current = Some(self.attachments.len() - 1);
            }
        }
        Ok(())
    }

    /// Adds a prebuilt attachment and returns its index. The binding is left
    /// alone unless nothing was bound yet.
    pub fn attach(&mut self, texture: &Texture) -> usize {
        self.attachments.push(Attachment::new(texture.clone(), 0));
        let index = self.attachments.len() - 1;
        self.current.get_or_insert(index);
        index
    }

    /// Selects which prebuilt attachment receives subsequent draws.
    pub fn bind(&mut self, which: usize) -> Result<()> {
        if which >= self.attachments.len() {
            return Err(PbrError::InvalidAttachment {
                index: which,
                count: self.attachments.len(),
            });
        }
        self.current = Some(which);
        Ok(())
    }

    /// Allocates a depth store of `size` shared by every attachment.
    pub fn bind_storage(&mut self, backend: &mut dyn Backend, size: (u32, u32)) -> Result<()> {
        self.depth = Some(backend.create_texture(TextureDesc::depth(size))?);
        Ok(())
    }

    #[must_use]
    pub fn depth(&self) -> Option<&Texture> {
        self.depth.as_ref()
    }

    /// Depth store, if one exists and matches the bound attachment's size.
    #[must_use]
    pub fn depth_for_current(&self) -> Option<&Texture> {
        let attachment = self.current().ok()?;
        self.depth
            .as_ref()
            .filter(|depth| depth.size() == attachment.size())
    }

    /// The attachment draws currently write to.
    pub fn current(&self) -> Result<&Attachment> {
        self.current
            .map(|index| &self.attachments[index])
            .ok_or(PbrError::NoAttachment)
    }

    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Texture of attachment `which`.
    #[must_use]
    pub fn texture(&self, which: usize) -> Option<&Texture> {
        self.attachments.get(which).map(|a| &a.texture)
    }

    /// Like [`texture`](Self::texture), failing with `InvalidAttachment`.
    pub fn attached(&self, which: usize) -> Result<&Texture> {
        self.texture(which).ok_or(PbrError::InvalidAttachment {
            index: which,
            count: self.attachments.len(),
        })
    }

    #[must_use]
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }

    /// Size of the bound attachment at its level.
    pub fn viewport(&self) -> Result<(u32, u32)> {
        Ok(self.current()?.size())
    }

    /// Clears every layer of the bound attachment and the depth store.
    pub fn clear(&self, backend: &mut dyn Backend, color: Vec4) -> Result<()> {
        backend.clear(self.current()?, self.depth_for_current(), color)
    }

    /// Clears only the depth store.
    pub fn clear_depth(&self, backend: &mut dyn Backend) -> Result<()> {
        match &self.depth {
            Some(depth) => backend.clear_depth(depth),
            None => Ok(()),
        }
    }
}
