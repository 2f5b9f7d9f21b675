//! Texture handles and descriptions.
//!
//! A [`Texture`] is a cheap, reference-counted handle: it carries a stable
//! [`TextureId`] and an immutable [`TextureDesc`]. The pixel storage lives in
//! the backend that created it, keyed by the id. Render targets and texture
//! managers share handles by cloning them; the backend releases the storage
//! once the last handle is dropped (see `Backend::prune`).

use std::borrow::Cow;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec4;

use crate::errors::{PbrError, Result};

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a texture across all backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Size of one channel element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PixelElementSize {
    /// 8-bit normalized channels.
    Byte,
    /// Floating point (HDR) channels.
    Float,
}

/// Channel layout of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PixelStructure {
    R,
    Rg,
    Rgb,
    Rgba,
    /// Depth store attached to a render target.
    Depth,
}

impl PixelStructure {
    /// Number of meaningful color channels.
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            Self::R | Self::Depth => 1,
            Self::Rg => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
}

/// Immutable description of a texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: Cow<'static, str>,
    /// Width × height (per face for cube maps).
    pub size: (u32, u32),
    pub kind: TextureKind,
    pub element: PixelElementSize,
    pub structure: PixelStructure,
    pub mip_levels: u32,
}

impl TextureDesc {
    /// A single-level 2D texture with RGBA channels.
    #[must_use]
    pub fn d2(label: impl Into<Cow<'static, str>>, size: (u32, u32), element: PixelElementSize) -> Self {
        Self {
            label: label.into(),
            size,
            kind: TextureKind::D2,
            element,
            structure: PixelStructure::Rgba,
            mip_levels: 1,
        }
    }

    /// A single-level cube map.
    #[must_use]
    pub fn cube(
        label: impl Into<Cow<'static, str>>,
        size: (u32, u32),
        element: PixelElementSize,
        structure: PixelStructure,
    ) -> Self {
        Self {
            label: label.into(),
            size,
            kind: TextureKind::Cube,
            element,
            structure,
            mip_levels: 1,
        }
    }

    /// A depth store for a render target.
    #[must_use]
    pub fn depth(size: (u32, u32)) -> Self {
        Self {
            label: Cow::Borrowed("Depth Storage"),
            size,
            kind: TextureKind::D2,
            element: PixelElementSize::Float,
            structure: PixelStructure::Depth,
            mip_levels: 1,
        }
    }

    #[must_use]
    pub fn with_structure(mut self, structure: PixelStructure) -> Self {
        self.structure = structure;
        self
    }

    #[must_use]
    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    /// Number of array layers (6 for cube maps).
    #[must_use]
    pub fn layer_count(&self) -> u32 {
        match self.kind {
            TextureKind::D2 => 1,
            TextureKind::Cube => 6,
        }
    }

    /// Size of one mip level, never smaller than 1×1.
    #[must_use]
    pub fn level_size(&self, level: u32) -> (u32, u32) {
        ((self.size.0 >> level).max(1), (self.size.1 >> level).max(1))
    }

    /// Longest possible mip chain for the base size.
    #[must_use]
    pub fn max_mip_levels(&self) -> u32 {
        32 - self.size.0.max(self.size.1).max(1).leading_zeros()
    }

    #[must_use]
    pub fn is_depth(&self) -> bool {
        self.structure == PixelStructure::Depth
    }

    /// Checks that the description can be allocated.
    pub fn validate(&self) -> Result<()> {
        if self.size.0 == 0 || self.size.1 == 0 {
            return Err(PbrError::InvalidTexture(format!(
                "{}: zero-sized texture {:?}",
                self.label, self.size
            )));
        }
        if self.kind == TextureKind::Cube && self.size.0 != self.size.1 {
            return Err(PbrError::InvalidTexture(format!(
                "{}: cube faces must be square, got {:?}",
                self.label, self.size
            )));
        }
        if self.mip_levels == 0 || self.mip_levels > self.max_mip_levels() {
            return Err(PbrError::InvalidTexture(format!(
                "{}: {} mip levels requested, at most {} possible",
                self.label,
                self.mip_levels,
                self.max_mip_levels()
            )));
        }
        Ok(())
    }

    /// Maps a shaded value to what this texture can actually store.
    ///
    /// Missing channels read back as 0 (alpha as 1) and byte textures are
    /// clamped and quantized to 8 bits.
    #[must_use]
    pub fn quantize(&self, value: Vec4) -> Vec4 {
        let mut v = match self.structure.channels() {
            1 => Vec4::new(value.x, 0.0, 0.0, 1.0),
            2 => Vec4::new(value.x, value.y, 0.0, 1.0),
            3 => value.truncate().extend(1.0),
            _ => value,
        };
        if self.element == PixelElementSize::Byte {
            v = (v.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round() / 255.0;
        }
        v
    }
}

#[derive(Debug)]
pub struct TextureInner {
    id: TextureId,
    desc: TextureDesc,
}

/// Shared handle to a backend texture.
#[derive(Debug, Clone)]
pub struct Texture(Rc<TextureInner>);

impl Texture {
    /// Allocates a new handle with a fresh id. Backends call this from
    /// `create_texture` and attach storage to the returned id.
    pub(crate) fn new(desc: TextureDesc) -> Self {
        Self(Rc::new(TextureInner {
            id: TextureId::next(),
            desc,
        }))
    }

    #[must_use]
    pub fn id(&self) -> TextureId {
        self.0.id
    }

    #[must_use]
    pub fn desc(&self) -> &TextureDesc {
        &self.0.desc
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.0.desc.size
    }

    #[must_use]
    pub fn kind(&self) -> TextureKind {
        self.0.desc.kind
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.0.desc.label
    }

    /// Weak reference used by backends to notice dropped textures.
    pub(crate) fn downgrade(&self) -> std::rc::Weak<TextureInner> {
        Rc::downgrade(&self.0)
    }

    /// Whether both handles point to the same texture.
    #[must_use]
    pub fn same(&self, other: &Texture) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Texture {}
