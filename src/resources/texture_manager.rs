//! Symbolic name → texture bindings for a single draw.

use rustc_hash::FxHashMap;

use crate::errors::{PbrError, Result};
use crate::resources::texture::Texture;

/// Ordered mapping from symbolic names to textures.
///
/// A manager describes what one pass may sample; passes build a fresh one
/// per draw rather than sharing a global registry. Re-adding a name replaces
/// the texture while keeping the original insertion position.
#[derive(Debug, Clone, Default)]
pub struct TextureManager {
    entries: Vec<(String, Texture)>,
    index: FxHashMap<String, usize>,
}

impl TextureManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_texture(&mut self, name: impl Into<String>, texture: Texture) {
        let name = name.into();
        if let Some(&slot) = self.index.get(&name) {
            self.entries[slot].1 = texture;
        } else {
            self.index.insert(name.clone(), self.entries.len());
            self.entries.push((name, texture));
        }
    }

    /// Builder-style [`add_texture`](Self::add_texture).
    #[must_use]
    pub fn with_texture(mut self, name: impl Into<String>, texture: Texture) -> Self {
        self.add_texture(name, texture);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Texture> {
        self.index.get(name).map(|&slot| &self.entries[slot].1)
    }

    /// Like [`get`](Self::get), but a miss is a wiring error.
    pub fn resolve(&self, name: &str) -> Result<&Texture> {
        self.get(name)
            .ok_or_else(|| PbrError::MissingTexture(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Texture)> {
        self.entries.iter().map(|(name, tex)| (name.as_str(), tex))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
