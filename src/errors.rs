//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`PbrError`] covers all failure modes including:
//! - GPU initialization failures
//! - Asset loading and decoding errors
//! - Program and uniform contract violations
//! - Pass wiring errors (missing textures, bad attachments)
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, PbrError>`.
//!
//! ```rust,ignore
//! use pbr_bloom::errors::{PbrError, Result};
//!
//! fn load_asset() -> Result<()> {
//!     // Operations that may fail return Result
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::resources::program::UniformType;
use crate::resources::texture::{TextureId, TextureKind};

/// The main error type for the crate.
///
/// Startup errors (assets, programs) are fatal for the caller. Wiring errors
/// such as [`PbrError::MissingTexture`] indicate a pass built with the wrong
/// texture manager and are reported by the draw that detected them.
#[derive(Error, Debug)]
pub enum PbrError {
    // ========================================================================
    // GPU & Backend Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Reading a texture back to the CPU failed.
    #[error("Texture readback failed: {0}")]
    ReadbackFailed(String),

    /// The backend holds no storage for this texture.
    #[error("Texture {0:?} is not owned by this backend")]
    UnknownTexture(TextureId),

    // ========================================================================
    // Asset Loading Errors
    // ========================================================================
    /// The requested asset was not found.
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image decoding error.
    #[error("Image decode error: {0}")]
    ImageDecodeError(String),

    /// Cube map validation error.
    #[error("Cube map error: {0}")]
    CubeMapError(String),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ========================================================================
    // Program Errors
    // ========================================================================
    /// No program is registered under this name.
    #[error("Unknown program: {0}")]
    UnknownProgram(String),

    /// The program does not declare this uniform.
    #[error("Program {program} has no uniform named {name}")]
    UnknownUniform {
        /// Program name
        program: &'static str,
        /// Requested uniform name
        name: String,
    },

    /// The uniform exists but has a different type.
    #[error("Uniform {name} of program {program} expects {expected:?}")]
    UniformTypeMismatch {
        /// Program name
        program: &'static str,
        /// Uniform name
        name: String,
        /// Declared type
        expected: UniformType,
    },

    // ========================================================================
    // Pass Wiring Errors
    // ========================================================================
    /// A quad requested a texture name absent from the texture manager.
    #[error("Texture manager has no texture named {0}")]
    MissingTexture(String),

    /// The number of bound textures does not match the program's slots.
    #[error("Program {program} expects {expected} textures, got {actual}")]
    TextureCountMismatch {
        /// Program name
        program: &'static str,
        /// Number of declared slots
        expected: usize,
        /// Number of bound textures
        actual: usize,
    },

    /// A bound texture has the wrong dimensionality for its slot.
    #[error("Slot {slot} of program {program} expects a {expected:?} texture")]
    TextureKindMismatch {
        /// Program name
        program: &'static str,
        /// Slot name
        slot: &'static str,
        /// Declared kind
        expected: TextureKind,
    },

    /// A draw tried to sample the texture it writes.
    #[error("Texture {0} is both sampled and written by the same draw")]
    FeedbackLoop(String),

    /// A draw was issued with nothing bound for writing.
    #[error("No attachment is bound to the render target")]
    NoAttachment,

    /// `bind(which)` selected an attachment that does not exist.
    #[error("Render target has no attachment {index} (has {count})")]
    InvalidAttachment {
        /// Requested index
        index: usize,
        /// Number of attachments
        count: usize,
    },

    /// A mip level outside the texture's chain was requested.
    #[error("Mip level {level} out of range for a texture with {levels} levels")]
    InvalidMipLevel {
        /// Requested level
        level: u32,
        /// Available levels
        levels: u32,
    },

    /// Texture dimensions or mip count are unusable.
    #[error("Invalid texture description: {0}")]
    InvalidTexture(String),

    // ========================================================================
    // Scene Errors
    // ========================================================================
    /// A scene node referenced a parent that is not in the tree.
    #[error("Scene node parent does not exist")]
    UnknownNode,

    /// The light manager is full.
    #[error("Light manager holds at most {0} lights")]
    TooManyLights(usize),
}

// ============================================================================
// Convenient conversion implementations
// ============================================================================

impl From<image::ImageError> for PbrError {
    fn from(err: image::ImageError) -> Self {
        PbrError::ImageDecodeError(err.to_string())
    }
}

/// Alias for `Result<T, PbrError>`.
pub type Result<T> = std::result::Result<T, PbrError>;
