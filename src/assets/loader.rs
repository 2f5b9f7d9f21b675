use std::path::Path;

use crate::errors::{PbrError, Result};
use crate::renderer::Backend;
use crate::resources::image::ImageData;
use crate::resources::texture::{PixelElementSize, Texture, TextureDesc};

/// Decodes an image file into linear float pixels.
pub fn load_image(path: &Path) -> Result<ImageData> {
    if !path.is_file() {
        return Err(PbrError::AssetNotFound(path.display().to_string()));
    }
    let img = image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| PbrError::ImageDecodeError(format!("{}: {e}", path.display())))?;
    log::debug!(
        "Loaded image {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    Ok(ImageData::from_dynamic(&img))
}

/// Loads an 8-bit RGBA 2D texture.
pub fn load_texture(backend: &mut dyn Backend, path: &Path) -> Result<Texture> {
    let image = load_image(path)?;
    let label = path
        .file_stem()
        .map_or_else(|| "Texture".to_string(), |s| s.to_string_lossy().into_owned());
    let texture = backend.create_texture(TextureDesc::d2(
        label,
        (image.width, image.height),
        PixelElementSize::Byte,
    ))?;
    backend.write_texture(&texture, 0, 0, &image)?;
    Ok(texture)
}

/// Writes `image` as an 8-bit PNG, clamping to `[0, 1]`.
pub fn save_png(image: &ImageData, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    image
        .to_rgba8()
        .save_with_format(path, image::ImageFormat::Png)?;
    log::info!("Frame written to {}", path.display());
    Ok(())
}
