//! Environment cube maps from HDR images.
//!
//! The layout is inferred from the aspect ratio:
//!
//! | Aspect | Layout                                              |
//! |--------|-----------------------------------------------------|
//! | 2:1    | equirectangular (longitude × latitude)              |
//! | 4:3    | horizontal cross, middle row `-X +Z +X -Z`          |
//! | 3:4    | vertical cross, `-Z` below `-Y` rotated half a turn |

use std::path::Path;

use glam::{UVec2, Vec2};

use crate::assets::loader::load_image;
use crate::errors::{PbrError, Result};
use crate::renderer::Backend;
use crate::resources::cube::{FACE_COUNT, direction_to_equirect, face_direction};
use crate::resources::image::ImageData;
use crate::resources::texture::{PixelElementSize, PixelStructure, Texture, TextureDesc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentLayout {
    Equirectangular,
    HorizontalCross,
    VerticalCross,
}

impl EnvironmentLayout {
    /// Detects the layout of a `width × height` image.
    pub fn detect(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PbrError::CubeMapError("empty environment image".to_string()));
        }
        if width == 2 * height {
            Ok(Self::Equirectangular)
        } else if width * 3 == height * 4 && width % 4 == 0 {
            Ok(Self::HorizontalCross)
        } else if width * 4 == height * 3 && width % 3 == 0 {
            Ok(Self::VerticalCross)
        } else {
            Err(PbrError::CubeMapError(format!(
                "unsupported environment layout {width}x{height}"
            )))
        }
    }

    /// Cell of each face inside a cross, in face order `+X -X +Y -Y +Z -Z`.
    fn cells(self) -> [UVec2; 6] {
        match self {
            Self::HorizontalCross => [
                UVec2::new(2, 1),
                UVec2::new(0, 1),
                UVec2::new(1, 0),
                UVec2::new(1, 2),
                UVec2::new(1, 1),
                UVec2::new(3, 1),
            ],
            Self::VerticalCross => [
                UVec2::new(2, 1),
                UVec2::new(0, 1),
                UVec2::new(1, 0),
                UVec2::new(1, 2),
                UVec2::new(1, 1),
                UVec2::new(1, 3),
            ],
            Self::Equirectangular => [UVec2::ZERO; 6],
        }
    }
}

/// Cuts one cross cell out of `image`.
fn crop_face(image: &ImageData, cell: UVec2, face_size: u32, rotate_half_turn: bool) -> ImageData {
    ImageData::from_fn(face_size, face_size, |x, y| {
        let (x, y) = if rotate_half_turn {
            (face_size - 1 - x, face_size - 1 - y)
        } else {
            (x, y)
        };
        image.get(cell.x * face_size + x, cell.y * face_size + y)
    })
}

fn texel_center(x: u32, y: u32, size: u32) -> Vec2 {
    (Vec2::new(x as f32, y as f32) + 0.5) / size as f32
}

/// Resamples `image` into six `face_size` faces in the order `+X -X +Y -Y +Z -Z`.
pub fn cube_faces_from_image(image: &ImageData, face_size: u32) -> Result<Vec<ImageData>> {
    let layout = EnvironmentLayout::detect(image.width, image.height)?;
    let faces = match layout {
        EnvironmentLayout::Equirectangular => (0..FACE_COUNT)
            .map(|face| {
                ImageData::from_fn(face_size, face_size, |x, y| {
                    let dir = face_direction(face, texel_center(x, y, face_size));
                    image.sample(direction_to_equirect(dir))
                })
            })
            .collect(),
        EnvironmentLayout::HorizontalCross | EnvironmentLayout::VerticalCross => {
            let cell_size = if layout == EnvironmentLayout::HorizontalCross {
                image.width / 4
            } else {
                image.width / 3
            };
            layout
                .cells()
                .iter()
                .enumerate()
                .map(|(face, &cell)| {
                    let rotate = layout == EnvironmentLayout::VerticalCross && face == 5;
                    let cropped = crop_face(image, cell, cell_size, rotate);
                    if cell_size == face_size {
                        cropped
                    } else {
                        ImageData::from_fn(face_size, face_size, |x, y| {
                            cropped.sample(texel_center(x, y, face_size))
                        })
                    }
                })
                .collect()
        }
    };
    Ok(faces)
}

/// Loads an HDR environment image into a float RGB cube map with faces of
/// `face_size`.
pub fn load_environment(backend: &mut dyn Backend, path: &Path, face_size: u32) -> Result<Texture> {
    let image = load_image(path)?;
    let faces = cube_faces_from_image(&image, face_size)?;
    let texture = backend.create_texture(TextureDesc::cube(
        "Environment",
        (face_size, face_size),
        PixelElementSize::Float,
        PixelStructure::Rgb,
    ))?;
    for (layer, face) in (0..FACE_COUNT).zip(&faces) {
        backend.write_texture(&texture, 0, layer, face)?;
    }
    log::info!(
        "Environment {} loaded as {face_size}px cube ({}x{} source)",
        path.display(),
        image.width,
        image.height
    );
    Ok(texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn layouts_follow_aspect_ratio() {
        assert_eq!(
            EnvironmentLayout::detect(64, 32).unwrap(),
            EnvironmentLayout::Equirectangular
        );
        assert_eq!(
            EnvironmentLayout::detect(64, 48).unwrap(),
            EnvironmentLayout::HorizontalCross
        );
        assert_eq!(
            EnvironmentLayout::detect(48, 64).unwrap(),
            EnvironmentLayout::VerticalCross
        );
        assert!(matches!(
            EnvironmentLayout::detect(50, 50),
            Err(PbrError::CubeMapError(_))
        ));
    }

    #[test]
    fn horizontal_cross_faces_come_from_their_cells() {
        // Paint every cell with its column and row.
        let image = ImageData::from_fn(16, 12, |x, y| {
            Vec4::new((x / 4) as f32, (y / 4) as f32, 0.0, 1.0)
        });
        let faces = cube_faces_from_image(&image, 4).unwrap();
        assert_eq!(faces[0].get(0, 0), Vec4::new(2.0, 1.0, 0.0, 1.0));
        assert_eq!(faces[2].get(3, 3), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(faces[5].get(1, 2), Vec4::new(3.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn vertical_cross_back_face_is_rotated() {
        let image = ImageData::from_fn(3, 4, |x, y| Vec4::new(x as f32, y as f32, 0.0, 1.0));
        let faces = cube_faces_from_image(&image, 1).unwrap();
        assert_eq!(faces[5].get(0, 0), Vec4::new(1.0, 3.0, 0.0, 1.0));
        assert_eq!(faces[4].get(0, 0), Vec4::new(1.0, 1.0, 0.0, 1.0));
    }

    #[test]
    fn constant_equirect_gives_constant_faces() {
        let image = ImageData::filled(8, 4, Vec4::new(0.5, 1.0, 2.0, 1.0));
        let faces = cube_faces_from_image(&image, 2).unwrap();
        assert_eq!(faces.len(), 6);
        for face in &faces {
            for p in &face.pixels {
                assert!((*p - Vec4::new(0.5, 1.0, 2.0, 1.0)).abs().max_element() < 1e-5);
            }
        }
    }
}
