//! CPU-side pixel buffers.
//!
//! [`ImageData`] is the exchange format between the asset loaders, the
//! backends (upload and readback) and the software rasterizer. Pixels are
//! stored row-major, top row first, as linear `Vec4` values.

use glam::{Vec2, Vec4};

#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec4>,
}

impl ImageData {
    /// An image filled with a single value.
    #[must_use]
    pub fn filled(width: u32, height: u32, value: Vec4) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; (width * height) as usize],
        }
    }

    /// Builds an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Vec4) -> Self {
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        let width = self.width;
        self.pixels[(y * width + x) as usize] = value;
    }

    /// Texel fetch with clamp-to-edge addressing.
    #[inline]
    #[must_use]
    pub fn fetch_clamped(&self, x: i64, y: i64) -> Vec4 {
        let x = x.clamp(0, i64::from(self.width) - 1) as u32;
        let y = y.clamp(0, i64::from(self.height) - 1) as u32;
        self.get(x, y)
    }

    /// Bilinear sample at normalized coordinates, clamp-to-edge.
    #[must_use]
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let fx = uv.x * self.width as f32 - 0.5;
        let fy = uv.y * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let top = self
            .fetch_clamped(x0, y0)
            .lerp(self.fetch_clamped(x0 + 1, y0), tx);
        let bottom = self
            .fetch_clamped(x0, y0 + 1)
            .lerp(self.fetch_clamped(x0 + 1, y0 + 1), tx);
        top.lerp(bottom, ty)
    }

    /// Largest component over all pixels (alpha excluded).
    #[must_use]
    pub fn max_rgb(&self) -> f32 {
        self.pixels
            .iter()
            .map(|p| p.x.max(p.y).max(p.z))
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Smallest component over all pixels (alpha excluded).
    #[must_use]
    pub fn min_rgb(&self) -> f32 {
        self.pixels
            .iter()
            .map(|p| p.x.min(p.y).min(p.z))
            .fold(f32::INFINITY, f32::min)
    }

    /// Converts to 8-bit RGBA, clamping to `[0, 1]`.
    #[must_use]
    pub fn to_rgba8(&self) -> image::RgbaImage {
        image::RgbaImage::from_fn(self.width, self.height, |x, y| {
            let p = self.get(x, y).clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
            image::Rgba([
                p.x.round() as u8,
                p.y.round() as u8,
                p.z.round() as u8,
                p.w.round() as u8,
            ])
        })
    }

    /// Converts any decoded image to linear float pixels.
    #[must_use]
    pub fn from_dynamic(img: &image::DynamicImage) -> Self {
        let rgba = img.to_rgba32f();
        let (width, height) = rgba.dimensions();
        let pixels = rgba
            .pixels()
            .map(|p| Vec4::new(p[0], p[1], p[2], p[3]))
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }
}
