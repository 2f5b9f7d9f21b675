//! Bloom post-processing.
//!
//! ```text
//! frame ──► Brightness ──► GaussianBlur ×N (ping-pong) ──► [Merge] ──► output
//! ```
//!
//! The blur alternates horizontal and vertical passes between the two
//! attachments of one render target. Attachment `T[h]` is written while
//! `horizontal == h`, and every pass after the first reads the attachment the
//! previous pass wrote. Both attachments persist across frames and are only
//! reallocated when the frame size changes or the input is one of them.

use crate::errors::Result;
use crate::renderer::{Backend, ProgramRegistry, Quad, RenderTarget};
use crate::resources::program::ProgramKind;
use crate::resources::texture::{PixelElementSize, Texture, TextureDesc};
use crate::resources::texture_manager::TextureManager;
use crate::settings::BloomSettings;

/// Brightness extraction, separable blur and the optional composite.
#[derive(Debug)]
pub struct BloomPipeline {
    settings: BloomSettings,
    brightness: Quad,
    blur: Quad,
    merge: Quad,
    ping_pong: Option<RenderTarget>,
}

impl BloomPipeline {
    /// Compiles (or reuses) the three bloom programs.
    pub fn new(
        backend: &mut dyn Backend,
        programs: &mut ProgramRegistry,
        settings: BloomSettings,
    ) -> Result<Self> {
        let mut brightness = Quad::new(programs.create_kind(backend, ProgramKind::Brightness)?);
        brightness.set_textures(["Brightness"]);
        let mut blur = Quad::new(programs.create_kind(backend, ProgramKind::GaussianBlur)?);
        blur.set_textures(["Image"]);
        let mut merge = Quad::new(programs.create_kind(backend, ProgramKind::Merge)?);
        merge.set_textures(["Display", "Bloom"]);

        Ok(Self {
            settings,
            brightness,
            blur,
            merge,
            ping_pong: None,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &BloomSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut BloomSettings {
        &mut self.settings
    }

    /// The two ping-pong textures `[T0, T1]`, once a blur has run.
    #[must_use]
    pub fn blur_textures(&self) -> Option<[&Texture; 2]> {
        let target = self.ping_pong.as_ref()?;
        Some([target.texture(0)?, target.texture(1)?])
    }

    /// Keeps the pixels of `frame` whose luminance exceeds the threshold.
    pub fn create_brightness(&mut self, backend: &mut dyn Backend, frame: &Texture) -> Result<Texture> {
        let output = backend.create_texture(TextureDesc::d2(
            "Brightness",
            frame.size(),
            PixelElementSize::Float,
        ))?;
        self.brightness
            .program()
            .use_program()
            .uniform_float("threshold", self.settings.threshold)?;

        let mut target = RenderTarget::new("Brightness");
        target.bind_texture(&output)?;
        let manager = TextureManager::new().with_texture("Brightness", frame.clone());
        self.brightness.draw(backend, &target, &manager)?;
        Ok(output)
    }

    /// Returns the ping-pong target for `image`, allocating a new pair when
    /// the size changed or when `image` is one of the current attachments.
    fn ping_pong_target<'a>(
        slot: &'a mut Option<RenderTarget>,
        backend: &mut dyn Backend,
        image: &Texture,
    ) -> Result<&'a mut RenderTarget> {
        let size = image.size();
        if let Some(target) = slot.take() {
            let aliased = (0..target.attachment_count())
                .filter_map(|which| target.texture(which))
                .any(|texture| texture == image);
            let matches = target.texture(0).is_some_and(|t| t.size() == size);
            if matches && !aliased {
                return Ok(slot.insert(target));
            }
        }

        let mut target = RenderTarget::new("Gaussian Blur");
        for label in ["Gaussian Blur 0", "Gaussian Blur 1"] {
            let texture =
                backend.create_texture(TextureDesc::d2(label, size, PixelElementSize::Float))?;
            target.attach(&texture);
        }
        log::debug!("Bloom ping-pong targets allocated at {size:?}");
        Ok(slot.insert(target))
    }

    /// Runs the configured number of separable blur passes over `image`.
    ///
    /// Returns the attachment the last pass wrote: `T0` after an even number
    /// of passes, `T1` after an odd one, and `image` itself when no pass is
    /// configured. Blurring a previous result moves the pipeline onto a fresh
    /// pair so the input is never overwritten.
    pub fn create_gaussian_blur(&mut self, backend: &mut dyn Backend, image: &Texture) -> Result<Texture> {
        let iterations = self.settings.blur_iterations;
        if iterations == 0 {
            return Ok(image.clone());
        }
        let target = Self::ping_pong_target(&mut self.ping_pong, backend, image)?;

        let mut horizontal = true;
        let mut beginning = true;
        for _ in 0..iterations {
            self.blur
                .program()
                .use_program()
                .uniform_int("horizontal", i32::from(horizontal))?;
            target.bind(usize::from(horizontal))?;

            let source = if beginning {
                image.clone()
            } else {
                target.attached(usize::from(!horizontal))?.clone()
            };
            let manager = TextureManager::new().with_texture("Image", source);
            self.blur.draw(backend, target, &manager)?;

            horizontal = !horizontal;
            beginning = false;
        }

        Ok(target.attached(usize::from(!horizontal))?.clone())
    }

    /// Adds the blurred highlights back onto `display`, tone maps and
    /// gamma-corrects the sum.
    pub fn merge_display_and_gaussian_blur(
        &mut self,
        backend: &mut dyn Backend,
        display: &Texture,
        blur: &Texture,
        exposure: f32,
    ) -> Result<Texture> {
        let output = backend.create_texture(TextureDesc::d2(
            "Bloom Merge",
            display.size(),
            PixelElementSize::Float,
        ))?;
        self.merge
            .program()
            .use_program()
            .uniform_float("exposure", exposure)?;

        let mut target = RenderTarget::new("Bloom Merge");
        target.bind_texture(&output)?;
        let manager = TextureManager::new()
            .with_texture("Display", display.clone())
            .with_texture("Bloom", blur.clone());
        self.merge.draw(backend, &target, &manager)?;
        Ok(output)
    }

    /// Full bloom chain over one frame.
    pub fn add_bloom(&mut self, backend: &mut dyn Backend, frame: &Texture) -> Result<Texture> {
        if !self.settings.enabled {
            return Ok(frame.clone());
        }
        let brightness = self.create_brightness(backend, frame)?;
        let blurred = self.create_gaussian_blur(backend, &brightness)?;
        if !self.settings.merge {
            return Ok(blurred);
        }
        let exposure = self.settings.exposure;
        self.merge_display_and_gaussian_blur(backend, frame, &blurred, exposure)
    }
}
