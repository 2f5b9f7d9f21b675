//! Window abstraction.
//!
//! Defines a [`Window`] trait that decouples the application from how frames
//! are scheduled and presented. [`HeadlessWindow`] drives a fixed number of
//! frames off-screen and can write the last presented frame to disk.

use std::path::{Path, PathBuf};

use crate::assets::save_png;
use crate::device::Device;
use crate::errors::Result;
use crate::renderer::Backend;
use crate::resources::image::ImageData;
use crate::resources::texture::Texture;
use crate::utils::FrameClock;

/// What a draw callback may touch during one frame.
pub struct FrameContext<'a> {
    pub backend: &'a mut dyn Backend,
    pub device: &'a mut Device,
}

/// Per-frame callback: receives the frame delta in seconds and the device's
/// colour texture, returns the texture to present.
pub type DrawFn = Box<dyn FnMut(&mut FrameContext<'_>, f64, Texture) -> Result<Texture>>;

/// Frame scheduling and presentation.
pub trait Window {
    /// Size of the presented frames in pixels.
    fn size(&self) -> (u32, u32);

    /// Installs the per-frame callback, replacing any previous one.
    fn set_draw(&mut self, draw: DrawFn);

    /// Runs the frame loop until the window is done.
    fn run(&mut self) -> Result<()>;

    /// The texture presented by the last successful frame.
    fn presented(&self) -> Option<&Texture>;
}

/// A window without a surface.
///
/// Each frame ticks the clock, calls the draw callback (or renders the
/// device scene when none is installed), presents the returned texture and
/// releases backend storage nobody references anymore. A failing frame is
/// logged and the previously presented texture stays on screen.
pub struct HeadlessWindow<B: Backend> {
    backend: B,
    device: Device,
    draw: Option<DrawFn>,
    clock: FrameClock,
    frames: u32,
    presented: Option<Texture>,
    failed_frames: u32,
    output: Option<PathBuf>,
}

impl<B: Backend> HeadlessWindow<B> {
    #[must_use]
    pub fn new(backend: B, device: Device) -> Self {
        Self {
            backend,
            device,
            draw: None,
            clock: FrameClock::default(),
            frames: 1,
            presented: None,
            failed_frames: 0,
            output: None,
        }
    }

    /// Number of frames [`run`](Window::run) renders.
    #[must_use]
    pub fn with_frames(mut self, frames: u32) -> Self {
        self.frames = frames;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: FrameClock) -> Self {
        self.clock = clock;
        self
    }

    /// Writes the last presented frame to `path` when the loop ends.
    #[must_use]
    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    /// Backend and device together, for setup code that needs both.
    pub fn context(&mut self) -> FrameContext<'_> {
        FrameContext {
            backend: &mut self.backend,
            device: &mut self.device,
        }
    }

    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Frames whose callback returned an error.
    #[must_use]
    pub fn failed_frames(&self) -> u32 {
        self.failed_frames
    }

    /// Reads the presented texture back to the CPU.
    pub fn read_presented(&mut self) -> Result<Option<ImageData>> {
        match self.presented.clone() {
            Some(texture) => Ok(Some(self.backend.read_texture(&texture, 0, 0)?)),
            None => Ok(None),
        }
    }

    /// Writes the presented frame to `path` as a PNG. Does nothing when no
    /// frame has been presented yet.
    pub fn save_presented(&mut self, path: &Path) -> Result<()> {
        match self.read_presented()? {
            Some(image) => save_png(&image, path),
            None => {
                log::warn!("No frame presented, nothing written to {}", path.display());
                Ok(())
            }
        }
    }

    fn render_frame(&mut self, dt: f64) -> Result<Texture> {
        let texture = self.device.color_texture().clone();
        let mut ctx = FrameContext {
            backend: &mut self.backend,
            device: &mut self.device,
        };
        match self.draw.as_mut() {
            Some(draw) => draw(&mut ctx, dt, texture),
            None => ctx.device.render(ctx.backend),
        }
    }
}

impl<B: Backend> Window for HeadlessWindow<B> {
    fn size(&self) -> (u32, u32) {
        self.device.size()
    }

    fn set_draw(&mut self, draw: DrawFn) {
        self.draw = Some(draw);
    }

    fn run(&mut self) -> Result<()> {
        log::info!(
            "Headless window running {} frames at {:?} on {}",
            self.frames,
            self.device.size(),
            self.backend.name()
        );
        for _ in 0..self.frames {
            let dt = self.clock.tick();
            match self.render_frame(dt) {
                Ok(texture) => self.presented = Some(texture),
                Err(err) => {
                    self.failed_frames += 1;
                    log::error!(
                        "Frame {} failed, keeping the previous frame: {err}",
                        self.clock.frame_count()
                    );
                }
            }
            let freed = self.backend.prune();
            if freed > 0 {
                log::trace!("Released {freed} textures");
            }
        }

        if let Some(path) = self.output.clone() {
            self.save_presented(&path)?;
        }
        Ok(())
    }

    fn presented(&self) -> Option<&Texture> {
        self.presented.as_ref()
    }
}
