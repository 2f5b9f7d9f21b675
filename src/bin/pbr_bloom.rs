//! Renders the sample scene headlessly and writes the last frame to a PNG.
//!
//! ```text
//! pbr_bloom [settings.json]
//! ```

use std::process::ExitCode;

use pbr_bloom::app::{Application, HeadlessWindow};
use pbr_bloom::renderer::{Backend, SoftwareBackend, WgpuBackend};
use pbr_bloom::utils::FrameClock;
use pbr_bloom::{AppSettings, BackendKind, Device, Result};

fn run_with<B: Backend>(mut backend: B, settings: AppSettings) -> Result<()> {
    let mut device = Device::new(&mut backend, settings.size(), settings.fov_degrees)?;
    let mut app = Application::new(settings.clone());
    app.startup(&mut backend, &mut device)?;

    let clock = settings
        .fixed_dt
        .map_or_else(FrameClock::default, FrameClock::fixed);
    let mut window = HeadlessWindow::new(backend, device)
        .with_frames(settings.frames)
        .with_clock(clock);
    if let Some(output) = &settings.output {
        window = window.with_output(output);
    }
    app.run(&mut window)
}

fn run() -> Result<()> {
    let settings = match std::env::args().nth(1) {
        Some(path) => AppSettings::load(path)?,
        None => AppSettings::default(),
    };

    match settings.backend {
        BackendKind::Wgpu => {
            let backend = WgpuBackend::new()?;
            log::info!("Using GPU adapter {}", backend.adapter_name());
            run_with(backend, settings)
        }
        BackendKind::Software => run_with(SoftwareBackend::new(), settings),
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
