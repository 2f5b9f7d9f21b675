#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod app;
pub mod assets;
pub mod device;
pub mod errors;
pub mod passes;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod settings;
pub mod utils;

pub use app::{Application, HeadlessWindow, Window};
pub use device::Device;
pub use errors::{PbrError, Result};
pub use passes::BloomPipeline;
pub use renderer::{Backend, ProgramRegistry, Quad, RenderTarget, SoftwareBackend, WgpuBackend};
pub use resources::{ImageData, ProgramHandle, ProgramKind, Texture, TextureDesc, TextureManager};
pub use scene::{Camera, Light, LightManager, Mesh, SceneTree};
pub use settings::{AppSettings, BackendKind, BloomSettings, IblSettings, OrbitSettings};
pub use utils::OrbitCamera;
