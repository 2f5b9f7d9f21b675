//! Application layer.
//!
//! - [`Window`] / [`HeadlessWindow`]: frame scheduling and presentation
//! - [`Application`]: startup of the sample scene and the per-frame logic

pub mod application;
pub mod window;

pub use application::{Application, ShadingState};
pub use window::{DrawFn, FrameContext, HeadlessWindow, Window};
