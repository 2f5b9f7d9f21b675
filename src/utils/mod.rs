//! Utility Module
//!
//! - [`FrameClock`]: fixed-step or wall-clock frame timing
//! - [`OrbitCamera`]: time-driven camera orbit around the Y axis

pub mod clock;
pub mod orbit;

pub use clock::FrameClock;
pub use orbit::OrbitCamera;
