//! Application Settings
//!
//! Every knob of the renderer lives in [`AppSettings`]. All structs derive
//! `serde` with `#[serde(default)]`, so a JSON file only needs the fields it
//! wants to change:
//!
//! ```json
//! {
//!     "backend": "software",
//!     "width": 320,
//!     "height": 240,
//!     "bloom": { "merge": true, "exposure": 0.8 }
//! }
//! ```

use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::errors::{PbrError, Result};

/// Which [`Backend`](crate::renderer::Backend) executes the programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Headless GPU device.
    #[default]
    Wgpu,
    /// CPU reference rasterizer.
    Software,
}

/// Sizes and sample counts of the image-based-lighting precomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IblSettings {
    /// Face size of the environment cube built from the source image.
    pub environment_size: u32,
    /// Base face size of the prefiltered specular cube.
    pub prefilter_size: u32,
    /// Number of prefilter mip levels, roughness 0 to 1.
    pub prefilter_levels: u32,
    pub prefilter_samples: i32,
    pub irradiance_size: u32,
    /// Angular step of the irradiance convolution in radians.
    pub irradiance_sample_delta: f32,
    pub brdf_lut_size: u32,
    pub brdf_samples: i32,
}

impl Default for IblSettings {
    fn default() -> Self {
        Self {
            environment_size: 512,
            prefilter_size: 128,
            prefilter_levels: 5,
            prefilter_samples: 1024,
            irradiance_size: 32,
            irradiance_sample_delta: 0.025,
            brdf_lut_size: 512,
            brdf_samples: 1024,
        }
    }
}

/// Bloom post-processing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    /// When false the frame is presented untouched.
    pub enabled: bool,
    /// Luminance above which a pixel contributes to bloom.
    pub threshold: f32,
    /// Separable blur passes (horizontal and vertical alternate).
    pub blur_iterations: u32,
    /// Composite the blur over the frame. When false the blurred highlights
    /// alone are presented.
    pub merge: bool,
    pub exposure: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1.0,
            blur_iterations: 10,
            merge: false,
            exposure: 1.0,
        }
    }
}

/// Time-driven orbit of the camera around its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitSettings {
    /// Radians per second around the Y axis.
    pub angular_rate: f32,
    pub base_offset: [f32; 3],
    pub target: [f32; 3],
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            angular_rate: 0.1,
            base_offset: [0.0, 0.0, 2.0],
            target: [0.0, 0.0, 0.0],
        }
    }
}

impl OrbitSettings {
    #[must_use]
    pub fn base_offset(&self) -> Vec3 {
        Vec3::from_array(self.base_offset)
    }

    #[must_use]
    pub fn target(&self) -> Vec3 {
        Vec3::from_array(self.target)
    }
}

/// Top-level configuration of the sample application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub backend: BackendKind,
    pub width: u32,
    pub height: u32,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Directory holding the environment and material folders.
    pub asset_root: PathBuf,
    /// Environment image, relative to `asset_root`.
    pub environment: PathBuf,
    /// Material folder name under `asset_root`.
    pub material: String,
    /// Number of frames the headless window renders.
    pub frames: u32,
    /// Fixed frame delta in seconds. `None` measures wall-clock time.
    pub fixed_dt: Option<f64>,
    /// Where the last presented frame is written, if anywhere.
    pub output: Option<PathBuf>,
    pub ibl: IblSettings,
    pub bloom: BloomSettings,
    pub orbit: OrbitSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            width: 640,
            height: 480,
            fov_degrees: 45.0,
            asset_root: PathBuf::from("Asset"),
            environment: PathBuf::from("CubeMap/Hamarikyu.hdr"),
            material: "Metal".to_string(),
            frames: 60,
            fixed_dt: Some(1.0 / 60.0),
            output: Some(PathBuf::from("frame.png")),
            ibl: IblSettings::default(),
            bloom: BloomSettings::default(),
            orbit: OrbitSettings::default(),
        }
    }
}

impl AppSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PbrError::AssetNotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn environment_path(&self) -> PathBuf {
        self.asset_root.join(&self.environment)
    }

    #[must_use]
    pub fn material_dir(&self) -> PathBuf {
        self.asset_root.join(&self.material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_scene() {
        let settings = AppSettings::default();
        assert_eq!(settings.ibl.prefilter_size, 128);
        assert_eq!(settings.ibl.prefilter_levels, 5);
        assert_eq!(settings.ibl.irradiance_size, 32);
        assert_eq!(settings.ibl.brdf_lut_size, 512);
        assert_eq!(settings.bloom.blur_iterations, 10);
        assert!(!settings.bloom.merge);
        assert_eq!(settings.orbit.base_offset(), Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings = AppSettings::from_json_str(
            r#"{ "backend": "software", "bloom": { "merge": true } }"#,
        )
        .unwrap();
        assert_eq!(settings.backend, BackendKind::Software);
        assert!(settings.bloom.merge);
        assert_eq!(settings.bloom.threshold, 1.0);
        assert_eq!(settings.width, 640);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = AppSettings::from_json_str(r#"{ "backend": "vulkan" }"#).unwrap_err();
        assert!(matches!(err, PbrError::JsonError(_)));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = AppSettings::load("definitely/not/here.json").unwrap_err();
        assert!(matches!(err, PbrError::AssetNotFound(_)));
    }
}
