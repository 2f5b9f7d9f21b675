//! Image-based lighting precomputation.
//!
//! From an HDR environment cube three textures are rendered once at startup:
//!
//! | Texture               | Program               | Shape                     |
//! |-----------------------|-----------------------|---------------------------|
//! | `MonteCarloPrefilter` | `MonteCarloPrefilter` | cube, N mip levels        |
//! | `Irradiance`          | `IrradianceCubeMap`   | cube, one level           |
//! | `IntegrateBRDF`       | `IntegrateBRDF`       | 2D lookup table, no input |
//!
//! Each prefilter level `i` is convolved with GGX roughness `i / (N - 1)`,
//! so the shading program picks the level with `roughness * (N - 1)`.

use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::path::Path;

use crate::assets;
use crate::errors::Result;
use crate::passes::fill::{fill, fill_mipmap};
use crate::renderer::{Backend, ProgramRegistry};
use crate::resources::program::ProgramKind;
use crate::resources::texture::{PixelElementSize, PixelStructure, Texture, TextureDesc};
use crate::resources::texture_manager::TextureManager;
use crate::settings::IblSettings;

/// Texture names bound to the shading program, in slot order.
pub const PBR_TEXTURE_NAMES: [&str; 8] = [
    "Color",
    "Normal",
    "Metallic",
    "Roughness",
    "AmbientOcclusion",
    "MonteCarloPrefilter",
    "Irradiance",
    "IntegrateBRDF",
];

/// Material texture name and the file it is loaded from.
pub const MATERIAL_FILES: [(&str, &str); 5] = [
    ("Color", "Color.jpg"),
    ("Normal", "Normal.jpg"),
    ("Metallic", "Metalness.jpg"),
    ("Roughness", "Roughness.jpg"),
    ("AmbientOcclusion", "AmbientOcclusion.jpg"),
];

/// GGX roughness the prefilter convolves mip `level` with.
#[must_use]
pub fn prefilter_roughness(level: u32, levels: u32) -> f32 {
    if levels <= 1 {
        0.0
    } else {
        level as f32 / (levels - 1) as f32
    }
}

/// Number of azimuth and polar steps of the irradiance convolution for a
/// given angular step.
#[must_use]
pub fn irradiance_sample_counts(sample_delta: f32) -> (u32, u32) {
    let delta = sample_delta.max(1e-3);
    let phi_steps = (TAU / delta).ceil() as u32;
    let theta_steps = (FRAC_PI_2 / delta).ceil() as u32;
    (phi_steps.max(1), theta_steps.max(1))
}

/// Value the irradiance convolution produces for a constant unit radiance.
///
/// The program sums `cos(theta) * sin(theta)` over a fixed grid of
/// `sample_delta` steps and scales by `PI / count`, which only approaches 1
/// as the step shrinks.
#[must_use]
pub fn irradiance_convolution_factor(sample_delta: f32) -> f32 {
    let delta = sample_delta.max(1e-3);
    let (_, n_theta) = irradiance_sample_counts(delta);
    let sum: f32 = (0..n_theta)
        .map(|i| {
            let theta = i as f32 * delta;
            theta.cos() * theta.sin()
        })
        .sum();
    PI * sum / n_theta as f32
}

fn float_cube(label: &'static str, size: u32) -> TextureDesc {
    TextureDesc::cube(
        label,
        (size, size),
        PixelElementSize::Float,
        PixelStructure::Rgb,
    )
}

/// Renders the prefiltered specular cube from `manager["Environment"]`.
pub fn create_prefilter(
    backend: &mut dyn Backend,
    programs: &mut ProgramRegistry,
    manager: &TextureManager,
    settings: &IblSettings,
) -> Result<Texture> {
    let program = programs.create_kind(backend, ProgramKind::MonteCarloPrefilter)?;
    let levels = settings.prefilter_levels;
    let output = backend.create_texture(
        float_cube("MonteCarloPrefilter", settings.prefilter_size).with_mip_levels(levels),
    )?;

    fill_mipmap(
        backend,
        &output,
        manager,
        &["Environment"],
        &program,
        levels,
        |level, active| {
            active.uniform_float("roughness", prefilter_roughness(level, levels))?;
            active.uniform_int("sample_count", settings.prefilter_samples)
        },
    )?;
    log::debug!(
        "Prefilter cube rendered: {} levels from {}px",
        levels,
        settings.prefilter_size
    );
    Ok(output)
}

/// Renders the diffuse irradiance cube from `manager["Environment"]`.
pub fn create_irradiance(
    backend: &mut dyn Backend,
    programs: &mut ProgramRegistry,
    manager: &TextureManager,
    settings: &IblSettings,
) -> Result<Texture> {
    let program = programs.create_kind(backend, ProgramKind::IrradianceCubeMap)?;
    let output = backend.create_texture(float_cube("Irradiance", settings.irradiance_size))?;
    program
        .use_program()
        .uniform_float("sample_delta", settings.irradiance_sample_delta)?;

    fill(backend, &output, manager, &["Environment"], &program)?;
    log::debug!("Irradiance cube rendered at {}px", settings.irradiance_size);
    Ok(output)
}

/// Renders the split-sum BRDF lookup table. Takes no input texture.
pub fn create_integrate_brdf(
    backend: &mut dyn Backend,
    programs: &mut ProgramRegistry,
    settings: &IblSettings,
) -> Result<Texture> {
    let program = programs.create_kind(backend, ProgramKind::IntegrateBRDF)?;
    let size = settings.brdf_lut_size;
    let output = backend.create_texture(
        TextureDesc::d2("IntegrateBRDF", (size, size), PixelElementSize::Float)
            .with_structure(PixelStructure::Rgb),
    )?;
    program
        .use_program()
        .uniform_int("sample_count", settings.brdf_samples)?;

    fill(backend, &output, &TextureManager::new(), &[], &program)?;
    log::debug!("BRDF lookup table rendered at {size}px");
    Ok(output)
}

/// The three precomputed lighting textures.
#[derive(Debug, Clone)]
pub struct IblTextures {
    pub prefilter: Texture,
    pub irradiance: Texture,
    pub brdf_lut: Texture,
}

/// Runs the three precomputation passes over `environment`.
pub fn precompute(
    backend: &mut dyn Backend,
    programs: &mut ProgramRegistry,
    environment: &Texture,
    settings: &IblSettings,
) -> Result<IblTextures> {
    let manager = TextureManager::new().with_texture("Environment", environment.clone());
    let prefilter = create_prefilter(backend, programs, &manager, settings)?;
    let irradiance = create_irradiance(backend, programs, &manager, settings)?;
    let brdf_lut = create_integrate_brdf(backend, programs, settings)?;
    Ok(IblTextures {
        prefilter,
        irradiance,
        brdf_lut,
    })
}

/// Loads the five material textures of `material_dir` into `manager`.
pub fn load_material(
    backend: &mut dyn Backend,
    manager: &mut TextureManager,
    material_dir: &Path,
) -> Result<()> {
    for (name, file) in MATERIAL_FILES {
        let texture = assets::load_texture(backend, &material_dir.join(file))?;
        manager.add_texture(name, texture);
    }
    Ok(())
}

/// Precomputes the lighting textures, loads the material and registers
/// everything the shading program samples in `manager`.
///
/// Returns the names to bind to the shading program, in slot order.
pub fn create_textures(
    backend: &mut dyn Backend,
    programs: &mut ProgramRegistry,
    manager: &mut TextureManager,
    environment: &Texture,
    material_dir: &Path,
    settings: &IblSettings,
) -> Result<Vec<String>> {
    let ibl = precompute(backend, programs, environment, settings)?;
    manager.add_texture("Environment", environment.clone());
    manager.add_texture("MonteCarloPrefilter", ibl.prefilter);
    manager.add_texture("Irradiance", ibl.irradiance);
    manager.add_texture("IntegrateBRDF", ibl.brdf_lut);
    load_material(backend, manager, material_dir)?;

    log::info!(
        "IBL textures ready: prefilter {}px x{}, irradiance {}px, BRDF LUT {}px",
        settings.prefilter_size,
        settings.prefilter_levels,
        settings.irradiance_size,
        settings.brdf_lut_size
    );
    Ok(PBR_TEXTURE_NAMES.iter().map(ToString::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roughness_spans_the_mip_chain() {
        assert_eq!(prefilter_roughness(0, 5), 0.0);
        assert_eq!(prefilter_roughness(2, 5), 0.5);
        assert_eq!(prefilter_roughness(4, 5), 1.0);
        assert_eq!(prefilter_roughness(0, 1), 0.0);
        for level in 1..5 {
            assert!(prefilter_roughness(level, 5) >= prefilter_roughness(level - 1, 5));
            assert_eq!(prefilter_roughness(level, 5), level as f32 / 4.0);
        }
    }

    #[test]
    fn sample_counts_cover_the_hemisphere() {
        assert_eq!(irradiance_sample_counts(0.5), (13, 4));
        assert_eq!(irradiance_sample_counts(0.025), (252, 63));
        assert_eq!(irradiance_sample_counts(10.0), (1, 1));
        let (phi, theta) = irradiance_sample_counts(0.0);
        assert!(phi > 0 && theta > 0);
    }

    #[test]
    fn convolution_factor_is_close_to_one() {
        let factor = irradiance_convolution_factor(0.025);
        assert!((factor - 1.0).abs() < 1e-2, "{factor}");
        // 4 theta steps: PI / 4 * (sin 1 + sin 2 + sin 3) / 2
        let coarse = irradiance_convolution_factor(0.5);
        assert!((coarse - 0.743).abs() < 1e-3, "{coarse}");
    }
}
