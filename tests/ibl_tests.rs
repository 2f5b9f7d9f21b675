//! IBL Precomputation Tests
//!
//! Tests for:
//! - Prefilter mip chain order and per-level roughness
//! - Convolution of a constant environment (prefilter and irradiance)
//! - BRDF lookup table range and orientation
//! - Texture registration and the shading program's binding order

use std::path::PathBuf;

use glam::{Vec3, Vec4};

use pbr_bloom::errors::PbrError;
use pbr_bloom::passes::ibl::{
    self, MATERIAL_FILES, PBR_TEXTURE_NAMES, irradiance_convolution_factor, prefilter_roughness,
};
use pbr_bloom::renderer::{Backend, ProgramRegistry, SoftwareBackend};
use pbr_bloom::resources::{
    ImageData, PixelElementSize, PixelStructure, ProgramKind, Texture, TextureDesc, TextureKind,
    TextureManager,
};
use pbr_bloom::settings::IblSettings;

const SKY: Vec3 = Vec3::new(0.5, 1.0, 2.0);

fn tiny_settings() -> IblSettings {
    IblSettings {
        environment_size: 4,
        prefilter_size: 8,
        prefilter_levels: 3,
        prefilter_samples: 16,
        irradiance_size: 2,
        irradiance_sample_delta: 0.2,
        brdf_lut_size: 8,
        brdf_samples: 64,
    }
}

fn constant_environment(backend: &mut SoftwareBackend, color: Vec3) -> Texture {
    let texture = backend
        .create_texture(TextureDesc::cube(
            "Environment",
            (4, 4),
            PixelElementSize::Float,
            PixelStructure::Rgb,
        ))
        .unwrap();
    for layer in 0..6 {
        backend
            .write_texture(&texture, 0, layer, &ImageData::filled(4, 4, color.extend(1.0)))
            .unwrap();
    }
    texture
}

fn assert_rgb_close(image: &ImageData, expected: Vec3, tolerance: f32) {
    for p in &image.pixels {
        let diff = (p.truncate() - expected).abs().max_element();
        assert!(diff < tolerance, "expected {expected}, got {p}");
    }
}

// ============================================================================
// Prefilter
// ============================================================================

#[test]
fn prefilter_renders_every_level_in_order() {
    let mut backend = SoftwareBackend::new();
    let mut programs = ProgramRegistry::new();
    let environment = constant_environment(&mut backend, SKY);
    let manager = TextureManager::new().with_texture("Environment", environment.clone());
    let settings = tiny_settings();

    let prefilter = ibl::create_prefilter(&mut backend, &mut programs, &manager, &settings).unwrap();
    assert_eq!(prefilter.kind(), TextureKind::Cube);
    assert_eq!(prefilter.desc().mip_levels, 3);

    let draws = backend.draws();
    assert_eq!(draws.len(), 3 * 6);
    for (i, draw) in draws.iter().enumerate() {
        assert_eq!(draw.program, ProgramKind::MonteCarloPrefilter);
        assert_eq!(draw.level, (i / 6) as u32);
        assert_eq!(draw.layer, (i % 6) as u32);
        assert_eq!(draw.inputs, [environment.id()]);
        assert_eq!(draw.target, prefilter.id());
    }

    // The program is left with the roughness of the last level.
    let program = programs.get("MonteCarloPrefilter").unwrap().borrow();
    assert_eq!(program.float("roughness"), prefilter_roughness(2, 3));
    assert_eq!(program.float("roughness"), 1.0);
}

#[test]
fn prefilter_of_constant_sky_is_constant_at_every_roughness() {
    let mut backend = SoftwareBackend::new();
    let mut programs = ProgramRegistry::new();
    let environment = constant_environment(&mut backend, SKY);
    let manager = TextureManager::new().with_texture("Environment", environment);
    let prefilter =
        ibl::create_prefilter(&mut backend, &mut programs, &manager, &tiny_settings()).unwrap();

    for level in 0..3 {
        for face in 0..6 {
            let image = backend.read_texture(&prefilter, level, face).unwrap();
            assert_eq!(image.width, 8 >> level);
            assert_rgb_close(&image, SKY, 1e-3);
        }
    }
}

#[test]
fn prefilter_levels_beyond_the_chain_are_rejected() {
    let mut backend = SoftwareBackend::new();
    let mut programs = ProgramRegistry::new();
    let environment = constant_environment(&mut backend, SKY);
    let manager = TextureManager::new().with_texture("Environment", environment);
    let settings = IblSettings {
        prefilter_size: 2,
        prefilter_levels: 5,
        ..tiny_settings()
    };
    let err = ibl::create_prefilter(&mut backend, &mut programs, &manager, &settings).unwrap_err();
    assert!(matches!(err, PbrError::InvalidTexture(_)));
}

// ============================================================================
// Irradiance
// ============================================================================

#[test]
fn irradiance_of_constant_sky_matches_the_convolution_factor() {
    let mut backend = SoftwareBackend::new();
    let mut programs = ProgramRegistry::new();
    let environment = constant_environment(&mut backend, SKY);
    let manager = TextureManager::new().with_texture("Environment", environment);
    let settings = tiny_settings();

    let irradiance =
        ibl::create_irradiance(&mut backend, &mut programs, &manager, &settings).unwrap();
    assert_eq!(backend.draws().len(), 6);

    let expected = SKY * irradiance_convolution_factor(settings.irradiance_sample_delta);
    for face in 0..6 {
        let image = backend.read_texture(&irradiance, 0, face).unwrap();
        assert_rgb_close(&image, expected, 1e-3);
    }
}

#[test]
fn irradiance_factor_approaches_one() {
    let fine = irradiance_convolution_factor(0.025);
    let coarse = irradiance_convolution_factor(0.2);
    assert!((fine - 1.0).abs() < (coarse - 1.0).abs());
    assert!((fine - 1.0).abs() < 5e-3);
}

// ============================================================================
// BRDF lookup table
// ============================================================================

#[test]
fn brdf_lut_takes_no_input_and_stays_in_range() {
    let mut backend = SoftwareBackend::new();
    let mut programs = ProgramRegistry::new();
    let lut = ibl::create_integrate_brdf(&mut backend, &mut programs, &tiny_settings()).unwrap();

    assert_eq!(backend.draws().len(), 1);
    assert!(backend.draws()[0].inputs.is_empty());

    let image = backend.read_texture(&lut, 0, 0).unwrap();
    assert_eq!((image.width, image.height), (8, 8));
    for p in &image.pixels {
        assert!(p.x >= 0.0 && p.y >= 0.0, "{p}");
        assert!(p.x + p.y <= 1.02, "{p}");
        assert_eq!(p.z, 0.0);
        assert_eq!(p.w, 1.0);
    }

    // Smooth surfaces seen head-on reflect almost everything through A.
    let smooth_head_on = image.get(7, 0);
    assert!(smooth_head_on.x > 0.8, "{smooth_head_on}");
    assert!(smooth_head_on.y < 0.1, "{smooth_head_on}");
}

// ============================================================================
// create_textures
// ============================================================================

fn material_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pbr_bloom_{test}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    for (_, file) in MATERIAL_FILES {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 128, 255]));
        img.save(dir.join(file)).unwrap();
    }
    dir
}

#[test]
fn create_textures_registers_everything_in_slot_order() {
    let mut backend = SoftwareBackend::new();
    let mut programs = ProgramRegistry::new();
    let environment = constant_environment(&mut backend, SKY);
    let dir = material_dir("create_textures");
    let mut manager = TextureManager::new();

    let names = ibl::create_textures(
        &mut backend,
        &mut programs,
        &mut manager,
        &environment,
        &dir,
        &tiny_settings(),
    )
    .unwrap();

    assert_eq!(names, PBR_TEXTURE_NAMES);
    for name in &names {
        assert!(manager.contains(name), "{name} not registered");
    }
    assert_eq!(manager.get("Environment"), Some(&environment));
    assert_eq!(manager.get("MonteCarloPrefilter").unwrap().kind(), TextureKind::Cube);
    assert_eq!(manager.get("Irradiance").unwrap().kind(), TextureKind::Cube);
    assert_eq!(manager.get("Metallic").unwrap().desc().element, PixelElementSize::Byte);

    let color = backend
        .read_texture(manager.get("Color").unwrap(), 0, 0)
        .unwrap();
    let expected = Vec4::new(200.0 / 255.0, 128.0 / 255.0, 1.0, 1.0);
    assert!((color.get(1, 1) - expected).abs().max_element() < 0.05);

    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn missing_material_aborts_startup() {
    let mut backend = SoftwareBackend::new();
    let mut programs = ProgramRegistry::new();
    let environment = constant_environment(&mut backend, SKY);
    let mut manager = TextureManager::new();

    let err = ibl::create_textures(
        &mut backend,
        &mut programs,
        &mut manager,
        &environment,
        &std::env::temp_dir().join("pbr_bloom_no_such_material"),
        &tiny_settings(),
    )
    .unwrap_err();
    assert!(matches!(err, PbrError::AssetNotFound(_)));
}
