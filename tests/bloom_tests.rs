//! Bloom Pipeline Tests
//!
//! Tests for:
//! - Brightness thresholding on luminance
//! - Ping-pong wiring of the separable blur (targets, inputs, parity)
//! - Energy behaviour of the blur kernel
//! - Persistence of the ping-pong textures across frames
//! - Merge tone mapping and the full add_bloom chain

use glam::{Vec3, Vec4};

use pbr_bloom::passes::BloomPipeline;
use pbr_bloom::renderer::{Backend, ProgramRegistry, SoftwareBackend};
use pbr_bloom::resources::{ImageData, PixelElementSize, ProgramKind, Texture, TextureDesc};
use pbr_bloom::settings::BloomSettings;

fn pipeline(backend: &mut SoftwareBackend, settings: BloomSettings) -> BloomPipeline {
    let mut programs = ProgramRegistry::new();
    BloomPipeline::new(backend, &mut programs, settings).unwrap()
}

fn frame(backend: &mut SoftwareBackend, image: &ImageData) -> Texture {
    let texture = backend
        .create_texture(TextureDesc::d2(
            "Frame",
            (image.width, image.height),
            PixelElementSize::Float,
        ))
        .unwrap();
    backend.write_texture(&texture, 0, 0, image).unwrap();
    texture
}

fn max_rgb(image: &ImageData) -> f32 {
    image
        .pixels
        .iter()
        .map(|p| p.truncate().max_element())
        .fold(0.0, f32::max)
}

// ============================================================================
// Brightness
// ============================================================================

#[test]
fn brightness_keeps_only_pixels_above_threshold() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(&mut backend, BloomSettings::default());
    // Left half luminance 2.0, right half 0.2.
    let image = ImageData::from_fn(4, 2, |x, _| {
        if x < 2 {
            Vec4::new(2.0, 2.0, 2.0, 1.0)
        } else {
            Vec4::new(0.2, 0.2, 0.2, 1.0)
        }
    });
    let input = frame(&mut backend, &image);

    let bright = bloom.create_brightness(&mut backend, &input).unwrap();
    assert_eq!(bright.size(), (4, 2));
    let out = backend.read_texture(&bright, 0, 0).unwrap();
    assert_eq!(out.get(0, 0), Vec4::new(2.0, 2.0, 2.0, 1.0));
    assert_eq!(out.get(3, 1), Vec4::new(0.0, 0.0, 0.0, 1.0));

    let draw = &backend.draws()[0];
    assert_eq!(draw.program, ProgramKind::Brightness);
    assert_eq!(draw.inputs, [input.id()]);
}

#[test]
fn brightness_uses_perceptual_luminance() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(
        &mut backend,
        BloomSettings {
            threshold: 0.5,
            ..BloomSettings::default()
        },
    );
    // Pure green passes, pure blue of the same magnitude does not.
    let image = ImageData::from_fn(2, 1, |x, _| {
        if x == 0 {
            Vec4::new(0.0, 1.0, 0.0, 1.0)
        } else {
            Vec4::new(0.0, 0.0, 1.0, 1.0)
        }
    });
    let input = frame(&mut backend, &image);
    let bright = bloom.create_brightness(&mut backend, &input).unwrap();
    let out = backend.read_texture(&bright, 0, 0).unwrap();
    assert_eq!(out.get(0, 0).truncate(), Vec3::new(0.0, 1.0, 0.0));
    assert_eq!(out.get(1, 0).truncate(), Vec3::ZERO);
}

// ============================================================================
// Gaussian blur ping-pong
// ============================================================================

#[test]
fn ten_passes_alternate_targets_and_end_on_the_first() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(&mut backend, BloomSettings::default());
    let input = frame(&mut backend, &ImageData::filled(8, 8, Vec4::ONE));

    let result = bloom.create_gaussian_blur(&mut backend, &input).unwrap();
    let [t0, t1] = bloom.blur_textures().unwrap();
    let (t0, t1) = (t0.clone(), t1.clone());
    assert_eq!(result, t0);

    let draws = backend.take_draws();
    assert_eq!(draws.len(), 10);
    for (i, draw) in draws.iter().enumerate() {
        assert_eq!(draw.program, ProgramKind::GaussianBlur);
        let expected_target = if i % 2 == 0 { t1.id() } else { t0.id() };
        assert_eq!(draw.target, expected_target, "pass {i}");
        if i == 0 {
            assert_eq!(draw.inputs, [input.id()]);
        } else {
            assert_eq!(draw.inputs, [draws[i - 1].target], "pass {i}");
        }
    }
}

#[test]
fn odd_pass_counts_end_on_the_second_target() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(
        &mut backend,
        BloomSettings {
            blur_iterations: 3,
            ..BloomSettings::default()
        },
    );
    let input = frame(&mut backend, &ImageData::filled(4, 4, Vec4::ONE));
    let result = bloom.create_gaussian_blur(&mut backend, &input).unwrap();
    let [_, t1] = bloom.blur_textures().unwrap();
    assert_eq!(&result, t1);
    assert_eq!(backend.draws().len(), 3);
}

#[test]
fn zero_passes_return_the_input() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(
        &mut backend,
        BloomSettings {
            blur_iterations: 0,
            ..BloomSettings::default()
        },
    );
    let input = frame(&mut backend, &ImageData::filled(4, 4, Vec4::ONE));
    let result = bloom.create_gaussian_blur(&mut backend, &input).unwrap();
    assert_eq!(result, input);
    assert!(backend.draws().is_empty());
}

#[test]
fn blur_never_adds_energy() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(
        &mut backend,
        BloomSettings {
            threshold: 0.5,
            ..BloomSettings::default()
        },
    );
    // A bright square on a dim background.
    let image = ImageData::from_fn(64, 64, |x, y| {
        if (24..40).contains(&x) && (24..40).contains(&y) {
            Vec4::new(4.0, 3.0, 2.0, 1.0)
        } else {
            Vec4::new(0.1, 0.1, 0.1, 1.0)
        }
    });
    let input = frame(&mut backend, &image);

    let bright = bloom.create_brightness(&mut backend, &input).unwrap();
    let bright_image = backend.read_texture(&bright, 0, 0).unwrap();
    let blurred = bloom.create_gaussian_blur(&mut backend, &bright).unwrap();
    let blurred_image = backend.read_texture(&blurred, 0, 0).unwrap();

    assert!(max_rgb(&blurred_image) <= max_rgb(&bright_image) + 1e-5);
    let sum = |img: &ImageData| img.pixels.iter().map(|p| p.truncate().element_sum()).sum::<f32>();
    // The square sits far from the edges, so clamping never duplicates it.
    assert!(sum(&blurred_image) <= sum(&bright_image) * (1.0 + 1e-4));
    // The highlight spreads outside the square.
    assert!(blurred_image.get(22, 32).x > 0.0);
    assert!(blurred_image.pixels.iter().all(|p| p.w == 1.0));
}

#[test]
fn white_frame_through_ten_passes_stays_bounded() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(
        &mut backend,
        BloomSettings {
            threshold: 0.5,
            ..BloomSettings::default()
        },
    );
    let input = frame(&mut backend, &ImageData::filled(64, 64, Vec4::ONE));

    let bright = bloom.create_brightness(&mut backend, &input).unwrap();
    let before = max_rgb(&backend.read_texture(&bright, 0, 0).unwrap());
    let blurred = bloom.create_gaussian_blur(&mut backend, &bright).unwrap();
    let after = backend.read_texture(&blurred, 0, 0).unwrap();

    assert_eq!(before, 1.0);
    assert!(max_rgb(&after) <= before);
    assert!(after.pixels.iter().all(|p| p.min_element() >= 0.0));
}

#[test]
fn blur_of_constant_image_is_constant() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(&mut backend, BloomSettings::default());
    let input = frame(&mut backend, &ImageData::filled(6, 5, Vec4::new(0.5, 1.0, 1.5, 1.0)));
    let blurred = bloom.create_gaussian_blur(&mut backend, &input).unwrap();
    let image = backend.read_texture(&blurred, 0, 0).unwrap();
    for p in &image.pixels {
        assert!((p.truncate() - Vec3::new(0.5, 1.0, 1.5)).abs().max_element() < 1e-4);
    }
}

#[test]
fn ping_pong_textures_persist_until_the_size_changes() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(&mut backend, BloomSettings::default());
    let a = frame(&mut backend, &ImageData::filled(8, 8, Vec4::ONE));
    let b = frame(&mut backend, &ImageData::filled(8, 8, Vec4::ZERO));
    let c = frame(&mut backend, &ImageData::filled(4, 4, Vec4::ONE));

    bloom.create_gaussian_blur(&mut backend, &a).unwrap();
    let first = bloom.blur_textures().unwrap()[0].id();
    bloom.create_gaussian_blur(&mut backend, &b).unwrap();
    assert_eq!(bloom.blur_textures().unwrap()[0].id(), first);

    bloom.create_gaussian_blur(&mut backend, &c).unwrap();
    let resized = bloom.blur_textures().unwrap()[0];
    assert_ne!(resized.id(), first);
    assert_eq!(resized.size(), (4, 4));
}

#[test]
fn blurring_a_previous_result_keeps_its_contents() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(&mut backend, BloomSettings::default());
    let input = frame(&mut backend, &ImageData::filled(16, 16, Vec4::ONE));

    let first = bloom.create_gaussian_blur(&mut backend, &input).unwrap();
    let first_centre = backend.read_texture(&first, 0, 0).unwrap().get(8, 8);
    let second = bloom.create_gaussian_blur(&mut backend, &first).unwrap();

    assert!(!second.same(&first));
    assert!(backend.draws().iter().all(|d| !d.inputs.contains(&d.target)));
    let second_centre = backend.read_texture(&second, 0, 0).unwrap().get(8, 8);
    assert!(first_centre.x > 0.999, "{first_centre}");
    assert!(second_centre.x > 0.999, "{second_centre}");
    // The earlier result is still intact.
    assert_eq!(backend.read_texture(&first, 0, 0).unwrap().get(8, 8), first_centre);
}

// ============================================================================
// Merge & add_bloom
// ============================================================================

#[test]
fn merge_tone_maps_and_gamma_corrects() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(&mut backend, BloomSettings::default());
    let display = frame(&mut backend, &ImageData::filled(2, 2, Vec4::new(1.0, 0.0, 0.5, 1.0)));
    let glow = frame(&mut backend, &ImageData::filled(2, 2, Vec4::new(0.0, 0.0, 0.5, 1.0)));

    let merged = bloom
        .merge_display_and_gaussian_blur(&mut backend, &display, &glow, 1.0)
        .unwrap();
    let p = backend.read_texture(&merged, 0, 0).unwrap().get(0, 0);
    let expected = (1.0f32 - (-1.0f32).exp()).powf(1.0 / 2.2);
    assert!((p.x - expected).abs() < 1e-5);
    assert_eq!(p.y, 0.0);
    assert!((p.z - expected).abs() < 1e-5);

    let draw = backend.draws().last().unwrap();
    assert_eq!(draw.program, ProgramKind::Merge);
    assert_eq!(draw.inputs, [display.id(), glow.id()]);
}

#[test]
fn add_bloom_without_merge_returns_the_blur() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(&mut backend, BloomSettings::default());
    let input = frame(&mut backend, &ImageData::filled(8, 8, Vec4::splat(3.0)));
    let out = bloom.add_bloom(&mut backend, &input).unwrap();

    assert_eq!(&out, bloom.blur_textures().unwrap()[0]);
    let programs: Vec<ProgramKind> = backend.draws().iter().map(|d| d.program).collect();
    assert_eq!(programs[0], ProgramKind::Brightness);
    assert_eq!(programs.len(), 11);
    assert!(!programs.contains(&ProgramKind::Merge));
}

#[test]
fn add_bloom_with_merge_composites_over_the_frame() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(
        &mut backend,
        BloomSettings {
            merge: true,
            ..BloomSettings::default()
        },
    );
    let input = frame(&mut backend, &ImageData::filled(8, 8, Vec4::splat(0.2)));
    let out = bloom.add_bloom(&mut backend, &input).unwrap();

    let last = backend.draws().last().unwrap();
    assert_eq!(last.program, ProgramKind::Merge);
    assert_eq!(last.target, out.id());
    assert_eq!(last.inputs[0], input.id());

    // Nothing passes the threshold, so only the frame is tone mapped.
    let p = backend.read_texture(&out, 0, 0).unwrap().get(4, 4);
    let expected = (1.0f32 - (-0.2f32).exp()).powf(1.0 / 2.2);
    assert!((p.x - expected).abs() < 1e-5);
}

#[test]
fn disabled_bloom_passes_the_frame_through() {
    let mut backend = SoftwareBackend::new();
    let mut bloom = pipeline(
        &mut backend,
        BloomSettings {
            enabled: false,
            ..BloomSettings::default()
        },
    );
    let input = frame(&mut backend, &ImageData::filled(4, 4, Vec4::ONE));
    let out = bloom.add_bloom(&mut backend, &input).unwrap();
    assert_eq!(out, input);
    assert!(backend.draws().is_empty());
}
