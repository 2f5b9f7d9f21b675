//! CPU implementations of the renderer's programs.
//!
//! A [`FragmentProgram`] is built once per draw from the active program's
//! uniforms and then evaluated for every texel of the destination.

use std::f32::consts::{FRAC_1_PI, PI};

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

use super::brdf;
use crate::passes::ibl::irradiance_sample_counts;
use crate::resources::cube::{direction_to_equirect, direction_to_face, face_direction};
use crate::resources::image::ImageData;
use crate::resources::program::{MAX_LIGHTS, Program, ProgramKind};

/// Horizontal/vertical Gaussian weights, centre tap first.
pub const BLUR_WEIGHTS: [f32; 5] = [0.227_027, 0.194_594_6, 0.121_621_6, 0.054_054, 0.016_216];

/// Rec. 709 luma coefficients used by the brightness pass.
pub const LUMINANCE: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// Read-only view over the storage of a sampled texture, `[level][layer]`.
#[derive(Clone, Copy)]
pub(crate) struct TextureView<'a> {
    pub levels: &'a [Vec<ImageData>],
}

impl TextureView<'_> {
    fn base(&self) -> &ImageData {
        &self.levels[0][0]
    }

    fn size(&self) -> (u32, u32) {
        let base = self.base();
        (base.width, base.height)
    }

    fn sample(&self, uv: Vec2) -> Vec4 {
        self.base().sample(uv)
    }

    fn texel(&self, x: i64, y: i64) -> Vec4 {
        self.base().fetch_clamped(x, y)
    }

    fn sample_cube_level(&self, dir: Vec3, level: usize) -> Vec4 {
        let (face, uv) = direction_to_face(dir);
        self.levels[level][face as usize].sample(uv)
    }

    /// Trilinear cube sample; `lod` is clamped to the mip chain.
    fn sample_cube(&self, dir: Vec3, lod: f32) -> Vec4 {
        let max_level = self.levels.len() - 1;
        let lod = lod.clamp(0.0, max_level as f32);
        let lo = lod.floor() as usize;
        let hi = (lo + 1).min(max_level);
        let t = lod - lo as f32;
        let a = self.sample_cube_level(dir, lo);
        if hi == lo || t == 0.0 {
            return a;
        }
        a.lerp(self.sample_cube_level(dir, hi), t)
    }

    fn max_lod(&self) -> f32 {
        (self.levels.len() - 1) as f32
    }
}

/// Position of the fragment being shaded.
pub(crate) struct FragCoord {
    /// Normalized coordinates of the texel centre, row 0 on top.
    pub uv: Vec2,
    /// Cube face being written (0 for 2D targets).
    pub layer: u32,
}

pub(crate) struct Fragment {
    pub color: Vec4,
    pub depth: Option<f32>,
}

impl Fragment {
    fn color(rgb: Vec3) -> Self {
        Self {
            color: rgb.extend(1.0),
            depth: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct PointLight {
    position: Vec3,
    color: Vec3,
}

/// Uniforms of one draw, decoded for evaluation.
pub(crate) enum FragmentProgram {
    PhysicallyBased {
        view_proj: Mat4,
        model: Mat4,
        inverse_mvp: Mat4,
        normal_matrix: Mat3,
        camera_position: Vec3,
        lights: Vec<PointLight>,
    },
    Skybox {
        inverse_view_proj: Mat4,
    },
    Prefilter {
        roughness: f32,
        sample_count: u32,
    },
    Irradiance {
        sample_delta: f32,
    },
    IntegrateBrdf {
        sample_count: u32,
    },
    Brightness {
        threshold: f32,
    },
    GaussianBlur {
        horizontal: bool,
    },
    Merge {
        exposure: f32,
    },
}

/// Maps the fragment's uv to normalized device coordinates.
fn ndc(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0)
}

/// Ray through the fragment, expressed in the space `inverse` maps to.
fn unproject(inverse: Mat4, uv: Vec2) -> (Vec3, Vec3) {
    let p = ndc(uv);
    let near = inverse.project_point3(p.extend(0.0));
    let far = inverse.project_point3(p.extend(1.0));
    (near, (far - near).normalize_or_zero())
}

/// Nearest hit of a ray with the unit sphere at the origin.
fn intersect_unit_sphere(origin: Vec3, dir: Vec3) -> Option<Vec3> {
    let b = origin.dot(dir);
    let c = origin.length_squared() - 1.0;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let root = disc.sqrt();
    let t = if -b - root >= 0.0 { -b - root } else { -b + root };
    (t >= 0.0).then(|| origin + dir * t)
}

/// Tangent and bitangent following the sphere's longitude lines.
fn surface_tangents(n: Vec3) -> (Vec3, Vec3) {
    let up = if n.y.abs() < 0.999 { Vec3::Y } else { Vec3::Z };
    let tangent = up.cross(n).normalize();
    (tangent, n.cross(tangent))
}

impl FragmentProgram {
    pub fn new(program: &Program) -> Self {
        match program.kind() {
            ProgramKind::PhysicallyBasedRendering => {
                let projection = program.mat4("projection");
                let view = program.mat4("view");
                let model = program.mat4("model");
                let view_proj = projection * view;
                let count = program.int("light_count").clamp(0, MAX_LIGHTS as i32) as usize;
                let lights = (0..count)
                    .map(|i| PointLight {
                        position: program.vec3(&format!("light_position[{i}]")),
                        color: program.vec3(&format!("light_color[{i}]")),
                    })
                    .collect();
                Self::PhysicallyBased {
                    view_proj,
                    model,
                    inverse_mvp: (view_proj * model).inverse(),
                    normal_matrix: Mat3::from_mat4(model.inverse().transpose()),
                    camera_position: program.vec3("camera_position"),
                    lights,
                }
            }
            ProgramKind::CubeMapHighDynamicRange => {
                let projection = program.mat4("projection");
                let rotation = Mat4::from_mat3(Mat3::from_mat4(program.mat4("view")));
                Self::Skybox {
                    inverse_view_proj: (projection * rotation).inverse(),
                }
            }
            ProgramKind::MonteCarloPrefilter => Self::Prefilter {
                roughness: program.float("roughness"),
                sample_count: program.int("sample_count").max(1) as u32,
            },
            ProgramKind::IrradianceCubeMap => Self::Irradiance {
                sample_delta: program.float("sample_delta"),
            },
            ProgramKind::IntegrateBRDF => Self::IntegrateBrdf {
                sample_count: program.int("sample_count").max(1) as u32,
            },
            ProgramKind::Brightness => Self::Brightness {
                threshold: program.float("threshold"),
            },
            ProgramKind::GaussianBlur => Self::GaussianBlur {
                horizontal: program.int("horizontal") != 0,
            },
            ProgramKind::Merge => Self::Merge {
                exposure: program.float("exposure"),
            },
        }
    }

    /// Shades one fragment. `None` discards it.
    pub fn shade(&self, inputs: &[TextureView<'_>], frag: &FragCoord) -> Option<Fragment> {
        match self {
            Self::PhysicallyBased { .. } => self.physically_based(inputs, frag),
            Self::Skybox { inverse_view_proj } => {
                let (_, dir) = unproject(*inverse_view_proj, frag.uv);
                Some(Fragment::color(inputs[0].sample_cube(dir, 0.0).xyz()))
            }
            Self::Prefilter {
                roughness,
                sample_count,
            } => {
                let n = face_direction(frag.layer, frag.uv).normalize();
                Some(Fragment::color(prefilter(&inputs[0], n, *roughness, *sample_count)))
            }
            Self::Irradiance { sample_delta } => {
                let n = face_direction(frag.layer, frag.uv).normalize();
                Some(Fragment::color(irradiance(&inputs[0], n, *sample_delta)))
            }
            Self::IntegrateBrdf { sample_count } => {
                let ab = brdf::integrate_brdf(frag.uv.x, frag.uv.y, *sample_count);
                Some(Fragment::color(Vec3::new(ab.x, ab.y, 0.0)))
            }
            Self::Brightness { threshold } => {
                let rgb = inputs[0].sample(frag.uv).xyz();
                let bright = rgb.dot(LUMINANCE) > *threshold;
                Some(Fragment::color(if bright { rgb } else { Vec3::ZERO }))
            }
            Self::GaussianBlur { horizontal } => {
                Some(Fragment::color(gaussian_blur(&inputs[0], frag.uv, *horizontal)))
            }
            Self::Merge { exposure } => {
                let hdr = inputs[0].sample(frag.uv).xyz() + inputs[1].sample(frag.uv).xyz();
                let mapped = Vec3::ONE - (-hdr * *exposure).exp();
                Some(Fragment::color(mapped.powf(1.0 / 2.2)))
            }
        }
    }

    fn physically_based(&self, inputs: &[TextureView<'_>], frag: &FragCoord) -> Option<Fragment> {
        let Self::PhysicallyBased {
            view_proj,
            model,
            inverse_mvp,
            normal_matrix,
            camera_position,
            lights,
        } = self
        else {
            return None;
        };

        let (origin, dir) = unproject(*inverse_mvp, frag.uv);
        let hit = intersect_unit_sphere(origin, dir)?;
        let local_normal = hit.normalize();
        let world_pos = model.transform_point3(hit);
        let clip = *view_proj * world_pos.extend(1.0);
        let depth = clip.z / clip.w;

        let uv = direction_to_equirect(local_normal);
        let albedo = inputs[0].sample(uv).xyz().powf(2.2);
        let tangent_normal = inputs[1].sample(uv).xyz() * 2.0 - Vec3::ONE;
        let metallic = inputs[2].sample(uv).x;
        let roughness = inputs[3].sample(uv).x;
        let ao = inputs[4].sample(uv).x;

        let geometric = (*normal_matrix * local_normal).normalize();
        let (tangent, bitangent) = surface_tangents(geometric);
        let n = (tangent * tangent_normal.x + bitangent * tangent_normal.y + geometric * tangent_normal.z)
            .normalize_or(geometric);
        let v = (*camera_position - world_pos).normalize_or_zero();
        let r = (-v).reflect(n);
        let n_dot_v = n.dot(v).max(0.0);

        let f0 = Vec3::splat(0.04).lerp(albedo, metallic);

        let mut lo = Vec3::ZERO;
        for light in lights {
            let to_light = light.position - world_pos;
            let l = to_light.normalize_or_zero();
            let h = (v + l).normalize_or_zero();
            let attenuation = 1.0 / to_light.length_squared().max(1e-4);
            let radiance = light.color * attenuation;

            let ndf = brdf::distribution_ggx(n, h, roughness);
            let g = brdf::geometry_smith_direct(n, v, l, roughness);
            let f = brdf::fresnel_schlick(h.dot(v).max(0.0), f0);
            let n_dot_l = n.dot(l).max(0.0);
            let specular = ndf * g * f / (4.0 * n_dot_v * n_dot_l + 0.0001);

            let k_d = (Vec3::ONE - f) * (1.0 - metallic);
            lo += (k_d * albedo * FRAC_1_PI + specular) * radiance * n_dot_l;
        }

        let f = brdf::fresnel_schlick_roughness(n_dot_v, f0, roughness);
        let k_d = (Vec3::ONE - f) * (1.0 - metallic);
        let diffuse = inputs[6].sample_cube(n, 0.0).xyz() * albedo;

        let prefiltered = inputs[5].sample_cube(r, roughness * inputs[5].max_lod()).xyz();
        let split = inputs[7].sample(Vec2::new(n_dot_v, roughness));
        let specular = prefiltered * (f * split.x + Vec3::splat(split.y));

        let color = (k_d * diffuse + specular) * ao + lo;
        Some(Fragment {
            color: color.extend(1.0),
            depth: Some(depth),
        })
    }
}

/// GGX-filtered radiance around `n` for one roughness.
fn prefilter(environment: &TextureView<'_>, n: Vec3, roughness: f32, sample_count: u32) -> Vec3 {
    let v = n;
    let mut total = Vec3::ZERO;
    let mut weight = 0.0;
    for i in 0..sample_count {
        let xi = brdf::hammersley(i, sample_count);
        let h = brdf::importance_sample_ggx(xi, n, roughness);
        let l = (2.0 * v.dot(h) * h - v).normalize();
        let n_dot_l = n.dot(l).max(0.0);
        if n_dot_l > 0.0 {
            total += environment.sample_cube(l, 0.0).xyz() * n_dot_l;
            weight += n_dot_l;
        }
    }
    if weight > 0.0 {
        total / weight
    } else {
        environment.sample_cube(n, 0.0).xyz()
    }
}

/// Cosine-weighted hemisphere convolution around `n`.
fn irradiance(environment: &TextureView<'_>, n: Vec3, sample_delta: f32) -> Vec3 {
    let (phi_steps, theta_steps) = irradiance_sample_counts(sample_delta);
    let delta = sample_delta.max(1e-3);
    let up = if n.y.abs() < 0.999 { Vec3::Y } else { Vec3::Z };
    let right = up.cross(n).normalize();
    let up = n.cross(right);

    let mut sum = Vec3::ZERO;
    for j in 0..phi_steps {
        let phi = j as f32 * delta;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for i in 0..theta_steps {
            let theta = i as f32 * delta;
            let (sin_theta, cos_theta) = theta.sin_cos();
            let dir = right * (sin_theta * cos_phi) + up * (sin_theta * sin_phi) + n * cos_theta;
            sum += environment.sample_cube(dir, 0.0).xyz() * cos_theta * sin_theta;
        }
    }
    PI * sum / (phi_steps * theta_steps) as f32
}

/// One separable 9-tap Gaussian pass with clamp-to-edge addressing.
fn gaussian_blur(image: &TextureView<'_>, uv: Vec2, horizontal: bool) -> Vec3 {
    let (width, height) = image.size();
    let x = (uv.x * width as f32) as i64;
    let y = (uv.y * height as f32) as i64;
    let (dx, dy) = if horizontal { (1, 0) } else { (0, 1) };

    let mut result = image.texel(x, y).xyz() * BLUR_WEIGHTS[0];
    for (i, weight) in BLUR_WEIGHTS.iter().enumerate().skip(1) {
        let i = i as i64;
        let forward = image.texel(x + dx * i, y + dy * i).xyz();
        let backward = image.texel(x - dx * i, y - dy * i).xyz();
        result += (forward + backward) * *weight;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_weights_never_add_energy() {
        let total = BLUR_WEIGHTS[0] + 2.0 * BLUR_WEIGHTS[1..].iter().sum::<f32>();
        assert!(total <= 1.0);
        assert!(total > 0.999);
    }

    #[test]
    fn center_ray_hits_sphere_front() {
        let hit = intersect_unit_sphere(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z);
        assert_eq!(hit, Some(Vec3::Z));
        assert_eq!(intersect_unit_sphere(Vec3::new(0.0, 2.0, 3.0), Vec3::NEG_Z), None);
    }

    #[test]
    fn ndc_flips_rows() {
        assert_eq!(ndc(Vec2::new(0.0, 0.0)), Vec2::new(-1.0, 1.0));
        assert_eq!(ndc(Vec2::new(1.0, 1.0)), Vec2::new(1.0, -1.0));
    }
}
