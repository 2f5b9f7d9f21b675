//! Microfacet BRDF helpers shared by the CPU programs.
//!
//! GGX distribution, Smith geometry with Schlick-GGX, Fresnel-Schlick and
//! Hammersley-sequence importance sampling. The WGSL programs implement the
//! same functions.

use std::f32::consts::PI;

use glam::{Vec2, Vec3};

/// Point `i` of an `n`-point Hammersley set.
#[inline]
#[must_use]
pub fn hammersley(i: u32, n: u32) -> Vec2 {
    let radical_inverse = i.reverse_bits() as f32 * 2.328_306_4e-10;
    Vec2::new(i as f32 / n as f32, radical_inverse)
}

/// Orthonormal tangent and bitangent around `n`.
#[inline]
#[must_use]
pub fn tangent_frame(n: Vec3) -> (Vec3, Vec3) {
    let up = if n.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = up.cross(n).normalize();
    let bitangent = n.cross(tangent);
    (tangent, bitangent)
}

/// GGX importance sample of the half vector around `n`.
#[must_use]
pub fn importance_sample_ggx(xi: Vec2, n: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;
    let phi = 2.0 * PI * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let h = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);

    let (tangent, bitangent) = tangent_frame(n);
    (tangent * h.x + bitangent * h.y + n * h.z).normalize()
}

#[inline]
#[must_use]
pub fn distribution_ggx(n: Vec3, h: Vec3, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let n_dot_h = n.dot(h).max(0.0);
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    a2 / (PI * denom * denom).max(1e-7)
}

#[inline]
#[must_use]
pub fn geometry_schlick_ggx(n_dot_v: f32, k: f32) -> f32 {
    n_dot_v / (n_dot_v * (1.0 - k) + k)
}

/// Smith geometry term with the direct-lighting remapping of `k`.
#[must_use]
pub fn geometry_smith_direct(n: Vec3, v: Vec3, l: Vec3, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = r * r / 8.0;
    geometry_schlick_ggx(n.dot(v).max(0.0), k) * geometry_schlick_ggx(n.dot(l).max(0.0), k)
}

/// Smith geometry term with the image-based-lighting remapping of `k`.
#[must_use]
pub fn geometry_smith_ibl(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    geometry_schlick_ggx(n_dot_v, k) * geometry_schlick_ggx(n_dot_l, k)
}

#[inline]
#[must_use]
pub fn fresnel_schlick(cos_theta: f32, f0: Vec3) -> Vec3 {
    f0 + (Vec3::ONE - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

#[inline]
#[must_use]
pub fn fresnel_schlick_roughness(cos_theta: f32, f0: Vec3, roughness: f32) -> Vec3 {
    let max = Vec3::splat(1.0 - roughness).max(f0);
    f0 + (max - f0) * (1.0 - cos_theta).clamp(0.0, 1.0).powi(5)
}

/// Split-sum scale and bias `(A, B)` for a view angle and roughness.
#[must_use]
pub fn integrate_brdf(n_dot_v: f32, roughness: f32, sample_count: u32) -> Vec2 {
    let n_dot_v = n_dot_v.max(1e-4);
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).max(0.0).sqrt(), 0.0, n_dot_v);
    let n = Vec3::Z;

    let mut a = 0.0;
    let mut b = 0.0;
    for i in 0..sample_count {
        let xi = hammersley(i, sample_count);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = (2.0 * v.dot(h) * h - v).normalize();

        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);
        if n_dot_l > 0.0 {
            let g = geometry_smith_ibl(n_dot_v, n_dot_l, roughness);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v).max(1e-7);
            let fc = (1.0 - v_dot_h).powi(5);
            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }
    let count = sample_count.max(1) as f32;
    Vec2::new(a / count, b / count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hammersley_starts_at_origin() {
        assert_eq!(hammersley(0, 16), Vec2::ZERO);
        assert!((hammersley(1, 16).y - 0.5).abs() < 1e-6);
        assert!((hammersley(2, 16).y - 0.25).abs() < 1e-6);
    }

    #[test]
    fn tangent_frame_is_orthonormal() {
        for n in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::NEG_Z, Vec3::new(1.0, 2.0, 3.0).normalize()] {
            let (t, b) = tangent_frame(n);
            assert!(t.dot(n).abs() < 1e-5);
            assert!(b.dot(n).abs() < 1e-5);
            assert!((t.length() - 1.0).abs() < 1e-5);
            assert!((b.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn smooth_head_on_brdf_is_all_scale() {
        let ab = integrate_brdf(1.0, 0.0, 64);
        assert!((ab.x - 1.0).abs() < 1e-3, "{ab:?}");
        assert!(ab.y.abs() < 1e-3, "{ab:?}");
    }

    #[test]
    fn split_sum_terms_stay_in_unit_range() {
        for &(n_dot_v, roughness) in &[(0.1, 0.2), (0.5, 0.5), (0.9, 1.0)] {
            let ab = integrate_brdf(n_dot_v, roughness, 128);
            assert!(ab.x >= 0.0 && ab.y >= 0.0);
            assert!(ab.x + ab.y <= 1.02, "{ab:?}");
        }
    }
}
