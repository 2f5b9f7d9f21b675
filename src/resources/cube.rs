//! Cube map face addressing.
//!
//! Faces are ordered `+X, -X, +Y, -Y, +Z, -Z` and each face is addressed with
//! texture coordinates whose row 0 is the top of the face, the same layout
//! GPU samplers use. The WGSL programs carry an identical table.

use glam::{Vec2, Vec3};

pub const FACE_COUNT: u32 = 6;

/// Direction through the point `uv` (in `[0, 1]²`) of `face`. Not normalized.
#[must_use]
pub fn face_direction(face: u32, uv: Vec2) -> Vec3 {
    let u = uv.x * 2.0 - 1.0;
    let v = uv.y * 2.0 - 1.0;
    match face {
        0 => Vec3::new(1.0, -v, -u),
        1 => Vec3::new(-1.0, -v, u),
        2 => Vec3::new(u, 1.0, v),
        3 => Vec3::new(u, -1.0, -v),
        4 => Vec3::new(u, -v, 1.0),
        _ => Vec3::new(-u, -v, -1.0),
    }
}

/// Inverse of [`face_direction`]: the face hit by `dir` and the coordinates
/// on that face.
#[must_use]
pub fn direction_to_face(dir: Vec3) -> (u32, Vec2) {
    let a = dir.abs();
    let (face, sc, tc, ma) = if a.x >= a.y && a.x >= a.z {
        if dir.x > 0.0 {
            (0, -dir.z, -dir.y, a.x)
        } else {
            (1, dir.z, -dir.y, a.x)
        }
    } else if a.y >= a.z {
        if dir.y > 0.0 {
            (2, dir.x, dir.z, a.y)
        } else {
            (3, dir.x, -dir.z, a.y)
        }
    } else if dir.z > 0.0 {
        (4, dir.x, -dir.y, a.z)
    } else {
        (5, -dir.x, -dir.y, a.z)
    };
    let ma = ma.max(f32::MIN_POSITIVE);
    (face, Vec2::new(sc / ma, tc / ma) * 0.5 + 0.5)
}

/// Longitude/latitude coordinates of a direction in an equirectangular map.
#[must_use]
pub fn direction_to_equirect(dir: Vec3) -> Vec2 {
    let d = dir.normalize_or_zero();
    let u = 0.5 + d.z.atan2(d.x) / std::f32::consts::TAU;
    let v = 0.5 - d.y.clamp(-1.0, 1.0).asin() / std::f32::consts::PI;
    Vec2::new(u, v)
}
