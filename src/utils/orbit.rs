use glam::{Quat, Vec3};

use crate::scene::camera::Camera;
use crate::settings::OrbitSettings;

/// Time-driven orbit around the Y axis.
///
/// `angle = elapsed * angular_rate` and the camera sits at
/// `rot_y(angle) * base_offset + target`, looking at `target`.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub angular_rate: f32,
    pub base_offset: Vec3,
    pub target: Vec3,
    elapsed: f64,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(&OrbitSettings::default())
    }
}

impl OrbitCamera {
    #[must_use]
    pub fn new(settings: &OrbitSettings) -> Self {
        Self {
            angular_rate: settings.angular_rate,
            base_offset: settings.base_offset(),
            target: settings.target(),
            elapsed: 0.0,
        }
    }

    /// Accumulates `dt` seconds and returns the camera for the new time.
    pub fn advance(&mut self, dt: f64) -> Camera {
        self.elapsed += dt;
        self.camera()
    }

    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    #[must_use]
    pub fn angle(&self) -> f32 {
        self.elapsed as f32 * self.angular_rate
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        Quat::from_rotation_y(self.angle()) * self.base_offset + self.target
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        Camera::new(self.position(), self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn starts_on_the_base_offset() {
        let orbit = OrbitCamera::default();
        assert_eq!(orbit.position(), Vec3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn quarter_turn_reaches_positive_x() {
        let mut orbit = OrbitCamera::default();
        let seconds = f64::from(FRAC_PI_2 / 0.1);
        let camera = orbit.advance(seconds);
        assert!((camera.position - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-3);
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn distance_to_target_is_preserved() {
        let mut orbit = OrbitCamera::default();
        for _ in 0..100 {
            let camera = orbit.advance(0.37);
            assert!(((camera.position - camera.target).length() - 2.0).abs() < 1e-4);
        }
    }

    #[test]
    fn unit_steps_sweep_at_the_fixed_rate() {
        let mut orbit = OrbitCamera::default();
        for t in 1..=30 {
            let camera = orbit.advance(1.0);
            let radius = glam::Vec2::new(camera.position.x, camera.position.z).length();
            assert!((radius - 2.0).abs() < 1e-4);
            assert_eq!(camera.position.y, 0.0);
            assert!((orbit.angle() - t as f32 * 0.1).abs() < 1e-5);
        }
        let p = orbit.position();
        assert!((p.x.atan2(p.z) - 3.0).abs() < 1e-4);
    }
}
