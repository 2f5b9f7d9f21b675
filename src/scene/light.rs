use glam::Vec3;
use smallvec::SmallVec;

use crate::errors::{PbrError, Result};
use crate::resources::program::{ActiveProgram, MAX_LIGHTS};

/// A point light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec3,
    /// Radiant intensity per channel, not clamped to `[0, 1]`.
    pub color: Vec3,
}

impl Light {
    #[must_use]
    pub fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }
}

/// The lights of a scene, as many as the shading program accepts.
#[derive(Debug, Clone, Default)]
pub struct LightManager {
    lights: SmallVec<[Light; MAX_LIGHTS]>,
}

impl LightManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_light(&mut self, light: Light) -> Result<()> {
        if self.lights.len() >= MAX_LIGHTS {
            return Err(PbrError::TooManyLights(MAX_LIGHTS));
        }
        self.lights.push(light);
        Ok(())
    }

    #[must_use]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Uploads `light_position[i]`, `light_color[i]` and `light_count`.
    pub fn register_to_program(&self, program: &mut ActiveProgram<'_>) -> Result<()> {
        for (i, light) in self.lights.iter().enumerate() {
            program.uniform_vector3(&format!("light_position[{i}]"), light.position)?;
            program.uniform_vector3(&format!("light_color[{i}]"), light.color)?;
        }
        program.uniform_int("light_count", self.lights.len() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::program::{ProgramHandle, ProgramKind};

    #[test]
    fn fifth_light_is_rejected() {
        let mut lights = LightManager::new();
        for i in 0..MAX_LIGHTS {
            lights.add_light(Light::new(Vec3::splat(i as f32), Vec3::ONE)).unwrap();
        }
        let err = lights.add_light(Light::new(Vec3::ZERO, Vec3::ONE)).unwrap_err();
        assert!(matches!(err, PbrError::TooManyLights(4)));
    }

    #[test]
    fn lights_land_in_program_arrays() {
        let mut lights = LightManager::new();
        lights.add_light(Light::new(Vec3::X, Vec3::splat(300.0))).unwrap();
        lights.add_light(Light::new(Vec3::Y, Vec3::splat(200.0))).unwrap();

        let program = ProgramHandle::new(ProgramKind::PhysicallyBasedRendering);
        lights.register_to_program(&mut program.use_program()).unwrap();

        let program = program.borrow();
        assert_eq!(program.int("light_count"), 2);
        assert_eq!(program.vec3("light_position[1]"), Vec3::Y);
        assert_eq!(program.vec3("light_color[0]"), Vec3::splat(300.0));
    }
}
