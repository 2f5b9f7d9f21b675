//! The device: camera, matrices, lights, textures and the scene, rendered into
//! one colour + depth target.

use glam::{Mat4, Vec4};

use crate::errors::Result;
use crate::renderer::{Backend, RenderTarget};
use crate::resources::program::UniformValue;
use crate::resources::texture::{PixelElementSize, Texture, TextureDesc};
use crate::resources::texture_manager::TextureManager;
use crate::scene::{Camera, LightManager, SceneTree};

const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

#[derive(Debug)]
pub struct Device {
    size: (u32, u32),
    camera: Camera,
    projection: Mat4,
    model: Mat4,
    clear_color: Vec4,
    light_manager: LightManager,
    texture_manager: TextureManager,
    scene_tree: SceneTree,
    target: RenderTarget,
    color: Texture,
}

impl Device {
    /// Allocates the HDR colour texture and its depth store.
    pub fn new(backend: &mut dyn Backend, size: (u32, u32), fov_degrees: f32) -> Result<Self> {
        let color = backend.create_texture(TextureDesc::d2("Display", size, PixelElementSize::Float))?;
        let mut target = RenderTarget::new("Display");
        target.bind_texture(&color)?;
        target.bind_storage(backend, size)?;

        let aspect = size.0 as f32 / size.1.max(1) as f32;
        Ok(Self {
            size,
            camera: Camera::default(),
            projection: Mat4::perspective_rh(fov_degrees.to_radians(), aspect, Z_NEAR, Z_FAR),
            model: Mat4::IDENTITY,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            light_manager: LightManager::new(),
            texture_manager: TextureManager::new(),
            scene_tree: SceneTree::new(),
            target,
            color,
        })
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    #[must_use]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    #[must_use]
    pub fn view(&self) -> Mat4 {
        self.camera.view_matrix()
    }

    #[must_use]
    pub fn model(&self) -> Mat4 {
        self.model
    }

    pub fn set_model(&mut self, model: Mat4) {
        self.model = model;
    }

    pub fn set_clear_color(&mut self, color: Vec4) {
        self.clear_color = color;
    }

    #[must_use]
    pub fn light_manager(&self) -> &LightManager {
        &self.light_manager
    }

    pub fn set_light_manager(&mut self, lights: LightManager) {
        self.light_manager = lights;
    }

    #[must_use]
    pub fn texture_manager(&self) -> &TextureManager {
        &self.texture_manager
    }

    pub fn texture_manager_mut(&mut self) -> &mut TextureManager {
        &mut self.texture_manager
    }

    pub fn set_texture_manager(&mut self, manager: TextureManager) {
        self.texture_manager = manager;
    }

    #[must_use]
    pub fn scene_tree(&self) -> &SceneTree {
        &self.scene_tree
    }

    pub fn set_scene_tree(&mut self, tree: SceneTree) {
        self.scene_tree = tree;
    }

    /// The texture [`render`](Self::render) draws into.
    #[must_use]
    pub fn color_texture(&self) -> &Texture {
        &self.color
    }

    /// Clears the target and draws every mesh of the scene tree.
    ///
    /// Each mesh program that declares `projection`, `view` or `model`
    /// receives the device matrices, the model matrix composed with the
    /// mesh's world matrix.
    pub fn render(&self, backend: &mut dyn Backend) -> Result<Texture> {
        self.target.clear(backend, self.clear_color)?;
        let view = self.view();

        for (world, mesh) in self.scene_tree.meshes() {
            {
                let mut program = mesh.program().use_program();
                program.uniform_if_declared("projection", UniformValue::Mat4(self.projection))?;
                program.uniform_if_declared("view", UniformValue::Mat4(view))?;
                program.uniform_if_declared("model", UniformValue::Mat4(world * self.model))?;
            }
            mesh.draw(backend, &self.target, &self.texture_manager)?;
        }
        log::trace!("Scene rendered into {:?}", self.color.id());
        Ok(self.color.clone())
    }
}
