//! The sample application: an orbiting camera around a PBR sphere lit by an
//! HDR environment, with bloom on top.

use std::path::Path;

use glam::{Mat4, Vec3};

use crate::app::window::{FrameContext, Window};
use crate::assets::load_environment;
use crate::device::Device;
use crate::errors::Result;
use crate::passes::{BloomPipeline, ibl};
use crate::renderer::{Backend, ProgramRegistry};
use crate::resources::program::ProgramHandle;
use crate::resources::texture::Texture;
use crate::scene::{Light, LightManager, Mesh, SceneNode, SceneTree};
use crate::settings::AppSettings;
use crate::utils::OrbitCamera;

/// Positions of the four point lights.
pub const LIGHT_POSITIONS: [Vec3; 4] = [
    Vec3::new(-10.0, 10.0, 10.0),
    Vec3::new(10.0, 10.0, 10.0),
    Vec3::new(-10.0, -10.0, 10.0),
    Vec3::new(10.0, -10.0, 10.0),
];

pub const LIGHT_COLOR: Vec3 = Vec3::splat(300.0);

/// Whether the shading program exists yet.
#[derive(Debug, Clone)]
pub enum ShadingState {
    Uninitialized,
    /// Startup finished; holds the program receiving `camera_position`.
    Ready(ProgramHandle),
}

#[derive(Debug)]
pub struct Application {
    settings: AppSettings,
    programs: ProgramRegistry,
    orbit: OrbitCamera,
    shading: ShadingState,
    bloom: Option<BloomPipeline>,
}

impl Application {
    #[must_use]
    pub fn new(settings: AppSettings) -> Self {
        let orbit = OrbitCamera::new(&settings.orbit);
        Self {
            settings,
            programs: ProgramRegistry::new(),
            orbit,
            shading: ShadingState::Uninitialized,
            bloom: None,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    #[must_use]
    pub fn shading_state(&self) -> &ShadingState {
        &self.shading
    }

    #[must_use]
    pub fn orbit(&self) -> &OrbitCamera {
        &self.orbit
    }

    #[must_use]
    pub fn bloom(&self) -> Option<&BloomPipeline> {
        self.bloom.as_ref()
    }

    #[must_use]
    pub fn programs(&self) -> &ProgramRegistry {
        &self.programs
    }

    /// Loads the environment and the material from the asset root, then
    /// builds the scene.
    pub fn startup(&mut self, backend: &mut dyn Backend, device: &mut Device) -> Result<()> {
        let environment = load_environment(
            backend,
            &self.settings.environment_path(),
            self.settings.ibl.environment_size,
        )?;
        let material_dir = self.settings.material_dir();
        self.startup_with_environment(backend, device, &environment, &material_dir)
    }

    /// Builds the scene around an already loaded environment cube.
    pub fn startup_with_environment(
        &mut self,
        backend: &mut dyn Backend,
        device: &mut Device,
        environment: &Texture,
        material_dir: &Path,
    ) -> Result<()> {
        let mut lights = LightManager::new();
        for position in LIGHT_POSITIONS {
            lights.add_light(Light::new(position, LIGHT_COLOR))?;
        }
        device.set_light_manager(lights);
        device.set_camera(self.orbit.camera());

        let pbr_mesh =
            self.create_physically_based_rendered_mesh(backend, device, environment, material_dir)?;
        let sky_mesh = self.create_cube_map_mesh(backend)?;
        let program = pbr_mesh.program().clone();

        let mut tree = SceneTree::new();
        let root = tree.add_node(SceneNode::Matrix(Mat4::IDENTITY), None)?;
        tree.add_node(SceneNode::Mesh(sky_mesh), Some(root))?;
        let model = tree.add_node(SceneNode::Matrix(Mat4::IDENTITY), Some(root))?;
        tree.add_node(SceneNode::Mesh(pbr_mesh), Some(model))?;
        device.set_scene_tree(tree);

        self.bloom = Some(BloomPipeline::new(
            backend,
            &mut self.programs,
            self.settings.bloom.clone(),
        )?);
        self.shading = ShadingState::Ready(program);
        log::info!(
            "Startup complete: {} programs on {}",
            self.programs.len(),
            backend.name()
        );
        Ok(())
    }

    fn create_physically_based_rendered_mesh(
        &mut self,
        backend: &mut dyn Backend,
        device: &mut Device,
        environment: &Texture,
        material_dir: &Path,
    ) -> Result<Mesh> {
        let program = self.programs.create(backend, "PhysicallyBasedRendering")?;
        let names = ibl::create_textures(
            backend,
            &mut self.programs,
            device.texture_manager_mut(),
            environment,
            material_dir,
            &self.settings.ibl,
        )?;
        {
            let mut active = program.use_program();
            active.uniform_matrix("projection", device.projection())?;
            active.uniform_matrix("view", device.view())?;
            active.uniform_matrix("model", device.model())?;
            active.uniform_vector3("camera_position", device.camera().position)?;
            device.light_manager().register_to_program(&mut active)?;
        }

        let mut mesh = Mesh::new(program);
        mesh.set_textures(names);
        Ok(mesh)
    }

    fn create_cube_map_mesh(&mut self, backend: &mut dyn Backend) -> Result<Mesh> {
        let program = self.programs.create(backend, "CubeMapHighDynamicRange")?;
        let mut mesh = Mesh::new(program);
        mesh.set_textures(["Environment"]);
        mesh.set_clear_depth(true);
        Ok(mesh)
    }

    /// One frame: advance the orbit, update the camera and its uniform,
    /// render the scene and run bloom over it.
    pub fn draw_frame(&mut self, ctx: &mut FrameContext<'_>, dt: f64, _texture: Texture) -> Result<Texture> {
        let camera = self.orbit.advance(dt);
        ctx.device.set_camera(camera);
        if let ShadingState::Ready(program) = &self.shading {
            program
                .use_program()
                .uniform_vector3("camera_position", camera.position)?;
        }

        let frame = ctx.device.render(ctx.backend)?;
        match self.bloom.as_mut() {
            Some(bloom) => bloom.add_bloom(ctx.backend, &frame),
            None => Ok(frame),
        }
    }

    /// Installs [`draw_frame`](Self::draw_frame) as the window callback and
    /// runs the window.
    pub fn run(mut self, window: &mut dyn Window) -> Result<()> {
        window.set_draw(Box::new(
            move |ctx: &mut FrameContext<'_>, dt: f64, texture: Texture| {
                self.draw_frame(ctx, dt, texture)
            },
        ));
        window.run()
    }
}
