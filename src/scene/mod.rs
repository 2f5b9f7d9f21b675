//! Scene collaborators: camera, lights, meshes and their hierarchy.

pub mod camera;
pub mod light;
pub mod mesh;
pub mod tree;

pub use camera::Camera;
pub use light::{Light, LightManager};
pub use mesh::Mesh;
pub use tree::{NodeKey, SceneNode, SceneTree};
