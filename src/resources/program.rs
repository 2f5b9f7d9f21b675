//! Shader programs and their uniform contract.
//!
//! Every program is identified by a [`ProgramKind`] whose symbolic name
//! matches the compiled artifact. A kind declares its uniforms (with
//! defaults) and the ordered texture slots its shader samples. The
//! [`Program`] itself is backend independent: it only stores uniform
//! values, which the backend reads at draw time.
//!
//! Uniforms can only be written through an [`ActiveProgram`] guard obtained
//! from [`ProgramHandle::use_program`], so "set uniforms only while the
//! program is in use" holds by construction.

use std::cell::{Ref, RefCell, RefMut};
use std::ops::Deref;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::errors::{PbrError, Result};
use crate::resources::texture::TextureKind;

/// Type of a uniform value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Int,
    Float,
    Vec3,
    Mat4,
}

/// A uniform value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

impl UniformValue {
    #[must_use]
    pub fn ty(&self) -> UniformType {
        match self {
            Self::Int(_) => UniformType::Int,
            Self::Float(_) => UniformType::Float,
            Self::Vec3(_) => UniformType::Vec3,
            Self::Mat4(_) => UniformType::Mat4,
        }
    }
}

/// Declaration of one uniform (or uniform array) of a program.
#[derive(Debug, Clone, Copy)]
pub struct UniformDecl {
    pub name: &'static str,
    pub default: UniformValue,
    /// Array length, 1 for plain uniforms.
    pub count: u32,
}

impl UniformDecl {
    const fn one(name: &'static str, default: UniformValue) -> Self {
        Self {
            name,
            default,
            count: 1,
        }
    }

    const fn array(name: &'static str, default: UniformValue, count: u32) -> Self {
        Self {
            name,
            default,
            count,
        }
    }
}

/// A texture slot sampled by a program, in texture-unit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSlot {
    pub name: &'static str,
    pub kind: TextureKind,
}

impl TextureSlot {
    const fn d2(name: &'static str) -> Self {
        Self {
            name,
            kind: TextureKind::D2,
        }
    }

    const fn cube(name: &'static str) -> Self {
        Self {
            name,
            kind: TextureKind::Cube,
        }
    }
}

/// Maximum number of lights the shading program accepts.
pub const MAX_LIGHTS: usize = 4;

/// Every program the renderer knows how to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    PhysicallyBasedRendering,
    CubeMapHighDynamicRange,
    MonteCarloPrefilter,
    IrradianceCubeMap,
    IntegrateBRDF,
    Brightness,
    GaussianBlur,
    Merge,
}

const ZERO_VEC3: UniformValue = UniformValue::Vec3(Vec3::ZERO);
const IDENTITY: UniformValue = UniformValue::Mat4(Mat4::IDENTITY);

const PBR_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::one("projection", IDENTITY),
    UniformDecl::one("view", IDENTITY),
    UniformDecl::one("model", IDENTITY),
    UniformDecl::one("camera_position", ZERO_VEC3),
    UniformDecl::one("light_count", UniformValue::Int(0)),
    UniformDecl::array("light_position", ZERO_VEC3, MAX_LIGHTS as u32),
    UniformDecl::array("light_color", ZERO_VEC3, MAX_LIGHTS as u32),
];

const PBR_TEXTURES: &[TextureSlot] = &[
    TextureSlot::d2("Color"),
    TextureSlot::d2("Normal"),
    TextureSlot::d2("Metallic"),
    TextureSlot::d2("Roughness"),
    TextureSlot::d2("AmbientOcclusion"),
    TextureSlot::cube("MonteCarloPrefilter"),
    TextureSlot::cube("Irradiance"),
    TextureSlot::d2("IntegrateBRDF"),
];

const SKYBOX_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::one("projection", IDENTITY),
    UniformDecl::one("view", IDENTITY),
];
const PREFILTER_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::one("roughness", UniformValue::Float(0.0)),
    UniformDecl::one("sample_count", UniformValue::Int(1024)),
];
const IRRADIANCE_UNIFORMS: &[UniformDecl] =
    &[UniformDecl::one("sample_delta", UniformValue::Float(0.025))];
const BRDF_UNIFORMS: &[UniformDecl] = &[UniformDecl::one("sample_count", UniformValue::Int(1024))];
const BRIGHTNESS_UNIFORMS: &[UniformDecl] =
    &[UniformDecl::one("threshold", UniformValue::Float(1.0))];
const BLUR_UNIFORMS: &[UniformDecl] = &[UniformDecl::one("horizontal", UniformValue::Int(1))];
const MERGE_UNIFORMS: &[UniformDecl] = &[UniformDecl::one("exposure", UniformValue::Float(1.0))];

const SKYBOX_TEXTURES: &[TextureSlot] = &[TextureSlot::cube("Skybox")];
const ENVIRONMENT_TEXTURES: &[TextureSlot] = &[TextureSlot::cube("Environment")];
const BRIGHTNESS_TEXTURES: &[TextureSlot] = &[TextureSlot::d2("Brightness")];
const BLUR_TEXTURES: &[TextureSlot] = &[TextureSlot::d2("Image")];
const MERGE_TEXTURES: &[TextureSlot] = &[TextureSlot::d2("Display"), TextureSlot::d2("Bloom")];

impl ProgramKind {
    pub const ALL: [ProgramKind; 8] = [
        Self::PhysicallyBasedRendering,
        Self::CubeMapHighDynamicRange,
        Self::MonteCarloPrefilter,
        Self::IrradianceCubeMap,
        Self::IntegrateBRDF,
        Self::Brightness,
        Self::GaussianBlur,
        Self::Merge,
    ];

    /// Symbolic name of the program.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PhysicallyBasedRendering => "PhysicallyBasedRendering",
            Self::CubeMapHighDynamicRange => "CubeMapHighDynamicRange",
            Self::MonteCarloPrefilter => "MonteCarloPrefilter",
            Self::IrradianceCubeMap => "IrradianceCubeMap",
            Self::IntegrateBRDF => "IntegrateBRDF",
            Self::Brightness => "Brightness",
            Self::GaussianBlur => "GaussianBlur",
            Self::Merge => "Merge",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Uniforms in declaration order.
    #[must_use]
    pub fn uniforms(self) -> &'static [UniformDecl] {
        match self {
            Self::PhysicallyBasedRendering => PBR_UNIFORMS,
            Self::CubeMapHighDynamicRange => SKYBOX_UNIFORMS,
            Self::MonteCarloPrefilter => PREFILTER_UNIFORMS,
            Self::IrradianceCubeMap => IRRADIANCE_UNIFORMS,
            Self::IntegrateBRDF => BRDF_UNIFORMS,
            Self::Brightness => BRIGHTNESS_UNIFORMS,
            Self::GaussianBlur => BLUR_UNIFORMS,
            Self::Merge => MERGE_UNIFORMS,
        }
    }

    /// Texture slots in binding order.
    #[must_use]
    pub fn textures(self) -> &'static [TextureSlot] {
        match self {
            Self::PhysicallyBasedRendering => PBR_TEXTURES,
            Self::CubeMapHighDynamicRange => SKYBOX_TEXTURES,
            Self::MonteCarloPrefilter | Self::IrradianceCubeMap => ENVIRONMENT_TEXTURES,
            Self::IntegrateBRDF => &[],
            Self::Brightness => BRIGHTNESS_TEXTURES,
            Self::GaussianBlur => BLUR_TEXTURES,
            Self::Merge => MERGE_TEXTURES,
        }
    }

    /// Whether fragments of this program carry their own depth.
    #[must_use]
    pub fn writes_depth(self) -> bool {
        matches!(self, Self::PhysicallyBasedRendering)
    }
}

/// Splits `name[3]` into `("name", 3)`; plain names get index 0.
fn parse_uniform_name(name: &str) -> Option<(&str, u32)> {
    match name.find('[') {
        None => Some((name, 0)),
        Some(open) => {
            let index = name[open + 1..].strip_suffix(']')?.parse().ok()?;
            Some((&name[..open], index))
        }
    }
}

/// Uniform storage of one compiled program.
#[derive(Debug, Clone)]
pub struct Program {
    kind: ProgramKind,
    /// One entry per declared element, flattened in declaration order.
    values: Vec<UniformValue>,
    version: u64,
}

impl Program {
    #[must_use]
    pub fn new(kind: ProgramKind) -> Self {
        let values = kind
            .uniforms()
            .iter()
            .flat_map(|decl| std::iter::repeat_n(decl.default, decl.count as usize))
            .collect();
        Self {
            kind,
            values,
            version: 0,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Incremented on every successful uniform write.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    fn slot(&self, name: &str) -> Result<(usize, &'static UniformDecl)> {
        let unknown = || PbrError::UnknownUniform {
            program: self.kind.name(),
            name: name.to_string(),
        };
        let (base, index) = parse_uniform_name(name).ok_or_else(unknown)?;
        let mut offset = 0;
        for decl in self.kind.uniforms() {
            if decl.name == base {
                if index >= decl.count {
                    return Err(unknown());
                }
                return Ok((offset + index as usize, decl));
            }
            offset += decl.count as usize;
        }
        Err(unknown())
    }

    /// Reads a uniform by name (`name` or `name[i]`).
    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.slot(name).ok().map(|(slot, _)| self.values[slot])
    }

    #[must_use]
    pub fn float(&self, name: &str) -> f32 {
        match self.uniform(name) {
            Some(UniformValue::Float(v)) => v,
            Some(UniformValue::Int(v)) => v as f32,
            _ => 0.0,
        }
    }

    #[must_use]
    pub fn int(&self, name: &str) -> i32 {
        match self.uniform(name) {
            Some(UniformValue::Int(v)) => v,
            Some(UniformValue::Float(v)) => v as i32,
            _ => 0,
        }
    }

    #[must_use]
    pub fn vec3(&self, name: &str) -> Vec3 {
        match self.uniform(name) {
            Some(UniformValue::Vec3(v)) => v,
            _ => Vec3::ZERO,
        }
    }

    #[must_use]
    pub fn mat4(&self, name: &str) -> Mat4 {
        match self.uniform(name) {
            Some(UniformValue::Mat4(m)) => m,
            _ => Mat4::IDENTITY,
        }
    }

    /// Flattened values in declaration order, used for uniform packing.
    #[must_use]
    pub fn values(&self) -> &[UniformValue] {
        &self.values
    }

    fn set(&mut self, name: &str, value: UniformValue) -> Result<()> {
        let (slot, decl) = self.slot(name)?;
        if decl.default.ty() != value.ty() {
            return Err(PbrError::UniformTypeMismatch {
                program: self.kind.name(),
                name: name.to_string(),
                expected: decl.default.ty(),
            });
        }
        self.values[slot] = value;
        self.version += 1;
        Ok(())
    }
}

/// Shared handle to a program.
///
/// Meshes, quads and the application all refer to the same program object,
/// so uniform writes made by one are seen by the next draw of the others.
#[derive(Debug, Clone)]
pub struct ProgramHandle(Rc<RefCell<Program>>);

impl ProgramHandle {
    #[must_use]
    pub fn new(kind: ProgramKind) -> Self {
        Self(Rc::new(RefCell::new(Program::new(kind))))
    }

    #[must_use]
    pub fn kind(&self) -> ProgramKind {
        self.0.borrow().kind()
    }

    /// Makes the program current; uniforms can be written through the
    /// returned guard until it is dropped.
    ///
    /// Panics if the program is already in use, which would mean two passes
    /// drive the same program at once.
    #[must_use]
    pub fn use_program(&self) -> ActiveProgram<'_> {
        ActiveProgram(self.0.borrow_mut())
    }

    /// Read-only view of the current uniform values.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, Program> {
        self.0.borrow()
    }

    #[must_use]
    pub fn same(&self, other: &ProgramHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// A program in use. Only an active program accepts uniform writes.
pub struct ActiveProgram<'a>(RefMut<'a, Program>);

impl ActiveProgram<'_> {
    pub fn uniform_int(&mut self, name: &str, value: i32) -> Result<()> {
        self.0.set(name, UniformValue::Int(value))
    }

    pub fn uniform_float(&mut self, name: &str, value: f32) -> Result<()> {
        self.0.set(name, UniformValue::Float(value))
    }

    pub fn uniform_vector3(&mut self, name: &str, value: Vec3) -> Result<()> {
        self.0.set(name, UniformValue::Vec3(value))
    }

    pub fn uniform_matrix(&mut self, name: &str, value: Mat4) -> Result<()> {
        self.0.set(name, UniformValue::Mat4(value))
    }

    pub fn uniform(&mut self, name: &str, value: UniformValue) -> Result<()> {
        self.0.set(name, value)
    }

    /// Sets a uniform only if the program declares it.
    pub fn uniform_if_declared(&mut self, name: &str, value: UniformValue) -> Result<bool> {
        if self.0.uniform(name).is_none() {
            return Ok(false);
        }
        self.0.set(name, value)?;
        Ok(true)
    }
}

impl Deref for ActiveProgram<'_> {
    type Target = Program;

    fn deref(&self) -> &Program {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_uniform_names() {
        assert_eq!(parse_uniform_name("roughness"), Some(("roughness", 0)));
        assert_eq!(parse_uniform_name("light_color[3]"), Some(("light_color", 3)));
        assert_eq!(parse_uniform_name("light_color[x]"), None);
        assert_eq!(parse_uniform_name("light_color[2"), None);
    }

    #[test]
    fn defaults_are_flattened_per_element() {
        let program = Program::new(ProgramKind::PhysicallyBasedRendering);
        let expected: u32 = ProgramKind::PhysicallyBasedRendering
            .uniforms()
            .iter()
            .map(|d| d.count)
            .sum();
        assert_eq!(program.values().len(), expected as usize);
    }

    #[test]
    fn every_kind_round_trips_its_name() {
        for kind in ProgramKind::ALL {
            assert_eq!(ProgramKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ProgramKind::from_name("Phong"), None);
    }

    #[test]
    fn schemas_declare_their_uniforms_and_slots() {
        let uniform_names = |kind: ProgramKind| -> Vec<&'static str> {
            kind.uniforms().iter().map(|d| d.name).collect()
        };
        let slot_names = |kind: ProgramKind| -> Vec<&'static str> {
            kind.textures().iter().map(|s| s.name).collect()
        };

        assert_eq!(uniform_names(ProgramKind::CubeMapHighDynamicRange), ["projection", "view"]);
        assert_eq!(
            uniform_names(ProgramKind::MonteCarloPrefilter),
            ["roughness", "sample_count"]
        );
        assert_eq!(uniform_names(ProgramKind::IrradianceCubeMap), ["sample_delta"]);
        assert_eq!(uniform_names(ProgramKind::IntegrateBRDF), ["sample_count"]);
        assert_eq!(uniform_names(ProgramKind::Brightness), ["threshold"]);
        assert_eq!(uniform_names(ProgramKind::GaussianBlur), ["horizontal"]);
        assert_eq!(uniform_names(ProgramKind::Merge), ["exposure"]);

        assert_eq!(slot_names(ProgramKind::CubeMapHighDynamicRange), ["Skybox"]);
        assert_eq!(slot_names(ProgramKind::MonteCarloPrefilter), ["Environment"]);
        assert_eq!(slot_names(ProgramKind::IrradianceCubeMap), ["Environment"]);
        assert!(slot_names(ProgramKind::IntegrateBRDF).is_empty());
        assert_eq!(slot_names(ProgramKind::Merge), ["Display", "Bloom"]);
        assert_eq!(ProgramKind::PhysicallyBasedRendering.textures().len(), 8);

        for kind in ProgramKind::ALL {
            assert_eq!(Program::new(kind).kind(), kind);
        }
    }
}
