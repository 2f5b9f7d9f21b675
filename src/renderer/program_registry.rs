//! Named program instances.

use rustc_hash::FxHashMap;

use crate::errors::{PbrError, Result};
use crate::renderer::Backend;
use crate::resources::program::{ProgramHandle, ProgramKind};

/// Compiles each program once and hands out shared handles to it.
///
/// A registry belongs to one backend; handles obtained from it must only be
/// drawn with that backend.
#[derive(Debug, Default)]
pub struct ProgramRegistry {
    programs: FxHashMap<ProgramKind, ProgramHandle>,
}

impl ProgramRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the program registered under `name`, compiling it on first use.
    pub fn create(&mut self, backend: &mut dyn Backend, name: &str) -> Result<ProgramHandle> {
        let kind =
            ProgramKind::from_name(name).ok_or_else(|| PbrError::UnknownProgram(name.to_string()))?;
        self.create_kind(backend, kind)
    }

    pub fn create_kind(&mut self, backend: &mut dyn Backend, kind: ProgramKind) -> Result<ProgramHandle> {
        if let Some(program) = self.programs.get(&kind) {
            return Ok(program.clone());
        }
        backend.compile_program(kind)?;
        log::debug!("Compiled program {} on {}", kind.name(), backend.name());
        let program = ProgramHandle::new(kind);
        self.programs.insert(kind, program.clone());
        Ok(program)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ProgramHandle> {
        ProgramKind::from_name(name).and_then(|kind| self.programs.get(&kind))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
