//! # Layout
//!
//! Reading objects laid out the way GNAT lays them out.
//!
//! - [`bits`]: bit-level unpack/pack of packed components
//! - [`descriptor`]: fat and thin pointers to unconstrained arrays
//! - [`fields`]: component lookup and scalar extraction
//!
//! The descriptor and field operations are methods of [`Target`], a
//! read-only view over the type arena and the host collaborators. A
//! [`Target`] is cheap to build and is what the fixing engine hands to these
//! modules between its own (mutating) steps.

pub mod bits;
pub mod descriptor;
pub mod fields;

pub use descriptor::{DataPointer, DescriptorBounds, Dimensions, MAX_ARITY};

use crate::config::EngineConfig;
use crate::memory::MemoryAccess;
use crate::symbols::TypeDirectory;
use crate::types::{Kind, TypeArena, TypeId};

/// Read-only view of everything needed to interpret target objects.
#[derive(Clone, Copy)]
pub struct Target<'a>
{
    pub arena: &'a TypeArena,
    pub directory: &'a dyn TypeDirectory,
    pub memory: &'a dyn MemoryAccess,
    pub config: &'a EngineConfig,
}

impl<'a> Target<'a>
{
    pub fn new(arena: &'a TypeArena, directory: &'a dyn TypeDirectory, memory: &'a dyn MemoryAccess, config: &'a EngineConfig) -> Self
    {
        Self {
            arena,
            directory,
            memory,
            config,
        }
    }

    /// Collapse typedefs, bounded by the configured depth.
    pub fn strip(&self, ty: TypeId) -> TypeId
    {
        self.arena.strip_typedefs(ty, self.config.max_depth)
    }

    /// Kind of `ty` with typedefs looked through.
    pub fn kind(&self, ty: TypeId) -> &'a Kind
    {
        self.arena.kind(self.strip(ty))
    }

    /// The parallel type `<name of ty><suffix>`, if the directory has one.
    pub fn parallel_type(&self, ty: TypeId, suffix: &str) -> Option<TypeId>
    {
        let name = self.arena.name(ty).or_else(|| self.arena.name(self.strip(ty)))?;
        self.directory.lookup_type(&format!("{name}{suffix}"))
    }
}
