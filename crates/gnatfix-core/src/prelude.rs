//! Common module for library exports

pub use crate::config::EngineConfig;
pub use crate::error::{GnatError, GnatResult};
pub use crate::fixing::{DiagnosticSink, Evaluation, RecordingSink};
pub use crate::layout::{DescriptorBounds, Target};
pub use crate::memory::{FlatMemory, MemoryAccess};
pub use crate::symbols::{Domain, Entity, ImageDescriptor, ResolverContext, StaticDirectory, Symbol, TypeDirectory};
pub use crate::types::{Address, Contents, Field, Kind, TypeArena, TypeDescriptor, TypeId, Value};
