//! # gnatfix-core
//!
//! Decoding of the debug-information conventions the GNAT Ada compiler
//! layers on top of DWARF.
//!
//! GNAT cannot express every Ada type in the debug format, so it encodes
//! what is missing in names: suffixes such as `___XVE`, `___XP3` or
//! `___XDLU_1__n` on type and component names, and "parallel" types that
//! exist only to carry extra facts about a real type. This crate turns
//! those encodings back into concrete layouts.
//!
//! It provides:
//! - The name codec: GNAT linkage names to Ada names and back, operator
//!   tokens, renaming symbols ([`symbols::demangle`])
//! - Bit-level marshalling for packed data ([`layout::bits`])
//! - Array descriptors: thin and thick pointers, their bounds and data
//!   ([`layout::descriptor`])
//! - Type fixing: given a type and the bytes of an object, the concrete
//!   layout of that object ([`fixing::Evaluation`])
//! - Per-image caches of decoded names and static fixings
//!   ([`symbols::ResolverContext`])
//!
//! ## Inputs
//!
//! The crate does not read object files. Types live in a [`TypeArena`]
//! filled by the caller, names are resolved through a [`TypeDirectory`],
//! and object bytes come from a [`MemoryAccess`] implementation. All three
//! are borrowed for the duration of an [`Evaluation`].

pub mod config;
pub mod error;
pub mod fixing;
pub mod layout;
pub mod memory;
pub mod prelude;
pub mod symbols;
pub mod types;

pub use config::EngineConfig;
pub use error::{GnatError, GnatResult};
pub use fixing::{Degradation, DegradationKind, DiagnosticSink, Evaluation, RecordingSink, TracingSink};
pub use memory::{FlatMemory, MemoryAccess};
pub use symbols::{ImageDescriptor, ImageId, ResolverContext, StaticDirectory, TypeDirectory};
pub use types::{Address, TypeArena, TypeId};
