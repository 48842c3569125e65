//! # Types
//!
//! The data model shared by every component: target addresses, the type
//! graph built from debug information, and typed values.

pub mod address;
pub mod descriptor;
pub mod value;

// Re-export all public types
pub use address::Address;
pub use descriptor::{EnumValue, Field, Kind, ScalarKind, TypeArena, TypeDescriptor, TypeId};
pub use value::{Contents, Value};
