//! # Symbols
//!
//! Name handling and the seam to the host's symbol tables.
//!
//! The engine does not search debug information itself. It asks a
//! [`TypeDirectory`] for types and variables by their encoded name (a
//! parallel type such as `pkg__rec___XVE`, or a bound variable such as
//! `pkg__arr___U`) and treats a missing entry as normal.
//!
//! - [`demangle`]: GNAT name codec
//! - [`cache`]: [`ResolverContext`], caches shared across evaluations
//! - [`image`]: image identity used as cache key

pub mod cache;
pub mod demangle;
pub mod image;

use std::collections::HashMap;

pub use cache::ResolverContext;
pub use image::{ImageDescriptor, ImageId};

use crate::types::{Address, TypeId};

/// Namespace searched by [`TypeDirectory::lookup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain
{
    Types,
    Variables,
}

/// A variable known to the symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol
{
    pub name: String,
    pub ty: TypeId,
    pub address: Address,
}

impl Symbol
{
    pub fn new(name: impl Into<String>, ty: TypeId, address: Address) -> Self
    {
        Self {
            name: name.into(),
            ty,
            address,
        }
    }
}

/// Result of a directory lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity
{
    Type(TypeId),
    Symbol(Symbol),
}

/// Lookup of encoded names in the host's symbol tables.
pub trait TypeDirectory
{
    /// Find `name` (an exact encoded name) in `domain`.
    fn lookup(&self, name: &str, domain: Domain) -> Option<Entity>;

    /// Convenience: the type registered under `name`.
    fn lookup_type(&self, name: &str) -> Option<TypeId>
    {
        match self.lookup(name, Domain::Types)? {
            Entity::Type(id) => Some(id),
            Entity::Symbol(_) => None,
        }
    }

    /// Convenience: the variable registered under `name`.
    fn lookup_variable(&self, name: &str) -> Option<Symbol>
    {
        match self.lookup(name, Domain::Variables)? {
            Entity::Symbol(symbol) => Some(symbol),
            Entity::Type(_) => None,
        }
    }
}

impl<D: TypeDirectory + ?Sized> TypeDirectory for &D
{
    fn lookup(&self, name: &str, domain: Domain) -> Option<Entity>
    {
        (**self).lookup(name, domain)
    }
}

/// In-memory directory filled by the host (or by tests).
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory
{
    types: HashMap<String, TypeId>,
    variables: HashMap<String, Symbol>,
}

impl StaticDirectory
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn add_type(&mut self, name: impl Into<String>, ty: TypeId)
    {
        self.types.insert(name.into(), ty);
    }

    pub fn add_variable(&mut self, symbol: Symbol)
    {
        self.variables.insert(symbol.name.clone(), symbol);
    }

    pub fn len(&self) -> usize
    {
        self.types.len() + self.variables.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.types.is_empty() && self.variables.is_empty()
    }
}

impl TypeDirectory for StaticDirectory
{
    fn lookup(&self, name: &str, domain: Domain) -> Option<Entity>
    {
        match domain {
            Domain::Types => self.types.get(name).copied().map(Entity::Type),
            Domain::Variables => self.variables.get(name).cloned().map(Entity::Symbol),
        }
    }
}
