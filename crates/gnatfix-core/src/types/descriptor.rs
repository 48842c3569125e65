//! Type descriptors and the arena that owns them.
//!
//! Debug information describes types as a graph that may refer back to
//! itself (a record holding an access to its own type, a typedef naming a
//! record declared later). The graph lives in a [`TypeArena`] and nodes
//! refer to one another through [`TypeId`] indices, so cycles never become
//! recursive ownership.
//!
//! Descriptors are immutable once added. The fixing engine never edits a
//! descriptor in place; it appends new ones and hands back their ids.

use std::fmt;

use crate::error::{GnatError, GnatResult};

/// Index of a [`TypeDescriptor`] inside a [`TypeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

impl TypeId
{
    /// Position of the descriptor in its arena.
    pub const fn index(self) -> usize
    {
        self.0 as usize
    }
}

impl fmt::Display for TypeId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{}", self.0)
    }
}

/// Flavour of a scalar base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind
{
    Int
    {
        signed: bool
    },
    Float,
    Char,
    Bool,
}

/// One literal of an enumeration type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue
{
    pub name: String,
    pub value: i64,
}

impl EnumValue
{
    pub fn new(name: impl Into<String>, value: i64) -> Self
    {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A record or union component.
///
/// `bit_size` of zero means the component occupies the natural size of its
/// type; a non-zero value is an explicit (packed) width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field
{
    pub name: String,
    pub ty: TypeId,
    pub bit_pos: u64,
    pub bit_size: u32,
}

impl Field
{
    /// A field at `bit_pos` with the natural size of `ty`.
    pub fn new(name: impl Into<String>, ty: TypeId, bit_pos: u64) -> Self
    {
        Self {
            name: name.into(),
            ty,
            bit_pos,
            bit_size: 0,
        }
    }

    /// A field with an explicit bit width.
    pub fn packed(name: impl Into<String>, ty: TypeId, bit_pos: u64, bit_size: u32) -> Self
    {
        Self {
            name: name.into(),
            ty,
            bit_pos,
            bit_size,
        }
    }
}

/// Shape of a type.
///
/// Matching on this enum is exhaustive everywhere in the engine, so a new
/// kind cannot silently fall through a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind
{
    Scalar(ScalarKind),
    Range
    {
        base: TypeId,
        low: i64,
        high: i64,
    },
    Enum
    {
        values: Vec<EnumValue>
    },
    Record
    {
        fields: Vec<Field>
    },
    Union
    {
        fields: Vec<Field>
    },
    /// `element_bits` is zero for arrays of naturally sized elements.
    Array
    {
        element: TypeId,
        index: TypeId,
        element_bits: u32,
    },
    Pointer
    {
        target: TypeId
    },
    Reference
    {
        target: TypeId
    },
    Typedef
    {
        target: TypeId
    },
}

/// A node of the type graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor
{
    name: Option<String>,
    kind: Kind,
    size: u64,
    fixed: bool,
    stub: bool,
}

impl TypeDescriptor
{
    /// Build a descriptor from its parts. `size` is in bytes.
    pub fn new(name: Option<String>, kind: Kind, size: u64) -> Self
    {
        Self {
            name,
            kind,
            size,
            fixed: false,
            stub: false,
        }
    }

    pub fn int(name: impl Into<String>, size: u64, signed: bool) -> Self
    {
        Self::new(Some(name.into()), Kind::Scalar(ScalarKind::Int { signed }), size)
    }

    pub fn float(name: impl Into<String>, size: u64) -> Self
    {
        Self::new(Some(name.into()), Kind::Scalar(ScalarKind::Float), size)
    }

    pub fn character(name: impl Into<String>, size: u64) -> Self
    {
        Self::new(Some(name.into()), Kind::Scalar(ScalarKind::Char), size)
    }

    pub fn boolean(name: impl Into<String>) -> Self
    {
        Self::new(Some(name.into()), Kind::Scalar(ScalarKind::Bool), 1)
    }

    pub fn range(name: impl Into<String>, base: TypeId, low: i64, high: i64, size: u64) -> Self
    {
        Self::new(Some(name.into()), Kind::Range { base, low, high }, size)
    }

    pub fn enumeration(name: impl Into<String>, values: Vec<EnumValue>, size: u64) -> Self
    {
        Self::new(Some(name.into()), Kind::Enum { values }, size)
    }

    pub fn record(name: impl Into<String>, fields: Vec<Field>, size: u64) -> Self
    {
        Self::new(Some(name.into()), Kind::Record { fields }, size)
    }

    pub fn union(name: impl Into<String>, fields: Vec<Field>, size: u64) -> Self
    {
        Self::new(Some(name.into()), Kind::Union { fields }, size)
    }

    pub fn array(name: Option<String>, element: TypeId, index: TypeId, size: u64) -> Self
    {
        Self::new(
            name,
            Kind::Array {
                element,
                index,
                element_bits: 0,
            },
            size,
        )
    }

    pub fn pointer(name: Option<String>, target: TypeId, size: u64) -> Self
    {
        Self::new(name, Kind::Pointer { target }, size)
    }

    pub fn reference(name: Option<String>, target: TypeId, size: u64) -> Self
    {
        Self::new(name, Kind::Reference { target }, size)
    }

    /// Typedefs take their size from the target; the stored size is unused.
    pub fn typedef(name: impl Into<String>, target: TypeId) -> Self
    {
        Self::new(Some(name.into()), Kind::Typedef { target }, 0)
    }

    /// Mark this descriptor as an engine-produced fixed instance.
    #[must_use]
    pub fn into_fixed(mut self) -> Self
    {
        self.fixed = true;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self
    {
        self.name = name;
        self
    }

    /// Encoded (linkage) name, if the type has one.
    pub fn name(&self) -> Option<&str>
    {
        self.name.as_deref()
    }

    pub fn kind(&self) -> &Kind
    {
        &self.kind
    }

    /// Byte size as recorded. See [`TypeArena::size_of`] for typedef-aware sizes.
    pub fn size(&self) -> u64
    {
        self.size
    }

    /// Whether the fixing engine produced this descriptor.
    pub fn is_fixed(&self) -> bool
    {
        self.fixed
    }

    /// Whether this is a placeholder from [`TypeArena::reserve`] not yet defined.
    pub fn is_stub(&self) -> bool
    {
        self.stub
    }

    /// Record or union components; empty for every other kind.
    pub fn fields(&self) -> &[Field]
    {
        match &self.kind {
            Kind::Record { fields } | Kind::Union { fields } => fields,
            Kind::Scalar(_)
            | Kind::Range { .. }
            | Kind::Enum { .. }
            | Kind::Array { .. }
            | Kind::Pointer { .. }
            | Kind::Reference { .. }
            | Kind::Typedef { .. } => &[],
        }
    }
}

/// Owner of every [`TypeDescriptor`] of one debug-info image.
///
/// Ids handed out by one arena are only meaningful for that arena; indexing
/// with a foreign id panics like an out-of-bounds slice access.
#[derive(Debug, Default, Clone)]
pub struct TypeArena
{
    types: Vec<TypeDescriptor>,
}

impl TypeArena
{
    #[must_use]
    pub fn new() -> Self
    {
        Self { types: Vec::new() }
    }

    /// Append a descriptor and return its id.
    pub fn add(&mut self, descriptor: TypeDescriptor) -> TypeId
    {
        let id = TypeId(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        self.types.push(descriptor);
        id
    }

    /// Reserve an id for a type whose definition refers back to itself.
    ///
    /// The placeholder is an empty record until [`TypeArena::define`] is
    /// called.
    pub fn reserve(&mut self, name: impl Into<String>) -> TypeId
    {
        let mut placeholder = TypeDescriptor::record(name, Vec::new(), 0);
        placeholder.stub = true;
        self.add(placeholder)
    }

    /// Give a reserved id its definition. Only placeholders can be defined.
    pub fn define(&mut self, id: TypeId, descriptor: TypeDescriptor) -> GnatResult<()>
    {
        let slot = self
            .types
            .get_mut(id.index())
            .ok_or_else(|| GnatError::InvalidArgument(format!("type {id} is not part of this arena")))?;
        if !slot.stub {
            return Err(GnatError::InvalidArgument(format!("type {id} is already defined")));
        }
        *slot = descriptor;
        Ok(())
    }

    pub fn get(&self, id: TypeId) -> &TypeDescriptor
    {
        &self.types[id.index()]
    }

    pub fn kind(&self, id: TypeId) -> &Kind
    {
        self.get(id).kind()
    }

    pub fn name(&self, id: TypeId) -> Option<&str>
    {
        self.get(id).name()
    }

    pub fn len(&self) -> usize
    {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.types.is_empty()
    }

    /// Collapse a typedef chain, following at most `max_depth` links.
    ///
    /// A chain longer than that (or a cycle) stops at the last typedef
    /// reached; the caller sees a typedef where it expected a target.
    pub fn strip_typedefs(&self, id: TypeId, max_depth: usize) -> TypeId
    {
        let mut current = id;
        for _ in 0..max_depth {
            match self.kind(current) {
                Kind::Typedef { target } => current = *target,
                _ => return current,
            }
        }
        current
    }

    /// Byte size with typedef layers looked through.
    pub fn size_of(&self, id: TypeId) -> u64
    {
        self.get(self.strip_typedefs(id, TYPEDEF_WALK_LIMIT)).size()
    }

    /// Find a component by exact name; returns its position and description.
    pub fn field(&self, id: TypeId, name: &str) -> Option<(usize, &Field)>
    {
        self.get(self.strip_typedefs(id, TYPEDEF_WALK_LIMIT))
            .fields()
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
    }

    /// Whether values of this type carry a sign.
    ///
    /// A range is signed only when its lower bound is negative, whatever its base.
    pub fn is_signed(&self, id: TypeId) -> bool
    {
        match self.kind(self.strip_typedefs(id, TYPEDEF_WALK_LIMIT)) {
            Kind::Scalar(ScalarKind::Int { signed }) => *signed,
            Kind::Scalar(ScalarKind::Float) => true,
            Kind::Range { low, .. } => *low < 0,
            Kind::Enum { values } => values.iter().any(|value| value.value < 0),
            Kind::Scalar(ScalarKind::Char | ScalarKind::Bool)
            | Kind::Record { .. }
            | Kind::Union { .. }
            | Kind::Array { .. }
            | Kind::Pointer { .. }
            | Kind::Reference { .. }
            | Kind::Typedef { .. } => false,
        }
    }

    /// Whether values of this type are scalars for bit-unpacking purposes.
    pub fn is_scalar(&self, id: TypeId) -> bool
    {
        match self.kind(self.strip_typedefs(id, TYPEDEF_WALK_LIMIT)) {
            Kind::Scalar(_) | Kind::Range { .. } | Kind::Enum { .. } | Kind::Pointer { .. } | Kind::Reference { .. } => true,
            Kind::Record { .. } | Kind::Union { .. } | Kind::Array { .. } | Kind::Typedef { .. } => false,
        }
    }

    /// Lowest and highest value of a discrete type.
    ///
    /// Integer base types derive their bounds from their size. Returns
    /// `None` for non-discrete kinds.
    pub fn discrete_bounds(&self, id: TypeId) -> Option<(i64, i64)>
    {
        let id = self.strip_typedefs(id, TYPEDEF_WALK_LIMIT);
        match self.kind(id) {
            Kind::Range { low, high, .. } => Some((*low, *high)),
            Kind::Enum { values } => {
                let low = values.iter().map(|value| value.value).min()?;
                let high = values.iter().map(|value| value.value).max()?;
                Some((low, high))
            }
            Kind::Scalar(ScalarKind::Bool) => Some((0, 1)),
            Kind::Scalar(ScalarKind::Char) => Some((0, unsigned_max(self.get(id).size()))),
            Kind::Scalar(ScalarKind::Int { signed }) => {
                let size = self.get(id).size();
                if *signed {
                    let bits = (size * 8).clamp(1, 64);
                    let high = if bits == 64 { i64::MAX } else { (1i64 << (bits - 1)) - 1 };
                    Some((-high - 1, high))
                } else {
                    Some((0, unsigned_max(size)))
                }
            }
            Kind::Scalar(ScalarKind::Float)
            | Kind::Record { .. }
            | Kind::Union { .. }
            | Kind::Array { .. }
            | Kind::Pointer { .. }
            | Kind::Reference { .. }
            | Kind::Typedef { .. } => None,
        }
    }

    /// Number of elements of an index type; empty ranges count zero.
    pub fn element_count(&self, index: TypeId) -> u64
    {
        match self.discrete_bounds(index) {
            Some((low, high)) if high >= low => u64::try_from(i128::from(high) - i128::from(low) + 1).unwrap_or(u64::MAX),
            _ => 0,
        }
    }

    /// Byte size of an array of `index` elements of `element`.
    ///
    /// With a non-zero `element_bits` the elements are packed and the size
    /// is the number of bytes covering `element_bits * count` bits.
    pub fn array_size(&self, element: TypeId, index: TypeId, element_bits: u32) -> u64
    {
        let count = self.element_count(index);
        if element_bits == 0 {
            self.size_of(element).saturating_mul(count)
        } else {
            u64::from(element_bits).saturating_mul(count).div_ceil(8)
        }
    }
}

/// Typedef layers tolerated by size and field queries that carry no config.
pub(crate) const TYPEDEF_WALK_LIMIT: usize = 32;

fn unsigned_max(size: u64) -> i64
{
    if size >= 8 {
        i64::MAX
    } else {
        (1i64 << (size * 8)) - 1
    }
}
