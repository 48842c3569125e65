//! # Array Descriptors
//!
//! GNAT passes unconstrained arrays around through one of two descriptors:
//!
//! - a **thick** (fat) pointer: a record with a `P_ARRAY` pointer to the
//!   data and a `P_BOUNDS` pointer to a bounds record;
//! - a **thin** pointer: a plain pointer to the data, with the bounds record
//!   stored immediately before the data. Its designated type is a record
//!   named `..___XUT` whose `BOUNDS` component describes that block.
//!
//! Bounds records hold `LB<i>`/`UB<i>` pairs, one per dimension, numbered
//! from zero.

use smallvec::SmallVec;
use tracing::debug;

use super::Target;
use crate::error::{GnatError, GnatResult};
use crate::symbols::demangle::{has_suffix, scan_number};
use crate::types::{Address, Kind, TypeId, Value};

/// Largest number of dimensions a descriptor may describe.
pub const MAX_ARITY: usize = 16;

/// Per-dimension `(low, high)` pairs; most arrays have few dimensions.
pub type Dimensions = SmallVec<[(i64, i64); 4]>;

/// Bounds of the array behind a descriptor.
///
/// A null descriptor has no bounds at all, which is different from an
/// empty array (bounds with `high < low`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorBounds
{
    /// `(low, high)` per dimension, outermost first.
    Available(Dimensions),
    Unavailable,
}

/// Where the elements behind a descriptor live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPointer
{
    pub address: Address,
    /// Designated array type as declared (bounds not yet applied).
    pub ty: TypeId,
}

/// Element width encoded in a `___XP<bits>` packed array name.
///
/// ```rust
/// use gnatfix_core::layout::descriptor::packed_bit_size;
///
/// assert_eq!(packed_bit_size("pkg__arr___XP3"), Some(3));
/// assert_eq!(packed_bit_size("pkg__arr"), None);
/// ```
pub fn packed_bit_size(name: &str) -> Option<u32>
{
    let tail = name.find("___XP")? + 5;
    let (bits, _) = scan_number(name, tail)?;
    u32::try_from(bits).ok().filter(|bits| *bits > 0)
}

impl Target<'_>
{
    /// Type a descriptor is read through: typedefs and one access level removed.
    pub fn descriptor_base_type(&self, ty: TypeId) -> TypeId
    {
        let ty = self.strip(ty);
        match self.arena.kind(ty) {
            Kind::Pointer { target } | Kind::Reference { target } => self.strip(*target),
            _ => ty,
        }
    }

    pub fn is_thin_pointer(&self, ty: TypeId) -> bool
    {
        self.arena
            .name(self.descriptor_base_type(ty))
            .is_some_and(|name| name.ends_with("___XUT") || name.ends_with("___XUT___XVE"))
    }

    pub fn is_thick_pointer(&self, ty: TypeId) -> bool
    {
        let base = self.descriptor_base_type(ty);
        matches!(self.arena.kind(base), Kind::Record { .. }) && self.arena.field(base, "P_ARRAY").is_some()
    }

    /// The record describing a thin pointer's bounds block and data.
    ///
    /// Prefers the `___XVE` parallel of the `___XUT` type when there is one.
    pub fn thin_descriptor_type(&self, ty: TypeId) -> TypeId
    {
        let base = self.descriptor_base_type(ty);
        if self.arena.name(base).is_some_and(|name| name.ends_with("___XVE")) {
            return base;
        }
        self.parallel_type(base, "___XVE").map_or(base, |template| self.strip(template))
    }

    /// Type of the bounds record of a descriptor.
    pub fn bounds_type(&self, ty: TypeId) -> Option<TypeId>
    {
        let base = self.descriptor_base_type(ty);
        let component = if self.is_thin_pointer(ty) {
            self.arena.field(self.thin_descriptor_type(ty), "BOUNDS")?
        } else {
            self.arena.field(base, "P_BOUNDS")?
        };
        Some(self.descriptor_base_type(component.1.ty))
    }

    /// Declared type of the array a descriptor designates.
    pub fn data_target_type(&self, ty: TypeId) -> Option<TypeId>
    {
        let base = self.descriptor_base_type(ty);
        if self.is_thin_pointer(ty) {
            let descriptor = self.thin_descriptor_type(ty);
            let data = self.arena.get(descriptor).fields().get(1)?;
            return Some(self.descriptor_base_type(data.ty));
        }
        let (_, data) = self.arena.field(base, "P_ARRAY")?;
        match self.kind(data.ty) {
            Kind::Pointer { target } => Some(self.strip(*target)),
            _ => None,
        }
    }

    /// Number of dimensions.
    ///
    /// For descriptors this is half the number of bounds components; for
    /// plain arrays it is the nesting depth of array kinds.
    pub fn arity(&self, ty: TypeId) -> usize
    {
        if let Some(bounds) = self.bounds_type(ty) {
            return self.arena.get(bounds).fields().len() / 2;
        }
        let mut depth = 0;
        let mut current = self.strip(ty);
        while let Kind::Array { element, .. } = self.arena.kind(current) {
            depth += 1;
            if depth >= self.config.max_depth {
                break;
            }
            current = self.strip(*element);
        }
        depth
    }

    /// Whether `ty` is a thick or thin descriptor of an array.
    pub fn is_array_descriptor(&self, ty: TypeId) -> bool
    {
        let Some(data) = self.data_target_type(ty) else {
            return false;
        };
        let is_array = match self.arena.kind(data) {
            Kind::Array { .. } => true,
            Kind::Pointer { target } => matches!(self.kind(*target), Kind::Array { .. }),
            _ => false,
        };
        is_array && self.arity(ty) > 0
    }

    /// An array type carrying a `___XP` packing suffix, not behind a descriptor.
    pub fn is_constrained_packed_array(&self, ty: TypeId) -> bool
    {
        let base = self.descriptor_base_type(ty);
        self.arena.name(base).is_some_and(|name| has_suffix(name, "___XP")) && !self.is_array_descriptor(ty)
    }

    /// A descriptor designating a packed array.
    pub fn is_unconstrained_packed_array(&self, ty: TypeId) -> bool
    {
        if !self.is_array_descriptor(ty) {
            return false;
        }
        self.packed_bits_of_descriptor(ty).is_some()
    }

    /// Packed element width of the array behind a descriptor, if packed.
    pub fn packed_bits_of_descriptor(&self, ty: TypeId) -> Option<u32>
    {
        let named = |id: TypeId| self.arena.name(id).and_then(packed_bit_size);
        named(self.descriptor_base_type(ty))
            .or_else(|| self.data_target_type(ty).and_then(named))
            .or_else(|| match self.data_target_type(ty).map(|data| self.kind(data)) {
                Some(Kind::Array { element_bits, .. }) if *element_bits > 0 => Some(*element_bits),
                _ => None,
            })
    }

    /// A record with a single component named `F`, used to over-align its content.
    pub fn is_aligner(&self, ty: TypeId) -> bool
    {
        match self.kind(ty) {
            Kind::Record { fields } => fields.len() == 1 && fields[0].name == "F",
            _ => false,
        }
    }

    /// Type wrapped by any number of aligners, and the bit offset of the content.
    pub fn aligned_type(&self, ty: TypeId) -> (TypeId, u64)
    {
        let mut current = ty;
        let mut offset = 0;
        for _ in 0..self.config.max_depth {
            if !self.is_aligner(current) {
                break;
            }
            let inner = &self.arena.get(self.strip(current)).fields()[0];
            offset += inner.bit_pos;
            current = inner.ty;
        }
        (current, offset)
    }

    /// Read the bounds behind a descriptor value.
    ///
    /// ## Errors
    ///
    /// [`GnatError::BadGnatArrayDescriptor`] when the descriptor lacks its
    /// bounds component or a bounds record lacks an `LB<i>`/`UB<i>` pair.
    pub fn bounds_of(&self, descriptor: &Value) -> GnatResult<DescriptorBounds>
    {
        let ty = descriptor.ty();
        let bounds_ty = self.bounds_type(ty).ok_or_else(|| self.bad_descriptor(ty, "no bounds component"))?;
        let arity = self.arena.get(bounds_ty).fields().len() / 2;
        if arity > MAX_ARITY {
            return Err(self.bad_descriptor(ty, "too many dimensions"));
        }

        let bounds_address = if self.is_thin_pointer(ty) {
            let Some(data) = self.thin_data_address(descriptor)? else {
                return Ok(DescriptorBounds::Unavailable);
            };
            // The bounds block immediately precedes the data.
            let size = self.arena.size_of(bounds_ty);
            data.checked_sub(size)
                .ok_or_else(|| self.bad_descriptor(ty, "bounds block below address zero"))?
        } else {
            let pointer = self
                .read_named_field(&self.thick_record(descriptor), "P_BOUNDS")?
                .ok_or_else(|| self.bad_descriptor(ty, "missing P_BOUNDS"))?;
            match self.kind(pointer.ty()) {
                Kind::Pointer { .. } => {}
                _ => return Err(self.bad_descriptor(ty, "P_BOUNDS is not an access")),
            }
            let address = Address::from(self.value_as_long(&pointer)? as u64);
            if address.is_null() {
                debug!(descriptor = %ty, "null bounds pointer");
                return Ok(DescriptorBounds::Unavailable);
            }
            address
        };

        let bounds = Value::at(bounds_ty, bounds_address);
        let mut dims = Dimensions::with_capacity(arity);
        for i in 0..arity {
            let low = self.read_bound(&bounds, &format!("LB{i}"))?;
            let high = self.read_bound(&bounds, &format!("UB{i}"))?;
            dims.push((low, high));
        }
        Ok(DescriptorBounds::Available(dims))
    }

    /// Address and declared type of the data behind a descriptor value.
    ///
    /// Returns `None` for a null data pointer.
    pub fn data_of(&self, descriptor: &Value) -> GnatResult<Option<DataPointer>>
    {
        let ty = descriptor.ty();
        let data_ty = self.data_target_type(ty).ok_or_else(|| self.bad_descriptor(ty, "no data component"))?;

        let address = if self.is_thin_pointer(ty) {
            self.thin_data_address(descriptor)?
        } else {
            let pointer = self
                .read_named_field(&self.thick_record(descriptor), "P_ARRAY")?
                .ok_or_else(|| self.bad_descriptor(ty, "missing P_ARRAY"))?;
            let address = Address::from(self.value_as_long(&pointer)? as u64);
            (!address.is_null()).then_some(address)
        };

        Ok(address.map(|address| DataPointer { address, ty: data_ty }))
    }

    fn thin_data_address(&self, descriptor: &Value) -> GnatResult<Option<Address>>
    {
        let address = match self.kind(descriptor.ty()) {
            Kind::Pointer { .. } => Address::from(self.value_as_long(descriptor)? as u64),
            _ => descriptor
                .address()
                .ok_or_else(|| GnatError::ValueUnavailable("thin descriptor has no address".to_string()))?,
        };
        Ok((!address.is_null()).then_some(address))
    }

    /// A thick pointer may be reached through an access to it.
    fn thick_record(&self, descriptor: &Value) -> Value
    {
        match self.kind(descriptor.ty()) {
            Kind::Pointer { target } | Kind::Reference { target } => match self.value_as_long(descriptor) {
                Ok(address) => Value::at(*target, Address::from(address as u64)),
                Err(_) => descriptor.clone(),
            },
            _ => descriptor.clone(),
        }
    }

    fn read_bound(&self, bounds: &Value, name: &str) -> GnatResult<i64>
    {
        let bound = self
            .read_named_field(bounds, name)?
            .ok_or_else(|| self.bad_descriptor(bounds.ty(), &format!("missing {name}")))?;
        self.value_as_long(&bound)
    }

    fn bad_descriptor(&self, ty: TypeId, what: &str) -> GnatError
    {
        let name = self.arena.name(ty).unwrap_or("<anonymous>");
        GnatError::BadGnatArrayDescriptor(format!("{name}: {what}"))
    }
}
