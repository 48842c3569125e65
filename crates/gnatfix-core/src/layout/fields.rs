//! Component lookup and scalar extraction.
//!
//! Discriminants, array bounds and descriptor pointers are all read the
//! same way: find a component by name, extract its bits, and interpret them
//! as an integer. Components may sit at any bit offset in packed records.

use tracing::trace;

use super::bits::{self, UnpackMode};
use super::Target;
use crate::error::{GnatError, GnatResult};
use crate::symbols::demangle::field_name_match;
use crate::types::{Field, Kind, ScalarKind, TypeId, Value};

/// A component found by [`Target::find_field`], with its absolute position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLocation
{
    pub field: Field,
    /// Bit offset from the start of the searched object.
    pub bit_offset: u64,
}

impl Target<'_>
{
    /// Find the component answering to `name` in the record `ty`.
    ///
    /// Components of the record itself are tried first, in order. Then the
    /// search descends into wrapper components (the `_parent` part of a
    /// derived record, `REP`, variant branches) and into the branches of
    /// variant parts.
    pub fn find_field(&self, ty: TypeId, name: &str) -> Option<FieldLocation>
    {
        self.find_field_at(ty, name, 0, 0)
    }

    fn find_field_at(&self, ty: TypeId, name: &str, base: u64, depth: usize) -> Option<FieldLocation>
    {
        if depth > self.config.max_depth {
            return None;
        }
        let fields = self.arena.get(self.strip(ty)).fields();

        if let Some(field) = fields.iter().find(|field| field_name_match(&field.name, name)) {
            return Some(FieldLocation {
                field: field.clone(),
                bit_offset: base + field.bit_pos,
            });
        }

        for field in fields {
            let offset = base + field.bit_pos;
            match self.kind(field.ty) {
                Kind::Record { .. } if is_wrapper_field(&field.name) => {
                    if let Some(found) = self.find_field_at(field.ty, name, offset, depth + 1) {
                        return Some(found);
                    }
                }
                Kind::Union { fields: branches } => {
                    for branch in branches {
                        if let Some(found) = self.find_field_at(branch.ty, name, offset + branch.bit_pos, depth + 1) {
                            return Some(found);
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Value of the component called `name`, or `None` if there is none.
    ///
    /// ## Errors
    ///
    /// Fails when the component exists but its bytes cannot be read.
    pub fn read_named_field(&self, record: &Value, name: &str) -> GnatResult<Option<Value>>
    {
        match self.find_field(record.ty(), name) {
            Some(location) => self.read_field(record, &location.field, location.bit_offset).map(Some),
            None => Ok(None),
        }
    }

    /// Extract `field` located `bit_offset` bits into `record`.
    ///
    /// Byte-aligned components of natural size are views into the record's
    /// contents; anything else is unpacked into a fresh buffer, after the
    /// size ceiling is checked.
    pub fn read_field(&self, record: &Value, field: &Field, bit_offset: u64) -> GnatResult<Value>
    {
        let natural_size = self.arena.size_of(field.ty);
        let natural_bits = natural_size.saturating_mul(8);
        if bit_offset % 8 == 0 && (field.bit_size == 0 || u64::from(field.bit_size) == natural_bits) {
            return Ok(Value::new(field.ty, record.contents().offset_by(bit_offset / 8)));
        }

        let bit_size = if field.bit_size == 0 {
            natural_bits
        } else {
            u64::from(field.bit_size)
        };
        self.config.check_object_size(natural_size.max(bit_size.div_ceil(8)))?;
        let first_byte = bit_offset / 8;
        let in_byte = to_usize(bit_offset % 8);
        let bit_size = to_usize(bit_size);
        let span = (in_byte + bit_size).div_ceil(8);
        let raw = record.contents().fetch(self.memory, first_byte, span)?;

        let size = to_usize(natural_size).max(bit_size.div_ceil(8));
        let mut unpacked = vec![0; size];
        let mode = if self.arena.is_scalar(field.ty) {
            UnpackMode::scalar(self.arena.is_signed(field.ty), self.config.endian)
        } else {
            UnpackMode::aggregate(self.config.endian)
        };
        bits::unpack_into(&raw, in_byte, bit_size, &mut unpacked, mode)?;
        trace!(field = %field.name, bit_offset, bit_size, "unpacked component");
        Ok(Value::from_bytes(field.ty, unpacked))
    }

    /// Interpret a discrete, character, boolean or access value as an integer.
    ///
    /// ## Errors
    ///
    /// [`GnatError::InvalidArgument`] for floating-point and composite
    /// values, [`GnatError::SizeLimitExceeded`] for scalars over the size
    /// ceiling, and memory errors when the bytes cannot be fetched.
    pub fn value_as_long(&self, value: &Value) -> GnatResult<i64>
    {
        let ty = self.strip(value.ty());
        let signed = match self.arena.kind(ty) {
            Kind::Scalar(ScalarKind::Float) => {
                return Err(GnatError::InvalidArgument(format!("floating-point value of type {ty} is not discrete")));
            }
            Kind::Scalar(_) | Kind::Range { .. } | Kind::Enum { .. } => self.arena.is_signed(ty),
            Kind::Pointer { .. } | Kind::Reference { .. } => false,
            Kind::Record { .. } | Kind::Union { .. } | Kind::Array { .. } | Kind::Typedef { .. } => {
                return Err(GnatError::InvalidArgument(format!("value of type {ty} is not a scalar")));
            }
        };
        let size = self.arena.size_of(ty);
        self.config.check_object_size(size)?;
        let bytes = value.contents().fetch(self.memory, 0, to_usize(size))?;
        Ok(bits::read_integer(&bytes, signed, self.config.endian))
    }
}

/// Components whose fields belong to the enclosing record for lookup purposes.
fn is_wrapper_field(name: &str) -> bool
{
    name.starts_with("PARENT")
        || name == "REP"
        || name.starts_with("_parent")
        || name.starts_with('S')
        || name.starts_with('R')
        || name.starts_with('O')
}

fn to_usize(value: u64) -> usize
{
    usize::try_from(value).unwrap_or(usize::MAX)
}
