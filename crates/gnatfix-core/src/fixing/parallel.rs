//! Parallel types and the component-name conventions of record templates.
//!
//! A type `T` may come with auxiliary types named `T___XVE` (record
//! template), `T___XVS` (pointer to the real base type), `T___XVU` (variant
//! template) and so on. This module finds them and decodes the facts GNAT
//! stores in component names.

use tracing::trace;

use super::Evaluation;
use crate::symbols::demangle::scan_number;
use crate::types::{Field, Kind, TypeId};

impl Evaluation<'_>
{
    /// The type a `___XVS` parallel designates, or `ty` when there is none.
    ///
    /// The parallel record has a single component. Its type is either a
    /// reference to the real type, or (older encoding) its name is the name
    /// of the real type.
    pub(crate) fn base_type(&self, ty: TypeId) -> TypeId
    {
        let stripped = self.strip(ty);
        if !matches!(self.arena.kind(stripped), Kind::Record { .. }) {
            return ty;
        }
        let Some(namer) = self.parallel_type(ty, "___XVS").map(|namer| self.strip(namer)) else {
            return ty;
        };
        let fields = match self.arena.kind(namer) {
            Kind::Record { fields } if fields.len() == 1 => fields,
            _ => return ty,
        };
        let real = match self.arena.kind(fields[0].ty) {
            Kind::Reference { target } => Some(*target),
            _ => self.directory.lookup_type(&fields[0].name),
        };
        trace!(%ty, real = ?real, "followed ___XVS");
        real.unwrap_or(ty)
    }

    /// The `___XVE` template describing the record `ty`, if any.
    pub(crate) fn dynamic_template(&self, ty: TypeId) -> Option<TypeId>
    {
        let stripped = self.strip(ty);
        if !matches!(self.arena.kind(stripped), Kind::Record { .. }) {
            return None;
        }
        if self.type_name(ty)?.ends_with("___XVE") {
            return Some(stripped);
        }
        self.parallel_type(ty, "___XVE").map(|template| self.strip(template))
    }

    /// A component whose size depends on the object: an access marked `___XVL`.
    pub(crate) fn is_dynamic_field(&self, field: &Field) -> bool
    {
        let pointer = self.strip(field.ty);
        matches!(self.arena.kind(pointer), Kind::Pointer { .. })
            && (field.name.contains("___XVL") || self.arena.name(field.ty).is_some_and(|name| name.contains("___XVL")))
    }

    /// Type designated by a dynamic component.
    pub(crate) fn dynamic_target(&self, field: &Field) -> TypeId
    {
        match self.arena.kind(self.strip(field.ty)) {
            Kind::Pointer { target } => *target,
            _ => field.ty,
        }
    }

    /// A component holding a variant part, directly or through a dynamic access.
    pub(crate) fn is_variant_part(&self, field: &Field) -> bool
    {
        match self.arena.kind(self.strip(field.ty)) {
            Kind::Union { .. } => true,
            Kind::Pointer { target } => {
                self.is_dynamic_field(field) && matches!(self.arena.kind(self.strip(*target)), Kind::Union { .. })
            }
            _ => false,
        }
    }

    /// Union type of a variant-part component.
    pub(crate) fn variant_union(&self, field: &Field) -> TypeId
    {
        if self.is_dynamic_field(field) {
            self.dynamic_target(field)
        } else {
            field.ty
        }
    }

    pub(crate) fn variant_field_index(&self, fields: &[Field]) -> Option<usize>
    {
        fields.iter().position(|field| self.is_variant_part(field))
    }
}

/// Alignment, in bits, GNAT encodes in a template component name.
///
/// `name___XVA4` (any `___XV<letter><digits>` ending) asks for 4-byte
/// alignment. Other names ending in a digit are byte aligned, and all other
/// components can start at any bit.
pub(crate) fn field_alignment(name: &str) -> u64
{
    let bytes = name.as_bytes();
    let len = bytes.len();
    if len == 0 || !bytes[len - 1].is_ascii_digit() {
        return 1;
    }
    let digits_start = if len >= 2 && bytes[len - 2].is_ascii_digit() { len - 2 } else { len - 1 };
    if digits_start < 7 || !bytes[digits_start - 6..].starts_with(b"___XV") {
        return 8;
    }
    match scan_number(name, digits_start) {
        Some((align, _)) if align > 0 => align.unsigned_abs() * 8,
        _ => 8,
    }
}

/// Round `offset` up to a multiple of `align`.
pub(crate) fn align_up(offset: u64, align: u64) -> u64
{
    if align <= 1 {
        return offset;
    }
    offset.div_ceil(align) * align
}

/// Name of the discriminant that controls a `..___XVN` variant part.
///
/// It is the part of the name between the last `___` or `.` and `___XVN`.
/// An empty result marks an unchecked union.
pub(crate) fn variant_discriminant_name(name: &str) -> &str
{
    let Some(end) = name.rfind("___XVN") else {
        return "";
    };
    let stem = &name[..end];
    let start = match (stem.rfind("___"), stem.rfind('.')) {
        (Some(triple), Some(dot)) => (triple + 3).max(dot + 1),
        (Some(triple), None) => triple + 3,
        (None, Some(dot)) => dot + 1,
        (None, None) => 0,
    };
    &stem[start..]
}

/// Whether the variant member called `choices` covers `value`.
///
/// Choices are concatenated selectors: `S<n>` (one value), `R<lo>T<hi>`
/// (a range) and `O` (others). Returns `None` for a malformed name.
pub(crate) fn in_variant(value: i64, choices: &str) -> Option<bool>
{
    let bytes = choices.as_bytes();
    let mut p = 0;
    loop {
        match bytes.get(p) {
            None => return Some(false),
            Some(b'S') => {
                let (single, next) = scan_number(choices, p + 1)?;
                if value == single {
                    return Some(true);
                }
                p = next;
            }
            Some(b'R') => {
                let (low, next) = scan_number(choices, p + 1)?;
                if bytes.get(next) != Some(&b'T') {
                    return None;
                }
                let (high, next) = scan_number(choices, next + 1)?;
                if (low..=high).contains(&value) {
                    return Some(true);
                }
                p = next;
            }
            Some(b'O') => return Some(true),
            Some(_) => return None,
        }
    }
}
