//! Array fixing, packed arrays and descriptor coercion.

use tracing::debug;

use super::{DegradationKind, Evaluation};
use crate::error::{GnatError, GnatResult};
use crate::layout::bits::{self, UnpackMode};
use crate::layout::descriptor::packed_bit_size;
use crate::layout::DescriptorBounds;
use crate::symbols::demangle::scan_number;
use crate::types::{Contents, Kind, TypeDescriptor, TypeId, Value};

impl Evaluation<'_>
{
    /// Fixed version of the array `ty`.
    ///
    /// Index subtypes come from the `___XA` parallel type when it exists and
    /// says more than the declared bounds; the element type is fixed
    /// recursively.
    pub(crate) fn fix_array(&mut self, ty: TypeId, dval: Option<&Value>) -> GnatResult<TypeId>
    {
        let base = self.strip(ty);
        if self.target().is_constrained_packed_array(ty) {
            let Some(decoded) = self.decode_constrained_packed_array_type(ty)? else {
                return Ok(base);
            };
            self.check_size(decoded)?;
            return Ok(decoded);
        }

        let name = self.type_name(ty).map(str::to_string);
        let index_desc = self
            .parallel_type(ty, "___XA")
            .or_else(|| self.packed_implementation_index(ty))
            .map(|desc| self.strip(desc))
            .filter(|desc| !self.is_redundant_index_desc(base, *desc));

        let Kind::Array {
            element,
            index,
            element_bits,
        } = self.arena.kind(base).clone()
        else {
            return Ok(base);
        };

        let Some(desc) = index_desc else {
            let fixed_element = self.fix_type(element, &Contents::none(), dval)?;
            if fixed_element == self.strip(element) {
                return Ok(base);
            }
            let size = self.arena.array_size(fixed_element, index, element_bits);
            self.check_byte_size(size)?;
            let fixed = TypeDescriptor::new(
                name,
                Kind::Array {
                    element: fixed_element,
                    index,
                    element_bits,
                },
                size,
            );
            return Ok(self.add_type(fixed.into_fixed()));
        };

        let index_types: Vec<TypeId> = self.arena.get(desc).fields().iter().map(|field| field.ty).collect();
        let mut innermost = base;
        for _ in 0..index_types.len() {
            match self.arena.kind(innermost) {
                Kind::Array { element, .. } => innermost = self.strip(*element),
                _ => break,
            }
        }

        let mut result = self.fix_type(innermost, &Contents::none(), dval)?;
        for (level, index_ty) in index_types.iter().enumerate().rev() {
            let range = self.fix_range(*index_ty, dval)?;
            let size = self.arena.array_size(result, range, 0);
            self.check_byte_size(size)?;
            let layer_name = if level == 0 { name.clone() } else { None };
            let layer = TypeDescriptor::new(
                layer_name,
                Kind::Array {
                    element: result,
                    index: range,
                    element_bits: 0,
                },
                size,
            );
            result = self.add_type(layer.into_fixed());
        }
        debug!(array = %ty, fixed = %result, "fixed array bounds");
        Ok(result)
    }

    /// `___XA` of the array a packed implementation type (`..P`) stands for.
    fn packed_implementation_index(&self, ty: TypeId) -> Option<TypeId>
    {
        let name = self.type_name(ty)?;
        let stem = name.strip_suffix('P').filter(|stem| !stem.is_empty())?;
        self.directory.lookup_type(&format!("{stem}___XA"))
    }

    /// Whether every `___XDLU_<lo>__<hi>` index of `desc` repeats the declared bounds.
    fn is_redundant_index_desc(&self, array: TypeId, desc: TypeId) -> bool
    {
        let mut layer = array;
        for field in self.arena.get(desc).fields() {
            let Kind::Array { element, index, .. } = self.arena.kind(layer) else {
                return false;
            };
            if !self.is_redundant_range_encoding(*index, field.ty) {
                return false;
            }
            layer = self.strip(*element);
        }
        true
    }

    fn is_redundant_range_encoding(&self, range: TypeId, encoding: TypeId) -> bool
    {
        let Kind::Range { low, high, .. } = self.arena.kind(self.strip(range)) else {
            return false;
        };
        let Some(name) = self.type_name(encoding) else {
            return false;
        };
        let Some(at) = name.find("___XDLU_") else {
            return false;
        };
        let bounds = &name[at..];
        let Some((lo, next)) = scan_number(bounds, 8) else {
            return false;
        };
        if lo != *low {
            return false;
        }
        matches!(scan_number(bounds, next + 2), Some((hi, _)) if hi == *high)
    }

    /// Array layout described by a `<shadow>___XP<bits>` packed array type.
    ///
    /// The bounds come from the shadow type `<shadow>` (or its `___XA`).
    /// Returns `None`, with a degradation, when the encoding is unusable.
    pub(crate) fn decode_constrained_packed_array_type(&mut self, ty: TypeId) -> GnatResult<Option<TypeId>>
    {
        let Some(raw_name) = self
            .type_name(ty)
            .or_else(|| self.arena.name(self.target().descriptor_base_type(ty)))
            .map(str::to_string)
        else {
            return Ok(None);
        };
        let Some(tail) = raw_name.find("___XP") else {
            return Ok(None);
        };
        let shadow_name = &raw_name[..tail];

        let Some(shadow) = self.directory.lookup_type(shadow_name).map(|shadow| self.strip(shadow)) else {
            self.recover(
                GnatError::MissingParallelType {
                    name: shadow_name.to_string(),
                    suffix: "",
                },
                format!("could not find bounds information on packed array {raw_name}"),
            );
            return Ok(None);
        };
        if !matches!(self.arena.kind(shadow), Kind::Array { .. }) {
            self.recover(
                GnatError::MalformedEncoding(raw_name.clone()),
                format!("could not understand bounds information on packed array {raw_name}"),
            );
            return Ok(None);
        }
        let Some(bits) = packed_bit_size(&raw_name) else {
            self.recover(
                GnatError::MalformedEncoding(raw_name.clone()),
                format!("could not understand bit size information on packed array {raw_name}"),
            );
            return Ok(None);
        };

        let (fixed, _) = self.constrained_packed_array_type(shadow, u64::from(bits), 0)?;
        Ok(Some(fixed))
    }

    /// Rebuild `ty` with `element_bits`-wide elements at the innermost level.
    ///
    /// Returns the new type and its total width in bits, which becomes the
    /// element width of the enclosing level.
    fn constrained_packed_array_type(&mut self, ty: TypeId, element_bits: u64, depth: usize) -> GnatResult<(TypeId, u64)>
    {
        let ty = self.strip(ty);
        let Kind::Array { element, index, .. } = self.arena.kind(ty).clone() else {
            return Ok((ty, element_bits));
        };
        if depth >= self.config.max_depth {
            return Ok((ty, element_bits));
        }

        let index = match self.parallel_type(ty, "___XA") {
            Some(desc) => match self.arena.get(self.strip(desc)).fields().first().map(|field| field.ty) {
                Some(range) => self.fix_range(range, None)?,
                None => index,
            },
            None => index,
        };
        let (element, element_bits) = self.constrained_packed_array_type(element, element_bits, depth + 1)?;

        let (low, high) = self.arena.discrete_bounds(index).unwrap_or((0, 0));
        let total_bits = if high < low {
            0
        } else {
            let count = u64::try_from(i128::from(high) - i128::from(low) + 1).unwrap_or(u64::MAX);
            element_bits.saturating_mul(count)
        };
        let size = total_bits.div_ceil(8);
        self.check_byte_size(size)?;

        let name = self.arena.name(ty).map(str::to_string);
        let packed = TypeDescriptor::new(
            name,
            Kind::Array {
                element,
                index,
                element_bits: u32::try_from(element_bits).unwrap_or(u32::MAX),
            },
            size,
        );
        Ok((self.add_type(packed.into_fixed()), total_bits))
    }

    /// Plain array value for a descriptor or a constrained packed array.
    ///
    /// Descriptors are replaced by the designated array with its actual
    /// bounds (and packed element width); other values are returned as is.
    ///
    /// ## Errors
    ///
    /// [`GnatError::NullArrayAccess`] when the descriptor is null.
    #[tracing::instrument(level = "debug", skip_all, fields(ty = %value.ty()))]
    pub fn coerce_to_simple_array(&mut self, value: &Value) -> GnatResult<Value>
    {
        let ty = value.ty();
        let target = self.target();
        if target.is_array_descriptor(ty) {
            let null_access = || GnatError::NullArrayAccess(self.type_name(ty).unwrap_or("<anonymous>").to_string());
            let DescriptorBounds::Available(dims) = target.bounds_of(value)? else {
                return Err(null_access());
            };
            let data = target.data_of(value)?.ok_or_else(null_access)?;
            let packed_bits = target.packed_bits_of_descriptor(ty);
            let bounds_ty = target.bounds_type(ty);

            let mut element = self.strip(data.ty);
            for _ in 0..dims.len() {
                match self.arena.kind(element) {
                    Kind::Array { element: inner, .. } => element = self.strip(*inner),
                    _ => break,
                }
            }
            let element = self.static_fixed_type(element)?;

            let mut result = element;
            let mut inner_bits = packed_bits.map(u64::from);
            for (dimension, (low, high)) in dims.iter().copied().enumerate().rev() {
                let bound_base = bounds_ty
                    .and_then(|bounds| self.arena.field(bounds, &format!("LB{dimension}")).map(|(_, field)| field.ty))
                    .unwrap_or(result);
                let size = self.arena.size_of(bound_base);
                let range = self.add_type(TypeDescriptor::new(None, Kind::Range { base: bound_base, low, high }, size).into_fixed());

                let element_bits = inner_bits.map_or(0, |bits| u32::try_from(bits).unwrap_or(u32::MAX));
                let array_size = self.arena.array_size(result, range, element_bits);
                self.check_byte_size(array_size)?;
                let count = self.arena.element_count(range);
                inner_bits = inner_bits.map(|bits| bits.saturating_mul(count));

                let array = TypeDescriptor::new(
                    None,
                    Kind::Array {
                        element: result,
                        index: range,
                        element_bits,
                    },
                    array_size,
                );
                result = self.add_type(array.into_fixed());
            }
            return Ok(Value::at(result, data.address));
        }

        if target.is_constrained_packed_array(ty) {
            return Ok(match self.decode_constrained_packed_array_type(ty)? {
                Some(decoded) => value.with_type(decoded),
                None => value.clone(),
            });
        }
        Ok(value.clone())
    }

    /// Element of a packed array at `indices` (one per dimension).
    ///
    /// ## Errors
    ///
    /// [`GnatError::InvalidArgument`] when the value is not a packed array,
    /// an index is below its lower bound or its bit offset overflows.
    pub fn packed_element(&mut self, array: &Value, indices: &[i64]) -> GnatResult<Value>
    {
        let mut layer = self.strip(array.ty());
        let mut bit_offset: u64 = 0;
        let mut bits: u64 = 0;

        for index_value in indices {
            let Kind::Array {
                element,
                index,
                element_bits,
            } = self.arena.kind(layer).clone()
            else {
                return Err(not_packed());
            };
            if element_bits == 0 {
                return Err(not_packed());
            }

            let (low, high) = match self.arena.discrete_bounds(index) {
                Some(bounds) => bounds,
                None => {
                    self.degrade(DegradationKind::IndexOutOfBounds, "don't know bounds of array".to_string());
                    (0, 0)
                }
            };
            if *index_value < low || *index_value > high {
                self.degrade(
                    DegradationKind::IndexOutOfBounds,
                    format!("packed array index {index_value} out of bounds"),
                );
            }
            let position = u64::try_from(i128::from(*index_value) - i128::from(low))
                .map_err(|_| GnatError::InvalidArgument(format!("packed array index {index_value} below {low}")))?;

            bits = u64::from(element_bits);
            bit_offset = position
                .checked_mul(bits)
                .and_then(|step| bit_offset.checked_add(step))
                .ok_or_else(|| GnatError::InvalidArgument(format!("packed array index {index_value} is too large")))?;
            layer = self.strip(element);
        }

        let element = layer;
        let size = self.arena.size_of(element).max(bits.div_ceil(8));
        self.check_byte_size(size)?;

        let in_byte = usize::try_from(bit_offset % 8).unwrap_or(0);
        let bit_size = usize::try_from(bits).unwrap_or(usize::MAX);
        let span = (in_byte + bit_size).div_ceil(8);
        let raw = array.contents().fetch(self.memory, bit_offset / 8, span)?;

        let mode = if self.arena.is_scalar(element) {
            UnpackMode::scalar(self.arena.is_signed(element), self.config.endian)
        } else {
            UnpackMode::aggregate(self.config.endian)
        };
        let mut unpacked = vec![0; usize::try_from(size).unwrap_or(usize::MAX)];
        bits::unpack_into(&raw, in_byte, bit_size, &mut unpacked, mode)?;
        Ok(Value::from_bytes(element, unpacked))
    }
}

fn not_packed() -> GnatError
{
    GnatError::InvalidArgument("attempt to do packed indexing of something other than a packed array".to_string())
}
