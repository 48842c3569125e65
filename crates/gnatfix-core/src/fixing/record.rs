//! Record fixing.
//!
//! A record whose layout depends on its discriminants is described by an
//! `___XVE` template. The template lists the components in declaration
//! order; `bit_pos` of each is relative to the end of the previous one,
//! components marked `___XVL` are accesses to their real (variable-size)
//! type, and a union-typed component is the variant part. Walking the
//! template against an object yields the object's actual layout.

use tracing::debug;

use super::parallel::{align_up, field_alignment};
use super::variant::Branch;
use super::{is_fatal, Degradation, DegradationKind, Evaluation};
use crate::error::GnatResult;
use crate::types::{Contents, Field, Kind, TypeDescriptor, TypeId, Value};

impl Evaluation<'_>
{
    /// Fixed version of the record `ty` stored in `contents`.
    ///
    /// `dval` supplies the discriminants when `ty` is a variant branch of an
    /// enclosing record; otherwise the record's own components are used.
    pub(crate) fn fix_record(&mut self, ty: TypeId, contents: &Contents, dval: Option<&Value>) -> GnatResult<TypeId>
    {
        let ty = self.base_type(ty);
        let stripped = self.strip(ty);
        if self.arena.get(stripped).is_fixed() {
            return Ok(stripped);
        }

        let fixed = match self.dynamic_template(ty) {
            Some(template) => self.template_to_fixed_record(ty, template, contents, dval)?,
            None => {
                let fields = self.arena.get(stripped).fields().to_vec();
                match self.variant_field_index(&fields) {
                    Some(variant) => self.record_with_fixed_variant_part(ty, variant, contents, dval)?,
                    None => return Ok(stripped),
                }
            }
        };

        let fixed = self.apply_size_variable(ty, fixed);
        self.check_size(fixed)?;
        Ok(fixed)
    }

    /// Walk `template` against the object and build its layout.
    fn template_to_fixed_record(&mut self, ty: TypeId, template: TypeId, contents: &Contents, dval: Option<&Value>) -> GnatResult<TypeId>
    {
        let template_fields = self.arena.get(template).fields().to_vec();
        let template_size = self.arena.size_of(template);
        let name = self.record_name(ty);

        let mut fields: Vec<Field> = Vec::with_capacity(template_fields.len());
        let mut offset: u64 = 0;
        let mut bit_len: u64 = 0;
        let mut variant: Option<(usize, Field, u64)> = None;

        for field in &template_fields {
            offset = align_up(offset, field_alignment(&field.name)) + field.bit_pos;
            let field_bits = if self.is_variant_part(field) {
                variant = Some((fields.len(), field.clone(), offset));
                0
            } else if self.is_dynamic_field(field) {
                let fixed = self.fix_dynamic_field(field, offset, &fields, name.as_deref(), contents, dval)?;
                fields.push(Field::new(field.name.clone(), fixed, offset));
                self.arena.size_of(fixed) * 8
            } else {
                fields.push(Field::packed(field.name.clone(), field.ty, offset, field.bit_size));
                if field.bit_size > 0 {
                    u64::from(field.bit_size)
                } else {
                    self.arena.size_of(field.ty) * 8
                }
            };
            bit_len = bit_len.max(offset + field_bits);
            offset += field_bits;
            self.check_byte_size(align_up(bit_len, 8) / 8)?;
        }

        // The variant part comes last: its discriminants and offset depend on
        // everything before it.
        if let Some((position, field, offset)) = variant {
            let partial;
            let dval = match dval {
                Some(dval) => dval,
                None => {
                    partial = self.partial_record(name.as_deref(), &fields, bit_len, contents);
                    &partial
                }
            };
            let union = self.variant_union(&field);
            let branch = self.fixed_variant_branch(union, Some(&field.name), &contents.offset_by(offset / 8), dval)?;
            let branch_bits = self.splice_branch(&mut fields, position, &field, offset, branch);
            bit_len = bit_len.max(offset + branch_bits);
        }

        let mut length = align_up(bit_len, 8) / 8;
        if template_size > 0 {
            length = align_up(length, template_size);
        } else {
            let shown = name.as_deref().unwrap_or("<anonymous>");
            self.degrade(
                DegradationKind::InvalidSize,
                format!("Invalid type size for `{shown}' detected: {template_size}."),
            );
        }
        self.check_byte_size(length)?;

        debug!(record = %ty, length, fields = fields.len(), "fixed record template");
        Ok(self.add_type(TypeDescriptor::new(name, Kind::Record { fields }, length).into_fixed()))
    }

    /// Fixed type of a `___XVL` component located `offset` bits into the object.
    fn fix_dynamic_field(
        &mut self,
        field: &Field,
        offset: u64,
        fields: &[Field],
        name: Option<&str>,
        contents: &Contents,
        dval: Option<&Value>,
    ) -> GnatResult<TypeId>
    {
        let declared = self.dynamic_target(field);
        let (field_ty, inner_offset) = self.target().aligned_type(declared);
        let field_contents = contents.offset_by((offset + inner_offset) / 8);
        let field_ty = self.base_type(field_ty);

        let partial;
        let dval = match dval {
            Some(dval) => dval,
            None => {
                partial = self.partial_record(name, fields, offset, contents);
                &partial
            }
        };

        match self.fix_type(field_ty, &field_contents, Some(dval)) {
            Ok(fixed) => Ok(fixed),
            Err(err) if !is_fatal(&err) => {
                self.push_degradation(Degradation {
                    kind: DegradationKind::ComponentUnavailable,
                    message: format!("could not fix component {}: {err}", field.name),
                    cause: Some(err),
                });
                Ok(field_ty)
            }
            Err(err) => Err(err),
        }
    }

    /// Fix the variant part of a record that has no template.
    ///
    /// Components keep their positions; the variant part is replaced by the
    /// selected branch, and the size grows or shrinks by the difference.
    fn record_with_fixed_variant_part(&mut self, ty: TypeId, variant: usize, contents: &Contents, dval: Option<&Value>) -> GnatResult<TypeId>
    {
        let stripped = self.strip(ty);
        let mut fields = self.arena.get(stripped).fields().to_vec();
        let size = self.arena.size_of(stripped);
        let name = self.record_name(ty);

        let own;
        let dval = match dval {
            Some(dval) => dval,
            None => {
                own = Value::new(stripped, contents.clone());
                &own
            }
        };

        let field = fields.remove(variant);
        let union = self.variant_union(&field);
        let union_size = self.arena.size_of(union);
        let branch = self.fixed_variant_branch(union, Some(&field.name), &contents.offset_by(field.bit_pos / 8), dval)?;
        let branch_bits = self.splice_branch(&mut fields, variant, &field, field.bit_pos, branch);

        let length = (size + branch_bits.div_ceil(8)).saturating_sub(union_size);
        self.check_byte_size(length)?;
        Ok(self.add_type(TypeDescriptor::new(name, Kind::Record { fields }, length).into_fixed()))
    }

    /// Insert the components of `branch` at `position`, shifted to `offset`.
    ///
    /// Returns the width of the branch in bits.
    fn splice_branch(&self, fields: &mut Vec<Field>, position: usize, variant: &Field, offset: u64, branch: Branch) -> u64
    {
        match branch {
            Branch::Empty => 0,
            Branch::Unchecked(union) => {
                fields.insert(position, Field::new(variant.name.clone(), union, offset));
                self.arena.size_of(union) * 8
            }
            Branch::Selected(branch) => {
                let stripped = self.strip(branch);
                let spliced: Vec<Field> = match self.arena.kind(stripped) {
                    Kind::Record { fields: members } => members
                        .iter()
                        .map(|member| Field::packed(member.name.clone(), member.ty, offset + member.bit_pos, member.bit_size))
                        .collect(),
                    _ => vec![Field::new(variant.name.clone(), branch, offset)],
                };
                fields.splice(position..position, spliced);
                self.arena.size_of(branch) * 8
            }
        }
    }

    /// The record built so far, as a value usable for discriminant lookups.
    fn partial_record(&mut self, name: Option<&str>, fields: &[Field], bit_len: u64, contents: &Contents) -> Value
    {
        let partial = TypeDescriptor::new(
            name.map(str::to_string),
            Kind::Record {
                fields: fields.to_vec(),
            },
            align_up(bit_len, 8) / 8,
        );
        let id = self.add_type(partial);
        Value::new(id, contents.clone())
    }

    /// Size from the `<name>___XVZ` variable, when the program provides one.
    fn apply_size_variable(&mut self, ty: TypeId, fixed: TypeId) -> TypeId
    {
        let Some(name) = self.type_name(ty).map(str::to_string) else {
            return fixed;
        };
        let Some(size) = self.int_variable(&format!("{name}___XVZ")) else {
            return fixed;
        };
        let Ok(size) = u64::try_from(size) else {
            return fixed;
        };
        if size == self.arena.size_of(fixed) {
            return fixed;
        }
        debug!(record = %ty, size, "size taken from ___XVZ");
        let descriptor = self.arena.get(fixed).clone();
        let resized = TypeDescriptor::new(descriptor.name().map(str::to_string), descriptor.kind().clone(), size);
        self.add_type(resized.into_fixed())
    }

    /// Name for a fixed record: the declared name, without a template suffix.
    fn record_name(&self, ty: TypeId) -> Option<String>
    {
        self.type_name(ty)
            .map(|name| name.strip_suffix("___XVE").unwrap_or(name).to_string())
    }

    /// Static approximation of a template: dynamic components replaced by
    /// the static fixing of their designated types.
    pub(crate) fn template_to_static_fixed(&mut self, template: TypeId) -> GnatResult<TypeId>
    {
        let fields = self.arena.get(template).fields().to_vec();
        let mut changed = false;
        let mut fixed_fields = fields.clone();

        for (fixed_field, field) in fixed_fields.iter_mut().zip(&fields) {
            let new_ty = if self.is_dynamic_field(field) {
                let target = self.dynamic_target(field);
                self.static_fixed_type(target)?
            } else {
                self.static_unwrap(field.ty)?
            };
            if new_ty != field.ty {
                fixed_field.ty = new_ty;
                changed = true;
            }
        }

        if !changed {
            return Ok(template);
        }
        let kind = match self.arena.kind(template) {
            Kind::Union { .. } => Kind::Union { fields: fixed_fields },
            _ => Kind::Record { fields: fixed_fields },
        };
        let name = self.record_name(template);
        let size = self.arena.size_of(template);
        Ok(self.add_type(TypeDescriptor::new(name, kind, size).into_fixed()))
    }

    /// Aligners removed and `___XVS` followed, statically.
    fn static_unwrap(&mut self, ty: TypeId) -> GnatResult<TypeId>
    {
        if self.target().is_aligner(ty) {
            let (inner, _) = self.target().aligned_type(ty);
            return self.static_unwrap(inner);
        }
        let real = self.base_type(ty);
        if real == ty {
            Ok(ty)
        } else {
            self.static_fixed_type(real)
        }
    }
}
