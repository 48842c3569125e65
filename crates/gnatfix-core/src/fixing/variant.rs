//! Variant part selection.

use tracing::debug;

use super::parallel::{in_variant, variant_discriminant_name};
use super::Evaluation;
use crate::error::{GnatError, GnatResult};
use crate::types::{Contents, Kind, TypeDescriptor, TypeId, Value};

/// Outcome of selecting the branch of a variant part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Branch
{
    /// The type of the branch that applies, fixed when it needed fixing.
    Selected(TypeId),
    /// An unchecked union: no discriminant, every member stays visible.
    Unchecked(TypeId),
    /// No member applies.
    Empty,
}

impl Evaluation<'_>
{
    /// Select the branch of the variant part `var_ty` for the discriminants in `dval`.
    ///
    /// `component` is the name of the component holding the variant part;
    /// it stands in for the union name when the union is anonymous.
    pub(crate) fn fixed_variant_branch(&mut self, var_ty: TypeId, component: Option<&str>, contents: &Contents, dval: &Value) -> GnatResult<Branch>
    {
        let mut union = self.strip(var_ty);
        if let Kind::Pointer { target } = self.arena.kind(union) {
            union = self.strip(*target);
        }
        if let Some(template) = self.parallel_type(union, "___XVU") {
            union = self.strip(template);
        }

        let discriminant = self
            .type_name(union)
            .or_else(|| self.type_name(var_ty))
            .or(component)
            .map(|name| variant_discriminant_name(name).to_string())
            .unwrap_or_default();
        if discriminant.is_empty() {
            return Ok(Branch::Unchecked(var_ty));
        }

        let Some(which) = self.which_variant_applies(union, &discriminant, dval) else {
            return Ok(Branch::Empty);
        };

        let member = self.arena.get(union).fields()[which].clone();
        if self.is_dynamic_field(&member) {
            let target = self.dynamic_target(&member);
            return Ok(Branch::Selected(self.fix_record(target, contents, Some(dval))?));
        }
        let member_fields = self.arena.get(self.strip(member.ty)).fields().to_vec();
        if self.variant_field_index(&member_fields).is_some() || self.dynamic_template(member.ty).is_some() {
            return Ok(Branch::Selected(self.fix_record(member.ty, contents, Some(dval))?));
        }
        Ok(Branch::Selected(member.ty))
    }

    /// Index of the member of `union` that applies, `others` last.
    fn which_variant_applies(&mut self, union: TypeId, discriminant: &str, dval: &Value) -> Option<usize>
    {
        let Some(value) = self.discriminant_value(dval, discriminant) else {
            self.recover(
                GnatError::UnsupportedVariant(format!("no value for discriminant {discriminant}")),
                format!("could not find discriminant {discriminant} of variant part"),
            );
            return None;
        };

        let members: Vec<String> = self.arena.get(union).fields().iter().map(|field| field.name.clone()).collect();
        let mut others = None;
        for (index, name) in members.iter().enumerate() {
            if name.starts_with('O') {
                others = Some(index);
                continue;
            }
            match in_variant(value, name) {
                Some(true) => return Some(index),
                Some(false) => {}
                None => self.recover(
                    GnatError::MalformedEncoding(name.clone()),
                    format!("could not understand variant choice {name}"),
                ),
            }
        }
        debug!(discriminant, value, others = ?others, "no explicit choice applies");
        others
    }

    /// Value of the discriminant `name` in `dval`.
    ///
    /// A qualified name (`pkg__rec__kind`) also matches its last component.
    pub(crate) fn discriminant_value(&self, dval: &Value, name: &str) -> Option<i64>
    {
        let target = self.target();
        let lookup = |name: &str| match target.read_named_field(dval, name) {
            Ok(Some(field)) => target.value_as_long(&field).ok(),
            Ok(None) => None,
            Err(err) => {
                debug!(name, %err, "unreadable discriminant");
                None
            }
        };
        lookup(name).or_else(|| {
            let last = name.rfind("__").map(|at| &name[at + 2..])?;
            lookup(last)
        })
    }

    /// Type standing for a branch when the variant part is fixed on its own.
    pub(crate) fn branch_type(&mut self, branch: Branch, union: TypeId) -> TypeId
    {
        match branch {
            Branch::Selected(ty) | Branch::Unchecked(ty) => ty,
            Branch::Empty => {
                let name = self.type_name(union).map(str::to_string);
                self.add_type(TypeDescriptor::new(name, Kind::Record { fields: Vec::new() }, 0).into_fixed())
            }
        }
    }
}
