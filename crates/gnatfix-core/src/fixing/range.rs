//! Discriminant-dependent and variable range bounds (`___XD` encodings).
//!
//! A subtype named `<prefix>___XD<info>` has bounds the debug format could
//! not state. `<info>` is `L`, `U`, both or neither, followed by
//! `_<lo>__<hi>` for the letters present. Each bound is either a literal
//! (`5`, `5m` for -5) or the name of a discriminant of the enclosing record.
//! A bound whose letter is absent lives in the variable `<prefix>___L` or
//! `<prefix>___U`.

use super::{DegradationKind, Evaluation};
use crate::error::GnatResult;
use crate::symbols::demangle::scan_number;
use crate::types::{Kind, TypeDescriptor, TypeId, Value};

impl Evaluation<'_>
{
    /// Fixed version of the range `ty`, bounds resolved against `dval`.
    ///
    /// A range without `___XD` is returned unchanged, and so is one whose
    /// bound names something that cannot be found.
    pub(crate) fn fix_range(&mut self, ty: TypeId, dval: Option<&Value>) -> GnatResult<TypeId>
    {
        let stripped = self.strip(ty);
        let Some(name) = self.type_name(ty).map(str::to_string) else {
            return Ok(stripped);
        };
        let Some(xd) = name.find("___XD") else {
            return Ok(stripped);
        };
        let base = match self.arena.kind(stripped) {
            Kind::Range { base, .. } => *base,
            _ => stripped,
        };

        let prefix = &name[..xd];
        let info = &name[xd + 5..];
        let bounds = info.find('_').map(|underscore| &info[underscore..]);
        let mut n = 1;
        let mut letters = info;

        let low = if let Some(rest) = letters.strip_prefix('L') {
            let Some((low, next)) = bounds.and_then(|bounds| self.scan_bound(bounds, n, dval)) else {
                return Ok(stripped);
            };
            n = next;
            match bounds.and_then(|bounds| bounds.as_bytes().get(n)) {
                Some(b'_') => n += 2,
                Some(b'.') => n += 1,
                _ => {}
            }
            letters = rest;
            low
        } else {
            match self.int_variable(&format!("{prefix}___L")) {
                Some(low) => low,
                None => {
                    self.degrade(DegradationKind::UnknownBound, "Unknown lower bound, using 1.".to_string());
                    1
                }
            }
        };

        let high = if letters.starts_with('U') {
            let Some((high, _)) = bounds.and_then(|bounds| self.scan_bound(bounds, n, dval)) else {
                return Ok(stripped);
            };
            high
        } else {
            match self.int_variable(&format!("{prefix}___U")) {
                Some(high) => high,
                None => {
                    self.degrade(DegradationKind::UnknownBound, format!("Unknown upper bound, using {low}."));
                    low
                }
            }
        };

        // The fixed range keeps the size of the encoded one, not of its base.
        let size = self.arena.size_of(stripped);
        let fixed = TypeDescriptor::new(Some(name), Kind::Range { base, low, high }, size).into_fixed();
        Ok(self.add_type(fixed))
    }

    /// A literal bound, or a discriminant bound read from `dval`.
    fn scan_bound(&self, bounds: &str, k: usize, dval: Option<&Value>) -> Option<(i64, usize)>
    {
        scan_number(bounds, k).or_else(|| self.scan_discriminant_bound(bounds, k, dval))
    }

    /// Bound named by the discriminant starting at `bounds[k]`, up to `__` or the end.
    fn scan_discriminant_bound(&self, bounds: &str, k: usize, dval: Option<&Value>) -> Option<(i64, usize)>
    {
        let dval = dval?;
        let start = bounds.get(k..).filter(|rest| !rest.is_empty())?;
        let discriminant = start.find("__").map_or(start, |end| &start[..end]);
        let value = self.discriminant_value(dval, discriminant)?;
        Some((value, k + discriminant.len()))
    }
}
