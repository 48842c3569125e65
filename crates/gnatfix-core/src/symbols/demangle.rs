//! GNAT name decoding and encoding.
//!
//! GNAT does not mangle names the way C++ or Rust compilers do. An Ada
//! entity keeps its lowercase spelling; scopes are joined with `__`,
//! operators become `O`-tokens (`Oadd` for `"+"`), and the compiler appends
//! suffixes that carry layout facts the debug format cannot express
//! (`___XVE`, `___XA`, ...) or that disambiguate overloads (`__2`, `$3`).
//!
//! ## Decoding
//!
//! [`decode`] turns `pkg__child__Oadd__2` into `pkg.child."+"`. Decoding
//! never fails: a name that does not validate (an uppercase letter or a
//! space survives, or an unknown `___` block is found) comes back verbatim
//! inside angle brackets, e.g. `<_Z3foo>`, which tells the user the name is
//! not an Ada name rather than hiding it.
//!
//! ## Encoding
//!
//! [`encode`] is the partial inverse used to look names up: `.` becomes
//! `__` and a quoted operator becomes its token.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{GnatError, GnatResult};

/// An Ada operator and its GNAT token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator
{
    /// Token as it appears in linkage names, e.g. `Oadd`.
    pub encoded: &'static str,
    /// Quoted symbol as written in Ada, e.g. `"+"`.
    pub decoded: &'static str,
    /// Whether the operator takes a single operand.
    pub unary: bool,
}

const fn op(encoded: &'static str, decoded: &'static str, unary: bool) -> Operator
{
    Operator {
        encoded,
        decoded,
        unary,
    }
}

/// Every operator GNAT encodes. `+` and `-` appear twice (binary, then unary)
/// and share their tokens.
pub const OPERATORS: &[Operator] = &[
    op("Oadd", "\"+\"", false),
    op("Osubtract", "\"-\"", false),
    op("Omultiply", "\"*\"", false),
    op("Odivide", "\"/\"", false),
    op("Omod", "\"mod\"", false),
    op("Orem", "\"rem\"", false),
    op("Oexpon", "\"**\"", false),
    op("Olt", "\"<\"", false),
    op("Ole", "\"<=\"", false),
    op("Ogt", "\">\"", false),
    op("Oge", "\">=\"", false),
    op("Oeq", "\"=\"", false),
    op("One", "\"/=\"", false),
    op("Oand", "\"and\"", false),
    op("Oor", "\"or\"", false),
    op("Oxor", "\"xor\"", false),
    op("Oconcat", "\"&\"", false),
    op("Oabs", "\"abs\"", true),
    op("Onot", "\"not\"", true),
    op("Oadd", "\"+\"", true),
    op("Osubtract", "\"-\"", true),
];

static BY_TOKEN: Lazy<HashMap<&'static str, &'static Operator>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for operator in OPERATORS {
        map.entry(operator.encoded).or_insert(operator);
    }
    map
});

/// Operator spelled by `token` (`Oadd`), binary form first.
pub fn operator_for_token(token: &str) -> Option<&'static Operator>
{
    BY_TOKEN.get(token).copied()
}

/// Operator whose quoted symbol is `symbol` (`"+"`), case-insensitively.
pub fn operator_for_symbol(symbol: &str) -> Option<&'static Operator>
{
    OPERATORS.iter().find(|operator| operator.decoded.eq_ignore_ascii_case(symbol))
}

/// GNAT token for a quoted operator symbol.
pub fn token_for_operator(symbol: &str) -> Option<&'static str>
{
    operator_for_symbol(symbol).map(|operator| operator.encoded)
}

/// Decode a GNAT linkage name into its Ada spelling.
///
/// ```rust
/// use gnatfix_core::symbols::demangle::decode;
///
/// assert_eq!(decode("pkg__child__Oadd"), "pkg.child.\"+\"");
/// assert_eq!(decode("_ada_main"), "main");
/// assert_eq!(decode("_Z3foo"), "<_Z3foo>");
/// ```
pub fn decode(encoded: &str) -> String
{
    try_decode(encoded).unwrap_or_else(|| suppressed(encoded))
}

/// Whether [`decode`] would fall back to the bracketed verbatim form.
pub fn is_suppressed(encoded: &str) -> bool
{
    try_decode(encoded).is_none()
}

fn suppressed(encoded: &str) -> String
{
    if encoded.starts_with('<') {
        encoded.to_string()
    } else {
        format!("<{encoded}>")
    }
}

fn try_decode(encoded: &str) -> Option<String>
{
    let name = encoded.strip_prefix("_ada_").unwrap_or(encoded);
    let bytes = name.as_bytes();
    if matches!(bytes.first(), Some(b'_' | b'<')) {
        return None;
    }

    let mut len = bytes.len();
    len = trim_trailing_digits(bytes, len);
    len = trim_protected_suffix(bytes, len);

    if let Some(p) = find(bytes, b"___") {
        if p + 3 < len {
            if bytes[p + 3] == b'X' {
                len = p;
            } else {
                return None;
            }
        }
    }

    if len > 3 && bytes[..len].ends_with(b"TKB") {
        len -= 3;
    }
    if len > 2 && bytes[..len].ends_with(b"TB") {
        len -= 2;
    }
    if len > 1 && bytes[len - 1] == b'B' {
        len -= 1;
    }
    len = trim_disambiguator(bytes, len);

    let s = &bytes[..len];
    let mut out: Vec<u8> = Vec::with_capacity(2 * len + 1);
    let mut i = 0;
    while i < len && !s[i].is_ascii_alphabetic() {
        out.push(s[i]);
        i += 1;
    }

    let mut at_start_name = true;
    while i < len {
        if at_start_name && s[i] == b'O' {
            if let Some(operator) = operator_at(s, i) {
                out.extend_from_slice(operator.decoded.as_bytes());
                i += operator.encoded.len();
                at_start_name = false;
                continue;
            }
        }
        at_start_name = false;

        // TK__ marks a task body scope; keep only the separator.
        if i + 4 < len && s[i..].starts_with(b"TK__") {
            i += 2;
        }

        // __B_<digits>__ names an anonymous block.
        if len - i > 5 && s[i..].starts_with(b"__B_") && s[i + 4].is_ascii_digit() {
            let k = skip_digits(s, i + 5);
            if len - k > 2 && s[k..].starts_with(b"__") {
                i = k;
            }
        }

        // _E<digits>[bs] entry bodies and barriers.
        if len - i > 3 && s[i..].starts_with(b"_E") && s[i + 2].is_ascii_digit() {
            let mut k = skip_digits(s, i + 3);
            if k < len && (s[k] == b'b' || s[k] == b's') {
                k += 1;
                if k == len || s[k] == b'_' {
                    i = k;
                }
            }
        }

        // <lowercase-alnum>N__ in protected object subprograms.
        if i + 2 < len && s[i] == b'N' && s[i + 1] == b'_' && s[i + 2] == b'_' {
            let mut ptr = i;
            while ptr > 0 && is_lower_alphanum(s[ptr - 1]) {
                ptr -= 1;
            }
            if ptr == 0 || (ptr >= 2 && s[ptr - 1] == b'_' && s[ptr - 2] == b'_') {
                i += 1;
            }
        }

        if i >= len {
            break;
        }

        if s[i] == b'X' && i != 0 && s[i - 1].is_ascii_alphanumeric() {
            // X[bn]* closes body-nested package names and must end the name.
            i += 1;
            while i < len && (s[i] == b'b' || s[i] == b'n') {
                i += 1;
            }
            if i < len {
                return None;
            }
        } else if i + 2 < len && s[i] == b'_' && s[i + 1] == b'_' {
            out.push(b'.');
            at_start_name = true;
            i += 2;
        } else {
            out.push(s[i]);
            i += 1;
        }
    }

    if out.iter().any(|b| b.is_ascii_uppercase() || *b == b' ') {
        return None;
    }
    String::from_utf8(out).ok()
}

fn operator_at(s: &[u8], i: usize) -> Option<&'static Operator>
{
    OPERATORS.iter().find(|operator| {
        let token = operator.encoded.as_bytes();
        s[i..].starts_with(token) && !s.get(i + token.len()).is_some_and(u8::is_ascii_alphanumeric)
    })
}

/// Trailing `.<digits>`, `$<digits>`, `___<digits>` or `__<digits>`.
fn trim_trailing_digits(s: &[u8], len: usize) -> usize
{
    if len > 1 && s[len - 1].is_ascii_digit() {
        let mut i = len - 2;
        while i > 0 && s[i].is_ascii_digit() {
            i -= 1;
        }
        if s[i] == b'.' || s[i] == b'$' {
            return i;
        }
        if i >= 2 && s[i - 2..].starts_with(b"___") {
            return i - 2;
        }
        if i >= 1 && s[i - 1..].starts_with(b"__") {
            return i - 1;
        }
    }
    len
}

/// The `N` GNAT appends to the unprotected half of a protected subprogram.
fn trim_protected_suffix(s: &[u8], len: usize) -> usize
{
    if len > 1 && s[len - 1] == b'N' && (s[len - 2].is_ascii_digit() || s[len - 2].is_ascii_lowercase()) {
        len - 1
    } else {
        len
    }
}

/// Overload disambiguators `__<digits>` (digits may contain `_`) or `$<digits>`.
fn trim_disambiguator(s: &[u8], len: usize) -> usize
{
    if len > 1 && s[len - 1].is_ascii_digit() {
        let mut i = len - 2;
        while i > 0 && (s[i].is_ascii_digit() || (s[i] == b'_' && s[i - 1].is_ascii_digit())) {
            i -= 1;
        }
        if i > 1 && s[i] == b'_' && s[i - 1] == b'_' {
            return i - 1;
        }
        if s[i] == b'$' {
            return i;
        }
    }
    len
}

fn skip_digits(s: &[u8], mut k: usize) -> usize
{
    while k < s.len() && s[k].is_ascii_digit() {
        k += 1;
    }
    k
}

fn is_lower_alphanum(b: u8) -> bool
{
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize>
{
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Encode an Ada name for lookup in debug information.
///
/// ## Errors
///
/// Returns [`GnatError::InvalidOperator`] when a quoted operator is not in
/// [`OPERATORS`].
///
/// ```rust
/// use gnatfix_core::symbols::demangle::encode;
///
/// assert_eq!(encode("pkg.child").unwrap(), "pkg__child");
/// assert_eq!(encode("pkg.\"<=\"").unwrap(), "pkg__Ole");
/// assert!(encode("pkg.\"!\"").is_err());
/// ```
pub fn encode(decoded: &str) -> GnatResult<String>
{
    let mut out = String::with_capacity(decoded.len() * 2);
    for (i, ch) in decoded.char_indices() {
        match ch {
            '.' => out.push_str("__"),
            '"' => {
                let tail = &decoded[i..];
                let operator = OPERATORS
                    .iter()
                    .find(|operator| tail.starts_with(operator.decoded))
                    .ok_or_else(|| GnatError::InvalidOperator(tail.to_string()))?;
                out.push_str(operator.encoded);
                break;
            }
            _ => out.push(ch),
        }
    }
    Ok(out)
}

/// Normalise a user-typed name: lowercase, unless written verbatim as `<Name>`.
pub fn fold_name(name: &str) -> String
{
    match name.strip_prefix('<').and_then(|inner| inner.strip_suffix('>')) {
        Some(verbatim) => verbatim.to_string(),
        None => name.to_lowercase(),
    }
}

/// Last component of a decoded name; bracketed names are returned whole.
pub fn unqualified_name(decoded: &str) -> &str
{
    if decoded.starts_with('<') {
        return decoded;
    }
    // Operators may not contain '.', but "." inside quotes is not a separator.
    let search_end = decoded.find('"').unwrap_or(decoded.len());
    match decoded[..search_end].rfind('.') {
        Some(dot) => &decoded[dot + 1..],
        None => decoded,
    }
}

/// Whether a record component called `field_name` answers to `target`.
///
/// GNAT may append encoding blocks to component names (`len___XVL`), so a
/// component matches when the rest of its name is such a block, except for
/// the variant-part marker `___XVN`.
pub fn field_name_match(field_name: &str, target: &str) -> bool
{
    match field_name.strip_prefix(target) {
        Some("") => true,
        Some(rest) => rest.starts_with("___") && rest != "___XVN",
        None => false,
    }
}

/// Whether `name` carries the encoding block `suffix` (`___XVE`, `___XD`, ...).
pub fn has_suffix(name: &str, suffix: &str) -> bool
{
    name.contains(suffix)
}

/// Name of the parallel type carrying `suffix` for `name`.
pub fn parallel_name(name: &str, suffix: &str) -> String
{
    format!("{name}{suffix}")
}

/// The part of an encoded name before its first `___` encoding block.
pub fn strip_encoding(name: &str) -> &str
{
    name.find("___").map_or(name, |block| &name[..block])
}

/// Scan a GNAT-encoded integer starting at byte `k` of `s`.
///
/// Digits may be followed by `m` for a negative value (`5m` is -5). Returns
/// the value and the index just past it, or `None` when `s[k]` is not a
/// digit.
pub fn scan_number(s: &str, k: usize) -> Option<(i64, usize)>
{
    let bytes = s.as_bytes();
    if !bytes.get(k).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let mut magnitude: u64 = 0;
    let mut end = k;
    while let Some(digit) = bytes.get(end).filter(|b| b.is_ascii_digit()) {
        magnitude = magnitude.wrapping_mul(10).wrapping_add(u64::from(digit - b'0'));
        end += 1;
    }
    if bytes.get(end) == Some(&b'm') {
        let value = (magnitude as i64).wrapping_neg();
        Some((value, end + 1))
    } else {
        Some((magnitude as i64, end))
    }
}

/// What a renaming declaration renames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenamingKind
{
    Object,
    Exception,
    Package,
    Subprogram,
}

/// A renaming declaration recovered from a `___XR` symbol name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renaming<'a>
{
    pub kind: RenamingKind,
    /// Encoded name of the renamed entity.
    pub renamed_entity: &'a str,
    /// Selector/index encoding that follows `___XE` (may be empty).
    pub expression: &'a str,
}

/// Parse a renaming symbol such as `r___XR_pkg__obj___XE`.
///
/// Returns `None` when the name is not a renaming or is malformed.
pub fn parse_renaming(symbol_name: &str) -> Option<Renaming<'_>>
{
    let info = symbol_name.find("___XR").map(|at| &symbol_name[at + 5..])?;
    let (kind, entity) = match info.as_bytes().first()? {
        b'_' => (RenamingKind::Object, &info[1..]),
        b'E' => (RenamingKind::Exception, info.get(2..)?),
        b'P' => (RenamingKind::Package, info.get(2..)?),
        b'S' => (RenamingKind::Subprogram, info.get(2..)?),
        _ => return None,
    };
    let suffix = entity.find("___XE")?;
    if suffix == 0 {
        return None;
    }
    Some(Renaming {
        kind,
        renamed_entity: &entity[..suffix],
        expression: &entity[suffix + 5..],
    })
}
