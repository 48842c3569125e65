//! # Fixing Engine
//!
//! Turns GNAT-encoded types into *fixed* ones: concrete layouts whose array
//! bounds are known, whose variant parts are reduced to the branch selected
//! by the discriminants, and whose packed arrays carry their element width.
//!
//! An [`Evaluation`] corresponds to one request of the debugger (printing
//! one expression, say). It borrows the type arena and the host
//! collaborators, appends the fixed descriptors it builds, and keeps the
//! list of [`Degradation`]s met on the way. Dropping it leaves nothing to
//! undo: every descriptor it appended is complete and immutable.
//!
//! ## Usage
//!
//! ```rust
//! use gnatfix_core::config::EngineConfig;
//! use gnatfix_core::fixing::Evaluation;
//! use gnatfix_core::memory::FlatMemory;
//! use gnatfix_core::symbols::{ImageId, ResolverContext, StaticDirectory};
//! use gnatfix_core::types::{Contents, TypeArena, TypeDescriptor};
//!
//! let mut arena = TypeArena::new();
//! let integer = arena.add(TypeDescriptor::int("integer", 4, true));
//! let directory = StaticDirectory::new();
//! let memory = FlatMemory::new();
//! let mut context = ResolverContext::new();
//!
//! let mut evaluation = Evaluation::new(
//!     &mut arena,
//!     &directory,
//!     &memory,
//!     &mut context,
//!     ImageId::from(1),
//!     EngineConfig::default(),
//! );
//! assert_eq!(evaluation.fix_type(integer, &Contents::none(), None).unwrap(), integer);
//! assert!(!evaluation.is_degraded());
//! ```
//!
//! ## Failure policy
//!
//! Missing parallel types, unknown bounds and undecidable variants degrade
//! the result and are recorded; sizes over [`EngineConfig::max_object_size`]
//! and malformed array descriptors are errors.

mod array;
mod parallel;
mod range;
mod record;
mod variant;

use std::cell::RefCell;
use std::fmt;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{GnatError, GnatResult};
use crate::layout::Target;
use crate::memory::MemoryAccess;
use crate::symbols::demangle::has_suffix;
use crate::symbols::{ImageId, ResolverContext, TypeDirectory};
use crate::types::{Contents, Kind, TypeArena, TypeDescriptor, TypeId, Value};

/// Why a result is less precise than the debug information intended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DegradationKind
{
    /// An auxiliary type the encoding refers to is absent.
    MissingParallelType,
    /// A name or type does not follow the encoding conventions.
    MalformedEncoding,
    /// The branch of a variant part could not be determined.
    UnsupportedVariant,
    /// A range bound variable is missing; a default was used.
    UnknownBound,
    /// A packed array was indexed outside its bounds.
    IndexOutOfBounds,
    /// A fixed record template has no usable size.
    InvalidSize,
    /// A component could not be fixed and kept its declared type.
    ComponentUnavailable,
    /// The type graph is nested deeper than the configured limit.
    DepthLimit,
}

impl DegradationKind
{
    /// Kind under which a recovered `error` is recorded.
    pub fn for_error(error: &GnatError) -> Self
    {
        match error {
            GnatError::MissingParallelType { .. } => Self::MissingParallelType,
            GnatError::UnsupportedVariant(_) => Self::UnsupportedVariant,
            GnatError::MalformedEncoding(_) | GnatError::InvalidOperator(_) => Self::MalformedEncoding,
            _ => Self::ComponentUnavailable,
        }
    }
}

/// A recorded degradation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradation
{
    pub kind: DegradationKind,
    pub message: String,
    /// The error that was recovered from, if one was raised.
    pub cause: Option<GnatError>,
}

impl fmt::Display for Degradation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.message)
    }
}

/// Where non-fatal diagnostics go.
pub trait DiagnosticSink
{
    fn report_warning(&self, message: &str);
}

/// Forwards warnings to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink
{
    fn report_warning(&self, message: &str)
    {
        warn!("{message}");
    }
}

/// Keeps warnings in memory, for hosts that display them later.
#[derive(Debug, Default)]
pub struct RecordingSink
{
    messages: RefCell<Vec<String>>,
}

impl RecordingSink
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String>
    {
        self.messages.borrow().clone()
    }
}

impl DiagnosticSink for RecordingSink
{
    fn report_warning(&self, message: &str)
    {
        self.messages.borrow_mut().push(message.to_string());
    }
}

static TRACING_SINK: TracingSink = TracingSink;

/// One fixing request.
pub struct Evaluation<'a>
{
    arena: &'a mut TypeArena,
    directory: &'a dyn TypeDirectory,
    memory: &'a dyn MemoryAccess,
    context: &'a mut ResolverContext,
    image: ImageId,
    config: EngineConfig,
    sink: &'a dyn DiagnosticSink,
    warnings: Vec<Degradation>,
    depth: usize,
}

/// How the dispatcher treats a kind.
enum Shape
{
    Unchanged,
    Packed,
    Range,
    Record,
    Array,
    Union,
    TooDeep,
}

impl<'a> Evaluation<'a>
{
    pub fn new(
        arena: &'a mut TypeArena,
        directory: &'a dyn TypeDirectory,
        memory: &'a dyn MemoryAccess,
        context: &'a mut ResolverContext,
        image: ImageId,
        config: EngineConfig,
    ) -> Self
    {
        Self {
            arena,
            directory,
            memory,
            context,
            image,
            config,
            sink: &TRACING_SINK,
            warnings: Vec::new(),
            depth: 0,
        }
    }

    /// Send warnings to `sink` instead of `tracing`.
    #[must_use]
    pub fn with_sink(mut self, sink: &'a dyn DiagnosticSink) -> Self
    {
        self.sink = sink;
        self
    }

    /// Read-only view used by the layout helpers.
    pub fn target(&self) -> Target<'_>
    {
        Target::new(&*self.arena, self.directory, self.memory, &self.config)
    }

    pub fn arena(&self) -> &TypeArena
    {
        &*self.arena
    }

    pub fn config(&self) -> &EngineConfig
    {
        &self.config
    }

    /// Whether any part of the results so far is approximate.
    pub fn is_degraded(&self) -> bool
    {
        !self.warnings.is_empty()
    }

    /// Every degradation met so far, including those over the warning limit.
    pub fn warnings(&self) -> &[Degradation]
    {
        &self.warnings
    }

    /// Fixed version of `ty` for the object described by `contents`.
    ///
    /// `dval` is the record whose discriminants control `ty` (needed for
    /// variant parts and discriminant-dependent bounds). An already fixed
    /// type is returned as is, and so is every kind that needs no fixing.
    #[tracing::instrument(level = "debug", skip_all, fields(ty = %ty))]
    pub fn fix_type(&mut self, ty: TypeId, contents: &Contents, dval: Option<&Value>) -> GnatResult<TypeId>
    {
        if self.arena.get(ty).is_fixed() {
            return Ok(ty);
        }
        if self.depth >= self.config.max_depth {
            self.degrade(
                DegradationKind::DepthLimit,
                format!("type {ty} is nested deeper than {} levels", self.config.max_depth),
            );
            return Ok(ty);
        }

        self.depth += 1;
        let result = self.dispatch(ty, contents, dval);
        self.depth -= 1;
        result
    }

    fn dispatch(&mut self, ty: TypeId, contents: &Contents, dval: Option<&Value>) -> GnatResult<TypeId>
    {
        let stripped = self.strip(ty);
        if self.arena.get(stripped).is_fixed() {
            return Ok(stripped);
        }
        let packed = self.type_name(ty).is_some_and(|name| has_suffix(name, "___XP"));

        let shape = match self.arena.kind(stripped) {
            Kind::Scalar(_) if packed => Shape::Packed,
            Kind::Scalar(_) | Kind::Enum { .. } | Kind::Pointer { .. } | Kind::Reference { .. } => Shape::Unchanged,
            Kind::Range { .. } => Shape::Range,
            Kind::Record { .. } => Shape::Record,
            Kind::Array { .. } => Shape::Array,
            Kind::Union { .. } => Shape::Union,
            Kind::Typedef { .. } => Shape::TooDeep,
        };

        match shape {
            Shape::Unchanged => Ok(stripped),
            Shape::Packed => Ok(self.decode_constrained_packed_array_type(ty)?.unwrap_or(stripped)),
            Shape::Range => self.fix_range(ty, dval),
            // Nested records read their own discriminants.
            Shape::Record => self.fix_record(ty, contents, None),
            Shape::Array => self.fix_array(ty, dval),
            Shape::Union => match dval {
                Some(dval) => {
                    let branch = self.fixed_variant_branch(ty, None, contents, dval)?;
                    Ok(self.branch_type(branch, stripped))
                }
                None => Ok(stripped),
            },
            Shape::TooDeep => {
                self.degrade(DegradationKind::DepthLimit, format!("typedef chain of {ty} is too long"));
                Ok(ty)
            }
        }
    }

    /// Fixed type plus the bytes of the object, fetched once.
    ///
    /// ## Errors
    ///
    /// [`GnatError::SizeLimitExceeded`] when the fixed size is over the
    /// ceiling (checked before anything is read), and memory errors.
    #[tracing::instrument(level = "debug", skip_all, fields(ty = %value.ty()))]
    pub fn fix_value(&mut self, value: &Value) -> GnatResult<Value>
    {
        let fixed = self.fix_type(value.ty(), value.contents(), None)?;
        let size = self.check_size(fixed)?;
        let length = usize::try_from(size).unwrap_or(usize::MAX);
        let bytes = value.contents().fetch(self.memory, 0, length)?.into_owned();

        let mut contents = Contents::from_bytes(bytes);
        if let Some(address) = value.address() {
            contents = contents.with_address(address);
        }
        debug!(%fixed, size, "fixed value");
        Ok(Value::new(fixed, contents))
    }

    /// Fixing that needs no object: dynamic components are approximated by
    /// their static forms. Memoized per image in the resolver context.
    pub fn static_fixed_type(&mut self, ty: TypeId) -> GnatResult<TypeId>
    {
        if self.arena.get(ty).is_fixed() {
            return Ok(ty);
        }
        let stripped = self.strip(ty);
        if let Some(memo) = self.context.static_fixed(self.image, stripped) {
            return Ok(memo);
        }
        if self.depth >= self.config.max_depth {
            return Ok(stripped);
        }

        // Placeholder first, so recursive references terminate.
        self.context.remember_static_fixed(self.image, stripped, stripped);
        self.depth += 1;
        let result = match self.arena.kind(stripped) {
            Kind::Record { .. } => {
                let template = self.dynamic_template(ty).unwrap_or(stripped);
                self.template_to_static_fixed(template)
            }
            Kind::Union { .. } => {
                let template = self.parallel_type(ty, "___XVU").map_or(stripped, |id| self.strip(id));
                self.template_to_static_fixed(template)
            }
            Kind::Scalar(_)
            | Kind::Range { .. }
            | Kind::Enum { .. }
            | Kind::Array { .. }
            | Kind::Pointer { .. }
            | Kind::Reference { .. }
            | Kind::Typedef { .. } => Ok(stripped),
        };
        self.depth -= 1;

        let fixed = result?;
        self.context.remember_static_fixed(self.image, stripped, fixed);
        Ok(fixed)
    }

    /// Value of component `name` of `record`, if it exists.
    pub fn read_named_field(&self, record: &Value, name: &str) -> GnatResult<Option<Value>>
    {
        self.target().read_named_field(record, name)
    }

    /// Integer value of a discrete or access value.
    pub fn value_as_long(&self, value: &Value) -> GnatResult<i64>
    {
        self.target().value_as_long(value)
    }

    pub(crate) fn strip(&self, ty: TypeId) -> TypeId
    {
        self.arena.strip_typedefs(ty, self.config.max_depth)
    }

    /// Encoded name of `ty`, or of the type behind its typedefs.
    pub(crate) fn type_name(&self, ty: TypeId) -> Option<&str>
    {
        self.arena.name(ty).or_else(|| self.arena.name(self.strip(ty)))
    }

    pub(crate) fn parallel_type(&self, ty: TypeId, suffix: &str) -> Option<TypeId>
    {
        self.target().parallel_type(ty, suffix)
    }

    pub(crate) fn add_type(&mut self, descriptor: TypeDescriptor) -> TypeId
    {
        self.arena.add(descriptor)
    }

    /// Reject sizes over the ceiling. Returns the size of `ty`.
    pub(crate) fn check_size(&self, ty: TypeId) -> GnatResult<u64>
    {
        let size = self.arena.size_of(ty);
        self.check_byte_size(size)?;
        Ok(size)
    }

    pub(crate) fn check_byte_size(&self, size: u64) -> GnatResult<()>
    {
        self.config.check_object_size(size)
    }

    /// Record a degradation; only the first few reach the sink.
    pub(crate) fn degrade(&mut self, kind: DegradationKind, message: String)
    {
        self.push_degradation(Degradation {
            kind,
            message,
            cause: None,
        });
    }

    /// Record `error` as recovered; the evaluation continues with a fallback.
    pub(crate) fn recover(&mut self, error: GnatError, message: String)
    {
        self.push_degradation(Degradation {
            kind: DegradationKind::for_error(&error),
            message,
            cause: Some(error),
        });
    }

    pub(crate) fn push_degradation(&mut self, degradation: Degradation)
    {
        if self.warnings.len() < self.config.warning_limit {
            self.sink.report_warning(&degradation.message);
        } else {
            debug!(kind = ?degradation.kind, message = %degradation.message, "warning limit reached");
        }
        self.warnings.push(degradation);
    }

    /// Integer value of the variable `name`, if it exists and is readable.
    pub(crate) fn int_variable(&self, name: &str) -> Option<i64>
    {
        let symbol = self.directory.lookup_variable(name)?;
        let value = Value::at(symbol.ty, symbol.address);
        match self.target().value_as_long(&value) {
            Ok(result) => Some(result),
            Err(err) => {
                debug!(variable = name, %err, "unreadable variable");
                None
            }
        }
    }
}

/// Errors that abort a whole request rather than one component.
pub(crate) fn is_fatal(err: &GnatError) -> bool
{
    matches!(
        err,
        GnatError::SizeLimitExceeded { .. } | GnatError::BadGnatArrayDescriptor(_) | GnatError::BufferTooSmall { .. }
    )
}
