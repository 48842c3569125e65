//! # Error Types
//!
//! Error handling for GNAT encoding decoding and type fixing.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Not every failure propagates. Malformed encodings, missing parallel
//! types and undecidable variants are recovered locally: the error is kept
//! as the `cause` of a [`Degradation`](crate::fixing::Degradation) on the
//! evaluation, which continues with a fallback.

use thiserror::Error;

use crate::types::Address;

/// Main error type for decoding and fixing operations
///
/// ## Error Categories
///
/// 1. **Encoding errors**: MalformedEncoding, InvalidOperator
/// 2. **Layout errors**: MissingParallelType, UnsupportedVariant, BadGnatArrayDescriptor
/// 3. **Resource errors**: SizeLimitExceeded, BufferTooSmall
/// 4. **Value errors**: NullArrayAccess, ValueUnavailable, Memory
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GnatError
{
    /// A name or type does not follow the GNAT encoding conventions
    ///
    /// Callers usually degrade to a best-effort layout or to the bracketed
    /// verbatim name instead of propagating this.
    #[error("Malformed GNAT encoding: {0}")]
    MalformedEncoding(String),

    /// An auxiliary type that the encoding requires is absent
    #[error("Missing parallel type {name}{suffix}")]
    MissingParallelType
    {
        /// Encoded name of the type the lookup started from
        name: String,
        /// Suffix that was appended (e.g. `___XA`); empty when the missing
        /// type is named by stripping an encoding instead
        suffix: &'static str,
    },

    /// A computed object size is above the configured ceiling
    ///
    /// This is raised before any buffer for the object is allocated, so
    /// corrupt debug info cannot trigger multi-gigabyte reads.
    #[error("Object size {size} is larger than the size limit ({limit} bytes)")]
    SizeLimitExceeded
    {
        /// Computed size in bytes
        size: u64,
        /// Configured ceiling in bytes
        limit: u64,
    },

    /// A fat or thin pointer lacks the fields the descriptor layout requires
    #[error("Bad GNAT array descriptor: {0}")]
    BadGnatArrayDescriptor(String),

    /// The applicable branch of a variant part could not be determined
    #[error("Unsupported variant: {0}")]
    UnsupportedVariant(String),

    /// An access to an unconstrained array is null, so no bounds exist
    #[error("Cannot dereference null array access of type {0}")]
    NullArrayAccess(String),

    /// An operator name is not part of the Ada operator table
    #[error("Invalid Ada operator name: {0}")]
    InvalidOperator(String),

    /// Target memory could not be read
    #[error("Cannot access {length} bytes of memory at {address}")]
    Memory
    {
        /// Start of the failed read
        address: Address,
        /// Requested length in bytes
        length: usize,
    },

    /// A value has neither cached contents nor an address covering the request
    #[error("Value contents unavailable: {0}")]
    ValueUnavailable(String),

    /// A destination buffer cannot hold the requested number of bits
    #[error("Cannot unpack {bits} bits into buffer of {bytes} bytes")]
    BufferTooSmall
    {
        /// Number of bits requested
        bits: usize,
        /// Size of the destination buffer
        bytes: usize,
    },

    /// Invalid argument passed to an engine function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience type alias for `Result<T, GnatError>`
///
/// ```rust
/// use gnatfix_core::error::GnatResult;
/// fn foo() -> GnatResult<()>
/// {
///     Ok(())
/// }
/// ```
pub type GnatResult<T> = std::result::Result<T, GnatError>;
