//! Values: a type plus the bytes (or the address) holding an object.

use std::borrow::Cow;
use std::sync::Arc;

use super::{Address, TypeId};
use crate::error::{GnatError, GnatResult};
use crate::memory::MemoryAccess;

/// Where the bytes of an object come from.
///
/// An object may be known by its cached bytes, by its target address, or
/// both. Reads are served from the cached bytes when they cover the request
/// and fall back to target memory otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contents
{
    address: Option<Address>,
    bytes: Option<Arc<[u8]>>,
    offset: usize,
}

impl Contents
{
    /// No bytes and no address: fixing proceeds from static information only.
    #[must_use]
    pub fn none() -> Self
    {
        Self::default()
    }

    /// An object living in target memory.
    #[must_use]
    pub fn at(address: Address) -> Self
    {
        Self {
            address: Some(address),
            bytes: None,
            offset: 0,
        }
    }

    /// An object whose bytes are already in debugger memory.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self
    {
        Self {
            address: None,
            bytes: Some(bytes.into()),
            offset: 0,
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: Address) -> Self
    {
        self.address = Some(address);
        self
    }

    pub fn address(&self) -> Option<Address>
    {
        self.address
    }

    /// Whether there is nothing to read from.
    pub fn is_empty(&self) -> bool
    {
        self.address.is_none() && self.bytes.is_none()
    }

    /// Cached bytes from the start of this object, if any.
    pub fn cached(&self) -> Option<&[u8]>
    {
        self.bytes.as_deref().map(|bytes| bytes.get(self.offset..).unwrap_or(&[]))
    }

    /// View of a sub-object starting `byte_offset` bytes into this one.
    #[must_use]
    pub fn offset_by(&self, byte_offset: u64) -> Self
    {
        let delta = usize::try_from(byte_offset).unwrap_or(usize::MAX);
        Self {
            address: self.address.and_then(|address| address.checked_add(byte_offset)),
            bytes: self.bytes.clone(),
            offset: self.offset.saturating_add(delta),
        }
    }

    /// Read `length` bytes at `byte_offset`.
    pub fn fetch(&self, memory: &dyn MemoryAccess, byte_offset: u64, length: usize) -> GnatResult<Cow<'_, [u8]>>
    {
        if let Some(cached) = self.cached() {
            let start = usize::try_from(byte_offset).unwrap_or(usize::MAX);
            if let Some(slice) = start.checked_add(length).and_then(|end| cached.get(start..end)) {
                return Ok(Cow::Borrowed(slice));
            }
        }

        match self.address {
            Some(address) => {
                let start = address.checked_add(byte_offset).ok_or(GnatError::Memory { address, length })?;
                memory.read_memory(start, length).map(Cow::Owned)
            }
            None => Err(GnatError::ValueUnavailable(format!(
                "{length} bytes at offset {byte_offset} are neither cached nor addressable"
            ))),
        }
    }
}

/// A typed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value
{
    ty: TypeId,
    contents: Contents,
}

impl Value
{
    pub fn new(ty: TypeId, contents: Contents) -> Self
    {
        Self { ty, contents }
    }

    /// A value at `address` in target memory.
    pub fn at(ty: TypeId, address: Address) -> Self
    {
        Self::new(ty, Contents::at(address))
    }

    /// A value held in debugger memory.
    pub fn from_bytes(ty: TypeId, bytes: impl Into<Arc<[u8]>>) -> Self
    {
        Self::new(ty, Contents::from_bytes(bytes))
    }

    pub fn ty(&self) -> TypeId
    {
        self.ty
    }

    pub fn contents(&self) -> &Contents
    {
        &self.contents
    }

    pub fn address(&self) -> Option<Address>
    {
        self.contents.address()
    }

    /// Cached bytes, if the value has been fetched.
    pub fn bytes(&self) -> Option<&[u8]>
    {
        self.contents.cached()
    }

    /// Same object viewed through another type.
    #[must_use]
    pub fn with_type(&self, ty: TypeId) -> Self
    {
        Self {
            ty,
            contents: self.contents.clone(),
        }
    }
}
