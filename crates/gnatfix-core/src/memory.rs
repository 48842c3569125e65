//! # Target Memory
//!
//! The engine never talks to an inferior directly. Hosts implement
//! [`MemoryAccess`] on top of whatever transport they use (ptrace, a core
//! file, a remote stub); [`FlatMemory`] is an in-process implementation
//! backed by byte regions, convenient for core dumps and fixtures.

use std::collections::BTreeMap;

use tracing::trace;

use crate::error::{GnatError, GnatResult};
use crate::types::Address;

/// Minimal memory accessor required to fetch values.
pub trait MemoryAccess
{
    /// Read exactly `length` bytes starting at `address`.
    ///
    /// ## Errors
    ///
    /// Returns [`GnatError::Memory`] when any byte of the range is unreadable.
    fn read_memory(&self, address: Address, length: usize) -> GnatResult<Vec<u8>>;
}

/// Memory made of disjoint byte regions.
///
/// ```rust
/// use gnatfix_core::memory::{FlatMemory, MemoryAccess};
/// use gnatfix_core::types::Address;
///
/// let mut memory = FlatMemory::new();
/// memory.map(Address::new(0x1000), vec![1, 2, 3, 4]);
/// assert_eq!(memory.read_memory(Address::new(0x1001), 2).unwrap(), vec![2, 3]);
/// assert!(memory.read_memory(Address::new(0x1003), 2).is_err());
/// ```
#[derive(Debug, Default, Clone)]
pub struct FlatMemory
{
    regions: BTreeMap<u64, Vec<u8>>,
}

impl FlatMemory
{
    #[must_use]
    pub fn new() -> Self
    {
        Self {
            regions: BTreeMap::new(),
        }
    }

    /// Map `bytes` at `address`, replacing any region starting there.
    pub fn map(&mut self, address: Address, bytes: Vec<u8>)
    {
        self.regions.insert(address.value(), bytes);
    }
}

impl MemoryAccess for FlatMemory
{
    fn read_memory(&self, address: Address, length: usize) -> GnatResult<Vec<u8>>
    {
        let start = address.value();
        let fault = GnatError::Memory { address, length };
        let (&base, bytes) = self.regions.range(..=start).next_back().ok_or(fault.clone())?;
        let offset = usize::try_from(start - base).map_err(|_| fault.clone())?;
        let end = offset.checked_add(length).ok_or(fault.clone())?;
        let slice = bytes.get(offset..end).ok_or(fault)?;
        trace!(%address, length, "read target memory");
        Ok(slice.to_vec())
    }
}

impl<M: MemoryAccess + ?Sized> MemoryAccess for &M
{
    fn read_memory(&self, address: Address, length: usize) -> GnatResult<Vec<u8>>
    {
        (**self).read_memory(address, length)
    }
}
