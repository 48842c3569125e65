//! Identity of a loaded debug-information image.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Describes a binary image mapped in the debuggee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor
{
    pub path: PathBuf,
    pub load_address: u64,
}

impl ImageDescriptor
{
    pub fn id(&self) -> ImageId
    {
        ImageId::from_parts(&self.path, self.load_address)
    }
}

/// Stable key for everything cached about one image.
///
/// Two loads of the same file at different addresses are different images:
/// the addresses baked into their fixed types differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u64);

impl ImageId
{
    pub fn from_parts(path: &Path, load_address: u64) -> Self
    {
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        load_address.hash(&mut hasher);
        ImageId(hasher.finish())
    }

    pub fn as_u64(self) -> u64
    {
        self.0
    }
}

impl From<u64> for ImageId
{
    fn from(raw: u64) -> Self
    {
        ImageId(raw)
    }
}
