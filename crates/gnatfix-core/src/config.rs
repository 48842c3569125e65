//! # Engine Configuration
//!
//! Limits and target facts the fixing engine needs.
//!
//! Defaults match what GNAT-aware debuggers have long used: objects above
//! 64 KiB are refused, at most two "missing parallel type" warnings are
//! printed per evaluation, and type graphs are walked at most 32 levels deep.
//!
//! ## Environment
//!
//! [`EngineConfig::from_env`] starts from the defaults and applies:
//!
//! - `GNATFIX_VARSIZE_LIMIT`: maximum object size in bytes
//! - `GNATFIX_WARNING_LIMIT`: warnings reported per evaluation
//! - `GNATFIX_MAX_DEPTH`: recursion and typedef-walk cap
//!
//! Unparseable values are ignored with a warning.

use std::env;
use std::str::FromStr;

use gimli::RunTimeEndian;
use tracing::warn;

use crate::error::{GnatError, GnatResult};

/// Default ceiling for the size of a fixed object, in bytes.
pub const DEFAULT_MAX_OBJECT_SIZE: u64 = 65536;
/// Default number of warnings reported per evaluation.
pub const DEFAULT_WARNING_LIMIT: usize = 2;
/// Default recursion cap for nested fixing and typedef walks.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Settings for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig
{
    /// Largest object (in bytes) the engine will lay out or fetch.
    pub max_object_size: u64,
    /// Warnings forwarded to the diagnostic sink per evaluation.
    pub warning_limit: usize,
    /// Depth at which nested fixing stops and typedef walks give up.
    pub max_depth: usize,
    /// Byte order of the target.
    pub endian: RunTimeEndian,
}

impl Default for EngineConfig
{
    fn default() -> Self
    {
        Self {
            max_object_size: DEFAULT_MAX_OBJECT_SIZE,
            warning_limit: DEFAULT_WARNING_LIMIT,
            max_depth: DEFAULT_MAX_DEPTH,
            endian: RunTimeEndian::Little,
        }
    }
}

impl EngineConfig
{
    /// Defaults overridden by the `GNATFIX_*` environment variables.
    pub fn from_env() -> Self
    {
        let mut config = Self::default();
        if let Some(limit) = env_value("GNATFIX_VARSIZE_LIMIT") {
            config.max_object_size = limit;
        }
        if let Some(limit) = env_value("GNATFIX_WARNING_LIMIT") {
            config.warning_limit = limit;
        }
        if let Some(depth) = env_value("GNATFIX_MAX_DEPTH") {
            config.max_depth = depth;
        }
        config
    }

    #[must_use]
    pub fn with_endian(mut self, endian: RunTimeEndian) -> Self
    {
        self.endian = endian;
        self
    }

    #[must_use]
    pub fn with_max_object_size(mut self, max_object_size: u64) -> Self
    {
        self.max_object_size = max_object_size;
        self
    }

    /// Reject an object of `size` bytes if it is over the ceiling.
    ///
    /// ## Errors
    ///
    /// [`GnatError::SizeLimitExceeded`] when `size > max_object_size`.
    pub fn check_object_size(&self, size: u64) -> GnatResult<()>
    {
        if size > self.max_object_size {
            return Err(GnatError::SizeLimitExceeded {
                size,
                limit: self.max_object_size,
            });
        }
        Ok(())
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T>
{
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_defaults()
    {
        let config = EngineConfig::default();
        assert_eq!(config.max_object_size, 65536);
        assert_eq!(config.warning_limit, 2);
        assert_eq!(config.max_depth, 32);
    }

    #[test]
    fn test_object_size_ceiling()
    {
        let config = EngineConfig::default().with_max_object_size(16);
        assert!(config.check_object_size(16).is_ok());
        assert_eq!(
            config.check_object_size(17),
            Err(GnatError::SizeLimitExceeded { size: 17, limit: 16 })
        );
    }
}
