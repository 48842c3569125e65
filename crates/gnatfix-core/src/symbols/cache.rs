//! # Resolver Context
//!
//! Caches that outlive a single evaluation.
//!
//! Decoding a linkage name and fixing a type that does not depend on any
//! value are both pure functions of the debug information, so their results
//! are kept here and shared by every evaluation. Entries are keyed by the
//! [`ImageId`] they were computed from; when an image is unloaded or
//! reloaded, [`ResolverContext::invalidate_for_image`] drops exactly its
//! entries.
//!
//! ## Usage
//!
//! ```rust
//! use gnatfix_core::symbols::{ImageId, ResolverContext};
//!
//! let mut context = ResolverContext::new();
//! let image = ImageId::from(1);
//! assert_eq!(&*context.decoded_name(image, "pkg__proc"), "pkg.proc");
//! assert_eq!(context.decoded_len(), 1);
//!
//! context.invalidate_for_image(image);
//! assert_eq!(context.decoded_len(), 0);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::demangle;
use super::image::ImageId;
use crate::types::TypeId;

/// Process-wide caches keyed by image identity.
#[derive(Debug, Default)]
pub struct ResolverContext
{
    decoded: HashMap<(ImageId, String), Arc<str>>,
    static_fixed: HashMap<(ImageId, TypeId), TypeId>,
}

impl ResolverContext
{
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Decoded spelling of `raw`, computed once per image.
    pub fn decoded_name(&mut self, image: ImageId, raw: &str) -> Arc<str>
    {
        self.decoded
            .entry((image, raw.to_string()))
            .or_insert_with(|| Arc::from(demangle::decode(raw)))
            .clone()
    }

    /// Memoized static fixing of `ty`, if any.
    pub fn static_fixed(&self, image: ImageId, ty: TypeId) -> Option<TypeId>
    {
        self.static_fixed.get(&(image, ty)).copied()
    }

    pub fn remember_static_fixed(&mut self, image: ImageId, ty: TypeId, fixed: TypeId)
    {
        self.static_fixed.insert((image, ty), fixed);
    }

    /// Drop every entry computed from `image`.
    pub fn invalidate_for_image(&mut self, image: ImageId)
    {
        let before = self.decoded.len() + self.static_fixed.len();
        self.decoded.retain(|(owner, _), _| *owner != image);
        self.static_fixed.retain(|(owner, _), _| *owner != image);
        let dropped = before - self.decoded.len() - self.static_fixed.len();
        debug!(image = image.as_u64(), dropped, "invalidated resolver caches");
    }

    pub fn clear(&mut self)
    {
        self.decoded.clear();
        self.static_fixed.clear();
    }

    pub fn decoded_len(&self) -> usize
    {
        self.decoded.len()
    }

    pub fn static_fixed_len(&self) -> usize
    {
        self.static_fixed.len()
    }
}
