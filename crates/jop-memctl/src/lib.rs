//! Memory controller and the object/array/method caches that sit in front
//! of it (section 4.7).

pub mod cache;
pub mod controller;

pub use cache::TaggedCache;
pub use controller::{MemoryController, McResult, EXC_ARRAY_BOUNDS, EXC_NULL_POINTER};

/// The three caches share the [`TaggedCache`] implementation; these newtypes
/// exist only to keep their call sites self-documenting.
pub struct ObjectCache(pub TaggedCache);
pub struct ArrayCache(pub TaggedCache);
pub struct MethodCache(pub TaggedCache);

impl ObjectCache {
    #[must_use]
    pub fn new(num_lines: usize) -> Self {
        Self(TaggedCache::new(num_lines))
    }
}

impl ArrayCache {
    #[must_use]
    pub fn new(num_lines: usize) -> Self {
        Self(TaggedCache::new(num_lines))
    }
}

impl MethodCache {
    #[must_use]
    pub fn new(num_lines: usize) -> Self {
        Self(TaggedCache::new(num_lines))
    }
}
