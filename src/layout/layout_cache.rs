use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;
use xxhash_rust::xxh3::xxh3_64;

use crate::layout::GridLayout;
use crate::models::{GridRow, ImageDescriptor, ImageKey};

/// Default number of cached layouts kept in memory.
pub const DEFAULT_CACHE_ENTRIES: usize = 32;

/// Layout cache keyed by a hash of the layout-relevant descriptor fields.
///
/// The hash covers every descriptor in input order, so any change to the
/// image list (flags, spans, positions, additions, removals, arrival order)
/// produces a different key.
pub struct LayoutCache {
    cache: Mutex<LruCache<u64, Vec<GridRow>>>,
}

impl LayoutCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Computes a fast hash of the descriptor list.
    pub fn list_hash(images: &[ImageDescriptor]) -> u64 {
        let mut hasher_input = Vec::with_capacity(images.len() * 40);

        for image in images {
            match &image.key {
                ImageKey::Id(id) => {
                    hasher_input.push(0);
                    hasher_input.extend_from_slice(&id.to_le_bytes());
                }
                ImageKey::Name(name) => {
                    hasher_input.push(1);
                    hasher_input.extend_from_slice(&(name.len() as u64).to_le_bytes());
                    hasher_input.extend_from_slice(name.as_bytes());
                }
                ImageKey::Unsaved(idx) => {
                    hasher_input.push(2);
                    hasher_input.extend_from_slice(&(*idx as u64).to_le_bytes());
                }
            }
            hasher_input.extend_from_slice(&image.position.to_le_bytes());
            hasher_input.push(u8::from(image.is_full_width));
            hasher_input.extend_from_slice(&image.row_span.to_le_bytes());
            hasher_input.extend_from_slice(&image.size_percent.to_le_bytes());
            hasher_input.extend_from_slice(&image.rotation.to_le_bytes());
        }

        xxh3_64(&hasher_input)
    }

    /// Returns the cached rows for `list_hash`, refreshing its recency.
    pub fn get(&self, list_hash: u64) -> Option<Vec<GridRow>> {
        self.cache.lock().get(&list_hash).cloned()
    }

    pub fn insert(&self, list_hash: u64, rows: Vec<GridRow>) {
        self.cache.lock().put(list_hash, rows);
    }

    /// Clears the entire cache.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ENTRIES)
    }
}

/// Layout computation with automatic cache management.
pub struct CachedLayoutComputer {
    pub layout: GridLayout,
    pub cache: LayoutCache,
}

impl CachedLayoutComputer {
    pub fn new(capacity: usize) -> Self {
        Self {
            layout: GridLayout::default(),
            cache: LayoutCache::new(capacity),
        }
    }

    pub fn with_layout(layout: GridLayout, capacity: usize) -> Self {
        Self {
            layout,
            cache: LayoutCache::new(capacity),
        }
    }

    /// Computes the layout, reusing a cached result when the descriptor list
    /// is unchanged.
    pub fn compute(&self, images: &[ImageDescriptor]) -> Vec<GridRow> {
        if images.is_empty() {
            return Vec::new();
        }

        let list_hash = LayoutCache::list_hash(images);
        if let Some(rows) = self.cache.get(list_hash) {
            trace!(list_hash, "layout cache hit");
            return rows;
        }

        let rows = self.layout.compute(images);
        self.cache.insert(list_hash, rows.clone());
        rows
    }

    /// Invalidates the cache, forcing recomputation on next call.
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}

impl Default for CachedLayoutComputer {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_ENTRIES)
    }
}
