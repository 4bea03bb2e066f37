//! Primary key cache for stable pagination.
//!
//! # Responsibility
//! - Hold the ordered key rows of the last paged query.
//! - Rebuild only when the sort field, direction or restriction changes.
//! - Slice cached keys into 1-based pages.
//!
//! # Invariants
//! - A cache answers only for the exact (sort field ignoring case,
//!   direction, restriction) it was built under.
//! - Clearing is unconditional and idempotent.

use crate::model::restriction::RecordRestriction;
use crate::model::value::Value;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Ordered key rows plus the query identity that produced them.
///
/// Serializable so a session can persist it between requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyCache {
    sort_field: String,
    ascending: bool,
    restriction: Option<RecordRestriction>,
    keys: Vec<Vec<Value>>,
}

impl KeyCache {
    pub fn new(
        sort_field: impl Into<String>,
        ascending: bool,
        restriction: Option<RecordRestriction>,
        keys: Vec<Vec<Value>>,
    ) -> Self {
        Self {
            sort_field: sort_field.into(),
            ascending,
            restriction,
            keys,
        }
    }

    pub fn matches(
        &self,
        sort_field: &str,
        ascending: bool,
        restriction: Option<&RecordRestriction>,
    ) -> bool {
        self.sort_field.eq_ignore_ascii_case(sort_field)
            && self.ascending == ascending
            && self.restriction.as_ref() == restriction
    }

    pub fn sort_field(&self) -> &str {
        &self.sort_field
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    pub fn restriction(&self) -> Option<&RecordRestriction> {
        self.restriction.as_ref()
    }

    pub fn keys(&self) -> &[Vec<Value>] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Key cache state machine: stale until built, fresh while the query
/// identity is unchanged.
#[derive(Debug, Clone, Default)]
pub struct KeyCachePager {
    cache: Option<KeyCache>,
    rebuilds: usize,
}

impl KeyCachePager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a paging request with this identity must rebuild the cache.
    pub fn is_stale(
        &self,
        sort_field: &str,
        ascending: bool,
        restriction: Option<&RecordRestriction>,
    ) -> bool {
        !self
            .cache
            .as_ref()
            .is_some_and(|cache| cache.matches(sort_field, ascending, restriction))
    }

    /// Returns the key rows of one page, rebuilding through `build` first
    /// when the cache is stale.
    ///
    /// A failed rebuild leaves the previous state untouched.
    pub fn page_keys<E>(
        &mut self,
        sort_field: &str,
        ascending: bool,
        restriction: Option<&RecordRestriction>,
        page: usize,
        page_size: usize,
        build: impl FnOnce() -> Result<Vec<Vec<Value>>, E>,
    ) -> Result<Vec<Vec<Value>>, E> {
        if self.is_stale(sort_field, ascending, restriction) {
            let keys = build()?;
            self.cache = Some(KeyCache::new(sort_field, ascending, restriction.cloned(), keys));
            self.rebuilds += 1;
        }

        let Some(cache) = self.cache.as_ref() else {
            return Ok(Vec::new());
        };
        let bounds = page_bounds(page, page_size, cache.len());
        Ok(cache.keys[bounds].to_vec())
    }

    pub fn clear(&mut self) {
        self.cache = None;
    }

    pub fn cache(&self) -> Option<&KeyCache> {
        self.cache.as_ref()
    }

    pub fn set_cache(&mut self, cache: Option<KeyCache>) {
        self.cache = cache;
    }

    /// Number of cached key rows; zero when stale.
    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, KeyCache::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many times the cache has been built by this pager.
    pub fn rebuild_count(&self) -> usize {
        self.rebuilds
    }
}

/// Index range of 1-based `page` over `total` items.
///
/// `page` and `page_size` must be at least 1; pages past the end are empty.
pub fn page_bounds(page: usize, page_size: usize, total: usize) -> Range<usize> {
    let start = page
        .saturating_sub(1)
        .saturating_mul(page_size)
        .min(total);
    let end = start.saturating_add(page_size).min(total);
    start..end
}
