//! Compiled program cache.
//!
//! Compiling a template is far more expensive than running it, so the engine
//! keeps every compiled [`Program`] behind an [`Arc`] keyed by the template
//! reference and the lookup path it was resolved under.
//!
//! # Concurrency
//!
//! The map is a [`DashMap`]: readers never block each other, and a miss is
//! filled by replacing the entry with a new `Arc`. Two threads missing on the
//! same key at once may both compile; the last insert wins and both results
//! are equivalent.
//!
//! # Invalidation
//!
//! There is no eviction. In reload mode (`debug = true` in the engine
//! configuration) every lookup recompiles, so edits to template files show up
//! on the next render. Entries can also be dropped with
//! [`ProgramCache::invalidate`] or [`ProgramCache::clear`].

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::TemplateError;
use crate::templating::program::Program;
use crate::templating::source::TemplateRef;

/// Identifies one compiled program.
///
/// The same name resolved under two different lookup paths may be two
/// different files, so the lookup path is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lookup directories, in order
    pub lookup: Vec<PathBuf>,
    pub template: TemplateRef,
}

impl CacheKey {
    pub fn new(lookup: Vec<PathBuf>, template: TemplateRef) -> Self {
        Self {
            lookup,
            template,
        }
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

impl CacheStats {
    /// Hit rate as a percentage
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Shared map from [`CacheKey`] to compiled programs.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: DashMap<CacheKey, Arc<Program>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ProgramCache {
    /// Create a new empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached program for `key`, compiling it on a miss.
    ///
    /// With `reload` set the cached entry is ignored and replaced. A failed
    /// compile leaves any existing entry in place.
    pub fn get_or_compile<F>(
        &self,
        key: &CacheKey,
        reload: bool,
        compile: F,
    ) -> Result<Arc<Program>, TemplateError>
    where
        F: FnOnce() -> Result<Program, TemplateError>,
    {
        if !reload && let Some(program) = self.programs.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Program cache hit for '{}'", key.template);
            return Ok(Arc::clone(&program));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Program cache miss for '{}' (reload={})", key.template, reload);
        let program = Arc::new(compile()?);
        self.programs.insert(key.clone(), Arc::clone(&program));
        Ok(program)
    }

    /// Cached program for `key` without compiling.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Program>> {
        self.programs.get(key).map(|program| Arc::clone(&program))
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.programs.remove(key).is_some()
    }

    /// Drop every entry and reset statistics.
    pub fn clear(&self) {
        self.programs.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Calculate hit rate as a percentage
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        self.stats().hit_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::cell::Cell;

    fn program(name: &str) -> Program {
        Program::new(name.to_string(), Vec::new())
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::new(vec![PathBuf::from("./views")], TemplateRef::name(name))
    }

    #[test]
    fn test_get_or_compile_caches() -> Result<()> {
        let cache = ProgramCache::new();
        let compiles = Cell::new(0);
        let compile = || {
            compiles.set(compiles.get() + 1);
            Ok(program("page"))
        };

        let first = cache.get_or_compile(&key("page"), false, compile)?;
        let second = cache.get_or_compile(&key("page"), false, compile)?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compiles.get(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1
            }
        );
        assert!((cache.hit_rate() - 50.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_reload_replaces_entry() -> Result<()> {
        let cache = ProgramCache::new();
        let first = cache.get_or_compile(&key("page"), true, || Ok(program("v1")))?;
        let second = cache.get_or_compile(&key("page"), true, || Ok(program("v2")))?;
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.get(&key("page")).map(|p| p.name().to_string()), Some("v2".to_string()));
        assert_eq!(cache.stats().misses, 2);
        Ok(())
    }

    #[test]
    fn test_lookup_is_part_of_key() -> Result<()> {
        let cache = ProgramCache::new();
        let other = CacheKey::new(vec![PathBuf::from("./other")], TemplateRef::name("page"));
        cache.get_or_compile(&key("page"), false, || Ok(program("a")))?;
        cache.get_or_compile(&other, false, || Ok(program("b")))?;
        assert_eq!(cache.len(), 2);
        Ok(())
    }

    #[test]
    fn test_failed_compile_keeps_previous_entry() -> Result<()> {
        let cache = ProgramCache::new();
        cache.get_or_compile(&key("page"), false, || Ok(program("good")))?;
        let result = cache.get_or_compile(&key("page"), true, || Err(TemplateError::SourceMissing));
        assert!(result.is_err());
        assert_eq!(cache.get(&key("page")).map(|p| p.name().to_string()), Some("good".to_string()));
        Ok(())
    }

    #[test]
    fn test_invalidate_and_clear() -> Result<()> {
        let cache = ProgramCache::new();
        cache.get_or_compile(&key("a"), false, || Ok(program("a")))?;
        cache.get_or_compile(&key("b"), false, || Ok(program("b")))?;
        assert!(cache.invalidate(&key("a")));
        assert!(!cache.invalidate(&key("a")));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
        assert_eq!(cache.hit_rate(), 0.0);
        Ok(())
    }
}
