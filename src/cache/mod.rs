//! Page cache
//!
//! Read endpoints cache the data each page needs under the page's path.
//! Mutations "revalidate" the paths they affect: the cached entries are
//! dropped and the next request recomputes them.
//!
//! Keys have the form `page:{path}` or `page:{path}#{variant}`, where the
//! variant separates views of one path (for example signed-in versus
//! anonymous visitors).
//!
//! ```rust,ignore
//! let cache = PageCache::new(&config.cache);
//! let page = cache.get_or_load("/news", None, || load_news()).await?;
//! cache.revalidate("/news").await;
//! ```

pub mod memory;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Shared handle to the page cache
pub type SharedPageCache = Arc<PageCache>;

/// Path-keyed cache of page data
#[derive(Debug)]
pub struct PageCache {
    inner: MemoryCache,
}

impl PageCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: MemoryCache::with_capacity_and_ttl(
                config.max_capacity,
                Duration::from_secs(config.ttl_seconds),
            ),
        }
    }

    fn key(path: &str, variant: Option<&str>) -> String {
        match variant {
            Some(variant) => format!("page:{}#{}", path, variant),
            None => format!("page:{}", path),
        }
    }

    /// Return the cached data for `path`, or run `loader` and cache its result.
    ///
    /// Loader errors are returned as-is and nothing is cached.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        path: &str,
        variant: Option<&str>,
        loader: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = Self::key(path, variant);

        match self.inner.get::<T>(&key).await {
            Ok(Some(hit)) => return Ok(hit),
            Ok(None) => {}
            Err(e) => tracing::warn!("Discarding unreadable cache entry {}: {:#}", key, e),
        }

        let value = loader().await?;
        if let Err(e) = self.inner.set(&key, &value).await {
            tracing::warn!("Failed to cache {}: {:#}", key, e);
        }
        Ok(value)
    }

    /// Whether `path` (with `variant`) currently has cached data
    pub async fn is_cached(&self, path: &str, variant: Option<&str>) -> bool {
        self.inner.contains(&Self::key(path, variant)).await
    }

    /// Drop the cached data for `path`, its variants and every path below it.
    ///
    /// `/` only drops the home page, not the whole site.
    pub async fn revalidate(&self, path: &str) {
        let base = Self::key(path, None);
        self.inner.delete(&base).await;
        let mut removed = self.inner.delete_pattern(&format!("{}#*", base)).await;
        if path != "/" {
            let nested = format!("{}/*", base.trim_end_matches('/'));
            removed += self.inner.delete_pattern(&nested).await;
        }
        tracing::debug!("Revalidated {} (+{} related entries)", path, removed);
    }

    /// Revalidate several paths
    pub async fn revalidate_all(&self, paths: &[&str]) {
        for path in paths {
            self.revalidate(path).await;
        }
    }
}

/// Build the shared page cache from configuration
pub fn create_page_cache(config: &CacheConfig) -> SharedPageCache {
    tracing::info!(
        "Page cache enabled (ttl {}s, capacity {})",
        config.ttl_seconds,
        config.max_capacity
    );
    Arc::new(PageCache::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> PageCache {
        PageCache::new(&CacheConfig::default())
    }

    async fn load(cache: &PageCache, path: &str, variant: Option<&str>, value: u32) -> u32 {
        cache
            .get_or_load(path, variant, || async move { Ok::<_, anyhow::Error>(value) })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_or_load_caches_value() {
        let cache = cache();
        assert_eq!(load(&cache, "/news", None, 1).await, 1);
        // Second loader is not consulted
        assert_eq!(load(&cache, "/news", None, 2).await, 1);
    }

    #[tokio::test]
    async fn test_loader_error_not_cached() {
        let cache = cache();
        let result: Result<u32, &str> = cache
            .get_or_load("/events", None, || async { Err("database down") })
            .await;
        assert_eq!(result, Err("database down"));
        assert!(!cache.is_cached("/events", None).await);
    }

    #[tokio::test]
    async fn test_revalidate_drops_variants_and_children() {
        let cache = cache();
        load(&cache, "/news", None, 1).await;
        load(&cache, "/news", Some("member"), 1).await;
        load(&cache, "/news/team-lunch", None, 1).await;
        load(&cache, "/newsletter", None, 1).await;

        cache.revalidate("/news").await;

        assert!(!cache.is_cached("/news", None).await);
        assert!(!cache.is_cached("/news", Some("member")).await);
        assert!(!cache.is_cached("/news/team-lunch", None).await);
        assert!(cache.is_cached("/newsletter", None).await);
        assert_eq!(load(&cache, "/news", None, 7).await, 7);
    }

    #[tokio::test]
    async fn test_revalidate_root_keeps_other_pages() {
        let cache = cache();
        load(&cache, "/", Some("anonymous"), 1).await;
        load(&cache, "/dashboard", None, 1).await;

        cache.revalidate("/").await;

        assert!(!cache.is_cached("/", Some("anonymous")).await);
        assert!(cache.is_cached("/dashboard", None).await);
    }

    #[tokio::test]
    async fn test_revalidate_all() {
        let cache = cache();
        load(&cache, "/admin/events", None, 1).await;
        load(&cache, "/events", None, 1).await;
        load(&cache, "/dashboard", Some("user-1"), 1).await;

        cache
            .revalidate_all(&["/admin/events", "/events", "/dashboard"])
            .await;

        assert!(!cache.is_cached("/admin/events", None).await);
        assert!(!cache.is_cached("/events", None).await);
        assert!(!cache.is_cached("/dashboard", Some("user-1")).await);
    }
}
