//! Catalog response cache using moka
//!
//! Catalog reads are cached per query with a time-to-live. Any write that can
//! change what the catalog shows clears the whole cache. A generation counter
//! keeps loads that straddle an invalidation from storing their result.

use lms_common::catalog::{CatalogPage, CatalogQuery};
use lms_common::courses::CourseOutline;
use moka::future::Cache;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CatalogCache {
    pages: Cache<CatalogQuery, Arc<CatalogPage>>,
    details: Cache<String, Arc<CourseOutline>>,
    generation: Arc<AtomicU64>,
}

impl CatalogCache {
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            pages: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            details: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cached catalog page, computing and storing it on a miss
    ///
    /// Errors are returned as-is and never cached.
    pub async fn page_or_load<E, F, Fut>(&self, query: CatalogQuery, load: F) -> Result<Arc<CatalogPage>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CatalogPage, E>>,
    {
        self.get_or_load(&self.pages, query, load).await
    }

    pub async fn detail_or_load<E, F, Fut>(&self, course_id: &str, load: F) -> Result<Arc<CourseOutline>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CourseOutline, E>>,
    {
        self.get_or_load(&self.details, course_id.to_string(), load).await
    }

    async fn get_or_load<K, V, E, F, Fut>(
        &self,
        cache: &Cache<K, Arc<V>>,
        key: K,
        load: F,
    ) -> Result<Arc<V>, E>
    where
        K: Hash + Eq + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(cached) = cache.get(&key).await {
            return Ok(cached);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let value = Arc::new(load().await?);
        if self.generation.load(Ordering::Acquire) != generation {
            return Ok(value);
        }
        cache.insert(key.clone(), value.clone()).await;
        // An invalidation may land between the check and the insert
        if self.generation.load(Ordering::Acquire) != generation {
            cache.invalidate(&key).await;
        }
        Ok(value)
    }

    /// Drop every cached entry
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.pages.invalidate_all();
        self.details.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_page() -> CatalogPage {
        CatalogPage {
            entries: Vec::new(),
            next_cursor: None,
        }
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = CatalogCache::with_ttl(10, Duration::from_secs(60));
        let query = CatalogQuery::default();

        let first: Result<_, ()> = cache.page_or_load(query.clone(), || async { Ok(empty_page()) }).await;
        assert!(first.is_ok());

        // A failing loader proves the hit never reached it
        let second = cache
            .page_or_load(query, || async { Err::<CatalogPage, ()>(()) })
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache = CatalogCache::with_ttl(10, Duration::from_secs(60));
        let query = CatalogQuery::default();

        let failed: Result<_, &str> = cache.page_or_load(query.clone(), || async { Err("boom") }).await;
        assert!(failed.is_err());

        let retried: Result<_, &str> = cache.page_or_load(query, || async { Ok(empty_page()) }).await;
        assert!(retried.is_ok());
    }

    #[tokio::test]
    async fn test_invalidate_forces_reload() {
        let cache = CatalogCache::with_ttl(10, Duration::from_secs(60));
        let query = CatalogQuery::default();
        let _: Result<_, ()> = cache.page_or_load(query.clone(), || async { Ok(empty_page()) }).await;

        cache.invalidate();

        let reloaded = cache
            .page_or_load(query, || async { Err::<CatalogPage, ()>(()) })
            .await;
        assert!(reloaded.is_err());
    }

    #[tokio::test]
    async fn test_load_overlapping_invalidate_is_not_stored() {
        let cache = CatalogCache::with_ttl(10, Duration::from_secs(60));
        let query = CatalogQuery::default();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let loading = {
            let cache = cache.clone();
            let query = query.clone();
            tokio::spawn(async move {
                cache
                    .page_or_load(query, || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<_, ()>(CatalogPage {
                            entries: Vec::new(),
                            next_cursor: Some("before-write".to_string()),
                        })
                    })
                    .await
            })
        };

        // Write lands while the read is still loading
        started_rx.await.unwrap();
        cache.invalidate();
        release_tx.send(()).unwrap();

        let page = loading.await.unwrap().unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("before-write"));

        let next = cache
            .page_or_load(query, || async { Err::<CatalogPage, ()>(()) })
            .await;
        assert!(next.is_err());
    }
}
