//! Shared TTL cache built on `moka`.
//!
//! Every cache in the system (embeddings, index queries, search results,
//! answers) is a [`TtlCache`] with its own TTL from [`CacheConfig`]. The
//! get-or-compute path coalesces concurrent misses for the same key into
//! one computation, and a computation that fails populates nothing.

use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use resume_harness_core::error::PipelineError;

#[derive(Clone)]
pub struct TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<String, V>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Return the cached value for `key`, computing and storing it on a
    /// miss. Errors propagate uncached.
    pub async fn get_or_compute<F>(&self, key: String, compute: F) -> Result<V, PipelineError>
    where
        F: Future<Output = Result<V, PipelineError>> + Send,
    {
        self.inner
            .try_get_with(key, compute)
            .await
            .map_err(|e: Arc<PipelineError>| (*e).clone())
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    #[cfg(test)]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_miss_computes_then_hit_reuses() {
        let cache: TtlCache<u32> = TtlCache::new(16, Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_compute("k".to_string(), async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_compute_is_not_cached() {
        let cache: TtlCache<u32> = TtlCache::new(16, Duration::from_secs(60));

        let err = cache
            .get_or_compute("k".to_string(), async {
                Err(PipelineError::Storage("down".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));

        let value = cache
            .get_or_compute("k".to_string(), async { Ok(9) })
            .await
            .unwrap();
        assert_eq!(value, 9);
    }

    #[tokio::test]
    async fn test_invalidate_all_clears() {
        let cache: TtlCache<u32> = TtlCache::new(16, Duration::from_secs(60));
        cache
            .get_or_compute("k".to_string(), async { Ok(1) })
            .await
            .unwrap();
        cache.invalidate_all();

        let value = cache
            .get_or_compute("k".to_string(), async { Ok(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }
}
