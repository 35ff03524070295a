use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::table::RawTable;

/// A table held by the cache together with when it was fetched.
#[derive(Clone, Debug)]
pub struct CachedSheet {
    pub table: Arc<RawTable>,
    pub fetched_at: DateTime<Local>,
    loaded: Instant,
}

/// Memoized sheet tables keyed by sheet identifier
///
/// A lookup reuses the stored table unless it is older than the optional
/// time-to-live; otherwise the loader runs and its result replaces the entry.
/// Failed loads are not stored, so the next request tries again.
#[derive(Debug, Default)]
pub struct SheetCache {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<String, CachedSheet>>,
}

impl SheetCache {
    /// Create a cache; `None` keeps entries until they are invalidated.
    pub fn new(ttl: Option<Duration>) -> Self {
        SheetCache {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return a fresh cached entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<CachedSheet> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| self.is_fresh(entry))
            .cloned()
    }

    /// Return the cached table or load, store and return a new one
    ///
    /// The lock is released while the loader runs. Two concurrent misses on
    /// the same key both load; the last one to finish wins.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> Result<CachedSheet>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RawTable>>,
    {
        if let Some(entry) = self.get(key) {
            log::debug!("Cache hit for sheet `{}`", key);
            return Ok(entry);
        }

        log::info!("Cache miss for sheet `{}`", key);
        let table = load().await?;

        let entry = CachedSheet {
            table: Arc::new(table),
            fetched_at: Local::now(),
            loaded: Instant::now(),
        };

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), entry.clone());
        Ok(entry)
    }

    /// Drop one entry so the next lookup reloads it.
    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    fn is_fresh(&self, entry: &CachedSheet) -> bool {
        match self.ttl {
            Some(ttl) => entry.loaded.elapsed() < ttl,
            None => true,
        }
    }
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table(name: &str) -> RawTable {
        RawTable::from_csv_str(name, "A\n1\n").unwrap()
    }

    #[tokio::test]
    async fn second_lookup_reuses_the_table() {
        let cache = SheetCache::new(None);
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..3 {
            let entry = cache
                .get_or_load("beneficios", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(table("beneficios"))
                })
                .await
                .unwrap();
            assert_eq!(entry.table.name, "beneficios");
        }

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keys_are_cached_independently() {
        let cache = SheetCache::new(None);
        cache.get_or_load("a", || async { Ok(table("a")) }).await.unwrap();
        cache.get_or_load("b", || async { Ok(table("b")) }).await.unwrap();

        assert_eq!(cache.get("a").unwrap().table.name, "a");
        assert_eq!(cache.get("b").unwrap().table.name, "b");
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = SheetCache::new(None);

        let failed = cache
            .get_or_load("x", || async {
                Err(DashboardError::EmptySheet("x".to_string()))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.get("x").is_none());

        let loaded = cache.get_or_load("x", || async { Ok(table("x")) }).await;
        assert!(loaded.is_ok());
    }

    #[tokio::test]
    async fn expired_and_invalidated_entries_reload() {
        let cache = SheetCache::new(Some(Duration::from_millis(0)));
        cache.get_or_load("k", || async { Ok(table("k")) }).await.unwrap();
        assert!(cache.get("k").is_none());

        let cache = SheetCache::new(None);
        cache.get_or_load("k", || async { Ok(table("k")) }).await.unwrap();
        cache.invalidate("k");
        assert!(cache.get("k").is_none());

        cache.get_or_load("k", || async { Ok(table("k")) }).await.unwrap();
        cache.clear();
        assert!(cache.get("k").is_none());
    }
}
