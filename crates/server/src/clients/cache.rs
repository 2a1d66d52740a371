//! TTL cache in front of a [`ClientRepository`].

use async_trait::async_trait;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::clients::model::ClientModel;
use crate::clients::repository::ClientRepository;
use crate::error::ClientStoreResult;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn live(&self, now: Instant) -> bool {
        now <= self.expires_at
    }
}

/// Concurrent map whose entries expire after a fixed TTL.
///
/// Expired entries are never returned; they are swept lazily, at most once a
/// minute, by whichever call gets the sweep lock first.
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, Entry<V>>,
    ttl: Duration,
    last_sweep: Mutex<Instant>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    fn maybe_sweep(&self) {
        let now = Instant::now();
        if let Ok(mut last) = self.last_sweep.try_lock()
            && now.duration_since(*last) >= Self::SWEEP_INTERVAL
        {
            *last = now;
            drop(last);
            self.entries.retain(|_, entry| entry.live(now));
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.maybe_sweep();
        let now = Instant::now();
        self.entries
            .get(key)
            .filter(|entry| entry.live(now))
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        self.maybe_sweep();
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(key, Entry { value, expires_at });
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serves `get_by_client_id` from a TTL cache. Only hits are cached; every
/// write goes to the inner repository and evicts the affected client id.
pub struct CachingClientRepository {
    inner: Arc<dyn ClientRepository>,
    cache: TtlCache<String, ClientModel>,
}

impl CachingClientRepository {
    pub fn new(inner: Arc<dyn ClientRepository>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    fn evict(&self, model: Option<&ClientModel>) {
        if let Some(model) = model {
            self.cache.invalidate(&model.client_id);
        }
    }
}

#[async_trait]
impl ClientRepository for CachingClientRepository {
    async fn get_all(&self) -> ClientStoreResult<Vec<ClientModel>> {
        self.inner.get_all().await
    }

    async fn get_by_client_id(&self, client_id: &str) -> ClientStoreResult<Option<ClientModel>> {
        let key = client_id.to_string();
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!(client_id, "Client cache hit");
            return Ok(Some(hit));
        }
        let found = self.inner.get_by_client_id(client_id).await?;
        if let Some(model) = &found {
            self.cache.insert(key, model.clone());
        }
        Ok(found)
    }

    async fn get_by_id(&self, id: i32) -> ClientStoreResult<Option<ClientModel>> {
        self.inner.get_by_id(id).await
    }

    async fn create(&self, model: Option<&ClientModel>) -> ClientStoreResult<u64> {
        let rows = self.inner.create(model).await?;
        self.evict(model);
        Ok(rows)
    }

    async fn update(&self, model: Option<&ClientModel>) -> ClientStoreResult<u64> {
        let rows = self.inner.update(model).await?;
        self.evict(model);
        Ok(rows)
    }

    async fn delete(&self, model: Option<&ClientModel>) -> ClientStoreResult<u64> {
        let rows = self.inner.delete(model).await?;
        self.evict(model);
        Ok(rows)
    }

    async fn delete_by_id(&self, id: i32) -> ClientStoreResult<u64> {
        self.inner.delete_by_id(id).await
    }
}
