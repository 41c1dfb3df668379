//! TTL-aware IP cache with in-flight probe coalescing, per §4.4.
//!
//! No direct teacher counterpart; the coalescing idiom (a map of
//! in-flight `Notify`s keyed by lookup key) is a standard async pattern,
//! applied here to avoid duplicate concurrent `virsh`/ARP probes for the
//! same VM.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::{Mutex, Notify};

use crate::model::IpCacheEntry;

const DEFAULT_TTL_SECS: i64 = 120;

#[derive(Default)]
struct Inner {
    entries: HashMap<String, IpCacheEntry>,
    in_flight: HashMap<String, Arc<Notify>>,
}

/// Process-wide IP cache. A single instance is shared across the
/// orchestrator and the status/ssh-info CLI paths.
pub struct IpCache {
    inner: Mutex<Inner>,
}

impl Default for IpCache {
    fn default() -> Self {
        Self::new()
    }
}

impl IpCache {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// Returns a fresh cached entry for `vm_name`, or `None` if absent or
    /// stale per `max_age` (defaults to the cache's 120s TTL when `None`).
    pub async fn get(&self, vm_name: &str, max_age: Option<ChronoDuration>) -> Option<IpCacheEntry> {
        let inner = self.inner.lock().await;
        let entry = inner.entries.get(vm_name)?;
        let max_age = max_age.unwrap_or_else(|| ChronoDuration::seconds(DEFAULT_TTL_SECS));
        if entry.is_fresh(Utc::now(), max_age) {
            Some(entry.clone())
        } else {
            None
        }
    }

    pub async fn put(&self, entry: IpCacheEntry) {
        let mut inner = self.inner.lock().await;
        inner.entries.insert(entry.vm_name.clone(), entry);
    }

    pub async fn invalidate(&self, vm_name: &str) {
        let mut inner = self.inner.lock().await;
        inner.entries.remove(vm_name);
    }

    /// Coalesces concurrent probes for the same `vm_name`: the first
    /// caller becomes the "leader" and runs `probe`; subsequent callers
    /// wait on the leader's `Notify` and then re-read the cache.
    pub async fn resolve_coalesced<F, Fut>(
        &self,
        vm_name: &str,
        max_age: Option<ChronoDuration>,
        probe: F,
    ) -> Option<IpCacheEntry>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Option<IpCacheEntry>>,
    {
        if let Some(entry) = self.get(vm_name, max_age).await {
            return Some(entry);
        }

        let (is_leader, notify) = {
            let mut inner = self.inner.lock().await;
            if let Some(notify) = inner.in_flight.get(vm_name) {
                (false, notify.clone())
            } else {
                let notify = Arc::new(Notify::new());
                inner.in_flight.insert(vm_name.to_string(), notify.clone());
                (true, notify)
            }
        };

        if !is_leader {
            notify.notified().await;
            return self.get(vm_name, max_age).await;
        }

        let result = probe().await;
        if let Some(entry) = &result {
            self.put(entry.clone()).await;
        }
        {
            let mut inner = self.inner.lock().await;
            inner.in_flight.remove(vm_name);
        }
        notify.notify_waiters();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_entry(vm: &str) -> IpCacheEntry {
        let now = Utc::now();
        IpCacheEntry {
            vm_name: vm.to_string(),
            ip_addresses: vec!["10.0.0.5".to_string()],
            mac_addresses: vec![],
            interfaces: vec!["eth0".to_string()],
            discovery_method: "test".to_string(),
            cached_at: now,
            expires_at: now + ChronoDuration::seconds(120),
            status: "ok".to_string(),
        }
    }

    #[tokio::test]
    async fn fresh_entries_are_returned_without_reprobing() {
        let cache = IpCache::new();
        cache.put(sample_entry("vm1")).await;
        assert!(cache.get("vm1", None).await.is_some());
    }

    #[tokio::test]
    async fn never_returns_an_entry_past_expiry() {
        let cache = IpCache::new();
        let mut stale = sample_entry("vm1");
        stale.expires_at = Utc::now() - ChronoDuration::seconds(1);
        cache.put(stale).await;
        assert!(cache.get("vm1", None).await.is_none());
    }

    #[tokio::test]
    async fn coalesces_concurrent_resolves_into_one_probe() {
        let cache = Arc::new(IpCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .resolve_coalesced("vm1", None, || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Some(sample_entry("vm1"))
                        }
                    })
                    .await
            }));
        }
        let mut results = vec![];
        for h in handles {
            results.push(h.await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.is_some()));
    }
}
