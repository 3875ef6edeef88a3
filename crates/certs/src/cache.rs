use std::num::NonZeroUsize;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::authority::CertificateAuthority;
use crate::error::CertError;
use crate::leaf::{mint_leaf, CertifiedLeaf};

/// No eviction is specified by the data model beyond "cached for the
/// process lifetime", but an unbounded process that sees many unique
/// hostnames can grow without limit — this is the generous ceiling called
/// for under "leaf-cert cache eviction" in the design notes.
const DEFAULT_CAPACITY: usize = 4096;

/// Per-host leaf certificate manager: mints on first use, then serves the
/// cached `CertifiedKey` for the rest of the process lifetime (or until
/// evicted under capacity pressure).
pub struct CertificateManager {
    ca: CertificateAuthority,
    leaves: DashMap<String, Arc<CertifiedLeaf>>,
    recency: Mutex<LruCache<String, ()>>,
}

impl CertificateManager {
    pub fn new(ca: CertificateAuthority) -> Self {
        Self::with_capacity(ca, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ca: CertificateAuthority, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            ca,
            leaves: DashMap::new(),
            recency: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn ca_cert_pem(&self) -> &str {
        self.ca.cert_pem()
    }

    /// Returns the cached leaf for `host`, minting it under a per-key guard
    /// if this is the first request for that host so concurrent CONNECTs to
    /// the same host never race into generating two keypairs.
    pub fn get_or_mint(&self, host: &str) -> Result<Arc<CertifiedLeaf>, CertError> {
        let leaf = match self.leaves.entry(host.to_string()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                debug!(host, "minting leaf certificate");
                let minted = Arc::new(mint_leaf(&self.ca, host)?);
                slot.insert(minted.clone());
                minted
            }
        };
        self.touch_and_evict(host);
        Ok(leaf)
    }

    fn touch_and_evict(&self, host: &str) {
        let mut recency = self.recency.lock();
        if let Some(evicted) = recency.push(host.to_string(), ()) {
            if evicted.0 != host {
                self.leaves.remove(&evicted.0);
                warn!(host = %evicted.0, "leaf certificate cache evicted host under capacity pressure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(capacity: usize) -> CertificateManager {
        let dir = tempfile::tempdir().unwrap();
        let ca = CertificateAuthority::load_or_generate(dir.path()).unwrap();
        CertificateManager::with_capacity(ca, capacity)
    }

    #[test]
    fn reuses_cached_leaf_for_same_host() {
        let mgr = manager(10);
        let first = mgr.get_or_mint("api.openai.com").unwrap();
        let second = mgr.get_or_mint("api.openai.com").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn evicts_least_recently_used_host_over_capacity() {
        let mgr = manager(2);
        mgr.get_or_mint("a.example.com").unwrap();
        mgr.get_or_mint("b.example.com").unwrap();
        mgr.get_or_mint("c.example.com").unwrap();
        assert!(!mgr.leaves.contains_key("a.example.com"));
        assert!(mgr.leaves.contains_key("c.example.com"));
    }
}
