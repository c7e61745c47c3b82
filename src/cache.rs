//! Tip Cache
//!
//! Per-tenant cache of the latest chain digest. The cache is a
//! performance hint, never ground truth: a hit lets a writer skip the
//! store tail lookup, a miss obligates the caller to consult the store
//! before linking. Verification never reads it.
//!
//! The API is synchronous on purpose: `set_tip` runs with no await point
//! between the durable append and the cache update, so a cancelled write
//! can never strand a stale tip behind a newer durable record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::LedgerError;

/// Cached view of one tenant's chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantChainState {
    pub tenant_id: String,
    pub tip_digest: String,
    pub record_count: i64,
}

/// In-process cache of chain tips, keyed by tenant.
#[derive(Clone, Default)]
pub struct TipCache {
    tips: Arc<Mutex<HashMap<String, TenantChainState>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl TipCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn tips(&self) -> Result<MutexGuard<'_, HashMap<String, TenantChainState>>, LedgerError> {
        self.tips
            .lock()
            .map_err(|_| LedgerError::Cache("tip cache mutex poisoned".to_string()))
    }

    /// Look up the cached tip digest for a tenant.
    ///
    /// `Ok(None)` means "unknown", not "empty chain": the caller must
    /// fall back to the store tail before treating the chain as genesis.
    pub fn get_tip(&self, tenant_id: &str) -> Result<Option<String>, LedgerError> {
        let tips = self.tips()?;
        match tips.get(tenant_id) {
            Some(state) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(state.tip_digest.clone()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Record a new tip. Called only after a durable append succeeded.
    pub fn set_tip(
        &self,
        tenant_id: &str,
        digest: &str,
        record_count: i64,
    ) -> Result<(), LedgerError> {
        let mut tips = self.tips()?;
        tips.insert(
            tenant_id.to_string(),
            TenantChainState {
                tenant_id: tenant_id.to_string(),
                tip_digest: digest.to_string(),
                record_count,
            },
        );
        debug!(tenant_id, record_count, "cache tip updated");
        Ok(())
    }

    /// Drop a tenant's cached state. The next writer self-heals from the
    /// store tail.
    pub fn invalidate(&self, tenant_id: &str) -> Result<(), LedgerError> {
        self.tips()?.remove(tenant_id);
        Ok(())
    }

    pub fn chain_state(&self, tenant_id: &str) -> Result<Option<TenantChainState>, LedgerError> {
        Ok(self.tips()?.get(tenant_id).cloned())
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_then_hit() {
        let cache = TipCache::new();
        assert_eq!(cache.get_tip("t1").unwrap(), None);
        assert_eq!(cache.miss_count(), 1);

        cache.set_tip("t1", "abc", 1).unwrap();
        assert_eq!(cache.get_tip("t1").unwrap(), Some("abc".to_string()));
        assert_eq!(cache.hit_count(), 1);
    }

    #[test]
    fn test_tenants_are_independent() {
        let cache = TipCache::new();
        cache.set_tip("t1", "aaa", 3).unwrap();
        cache.set_tip("t2", "bbb", 7).unwrap();

        assert_eq!(cache.get_tip("t1").unwrap(), Some("aaa".to_string()));
        assert_eq!(cache.get_tip("t2").unwrap(), Some("bbb".to_string()));

        let state = cache.chain_state("t2").unwrap().unwrap();
        assert_eq!(state.record_count, 7);
    }

    #[test]
    fn test_invalidate_forces_fallback() {
        let cache = TipCache::new();
        cache.set_tip("t1", "aaa", 1).unwrap();
        cache.invalidate("t1").unwrap();
        assert_eq!(cache.get_tip("t1").unwrap(), None);
    }
}
