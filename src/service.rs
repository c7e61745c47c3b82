//! Audit Service
//!
//! Composes the compliance gate, tip cache, hash chain engine, store and
//! metrics into the public operation surface. The write path walks a
//! fixed sequence of stages; the stage a write failed in is carried in
//! the reported error so callers get a definitive, machine-readable
//! reason.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::cache::{TenantChainState, TipCache};
use crate::chain;
use crate::compliance::ComplianceGate;
use crate::config::AppConfig;
use crate::error::LedgerError;
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::store::{AuditRecord, AuditStore, NewAuditRecord};
use crate::verify::{IntegrityReport, IntegrityVerifier};

/// Stages of the composite write operation. Any stage can fail; the
/// failing stage is reported alongside the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Validating,
    ResolvingTip,
    Linking,
    Persisting,
    CacheUpdating,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::ResolvingTip => "resolving_tip",
            Self::Linking => "linking",
            Self::Persisting => "persisting",
            Self::CacheUpdating => "cache_updating",
        };
        write!(f, "{}", name)
    }
}

/// Result of one `log_event` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEventOutcome {
    pub success: bool,
    pub sequence_id: Option<i64>,
    pub current_digest: Option<String>,
    pub insert_latency_ms: f64,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

/// The audit ledger's operation surface. All component state is
/// explicitly injected; tests construct a fresh instance each.
pub struct AuditService {
    gate: ComplianceGate,
    store: AuditStore,
    cache: TipCache,
    metrics: Arc<MetricsCollector>,
    tenant_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    store_timeout: Duration,
}

impl AuditService {
    pub fn new(
        store: AuditStore,
        gate: ComplianceGate,
        cache: TipCache,
        metrics: Arc<MetricsCollector>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            gate,
            store,
            cache,
            metrics,
            tenant_locks: Mutex::new(HashMap::new()),
            store_timeout,
        }
    }

    pub fn from_config(config: &AppConfig, store: AuditStore) -> Self {
        Self::new(
            store,
            ComplianceGate::new(config.compliance_marker.clone()),
            TipCache::new(),
            Arc::new(MetricsCollector::new(config.metrics_capacity)),
            Duration::from_millis(config.store_timeout_ms),
        )
    }

    /// Append one event to its tenant's chain.
    ///
    /// Same-tenant writers are serialized across the resolve → link →
    /// persist → cache span; distinct tenants proceed in parallel.
    pub async fn log_event(
        &self,
        payload: Value,
        tenant_id: &str,
        user_id: Option<String>,
        service_name: Option<String>,
        event_type: Option<String>,
    ) -> LogEventOutcome {
        let started = Instant::now();
        let result = self
            .write_event(&payload, tenant_id, user_id, service_name, event_type)
            .await;
        let insert_latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(record) => {
                self.metrics.record_insert_latency(insert_latency_ms);
                debug!(
                    tenant_id,
                    sequence_id = record.sequence_id,
                    latency_ms = insert_latency_ms,
                    "event logged"
                );
                LogEventOutcome {
                    success: true,
                    sequence_id: Some(record.sequence_id),
                    current_digest: Some(record.current_digest),
                    insert_latency_ms,
                    error: None,
                    error_code: None,
                }
            }
            Err((stage, err)) => LogEventOutcome {
                success: false,
                sequence_id: None,
                current_digest: None,
                insert_latency_ms,
                error: Some(format!("{}: {}", stage, err)),
                error_code: Some(err.code().to_string()),
            },
        }
    }

    async fn write_event(
        &self,
        payload: &Value,
        tenant_id: &str,
        user_id: Option<String>,
        service_name: Option<String>,
        event_type: Option<String>,
    ) -> Result<AuditRecord, (WriteStage, LedgerError)> {
        let mut stage = WriteStage::Validating;
        self.gate
            .validate(payload)
            .map_err(|v| (stage, LedgerError::Compliance(v)))?;

        // Same-tenant writers hold this lock across the whole critical
        // span so each record links to the exact prior tip.
        let lock = self.tenant_lock(tenant_id);
        let _guard = lock.lock().await;

        stage = WriteStage::ResolvingTip;
        let previous_digest = self.resolve_tip(tenant_id).await.map_err(|e| (stage, e))?;

        stage = WriteStage::Linking;
        let canonical_payload = chain::canonicalize(payload);
        let current_digest = chain::link(
            previous_digest.as_deref(),
            canonical_payload.as_bytes(),
            tenant_id,
        );
        debug!(tenant_id, stage = %stage, digest = %current_digest, "record linked");

        stage = WriteStage::Persisting;
        let record = self
            .store_call(self.store.append(NewAuditRecord {
                tenant_id: tenant_id.to_string(),
                user_id,
                service_name,
                event_type,
                canonical_payload,
                previous_digest,
                current_digest,
            }))
            .await
            .map_err(|e| (stage, e))?;

        // No await between the append completing and this update, so a
        // cancelled call cannot leave a stale tip behind the new record.
        stage = WriteStage::CacheUpdating;
        if let Err(err) = self
            .cache
            .set_tip(tenant_id, &record.current_digest, record.sequence_id)
        {
            // Record is already durable; the cache is an optimization
            // and the next writer self-heals from the store tail.
            warn!(tenant_id, stage = %stage, error = %err, "cache update failed after durable append");
        }

        Ok(record)
    }

    /// Resolve the digest the next record must link from.
    ///
    /// Cache hit wins; a miss (or an unavailable cache) falls back to the
    /// store tail. A failed fallback is a hard error: an unknown tip must
    /// never be treated as an empty chain, or a fork slips in silently.
    async fn resolve_tip(&self, tenant_id: &str) -> Result<Option<String>, LedgerError> {
        match self.cache.get_tip(tenant_id) {
            Ok(Some(tip)) => {
                self.metrics.record_cache_hit();
                return Ok(Some(tip));
            }
            Ok(None) => {
                self.metrics.record_cache_miss();
            }
            Err(err) => {
                self.metrics.record_cache_miss();
                warn!(tenant_id, error = %err, "tip cache unavailable, falling back to store");
            }
        }

        let tail = self
            .store_call(self.store.tail(tenant_id))
            .await
            .map_err(|e| LedgerError::GenesisAmbiguity {
                tenant: tenant_id.to_string(),
                detail: e.to_string(),
            })?;

        Ok(tail.map(|record| record.current_digest))
    }

    /// Verify one tenant's chain, or all tenants when `tenant_id` is
    /// `None`. Reads durable storage only; never consults the cache.
    pub async fn verify_integrity(
        &self,
        tenant_id: Option<&str>,
    ) -> Result<IntegrityReport, LedgerError> {
        IntegrityVerifier::new(self.store.clone())
            .verify(tenant_id)
            .await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// One ascending page of a tenant's stored chain.
    pub async fn chain_page(
        &self,
        tenant_id: &str,
        from_sequence: i64,
        page_size: i64,
    ) -> Result<Vec<AuditRecord>, LedgerError> {
        self.store_call(
            self.store
                .chain_page(tenant_id, from_sequence, page_size.clamp(1, 1000)),
        )
        .await
    }

    /// Cached view of a tenant's chain, if the cache has one.
    pub fn cached_chain_state(&self, tenant_id: &str) -> Option<TenantChainState> {
        self.cache.chain_state(tenant_id).ok().flatten()
    }

    pub fn cache_counts(&self) -> (u64, u64) {
        (self.cache.hit_count(), self.cache.miss_count())
    }

    fn tenant_lock(&self, tenant_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .tenant_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        locks
            .entry(tenant_id.to_string())
            .or_default()
            .clone()
    }

    /// Run a store future under the configured timeout bound.
    async fn store_call<T, F>(&self, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(LedgerError::StorageTimeout(
                self.store_timeout.as_millis() as u64
            )),
        }
    }
}
