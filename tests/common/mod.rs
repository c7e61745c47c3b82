//! Shared test helpers: fresh service instances over in-memory or
//! file-backed SQLite, plus event payload builders.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use audit_ledger::cache::TipCache;
use audit_ledger::compliance::ComplianceGate;
use audit_ledger::metrics::MetricsCollector;
use audit_ledger::service::AuditService;
use audit_ledger::store::AuditStore;

pub const MARKER: &str = "a1b2c3d4e5f60718";

pub fn build_service(store: AuditStore) -> AuditService {
    AuditService::new(
        store,
        ComplianceGate::new(MARKER.to_string()),
        TipCache::new(),
        Arc::new(MetricsCollector::new(1024)),
        Duration::from_millis(2000),
    )
}

/// Service over a fresh in-memory database.
pub async fn mem_service() -> AuditService {
    let store = AuditStore::new_in_memory().await.expect("in-memory store");
    store.run_migrations().await.expect("migrations");
    build_service(store)
}

/// Service over a file-backed database, for tests that need a second
/// connection to tamper with rows out-of-band. The TempDir must outlive
/// the service.
pub async fn file_service() -> (AuditService, String, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("audit.db").display());
    let store = AuditStore::new(&url).await.expect("file store");
    store.run_migrations().await.expect("migrations");
    (build_service(store), url, dir)
}

/// A payload that passes the compliance gate.
pub fn event(action: &str) -> Value {
    json!({
        "action": action,
        "resource_type": "auth",
        "compliance_marker": MARKER,
    })
}
