use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One admitted, durably persisted audit record. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Store-assigned, strictly increasing per tenant, starting at 1.
    pub sequence_id: i64,
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub service_name: Option<String>,
    pub event_type: Option<String>,
    pub event_payload: Value,
    /// `None` only for a tenant's genesis record.
    pub previous_digest: Option<String>,
    pub current_digest: String,
    pub inserted_at: DateTime<Utc>,
}

/// Input to `AuditStore::append`; the store assigns `sequence_id` and
/// `inserted_at`.
#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub tenant_id: String,
    pub user_id: Option<String>,
    pub service_name: Option<String>,
    pub event_type: Option<String>,
    /// Canonical serialization of the payload, the exact bytes hashed
    /// into `current_digest`.
    pub canonical_payload: String,
    pub previous_digest: Option<String>,
    pub current_digest: String,
}
