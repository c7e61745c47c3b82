//! Integrity Verification
//!
//! Replays tenant chains from durable storage and recomputes every
//! digest from the genesis sentinel. The cache is never consulted:
//! verification trusts only what the store returns, in ascending
//! sequence order, one page at a time.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chain;
use crate::error::LedgerError;
use crate::store::AuditStore;

/// What a verification run covered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "tenant_id", rename_all = "snake_case")]
pub enum VerifyScope {
    All,
    Tenant(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Recomputed digest does not match the stored `current_digest`.
    DigestMismatch,
    /// Sequence ids are not gap-free strictly increasing.
    SequenceGap,
}

/// A structured finding. Tampering is an expected outcome of
/// verification, not a verifier fault, so findings are report data
/// rather than errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainViolation {
    pub tenant_id: String,
    pub sequence_id: i64,
    pub kind: ViolationKind,
    /// Recomputed digest, or the expected sequence id for gap findings.
    pub expected: String,
    /// Stored digest, or the encountered sequence id for gap findings.
    pub actual: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub scope: VerifyScope,
    pub total_records_checked: u64,
    pub violations: Vec<ChainViolation>,
    pub verified: bool,
}

impl IntegrityReport {
    pub fn summary(&self) -> String {
        if self.verified {
            format!(
                "chain verified: {} records checked, no violations",
                self.total_records_checked
            )
        } else {
            format!(
                "chain INVALID: {} violations across {} records",
                self.violations.len(),
                self.total_records_checked
            )
        }
    }
}

/// Streams chains out of the store and recomputes their digests.
pub struct IntegrityVerifier {
    store: AuditStore,
    page_size: i64,
}

impl IntegrityVerifier {
    pub fn new(store: AuditStore) -> Self {
        Self {
            store,
            page_size: 256,
        }
    }

    pub fn with_page_size(store: AuditStore, page_size: i64) -> Self {
        Self {
            store,
            page_size: page_size.max(1),
        }
    }

    /// Verify one tenant's chain, or every tenant when `tenant_id` is
    /// `None`.
    pub async fn verify(&self, tenant_id: Option<&str>) -> Result<IntegrityReport, LedgerError> {
        let (scope, tenants) = match tenant_id {
            Some(tenant) => (
                VerifyScope::Tenant(tenant.to_string()),
                vec![tenant.to_string()],
            ),
            None => (VerifyScope::All, self.store.tenants().await?),
        };

        let mut total_records_checked = 0u64;
        let mut violations = Vec::new();

        for tenant in &tenants {
            total_records_checked += self.verify_tenant(tenant, &mut violations).await?;
        }

        let verified = violations.is_empty();
        if verified {
            info!(
                records = total_records_checked,
                "integrity verification passed"
            );
        } else {
            warn!(
                records = total_records_checked,
                violations = violations.len(),
                "integrity verification found violations"
            );
        }

        Ok(IntegrityReport {
            scope,
            total_records_checked,
            violations,
            verified,
        })
    }

    /// Walk one tenant's chain in pages, returning the number of records
    /// checked and pushing any violations found.
    async fn verify_tenant(
        &self,
        tenant_id: &str,
        violations: &mut Vec<ChainViolation>,
    ) -> Result<u64, LedgerError> {
        let mut checked = 0u64;
        // Running value: the digest each record is expected to chain
        // from. Starts at the genesis sentinel via `link(None, ..)`.
        let mut running_digest: Option<String> = None;
        let mut expected_sequence = 1i64;
        let mut next_page_start = 1i64;

        loop {
            let page = self
                .store
                .chain_page(tenant_id, next_page_start, self.page_size)
                .await?;
            if page.is_empty() {
                break;
            }

            for record in &page {
                checked += 1;

                if record.sequence_id != expected_sequence {
                    violations.push(ChainViolation {
                        tenant_id: tenant_id.to_string(),
                        sequence_id: record.sequence_id,
                        kind: ViolationKind::SequenceGap,
                        expected: expected_sequence.to_string(),
                        actual: record.sequence_id.to_string(),
                    });
                    // Resume gap tracking from what the store returned.
                    expected_sequence = record.sequence_id;
                }

                let canonical = chain::canonicalize(&record.event_payload);
                let recomputed = chain::link(
                    running_digest.as_deref(),
                    canonical.as_bytes(),
                    tenant_id,
                );

                if recomputed != record.current_digest {
                    violations.push(ChainViolation {
                        tenant_id: tenant_id.to_string(),
                        sequence_id: record.sequence_id,
                        kind: ViolationKind::DigestMismatch,
                        expected: recomputed,
                        actual: record.current_digest.clone(),
                    });
                }

                // Continue from the stored digest, not the recomputed
                // one: a single corrupted entry stays localized instead
                // of cascading mismatches through the rest of the chain.
                running_digest = Some(record.current_digest.clone());
                expected_sequence += 1;
            }

            next_page_start = page.last().map(|r| r.sequence_id + 1).unwrap_or(i64::MAX);
        }

        Ok(checked)
    }
}
