//! Audit Store
//!
//! Durable append-only persistence for audit records, keyed by
//! `(tenant_id, sequence_id)`. Sequence assignment happens inside the
//! append transaction, and the primary key backstops the per-tenant
//! write serialization: a raced duplicate sequence fails the insert
//! instead of forking the chain.

pub mod models;
pub mod schema;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::debug;

pub use models::{AuditRecord, NewAuditRecord};

#[derive(Clone)]
pub struct AuditStore {
    pool: SqlitePool,
}

impl AuditStore {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Ok(AuditStore { pool })
    }

    /// In-memory store for tests. A single connection keeps every query
    /// on the same in-memory database.
    pub async fn new_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(AuditStore { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::raw_sql(schema::AUDIT_RECORDS_SCHEMA)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append a record, assigning the next sequence id for its tenant.
    ///
    /// Atomic: on any failure the transaction rolls back and no partial
    /// record is left behind, so a caller-driven retry is always safe.
    pub async fn append(&self, record: NewAuditRecord) -> Result<AuditRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let sequence_id: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(sequence_id), 0) + 1
            FROM audit_records
            WHERE tenant_id = ?
            "#,
        )
        .bind(&record.tenant_id)
        .fetch_one(&mut *tx)
        .await?;

        let inserted_at = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO audit_records
                (tenant_id, sequence_id, user_id, service_name, event_type,
                 event_payload, previous_digest, current_digest, inserted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.tenant_id)
        .bind(sequence_id)
        .bind(&record.user_id)
        .bind(&record.service_name)
        .bind(&record.event_type)
        .bind(&record.canonical_payload)
        .bind(&record.previous_digest)
        .bind(&record.current_digest)
        .bind(inserted_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            tenant_id = %record.tenant_id,
            sequence_id,
            "audit record appended"
        );

        Ok(AuditRecord {
            sequence_id,
            tenant_id: record.tenant_id,
            user_id: record.user_id,
            service_name: record.service_name,
            event_type: record.event_type,
            event_payload: serde_json::from_str(&record.canonical_payload)
                .unwrap_or(serde_json::Value::Null),
            previous_digest: record.previous_digest,
            current_digest: record.current_digest,
            inserted_at,
        })
    }

    /// Latest record for a tenant, or `None` for an empty chain.
    pub async fn tail(&self, tenant_id: &str) -> Result<Option<AuditRecord>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT tenant_id, sequence_id, user_id, service_name, event_type,
                   event_payload, previous_digest, current_digest, inserted_at
            FROM audit_records
            WHERE tenant_id = ?
            ORDER BY sequence_id DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_record).transpose()
    }

    /// One ascending page of a tenant's chain, restartable at any
    /// sequence id. Callers page through arbitrarily long chains without
    /// loading full history.
    pub async fn chain_page(
        &self,
        tenant_id: &str,
        from_sequence: i64,
        page_size: i64,
    ) -> Result<Vec<AuditRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, sequence_id, user_id, service_name, event_type,
                   event_payload, previous_digest, current_digest, inserted_at
            FROM audit_records
            WHERE tenant_id = ? AND sequence_id >= ?
            ORDER BY sequence_id ASC
            LIMIT ?
            "#,
        )
        .bind(tenant_id)
        .bind(from_sequence)
        .bind(page_size)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_record).collect()
    }

    /// All tenants with at least one record.
    pub async fn tenants(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows =
            sqlx::query("SELECT DISTINCT tenant_id FROM audit_records ORDER BY tenant_id")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(|row| row.try_get("tenant_id")).collect()
    }

    pub async fn count(&self, tenant_id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM audit_records WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
    }

    /// Raw pool handle for tests that tamper with stored rows out-of-band.
    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn map_record(row: SqliteRow) -> Result<AuditRecord, sqlx::Error> {
    let payload_text: String = row.try_get("event_payload")?;
    let event_payload = serde_json::from_str(&payload_text).map_err(|e| {
        sqlx::Error::ColumnDecode {
            index: "event_payload".to_string(),
            source: Box::new(e),
        }
    })?;

    Ok(AuditRecord {
        sequence_id: row.try_get("sequence_id")?,
        tenant_id: row.try_get("tenant_id")?,
        user_id: row.try_get("user_id")?,
        service_name: row.try_get("service_name")?,
        event_type: row.try_get("event_type")?,
        event_payload,
        previous_digest: row.try_get("previous_digest")?,
        current_digest: row.try_get("current_digest")?,
        inserted_at: row.try_get("inserted_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> AuditStore {
        let store = AuditStore::new_in_memory().await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    fn new_record(tenant: &str, digest: &str, previous: Option<&str>) -> NewAuditRecord {
        NewAuditRecord {
            tenant_id: tenant.to_string(),
            user_id: Some("user-1".to_string()),
            service_name: None,
            event_type: Some("test".to_string()),
            canonical_payload: r#"{"action":"login"}"#.to_string(),
            previous_digest: previous.map(str::to_string),
            current_digest: digest.to_string(),
        }
    }

    #[tokio::test]
    async fn test_append_assigns_monotonic_sequences() {
        let store = store().await;

        let first = store.append(new_record("t1", "d1", None)).await.unwrap();
        let second = store
            .append(new_record("t1", "d2", Some("d1")))
            .await
            .unwrap();

        assert_eq!(first.sequence_id, 1);
        assert_eq!(second.sequence_id, 2);
        assert_eq!(store.count("t1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sequences_are_per_tenant() {
        let store = store().await;
        store.append(new_record("t1", "d1", None)).await.unwrap();
        store.append(new_record("t1", "d2", Some("d1"))).await.unwrap();

        let other = store.append(new_record("t2", "e1", None)).await.unwrap();
        assert_eq!(other.sequence_id, 1);

        let tenants = store.tenants().await.unwrap();
        assert_eq!(tenants, vec!["t1".to_string(), "t2".to_string()]);
    }

    #[tokio::test]
    async fn test_tail_returns_latest() {
        let store = store().await;
        assert!(store.tail("t1").await.unwrap().is_none());

        store.append(new_record("t1", "d1", None)).await.unwrap();
        store.append(new_record("t1", "d2", Some("d1"))).await.unwrap();

        let tail = store.tail("t1").await.unwrap().unwrap();
        assert_eq!(tail.sequence_id, 2);
        assert_eq!(tail.current_digest, "d2");
    }

    #[tokio::test]
    async fn test_chain_page_is_restartable() {
        let store = store().await;
        let mut previous: Option<String> = None;
        for i in 1..=5 {
            let digest = format!("d{}", i);
            store
                .append(new_record("t1", &digest, previous.as_deref()))
                .await
                .unwrap();
            previous = Some(digest);
        }

        let first_page = store.chain_page("t1", 1, 2).await.unwrap();
        assert_eq!(first_page.len(), 2);
        assert_eq!(first_page[0].sequence_id, 1);
        assert_eq!(first_page[1].sequence_id, 2);

        let resumed = store.chain_page("t1", 3, 10).await.unwrap();
        assert_eq!(resumed.len(), 3);
        assert_eq!(resumed[0].sequence_id, 3);
        assert_eq!(resumed.last().unwrap().sequence_id, 5);
    }

    #[tokio::test]
    async fn test_duplicate_sequence_is_rejected() {
        let store = store().await;
        store.append(new_record("t1", "d1", None)).await.unwrap();

        // Bypass append to simulate a raced writer reusing a sequence id.
        let result = sqlx::query(
            r#"
            INSERT INTO audit_records
                (tenant_id, sequence_id, event_payload, current_digest, inserted_at)
            VALUES ('t1', 1, '{}', 'dup', '2026-01-01T00:00:00Z')
            "#,
        )
        .execute(&store.pool)
        .await;

        assert!(result.is_err());
    }
}
