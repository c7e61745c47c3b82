use serde::{Deserialize, Serialize};
use std::env;

use crate::compliance::{marker_has_shape, MARKER_LEN};
use crate::error::LedgerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// Fixed token every admitted payload must carry verbatim. Supplied by
    /// the embedding deployment; treated as opaque here.
    pub compliance_marker: String,
    pub store_timeout_ms: u64,
    pub metrics_capacity: usize,
}

impl AppConfig {
    pub fn load() -> Result<Self, LedgerError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://audit_ledger.db".to_string());

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| LedgerError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

        let compliance_marker = env::var("AUDIT_COMPLIANCE_MARKER")
            .unwrap_or_else(|_| "a1b2c3d4e5f60718".to_string());

        if !marker_has_shape(&compliance_marker) {
            return Err(LedgerError::Config(format!(
                "AUDIT_COMPLIANCE_MARKER must be {} lowercase hex characters",
                MARKER_LEN
            )));
        }

        let store_timeout_ms = env::var("AUDIT_STORE_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .map_err(|e| LedgerError::Config(format!("Invalid AUDIT_STORE_TIMEOUT_MS: {}", e)))?;

        let metrics_capacity = env::var("AUDIT_METRICS_CAPACITY")
            .unwrap_or_else(|_| "1024".to_string())
            .parse()
            .map_err(|e| LedgerError::Config(format!("Invalid AUDIT_METRICS_CAPACITY: {}", e)))?;

        Ok(AppConfig {
            database_url,
            server_host,
            server_port,
            compliance_marker,
            store_timeout_ms,
            metrics_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.compliance_marker.len(), MARKER_LEN);
        assert!(config.store_timeout_ms > 0);
        assert!(config.metrics_capacity > 0);
    }
}
