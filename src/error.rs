use thiserror::Error;

use crate::compliance::ComplianceViolation;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("JSON serialization error: {}", err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(format!("Database error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Compliance rejected: {0}")]
    Compliance(ComplianceViolation),

    #[error("Cannot resolve chain tip for tenant '{tenant}': {detail}")]
    GenesisAmbiguity { tenant: String, detail: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage operation timed out after {0}ms")]
    StorageTimeout(u64),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl LedgerError {
    /// True when a retried call cannot corrupt the chain: the append is
    /// transactional, so a storage failure leaves no partial record behind.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::StorageTimeout(_))
    }

    /// Stable machine-readable code for the HTTP surface.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Compliance(_) => "compliance_rejected",
            Self::GenesisAmbiguity { .. } => "genesis_ambiguity",
            Self::Storage(_) => "storage_error",
            Self::StorageTimeout(_) => "storage_timeout",
            Self::Cache(_) => "cache_error",
        }
    }
}
