//! Tamper-evident append-only audit ledger.
//!
//! Every admitted event is cryptographically chained to its predecessor
//! per tenant; the chain tip is cached for low-latency writes, and the
//! full chain can be replayed from durable storage to detect and
//! localize post-hoc tampering.

pub mod cache;
pub mod chain;
pub mod compliance;
pub mod config;
pub mod error;
pub mod metrics;
pub mod service;
pub mod store;
pub mod verify;

pub use error::LedgerError;
pub use service::{AuditService, LogEventOutcome};
pub use verify::IntegrityReport;
