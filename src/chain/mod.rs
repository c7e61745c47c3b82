//! Hash Chain Engine
//!
//! Pure digest computation linking each audit record to its predecessor,
//! plus the canonical payload serialization both the writer and the
//! verifier hash over.

pub mod canonical;
pub mod engine;

pub use canonical::canonicalize;
pub use engine::{link, GENESIS_DIGEST};
