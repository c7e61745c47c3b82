//! Compliance Gate
//!
//! Admission check run before any write reaches the chain. Rejection
//! happens before tip resolution, so a rejected event leaves no side
//! effect anywhere: no record, no cache mutation, no metric sample.

use serde_json::Value;
use std::fmt;

/// Required length of the deployment-supplied compliance marker.
pub const MARKER_LEN: usize = 16;

/// Payload key carrying the compliance marker.
pub const MARKER_FIELD: &str = "compliance_marker";

/// Payload keys every admitted event must populate.
pub const ACTION_FIELD: &str = "action";
pub const RESOURCE_TYPE_FIELD: &str = "resource_type";

/// Machine-readable rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplianceViolation {
    PayloadNotObject,
    MissingField(&'static str),
    EmptyField(&'static str),
    MissingMarker,
    MalformedMarker,
    MarkerMismatch,
}

impl fmt::Display for ComplianceViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadNotObject => write!(f, "event payload must be a JSON object"),
            Self::MissingField(field) => write!(f, "missing required field '{}'", field),
            Self::EmptyField(field) => write!(f, "required field '{}' is empty", field),
            Self::MissingMarker => write!(f, "missing compliance marker"),
            Self::MalformedMarker => write!(
                f,
                "compliance marker must be {} lowercase hex characters",
                MARKER_LEN
            ),
            Self::MarkerMismatch => write!(f, "compliance marker does not match"),
        }
    }
}

/// Validates events against the deployment's compliance marker.
pub struct ComplianceGate {
    marker: String,
}

impl ComplianceGate {
    pub fn new(marker: String) -> Self {
        Self { marker }
    }

    /// Check an event payload for admission.
    pub fn validate(&self, payload: &Value) -> Result<(), ComplianceViolation> {
        let object = payload
            .as_object()
            .ok_or(ComplianceViolation::PayloadNotObject)?;

        for field in [ACTION_FIELD, RESOURCE_TYPE_FIELD] {
            let value = object
                .get(field)
                .ok_or(ComplianceViolation::MissingField(field))?;
            match value.as_str() {
                Some(s) if !s.is_empty() => {}
                _ => return Err(ComplianceViolation::EmptyField(field)),
            }
        }

        let marker = object
            .get(MARKER_FIELD)
            .and_then(Value::as_str)
            .ok_or(ComplianceViolation::MissingMarker)?;

        // Cheap shape check first so malformed markers never reach the
        // full comparison.
        if !marker_has_shape(marker) {
            return Err(ComplianceViolation::MalformedMarker);
        }

        if marker != self.marker {
            return Err(ComplianceViolation::MarkerMismatch);
        }

        Ok(())
    }
}

/// O(1) shape check: 16 lowercase hex characters.
pub fn marker_has_shape(marker: &str) -> bool {
    marker.len() == MARKER_LEN
        && marker
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
