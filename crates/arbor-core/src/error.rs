// ── Core error types ──
//
// User-facing faults from arbor-core. These are NOT API-specific --
// consumers never see HTTP status codes or JSON parse failures directly.
// The `From<arbor_api::Error>` impl translates transport-layer errors
// into domain-appropriate variants.
//
// The same type is what the observability sink receives: node-local
// faults (enrichment, sorting, malformed branches) are reported rather
// than returned.

use strum::EnumDiscriminants;
use thiserror::Error;

use crate::model::NodeId;

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Error, EnumDiscriminants)]
#[strum_discriminants(
    name(FaultKind),
    derive(Hash, strum::Display, strum::AsRefStr)
)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach platform at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Platform request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Hierarchy pipeline faults ────────────────────────────────────
    #[error("Failed to load template '{template}': {reason}")]
    ConfigLoadFailed { template: String, reason: String },

    #[error("Invalid hierarchy query: {reason}")]
    InvalidQueryParams { reason: String },

    #[error("Hierarchy fetch failed: {cause}")]
    FetchFailed {
        #[source]
        cause: Box<CoreError>,
    },

    #[error("Enrichment failed for node {node_id}: {reason}")]
    EnrichmentFailed { node_id: NodeId, reason: String },

    #[error("Sort field '{field}' missing on node {node_id}")]
    SortFieldMissing { field: String, node_id: NodeId },

    #[error("Malformed hierarchy: {0}")]
    MalformedHierarchy(HierarchyFault),

    // ── Rule errors ──────────────────────────────────────────────────
    #[error("Invalid enrichment rule: {message}")]
    RuleSyntax { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The fieldless kind of this fault, for counting and filtering.
    pub fn kind(&self) -> FaultKind {
        FaultKind::from(self)
    }

    /// Wrap a source failure as `FetchFailed`, leaving pre-fetch
    /// validation faults untouched.
    pub(crate) fn into_fetch_failure(self) -> Self {
        match self {
            err @ (Self::InvalidQueryParams { .. } | Self::FetchFailed { .. }) => err,
            other => Self::FetchFailed {
                cause: Box::new(other),
            },
        }
    }
}

/// A structural defect found while walking the parent -> children mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyFault {
    /// A child points back at one of its own ancestors.
    #[error("node {node_id} under {parent_id} is its own ancestor; branch cut")]
    Cycle { node_id: NodeId, parent_id: NodeId },

    /// The same node is reachable from two places; the second is dropped.
    #[error("node {node_id} appears more than once; later occurrence skipped")]
    Duplicate { node_id: NodeId },

    /// Children are keyed under a parent that was never reached.
    #[error("{orphans} record(s) listed under unreachable parent {parent_id}")]
    DanglingParent { parent_id: String, orphans: usize },

    /// A record has no usable value in the primary-key field.
    #[error("record without a '{field}' value kept as a leaf")]
    MissingPrimaryKey { field: String },

    /// A record field collides with the child-list key and was dropped.
    #[error("node {node_id} has a '{field}' field; dropped in favour of its child list")]
    ReservedField { node_id: NodeId, field: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<arbor_api::Error> for CoreError {
    fn from(err: arbor_api::Error) -> Self {
        match err {
            arbor_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            arbor_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            arbor_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            arbor_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            arbor_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            arbor_api::Error::TemplateNotFound { name } => CoreError::ConfigLoadFailed {
                template: name,
                reason: "not found".into(),
            },
            arbor_api::Error::Status { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            arbor_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failure_wraps_transport_faults_once() {
        let err = CoreError::Timeout { timeout_secs: 30 }.into_fetch_failure();
        assert_eq!(err.kind(), FaultKind::FetchFailed);

        let again = err.clone().into_fetch_failure();
        assert_eq!(again, err);
    }

    #[test]
    fn invalid_params_are_not_wrapped() {
        let err = CoreError::InvalidQueryParams {
            reason: "record id is required".into(),
        }
        .into_fetch_failure();
        assert_eq!(err.kind(), FaultKind::InvalidQueryParams);
    }

    #[test]
    fn template_not_found_maps_to_config_load_failure() {
        let err = CoreError::from(arbor_api::Error::TemplateNotFound {
            name: "Account_Tree".into(),
        });
        assert_eq!(err.kind(), FaultKind::ConfigLoadFailed);
        assert_eq!(
            err.to_string(),
            "Failed to load template 'Account_Tree': not found"
        );
    }
}
