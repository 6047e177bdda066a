// ── Core error types ──
//
// Errors raised while reconciling configuration against a remote instance.
// Remote API failures are carried unmodified; everything else is a
// configuration problem described with the field path it concerns.

use thiserror::Error;

use crate::remote_map::MapError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Remote API ───────────────────────────────────────────────────
    #[error(transparent)]
    Api(#[from] seerr_api::Error),

    // ── Configuration errors ─────────────────────────────────────────
    /// Missing required attributes, unresolvable references, malformed
    /// permission sets, inconsistent remote state.
    #[error("{tree}: {message}")]
    Validation { tree: String, message: String },

    /// Remote data (or a record) could not be mapped through a remote map.
    #[error("{tree}: unable to map attributes: {message}")]
    Mapping { tree: String, message: String },

    #[error("no secret found for {plugin} instance '{instance}'")]
    SecretNotFound { plugin: String, instance: String },

    #[error(
        "instance has already been configured with a Jellyfin server but session data \
         has been lost, please recreate the instance and try again"
    )]
    AlreadyConfigured,

    // ── Pass summary ─────────────────────────────────────────────────
    #[error("{} section(s) failed to reconcile: {}", .failures.len(), summarize(.failures))]
    SectionsFailed { failures: Vec<SectionFailure> },
}

/// One failed top-level section within a reconciliation pass.
#[derive(Debug)]
pub struct SectionFailure {
    pub tree: String,
    pub error: Box<CoreError>,
}

fn summarize(failures: &[SectionFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("[{}] {}", f.tree, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl CoreError {
    pub fn validation(tree: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            tree: tree.into(),
            message: message.into(),
        }
    }

    pub fn mapping(tree: impl Into<String>, err: &MapError) -> Self {
        Self::Mapping {
            tree: tree.into(),
            message: err.to_string(),
        }
    }

    /// The HTTP status of the underlying remote error, if any.
    pub fn api_status(&self) -> Option<u16> {
        match self {
            Self::Api(e) => e.status(),
            _ => None,
        }
    }

    /// Returns `true` if this error is a configuration problem rather than a remote failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::Mapping { .. } | Self::SecretNotFound { .. }
        )
    }
}
