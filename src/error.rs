// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};

/// Stable error codes, one per taxonomy member.
pub mod codes {
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
    pub const QUOTA_EXCEEDED: &str = "QUOTA_EXCEEDED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const TRANSIENT_UNAVAILABLE: &str = "TRANSIENT_UNAVAILABLE";
    pub const UNKNOWN: &str = "UNKNOWN";
}

/// Why a write was rejected as conflicting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ConflictReason {
    /// A unique name (e.g. a username) is already held by someone else.
    NameTaken { name: String },
    /// The stored record changed since the caller last read it.
    RecordChanged { record_id: String },
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictReason::NameTaken { name } => write!(f, "name '{}' is taken", name),
            ConflictReason::RecordChanged { record_id } => {
                write!(f, "record '{}' was changed by another writer", record_id)
            }
        }
    }
}

/// Failure taxonomy shared by the remote store, the sync client and the managers.
///
/// Only [`SyncError::TransientUnavailable`] is retried; every other kind aborts
/// a retry loop on first occurrence.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("not authenticated")]
    Unauthenticated,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(ConflictReason),

    #[error("service temporarily unavailable: {0}")]
    TransientUnavailable(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SyncError {
    pub fn name_taken(name: impl Into<String>) -> Self {
        SyncError::Conflict(ConflictReason::NameTaken { name: name.into() })
    }

    pub fn record_changed(record_id: impl Into<String>) -> Self {
        SyncError::Conflict(ConflictReason::RecordChanged {
            record_id: record_id.into(),
        })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::TransientUnavailable(_))
    }

    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Unauthenticated => codes::UNAUTHENTICATED,
            SyncError::PermissionDenied(_) => codes::PERMISSION_DENIED,
            SyncError::QuotaExceeded(_) => codes::QUOTA_EXCEEDED,
            SyncError::NotFound(_) => codes::NOT_FOUND,
            SyncError::Conflict(_) => codes::CONFLICT,
            SyncError::TransientUnavailable(_) => codes::TRANSIENT_UNAVAILABLE,
            SyncError::Unknown(_) => codes::UNKNOWN,
        }
    }

    /// Message suitable for showing to the end user.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Unauthenticated => "Please sign in to continue.".to_string(),
            SyncError::PermissionDenied(_) => {
                "You don't have permission to do that.".to_string()
            }
            SyncError::QuotaExceeded(_) => {
                "You've reached your limit for now. Upgrade or try again tomorrow.".to_string()
            }
            SyncError::NotFound(_) => "We couldn't find that item.".to_string(),
            SyncError::Conflict(ConflictReason::NameTaken { name }) => {
                format!("The name '{}' is already taken.", name)
            }
            SyncError::Conflict(ConflictReason::RecordChanged { .. }) => {
                "This item was changed elsewhere. Refresh and try again.".to_string()
            }
            SyncError::TransientUnavailable(_) => {
                "The service is busy right now. Please try again in a moment.".to_string()
            }
            SyncError::Unknown(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            SyncError::TransientUnavailable(err.to_string())
        } else {
            SyncError::Unknown(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Unknown(format!("JSON error: {}", err))
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(err: anyhow::Error) -> Self {
        SyncError::Unknown(format!("{:#}", err))
    }
}
