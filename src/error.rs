//! Error types shared across the harness.

use thiserror::Error;

/// Result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Failure kinds surfaced by the identity client, SSO manager and orchestrator.
///
/// Expected failures travel as values inside result structs; this enum is
/// what those structs carry and what the orchestrator catches at its boundary.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Identity API rejected the client credentials.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Identity API refused to create a user.
    #[error("OneLogin user creation failed")]
    RemoteCreateFailed {
        email: String,
        reason: String,
    },

    /// SAML payload could not be Base64-decoded.
    #[error("Invalid base64-encoded input: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Decoded SAML payload is not UTF-8.
    #[error("SAML payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Decoded SAML payload is not well-formed XML.
    #[error("Malformed XML: {0}")]
    Xml(String),

    /// Configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Report could not be written.
    #[error("Report I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report could not be serialized.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A shared lock was poisoned by a panicking writer.
    #[error("{0} lock poisoned")]
    LockPoisoned(&'static str),
}

/// Why a session failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInvalidReason {
    NotFound,
    Expired,
    Inactive,
}

impl std::fmt::Display for SessionInvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionInvalidReason::NotFound => write!(f, "Session not found"),
            SessionInvalidReason::Expired => write!(f, "Session expired"),
            SessionInvalidReason::Inactive => write!(f, "Session inactive"),
        }
    }
}

impl serde::Serialize for SessionInvalidReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
