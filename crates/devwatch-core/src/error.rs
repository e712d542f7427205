// ── Core error types ──
//
// User-facing errors from devwatch-core. Consumers never see reqwest or
// JSON parse failures directly. The `From<devwatch_api::Error>` impl
// folds transport-layer errors into this taxonomy; none of them are fatal,
// the caller decides whether to alert, offer a retry, or ignore.

use thiserror::Error;

use crate::locale::{self, Locale, Message};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("No authenticated user")]
    NoSession,

    #[error("Network unreachable: {reason}")]
    TransportFailure { reason: String },

    #[error("Server rejected request ({code}): {message}")]
    ServerRejected { code: u16, message: String },

    #[error("Identity provider error: {code}")]
    Identity { code: String, message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Preference storage error: {message}")]
    Storage { message: String },

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Network-class failures are the only ones worth offering a
    /// user-triggered retry for. Nothing is retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }

    /// Text suitable for an alert dialog.
    ///
    /// Server-supplied messages are passed through; identity-provider codes
    /// get canned localized text; everything else gets a generic message.
    pub fn user_message(&self, locale: Locale) -> String {
        match self {
            Self::NoSession => locale::text(Message::ErrorNoSession, locale).into(),
            Self::TransportFailure { .. } => locale::text(Message::ErrorNetwork, locale).into(),
            Self::ServerRejected { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Identity { code, .. } => locale::identity_message(code, locale)
                .unwrap_or_else(|| locale::text(Message::ErrorUnknown, locale))
                .into(),
            Self::Validation { message } => message.clone(),
            _ => locale::text(Message::ErrorUnknown, locale).into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<devwatch_api::Error> for CoreError {
    fn from(err: devwatch_api::Error) -> Self {
        use devwatch_api::ErrorKind;

        match err {
            devwatch_api::Error::NoSession => Self::NoSession,
            devwatch_api::Error::ServerRejected { code, message } => {
                Self::ServerRejected { code, message }
            }
            devwatch_api::Error::Identity { code, message } => Self::Identity { code, message },
            ref e if e.kind() == ErrorKind::TransportFailure => Self::TransportFailure {
                reason: e.to_string(),
            },
            other => Self::Unknown(other.to_string()),
        }
    }
}
