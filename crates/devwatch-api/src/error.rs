use thiserror::Error;

/// Top-level error type for the `devwatch-api` crate.
///
/// Covers every failure mode of the device API and the identity provider.
/// `devwatch-core` maps these into user-facing errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Session ─────────────────────────────────────────────────────
    /// No authenticated user, or the identity provider could not produce
    /// a token. No request was sent.
    #[error("No active session -- sign in required")]
    NoSession,

    /// The identity provider rejected an operation.
    #[error("Identity provider error: {code}")]
    Identity { code: String, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Server ──────────────────────────────────────────────────────
    /// The server signalled an application-level failure, either with an
    /// HTTP status >= 400 or a `status_code >= 400` in the JSON body.
    #[error("Server rejected request ({code}): {message}")]
    ServerRejected { code: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Coarse classification of [`Error`] for callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NoSession,
    TransportFailure,
    ServerRejected,
    Unknown,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSession => ErrorKind::NoSession,
            Self::Transport(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                ErrorKind::TransportFailure
            }
            Self::ServerRejected { .. } => ErrorKind::ServerRejected,
            _ => ErrorKind::Unknown,
        }
    }

    /// Returns `true` if the failure is network-class and worth offering
    /// the user a retry for.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransportFailure
    }

    /// The identity provider's error code, if this is an identity failure.
    pub fn identity_code(&self) -> Option<&str> {
        match self {
            Self::Identity { code, .. } => Some(code),
            _ => None,
        }
    }
}
