// Authenticated device API client
//
// Wraps `reqwest::Client` with bearer-token injection, base-URL path
// construction, and `status_code` envelope normalization. Endpoint
// operations live in sibling modules as inherent methods so this module
// stays focused on transport mechanics.

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Error;
use crate::identity::IdentityProvider;
use crate::transport::TransportConfig;

/// Caller-supplied knobs for a single [`ApiClient::request`].
#[derive(Debug, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Merged over the default headers; these win on conflict.
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: &impl Serialize) -> Result<Self, Error> {
        let value = serde_json::to_value(body).map_err(|e| Error::Deserialization {
            message: format!("failed to encode request body: {e}"),
            body: String::new(),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// HTTP client for the device API.
///
/// Every call asks the identity provider for a freshly refreshed token;
/// nothing is cached, so a near-expiry token is never reused.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    identity: Arc<dyn IdentityProvider>,
}

impl ApiClient {
    pub fn new(
        base_url: Url,
        identity: Arc<dyn IdentityProvider>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?, base_url, identity))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            http,
            base_url,
            identity,
        }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The identity provider tokens come from.
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    // ── Token ────────────────────────────────────────────────────────

    /// Force-refresh a token from the active session.
    ///
    /// Returns `None` when nobody is signed in. Provider failures are logged
    /// and also reported as `None`.
    pub async fn fresh_token(&self) -> Option<SecretString> {
        match self.identity.fresh_token().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                None
            }
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build a full URL: `{base}/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    fn default_headers(token: &SecretString) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| {
                warn!("identity provider returned a token that is not a valid header value");
                Error::Identity {
                    code: "INVALID_TOKEN".into(),
                    message: "token contains characters not allowed in a header".into(),
                }
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send an authenticated request and return the raw response.
    ///
    /// Fails with [`Error::NoSession`] before touching the network when no
    /// token is available.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<reqwest::Response, Error> {
        let token = self.fresh_token().await.ok_or(Error::NoSession)?;
        let url = self.api_url(path)?;

        let mut headers = Self::default_headers(&token)?;
        headers.extend(options.headers);

        debug!("{method} {url}");

        let mut builder = self.http.request(method, url).headers(headers);
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = options.body {
            builder = builder.body(body.to_string());
        }

        builder.send().await.map_err(Error::Transport)
    }

    /// Send a request and decode the normalized envelope payload.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, Error> {
        let resp = self.request(method, path, options).await?;
        let payload = parse_envelope(resp).await?;
        serde_json::from_value(payload.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: payload.to_string(),
        })
    }
}

/// Normalize a response into its payload.
///
/// One rule for every endpoint: the request failed if the HTTP status is
/// >= 400 or the JSON body carries a numeric `status_code >= 400`. The
/// payload is `data` when present, otherwise the whole body.
async fn parse_envelope(resp: reqwest::Response) -> Result<serde_json::Value, Error> {
    let status = resp.status();
    let body = resp.text().await.map_err(Error::Transport)?;
    trace!(%status, len = body.len(), "response received");

    let value = if body.trim().is_empty() {
        serde_json::Value::Null
    } else {
        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(Error::ServerRejected {
                    code: status.as_u16(),
                    message: preview(&body, status),
                });
            }
            Err(e) => {
                return Err(Error::Deserialization {
                    message: e.to_string(),
                    body,
                });
            }
        }
    };

    let body_code = value
        .get("status_code")
        .and_then(serde_json::Value::as_u64)
        .and_then(|c| u16::try_from(c).ok());

    let rejected_code = match body_code {
        Some(code) if code >= 400 => Some(code),
        _ if status.as_u16() >= 400 => Some(status.as_u16()),
        _ => None,
    };

    if let Some(code) = rejected_code {
        let message = server_message(&value).unwrap_or_else(|| preview(&body, status));
        return Err(Error::ServerRejected { code, message });
    }

    Ok(match value {
        serde_json::Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    })
}

fn server_message(value: &serde_json::Value) -> Option<String> {
    ["message", "error"].iter().find_map(|key| match value.get(key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Object(obj) => obj
            .get("message")
            .and_then(serde_json::Value::as_str)
            .map(String::from),
        _ => None,
    })
}

fn preview(body: &str, status: reqwest::StatusCode) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {status}"), String::from);
    }
    trimmed.chars().take(200).collect()
}
