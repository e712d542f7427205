// Identity provider integration
//
// The device API never sees passwords: it only accepts short-lived bearer
// tokens minted by a separate identity service. This module defines the
// provider seam used by `ApiClient` and a REST implementation for
// secure-token style identity services (sign-in with password, refresh
// token exchange, account updates).

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// The authenticated user as seen by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

/// Source of bearer tokens and account operations.
///
/// Object safe so a session controller can hold `Arc<dyn IdentityProvider>`
/// and tests can substitute a fake.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, if any. Never touches the network.
    async fn current_user(&self) -> Option<AuthUser>;

    /// Mint a new ID token for the active session, forcing a refresh.
    ///
    /// `Ok(None)` means there is no active session.
    async fn fresh_token(&self) -> Result<Option<SecretString>, Error>;

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<AuthUser, Error>;

    /// Drop the local session. Never fails.
    async fn sign_out(&self);

    /// Re-check the current user's password (required before sensitive
    /// account changes).
    async fn reauthenticate(&self, password: &SecretString) -> Result<(), Error>;

    async fn change_password(&self, new_password: &SecretString) -> Result<(), Error>;

    async fn change_email(&self, new_email: &str) -> Result<(), Error>;

    async fn send_password_reset(&self, email: &str) -> Result<(), Error>;

    /// Rebuild a session from a persisted refresh token.
    async fn restore(&self, refresh_token: SecretString) -> Result<AuthUser, Error>;

    /// The long-lived refresh token of the active session, for persistence.
    async fn refresh_token(&self) -> Option<SecretString>;
}

// ── REST implementation ──────────────────────────────────────────────

/// Endpoints of a secure-token identity service.
#[derive(Debug, Clone)]
pub struct IdentityEndpoints {
    /// Base for `accounts:*` calls, e.g. `https://identity.example.com/v1`.
    pub accounts_url: Url,
    /// Base for the `token` refresh call, e.g. `https://token.example.com/v1`.
    pub token_url: Url,
}

#[derive(Debug)]
struct IdentitySession {
    user_id: String,
    email: Option<String>,
    id_token: SecretString,
    refresh_token: SecretString,
}

/// Error body: `{"error":{"code":400,"message":"EMAIL_NOT_FOUND"}}`.
#[derive(Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
struct LookupUser {
    #[serde(default)]
    email: Option<String>,
}

/// [`IdentityProvider`] backed by a secure-token REST identity service.
pub struct RestIdentityProvider {
    http: reqwest::Client,
    endpoints: IdentityEndpoints,
    api_key: SecretString,
    session: RwLock<Option<IdentitySession>>,
}

impl RestIdentityProvider {
    pub fn new(
        endpoints: IdentityEndpoints,
        api_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self::with_client(transport.build_client()?, endpoints, api_key))
    }

    /// Create a provider with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        endpoints: IdentityEndpoints,
        api_key: SecretString,
    ) -> Self {
        Self {
            http,
            endpoints,
            api_key,
            session: RwLock::new(None),
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    // `accounts:signIn...` must not go through `Url::join`: the colon would
    // make it parse as a scheme.
    fn accounts_url(&self, method: &str) -> Result<Url, Error> {
        let base = self.endpoints.accounts_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/accounts:{method}"))?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());
        Ok(url)
    }

    fn token_url(&self) -> Result<Url, Error> {
        let base = self.endpoints.token_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/token"))?;
        url.query_pairs_mut()
            .append_pair("key", self.api_key.expose_secret());
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn parse_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ProviderErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            // Messages look like "WEAK_PASSWORD : Password should be ..."
            let code = message
                .split(" : ")
                .next()
                .unwrap_or_default()
                .trim()
                .to_owned();
            return Err(Error::Identity { code, message });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, Error> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::parse_response(resp).await
    }

    async fn exchange_refresh_token(&self, refresh_token: &SecretString) -> Result<TokenResponse, Error> {
        let url = self.token_url()?;
        let resp = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(Error::Transport)?;
        Self::parse_response(resp).await
    }

    async fn lookup_email(&self, id_token: &SecretString) -> Result<Option<String>, Error> {
        let url = self.accounts_url("lookup")?;
        let resp: LookupResponse = self
            .post_json(url, &json!({ "idToken": id_token.expose_secret() }))
            .await?;
        Ok(resp.users.into_iter().next().and_then(|u| u.email))
    }

    async fn update_account(&self, fields: serde_json::Value) -> Result<(), Error> {
        let id_token = self.fresh_token().await?.ok_or(Error::NoSession)?;
        let mut body = json!({
            "idToken": id_token.expose_secret(),
            "returnSecureToken": true,
        });
        if let (Some(target), serde_json::Value::Object(extra)) = (body.as_object_mut(), fields) {
            target.extend(extra);
        }

        let url = self.accounts_url("update")?;
        let resp: UpdateResponse = self.post_json(url, &body).await?;

        let mut guard = self.session.write().await;
        if let Some(session) = guard.as_mut() {
            if let Some(token) = resp.id_token {
                session.id_token = SecretString::from(token);
            }
            if let Some(token) = resp.refresh_token {
                session.refresh_token = SecretString::from(token);
            }
            if resp.email.is_some() {
                session.email = resp.email;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn current_user(&self) -> Option<AuthUser> {
        self.session.read().await.as_ref().map(|s| AuthUser {
            user_id: s.user_id.clone(),
            email: s.email.clone(),
        })
    }

    async fn fresh_token(&self) -> Result<Option<SecretString>, Error> {
        let refresh_token = match self.session.read().await.as_ref() {
            Some(session) => session.refresh_token.clone(),
            None => return Ok(None),
        };

        let resp = self.exchange_refresh_token(&refresh_token).await?;

        let mut guard = self.session.write().await;
        // Signed out while the refresh was in flight.
        let Some(session) = guard.as_mut() else {
            return Ok(None);
        };
        session.id_token = SecretString::from(resp.id_token);
        session.refresh_token = SecretString::from(resp.refresh_token);
        Ok(Some(session.id_token.clone()))
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<AuthUser, Error> {
        let url = self.accounts_url("signInWithPassword")?;
        debug!(email, "signing in");

        let resp: SignInResponse = self
            .post_json(
                url,
                &json!({
                    "email": email,
                    "password": password.expose_secret(),
                    "returnSecureToken": true,
                }),
            )
            .await?;

        let user = AuthUser {
            user_id: resp.local_id.clone(),
            email: resp.email.clone().or_else(|| Some(email.to_owned())),
        };
        *self.session.write().await = Some(IdentitySession {
            user_id: resp.local_id,
            email: user.email.clone(),
            id_token: SecretString::from(resp.id_token),
            refresh_token: SecretString::from(resp.refresh_token),
        });
        debug!(user_id = %user.user_id, "sign-in successful");
        Ok(user)
    }

    async fn sign_out(&self) {
        *self.session.write().await = None;
        debug!("signed out");
    }

    async fn reauthenticate(&self, password: &SecretString) -> Result<(), Error> {
        let (user_id, email) = {
            let guard = self.session.read().await;
            let session = guard.as_ref().ok_or(Error::NoSession)?;
            (session.user_id.clone(), session.email.clone())
        };
        let email = email.ok_or_else(|| Error::Identity {
            code: "MISSING_EMAIL".into(),
            message: "current session has no email address".into(),
        })?;

        let url = self.accounts_url("signInWithPassword")?;
        let resp: SignInResponse = self
            .post_json(
                url,
                &json!({
                    "email": email,
                    "password": password.expose_secret(),
                    "returnSecureToken": true,
                }),
            )
            .await?;

        if resp.local_id != user_id {
            return Err(Error::Identity {
                code: "USER_MISMATCH".into(),
                message: "credentials belong to a different user".into(),
            });
        }

        if let Some(session) = self.session.write().await.as_mut() {
            session.id_token = SecretString::from(resp.id_token);
            session.refresh_token = SecretString::from(resp.refresh_token);
        }
        debug!(user_id, "reauthenticated");
        Ok(())
    }

    async fn change_password(&self, new_password: &SecretString) -> Result<(), Error> {
        debug!("changing password");
        self.update_account(json!({ "password": new_password.expose_secret() }))
            .await
    }

    async fn change_email(&self, new_email: &str) -> Result<(), Error> {
        debug!(new_email, "changing email");
        self.update_account(json!({ "email": new_email })).await
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), Error> {
        let url = self.accounts_url("sendOobCode")?;
        debug!(email, "requesting password reset");
        let _: serde_json::Value = self
            .post_json(
                url,
                &json!({ "requestType": "PASSWORD_RESET", "email": email }),
            )
            .await?;
        Ok(())
    }

    async fn restore(&self, refresh_token: SecretString) -> Result<AuthUser, Error> {
        let resp = self.exchange_refresh_token(&refresh_token).await?;
        let id_token = SecretString::from(resp.id_token);
        let email = self.lookup_email(&id_token).await?;

        let user = AuthUser {
            user_id: resp.user_id.clone(),
            email: email.clone(),
        };
        *self.session.write().await = Some(IdentitySession {
            user_id: resp.user_id,
            email,
            id_token,
            refresh_token: SecretString::from(resp.refresh_token),
        });
        debug!(user_id = %user.user_id, "session restored");
        Ok(user)
    }

    async fn refresh_token(&self) -> Option<SecretString> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
    }
}
