// ── Session persistence ──
//
// The identity provider's refresh token is kept in the system keyring so a
// restart can rebuild the session without asking for the password again.

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use devwatch_api::{AuthUser, IdentityProvider};

use crate::{ConfigError, KEYRING_SERVICE};

const REFRESH_TOKEN_ENTRY: &str = "session/refresh-token";

fn entry() -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(KEYRING_SERVICE, REFRESH_TOKEN_ENTRY)?)
}

pub fn save_refresh_token(token: &SecretString) -> Result<(), ConfigError> {
    entry()?.set_password(token.expose_secret())?;
    Ok(())
}

/// The stored refresh token, if the keyring has one.
pub fn load_refresh_token() -> Option<SecretString> {
    entry().ok()?.get_password().ok().map(SecretString::from)
}

/// Forget the stored token. A missing entry is not an error.
pub fn clear_refresh_token() -> Result<(), ConfigError> {
    match entry()?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Persist the provider's current session, or clear it after sign-out.
pub async fn save_session(identity: &dyn IdentityProvider) -> Result<(), ConfigError> {
    match identity.refresh_token().await {
        Some(token) => {
            save_refresh_token(&token)?;
            debug!("session token saved to keyring");
        }
        None => clear_refresh_token()?,
    }
    Ok(())
}

/// Rebuild the session from the keyring.
///
/// A token the provider rejects is removed so the next start does not try
/// it again. Network failures leave it in place.
pub async fn restore_session(identity: &dyn IdentityProvider) -> Option<AuthUser> {
    let token = load_refresh_token()?;

    match identity.restore(token).await {
        Ok(user) => {
            info!(user_id = %user.user_id, "session restored");
            if let Err(e) = save_session(identity).await {
                warn!(error = %e, "could not store rotated session token");
            }
            Some(user)
        }
        Err(e) if e.identity_code().is_some() => {
            warn!(error = %e, "stored session rejected, clearing it");
            if let Err(e) = clear_refresh_token() {
                warn!(error = %e, "could not clear stored session");
            }
            None
        }
        Err(e) => {
            warn!(error = %e, "could not restore session");
            None
        }
    }
}
