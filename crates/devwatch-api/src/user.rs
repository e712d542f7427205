// User endpoints
//
// Profile retrieval (with the device list) and language preference.

use reqwest::Method;
use tracing::debug;

use crate::client::{ApiClient, RequestOptions};
use crate::error::Error;
use crate::models::{LanguageBody, UserProfile};

impl ApiClient {
    /// Fetch the user's profile.
    ///
    /// `GET user/{id}` with an optional `scope` query parameter selecting
    /// which related collections (e.g. `devices`) the server includes.
    pub async fn get_user_data(
        &self,
        user_id: &str,
        scope: Option<&str>,
    ) -> Result<UserProfile, Error> {
        debug!(user_id, ?scope, "fetching user data");
        let mut options = RequestOptions::default();
        if let Some(scope) = scope {
            options = options.query("scope", scope);
        }
        self.call(Method::GET, &format!("user/{user_id}"), options)
            .await
    }

    /// Store the user's language preference on the server.
    ///
    /// `PUT user/{id}` with `{"language": "<code>"}`
    pub async fn change_language(&self, lang_code: &str, user_id: &str) -> Result<(), Error> {
        debug!(user_id, lang_code, "changing language");
        let options = RequestOptions::default().json(&LanguageBody {
            language: lang_code,
        })?;
        let _: serde_json::Value = self
            .call(Method::PUT, &format!("user/{user_id}"), options)
            .await?;
        Ok(())
    }
}
