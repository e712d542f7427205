// Event history endpoint

use reqwest::Method;
use tracing::debug;

use crate::client::{ApiClient, RequestOptions};
use crate::error::Error;
use crate::models::WatchFamilyEvent;

impl ApiClient {
    /// List a device's recent state transmissions, newest first.
    ///
    /// `GET watchfamily?sigfoxId=...&limit=N`
    pub async fn event_history(
        &self,
        sigfox_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<WatchFamilyEvent>, Error> {
        debug!(sigfox_id, ?limit, "fetching event history");
        let mut options = RequestOptions::default().query("sigfoxId", sigfox_id);
        if let Some(n) = limit {
            options = options.query("limit", n.to_string());
        }
        let events: Option<Vec<WatchFamilyEvent>> = self
            .call(Method::GET, "watchfamily", options)
            .await?;
        Ok(events.unwrap_or_default())
    }
}
