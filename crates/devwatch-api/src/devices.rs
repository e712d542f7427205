// Device endpoints
//
// Association (claiming a device for a user), dissociation, single-device
// reads, and settings updates. Every mutation is a full server round-trip;
// callers re-fetch afterwards instead of patching local state.

use reqwest::Method;
use tracing::debug;

use crate::client::{ApiClient, RequestOptions};
use crate::error::Error;
use crate::models::{AssociateDeviceBody, DeviceRecord, DeviceSettingsUpdate};

/// `device/{serial}`, with the serial percent-encoded as one path segment.
fn device_path(serial: &str) -> String {
    format!("device/{}", urlencoding::encode(serial))
}

impl ApiClient {
    /// Fetch a single device by serial number.
    ///
    /// `GET device/{serial}`
    pub async fn get_device(&self, serial: &str) -> Result<DeviceRecord, Error> {
        debug!(serial, "fetching device");
        self.call(Method::GET, &device_path(serial), RequestOptions::default())
            .await
    }

    /// Associate a device with a user account.
    ///
    /// `POST device/{serial}` with `{"userId": "...", "name": "..."}`
    pub async fn associate_device(
        &self,
        user_id: &str,
        serial: &str,
        name: Option<&str>,
    ) -> Result<(), Error> {
        debug!(user_id, serial, "associating device");
        let options = RequestOptions::default().json(&AssociateDeviceBody { user_id, name })?;
        let _: serde_json::Value = self
            .call(Method::POST, &device_path(serial), options)
            .await?;
        Ok(())
    }

    /// Remove a device from a user account.
    ///
    /// `DELETE device/{serial}?userId=...`
    pub async fn dissociate_device(&self, user_id: &str, serial: &str) -> Result<(), Error> {
        debug!(user_id, serial, "dissociating device");
        let options = RequestOptions::default().query("userId", user_id);
        let _: serde_json::Value = self
            .call(Method::DELETE, &device_path(serial), options)
            .await?;
        Ok(())
    }

    /// Update a device's settings entry (rename, thresholds, ...).
    ///
    /// `PUT setting/{id}`
    pub async fn update_device_settings(
        &self,
        setting_id: &str,
        update: &DeviceSettingsUpdate,
    ) -> Result<(), Error> {
        debug!(setting_id, "updating device settings");
        let options = RequestOptions::default().json(update)?;
        let _: serde_json::Value = self
            .call(Method::PUT, &format!("setting/{setting_id}"), options)
            .await?;
        Ok(())
    }
}
