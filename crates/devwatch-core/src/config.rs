// ── Runtime client configuration ──
//
// Describes *how* to talk to the device API. Never touches disk: the host
// app (or devwatch-config) constructs a `ClientConfig` and hands it in.

use std::time::Duration;

use url::Url;

/// How often the device list is re-fetched in the background.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default `scope` for the device-list fetch.
pub const DEFAULT_DEVICE_SCOPE: &str = "devices";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Device API base URL (e.g. `https://api.example.com/v1/`).
    pub api_url: Url,
    /// Request timeout.
    pub timeout: Duration,
    /// Background refresh period. Zero disables polling.
    pub poll_interval: Duration,
    /// `scope` query parameter of the user fetch that returns devices.
    pub device_scope: Option<String>,
    /// Default number of entries requested for event history.
    pub history_limit: u32,
}

impl ClientConfig {
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            timeout: Duration::from_secs(30),
            poll_interval: DEFAULT_POLL_INTERVAL,
            device_scope: Some(DEFAULT_DEVICE_SCOPE.into()),
            history_limit: 50,
        }
    }
}
