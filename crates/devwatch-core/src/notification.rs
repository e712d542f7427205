// ── Push notification intake ──
//
// The push SDK belongs to the host app; it forwards what it receives here.
// Notifications never carry device state themselves, they only prompt a
// reload of the device list.

use serde::{Deserialize, Serialize};

/// Payload of one push notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl Notification {
    /// Serial number of the device the notification is about, if any.
    pub fn serial(&self) -> Option<&str> {
        ["serialNumber", "serial"]
            .iter()
            .find_map(|key| self.data.get(*key)?.as_str())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// Delivered while the app is in the foreground.
    Received(Notification),
    /// The user tapped the notification.
    Tapped(Notification),
}
