// ── Event history types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::FamilyState;

/// One transmission from a device's event history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub state: Option<FamilyState>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub battery: Option<f64>,
}

impl DeviceEvent {
    pub fn is_alarm(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.is_alarm)
    }
}
