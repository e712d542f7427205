// ── Device status derivation ──
//
// Pure functions from a parsed `Device` to what a device list shows:
// the status badge, the raw state text, and the reading cells. Nothing
// here performs I/O or fails; missing data yields a placeholder.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::locale::{self, Locale, Message};
use crate::model::{Device, StateName};

/// Shown for any value the device hasn't reported.
pub const PLACEHOLDER: &str = "-";

/// Transmissions older than this many hours no longer count as "recent".
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// Badge state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStatus {
    Connected,
    Alarm,
    Warning,
    Disconnected,
}

impl DeviceStatus {
    /// English display label.
    pub fn label(self) -> &'static str {
        self.localized_label(Locale::English)
    }

    pub fn localized_label(self, locale: Locale) -> &'static str {
        let message = match self {
            Self::Connected => Message::StatusConnected,
            Self::Alarm => Message::StatusAlarm,
            Self::Warning => Message::StatusWarning,
            Self::Disconnected => Message::StatusDisconnected,
        };
        locale::text(message, locale)
    }

    pub fn needs_attention(self) -> bool {
        matches!(self, Self::Alarm | Self::Disconnected)
    }
}

/// A resolved status together with its display label.
///
/// Resolvers produce the English label; call [`Resolution::localized`]
/// before showing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub status: DeviceStatus,
    pub label: &'static str,
}

impl Resolution {
    pub fn localized(self, locale: Locale) -> Self {
        Self {
            label: self.status.localized_label(locale),
            ..self
        }
    }
}

impl From<DeviceStatus> for Resolution {
    fn from(status: DeviceStatus) -> Self {
        Self {
            status,
            label: status.label(),
        }
    }
}

/// Classify a device as of `now`.
///
/// Tiers are evaluated in order and the first match wins:
/// 1. power mode off → disconnected
/// 2. family state: alarm flag, then known connected / disconnected names
/// 3. thermometer with a temperature reading → connected
/// 4. transmission within [`RECENT_WINDOW_HOURS`] → connected
/// 5. otherwise → warning
pub fn resolve_at(device: &Device, now: DateTime<Utc>) -> Resolution {
    if !device.mode.is_armed() {
        return DeviceStatus::Disconnected.into();
    }

    if let Some(state) = &device.family_state {
        if state.is_alarm {
            return DeviceStatus::Alarm.into();
        }
        match state.known_name() {
            Some(StateName::Ok | StateName::Armed | StateName::Monitoring) => {
                return DeviceStatus::Connected.into();
            }
            Some(StateName::Disarmed | StateName::Off | StateName::Disconnected) => {
                return DeviceStatus::Disconnected.into();
            }
            None => {}
        }
    }

    if temperature(device).is_some() {
        return DeviceStatus::Connected.into();
    }

    // Future timestamps (clock skew) count as recent.
    let window = Duration::hours(RECENT_WINDOW_HOURS);
    if device
        .updated_on
        .is_some_and(|updated| now.signed_duration_since(updated) < window)
    {
        return DeviceStatus::Connected.into();
    }

    DeviceStatus::Warning.into()
}

/// Classify a device against the current wall clock.
pub fn resolve(device: &Device) -> Resolution {
    resolve_at(device, Utc::now())
}

/// Whether the row should be highlighted. Display only.
pub fn needs_attention(device: &Device) -> bool {
    resolve(device).status.needs_attention()
}

/// Human text for the latest raw state, independent of the status tiers.
pub fn state_text(device: &Device, locale: Locale) -> &'static str {
    if let Some(state) = &device.family_state {
        let message = match state.known_name() {
            Some(StateName::Ok) => Message::StateOk,
            Some(StateName::Armed) => Message::StateArmed,
            Some(StateName::Disarmed) => Message::StateDisarmed,
            Some(StateName::Monitoring) => Message::StateMonitoring,
            Some(StateName::Off | StateName::Disconnected) => Message::StateOff,
            None => Message::StateUnknown,
        };
        return locale::text(message, locale);
    }

    match device.legacy_alarm {
        Some(true) => locale::text(Message::StateAlarm, locale),
        Some(false) => locale::text(Message::StateNormal, locale),
        None => PLACEHOLDER,
    }
}

/// Battery charge rounded to a whole percent.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
pub fn battery_percent(device: &Device) -> Option<u8> {
    // Range-checked to 0..=100 at parse time.
    device.battery.map(|b| b.round().clamp(0.0, 100.0) as u8)
}

/// Thermometers only.
pub fn temperature(device: &Device) -> Option<f64> {
    device.termo_reading().and_then(|r| r.temperature)
}

/// Thermometers only.
pub fn humidity(device: &Device) -> Option<f64> {
    device.termo_reading().and_then(|r| r.humidity)
}

/// Pre-formatted cells for a device list row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRow {
    pub serial: String,
    pub name: String,
    pub status: DeviceStatus,
    pub label: &'static str,
    pub state: &'static str,
    pub battery: String,
    pub temperature: String,
    pub humidity: String,
    pub highlight: bool,
}

impl DeviceRow {
    pub fn build(device: &Device, locale: Locale, now: DateTime<Utc>) -> Self {
        let resolution = resolve_at(device, now).localized(locale);
        Self {
            serial: device.serial.clone(),
            name: device.display_name().to_owned(),
            status: resolution.status,
            label: resolution.label,
            state: state_text(device, locale),
            battery: battery_percent(device).map_or_else(|| PLACEHOLDER.into(), |b| format!("{b}%")),
            temperature: temperature(device)
                .map_or_else(|| PLACEHOLDER.into(), |t| format!("{t:.1} °C")),
            humidity: humidity(device).map_or_else(|| PLACEHOLDER.into(), |h| format!("{h:.0}%")),
            highlight: resolution.status.needs_attention(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceKind, FamilyState, PowerMode, TermoReading};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn device(mode: PowerMode) -> Device {
        Device {
            serial: "SN-1".into(),
            sigfox_id: None,
            kind: DeviceKind::Watch,
            mode,
            family_state: None,
            legacy_alarm: None,
            updated_on: None,
            battery: None,
            settings: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn with_state(mut d: Device, name: &str, is_alarm: bool) -> Device {
        d.family_state = Some(FamilyState {
            name: name.into(),
            is_alarm,
        });
        d
    }

    fn termo(temperature: Option<f64>) -> Device {
        let mut d = device(PowerMode::Armed);
        d.kind = DeviceKind::Termo {
            reading: Some(TermoReading {
                temperature,
                humidity: Some(55.0),
            }),
        };
        d
    }

    // ── Tier 1 ──

    #[test]
    fn powered_off_is_disconnected_regardless_of_alarm() {
        let mut d = with_state(device(PowerMode::Off), "ARMED", true);
        d.updated_on = Some(now());
        let r = resolve_at(&d, now());
        assert_eq!(r.status, DeviceStatus::Disconnected);
        assert_eq!(r.label, "Disconnected");
    }

    #[test]
    fn powered_off_termo_with_reading_is_disconnected() {
        let mut d = termo(Some(20.0));
        d.mode = PowerMode::Off;
        assert_eq!(resolve_at(&d, now()).status, DeviceStatus::Disconnected);
    }

    // ── Tier 2 ──

    #[test]
    fn alarm_wins_over_connected_state_name() {
        let d = with_state(device(PowerMode::Armed), "ARMED", true);
        let r = resolve_at(&d, now());
        assert_eq!(r.status, DeviceStatus::Alarm);
        assert_eq!(r.label, "Active Alarm");
    }

    #[test]
    fn resolution_label_follows_locale() {
        let d = with_state(device(PowerMode::Armed), "ARMED", true);
        let r = resolve_at(&d, now()).localized(Locale::Spanish);
        assert_eq!(r.status, DeviceStatus::Alarm);
        assert_eq!(r.label, "Alarma activa");
        assert_eq!(r.localized(Locale::English).label, "Active Alarm");
    }

    #[test]
    fn connected_state_names() {
        for name in ["OK", "ARMED", "MONITORING", " armed "] {
            let d = with_state(device(PowerMode::Armed), name, false);
            assert_eq!(resolve_at(&d, now()).status, DeviceStatus::Connected, "{name}");
        }
    }

    #[test]
    fn disconnected_state_names_beat_fresh_data() {
        for name in ["DISARMED", "OFF", "DISCONNECTED"] {
            let mut d = with_state(device(PowerMode::Armed), name, false);
            d.updated_on = Some(now());
            assert_eq!(
                resolve_at(&d, now()).status,
                DeviceStatus::Disconnected,
                "{name}"
            );
        }
    }

    #[test]
    fn unknown_state_name_falls_through() {
        let mut d = with_state(device(PowerMode::Armed), "CALIBRATING", false);
        d.updated_on = Some(now() - Duration::hours(1));
        assert_eq!(resolve_at(&d, now()).status, DeviceStatus::Connected);

        d.updated_on = Some(now() - Duration::hours(48));
        assert_eq!(resolve_at(&d, now()).status, DeviceStatus::Warning);
    }

    // ── Tier 3 ──

    #[test]
    fn termo_with_temperature_is_connected() {
        assert_eq!(
            resolve_at(&termo(Some(21.5)), now()).status,
            DeviceStatus::Connected
        );
    }

    #[test]
    fn termo_without_temperature_uses_recency() {
        let mut d = termo(None);
        assert_eq!(resolve_at(&d, now()).status, DeviceStatus::Warning);
        d.updated_on = Some(now() - Duration::minutes(5));
        assert_eq!(resolve_at(&d, now()).status, DeviceStatus::Connected);
    }

    // ── Tiers 4 and 5 ──

    #[test]
    fn recency_window() {
        let mut d = device(PowerMode::Armed);

        d.updated_on = Some(now() - Duration::hours(2));
        assert_eq!(resolve_at(&d, now()).status, DeviceStatus::Connected);

        d.updated_on = Some(now() - Duration::hours(30));
        let r = resolve_at(&d, now());
        assert_eq!(r.status, DeviceStatus::Warning);
        assert_eq!(r.label, "No recent data available");

        d.updated_on = Some(now() - Duration::hours(RECENT_WINDOW_HOURS));
        assert_eq!(resolve_at(&d, now()).status, DeviceStatus::Warning);

        d.updated_on = Some(now() + Duration::minutes(10));
        assert_eq!(resolve_at(&d, now()).status, DeviceStatus::Connected);
    }

    #[test]
    fn no_data_at_all_is_warning() {
        assert_eq!(
            resolve_at(&device(PowerMode::Armed), now()).status,
            DeviceStatus::Warning
        );
    }

    // ── Helpers ──

    #[test]
    fn needs_attention_matches_status() {
        for (d, expected) in [
            (device(PowerMode::Off), true),
            (with_state(device(PowerMode::Armed), "OK", true), true),
            (with_state(device(PowerMode::Armed), "OK", false), false),
            (device(PowerMode::Armed), false),
        ] {
            let status = resolve(&d).status;
            assert_eq!(needs_attention(&d), expected);
            assert_eq!(
                needs_attention(&d),
                matches!(status, DeviceStatus::Alarm | DeviceStatus::Disconnected)
            );
        }
    }

    #[test]
    fn state_text_localizes_known_names() {
        let d = with_state(device(PowerMode::Armed), "DISARMED", false);
        assert_eq!(state_text(&d, Locale::English), "Disarmed");
        assert_eq!(state_text(&d, Locale::Spanish), "Desarmado");

        let d = with_state(device(PowerMode::Armed), "LEAK", true);
        assert_eq!(state_text(&d, Locale::English), "Unknown state");
    }

    #[test]
    fn state_text_legacy_fallback() {
        let mut d = device(PowerMode::Armed);
        assert_eq!(state_text(&d, Locale::English), PLACEHOLDER);

        d.legacy_alarm = Some(true);
        assert_eq!(state_text(&d, Locale::English), "Alarm");

        d.legacy_alarm = Some(false);
        assert_eq!(state_text(&d, Locale::English), "Normal");
    }

    #[test]
    fn readings_only_for_termo() {
        let t = termo(Some(19.26));
        assert_eq!(temperature(&t), Some(19.26));
        assert_eq!(humidity(&t), Some(55.0));

        let w = device(PowerMode::Armed);
        assert_eq!(temperature(&w), None);
        assert_eq!(humidity(&w), None);
    }

    #[test]
    fn row_uses_placeholders() {
        let row = DeviceRow::build(&device(PowerMode::Armed), Locale::English, now());
        assert_eq!(row.battery, PLACEHOLDER);
        assert_eq!(row.temperature, PLACEHOLDER);
        assert_eq!(row.name, "SN-1");
        assert!(!row.highlight);

        let mut t = termo(Some(19.26));
        t.battery = Some(87.4);
        let row = DeviceRow::build(&t, Locale::Spanish, now());
        assert_eq!(row.battery, "87%");
        assert_eq!(row.temperature, "19.3 °C");
        assert_eq!(row.label, "Conectado");
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(DeviceStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(
            serde_json::to_string(&DeviceStatus::Alarm).unwrap(),
            "\"alarm\""
        );
    }
}
