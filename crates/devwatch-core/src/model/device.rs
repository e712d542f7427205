// ── Device domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Power mode reported by the server (`modeId`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerMode {
    /// `modeId == 1`.
    Armed,
    /// Any other `modeId`, or none at all.
    Off,
}

impl PowerMode {
    pub fn from_mode_id(mode_id: Option<i64>) -> Self {
        match mode_id {
            Some(1) => Self::Armed,
            _ => Self::Off,
        }
    }

    pub fn is_armed(self) -> bool {
        matches!(self, Self::Armed)
    }
}

/// Latest temperature/humidity reading of a thermometer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TermoReading {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

/// Device family, selected by the server's `typeName`.
///
/// Thermometer readings only exist on the `Termo` variant, so they can't be
/// consulted for any other kind of device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DeviceKind {
    Termo { reading: Option<TermoReading> },
    Watch,
    Other { type_name: Option<String> },
}

impl DeviceKind {
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Termo { .. } => Some("termo"),
            Self::Watch => Some("watch"),
            Self::Other { type_name } => type_name.as_deref(),
        }
    }

    pub fn is_termo(&self) -> bool {
        matches!(self, Self::Termo { .. })
    }
}

/// Well-known raw state names of the family-state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum StateName {
    Ok,
    Armed,
    Monitoring,
    Disarmed,
    Off,
    Disconnected,
}

/// Most recent state snapshot (`lastWatchFamilyData.state`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyState {
    /// Raw state name as sent by the server (may be empty).
    pub name: String,
    pub is_alarm: bool,
}

impl FamilyState {
    /// The state name if it is one we recognize.
    pub fn known_name(&self) -> Option<StateName> {
        self.name.trim().parse().ok()
    }
}

/// First settings entry: the user-assigned name plus the id used for
/// rename operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSetting {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// A recoverable defect found while parsing a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseIssue {
    InvalidTimestamp(String),
    InvalidBattery(String),
    InvalidLegacyAlarm(i64),
    MissingTypeName,
    /// The field arrived with the wrong JSON type and was converted.
    CoercedField { field: String, raw: String },
    /// The field arrived with the wrong JSON type and was dropped.
    InvalidField { field: String, raw: String },
}

/// The canonical Device type, parsed once from a server record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub serial: String,
    pub sigfox_id: Option<String>,
    pub kind: DeviceKind,
    pub mode: PowerMode,

    // Telemetry
    pub family_state: Option<FamilyState>,
    /// Legacy `lastWatchData.alarm`, only used when no family state exists.
    pub legacy_alarm: Option<bool>,
    pub updated_on: Option<DateTime<Utc>>,
    /// Battery charge, 0-100.
    pub battery: Option<f64>,

    // Configuration
    pub settings: Vec<DeviceSetting>,

    // Metadata
    pub issues: Vec<ParseIssue>,
}

impl Device {
    /// The user-assigned name, falling back to the serial number.
    pub fn display_name(&self) -> &str {
        self.settings
            .first()
            .and_then(|s| s.name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.serial)
    }

    /// The settings id used by rename operations.
    pub fn settings_id(&self) -> Option<&str> {
        self.settings.first().and_then(|s| s.id.as_deref())
    }

    pub fn termo_reading(&self) -> Option<&TermoReading> {
        match &self.kind {
            DeviceKind::Termo { reading } => reading.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_mode_only_one_is_armed() {
        assert_eq!(PowerMode::from_mode_id(Some(1)), PowerMode::Armed);
        assert_eq!(PowerMode::from_mode_id(Some(0)), PowerMode::Off);
        assert_eq!(PowerMode::from_mode_id(Some(2)), PowerMode::Off);
        assert_eq!(PowerMode::from_mode_id(None), PowerMode::Off);
    }

    #[test]
    fn state_names_parse_case_insensitively() {
        assert_eq!("ARMED".parse::<StateName>().ok(), Some(StateName::Armed));
        assert_eq!("monitoring".parse::<StateName>().ok(), Some(StateName::Monitoring));
        assert_eq!(StateName::Disconnected.as_ref(), "DISCONNECTED");
        assert!("LEAK".parse::<StateName>().is_err());
    }
}
