// Device API wire types
//
// Models for the JSON payloads exchanged with the device API. The server
// is inconsistent about field presence and shape (single snapshots arrive
// either as an object or as a one-element array), so nearly every field is
// optional and nothing here interprets values. Interpretation happens in
// `devwatch-core`, once, at the parse step.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ── Lenient building blocks ──────────────────────────────────────────

/// A value the server sends either bare or wrapped in an array.
///
/// Anything else (a string where an object belongs, say) is kept as
/// `Malformed` instead of failing the enclosing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
    Malformed(serde_json::Value),
}

impl<T> OneOrMany<T> {
    /// The bare value, or the first element of the array.
    pub fn first(&self) -> Option<&T> {
        match self {
            Self::Many(items) => items.first(),
            Self::One(item) => Some(item),
            Self::Malformed(_) => None,
        }
    }
}

/// A scalar that usually arrives as `T` but sometimes with another JSON
/// type (`"21.5"` for a number, `0` for a boolean).
///
/// Decoding never fails; `Raw` keeps the original value so the parse step
/// can coerce it or report it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Loose<T> {
    Typed(T),
    Raw(serde_json::Value),
}

impl<T> Loose<T> {
    /// The value, if it arrived with the expected type.
    pub fn typed(&self) -> Option<&T> {
        match self {
            Self::Typed(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

/// Identifier that may be a string or a number on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Text(String),
    Number(i64),
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Timestamp as sent by the server: epoch milliseconds or a date string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Millis(i64),
    Text(String),
    Other(serde_json::Value),
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a list element by element, dropping entries that don't fit `T`.
fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let items = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items,
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

// ── Device record ────────────────────────────────────────────────────

/// Server-side snapshot of one physical device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub sigfox_id: Option<String>,
    #[serde(default)]
    pub type_name: Option<Loose<String>>,
    /// `1` = powered/armed, anything else = off.
    #[serde(default)]
    pub mode_id: Option<Loose<i64>>,
    #[serde(default)]
    pub last_watch_family_data: Option<OneOrMany<WatchFamilyData>>,
    #[serde(default)]
    pub last_termo_data: Option<OneOrMany<TermoData>>,
    /// Legacy snapshot, only consulted when no family data exists.
    #[serde(default)]
    pub last_watch_data: Option<OneOrMany<WatchData>>,
    #[serde(default)]
    pub updated_on: Option<WireTimestamp>,
    #[serde(default)]
    pub battery: Option<OneOrMany<BatteryReading>>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub settings: Vec<DeviceSetting>,
    /// Catch-all for fields we don't model.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchFamilyData {
    #[serde(default)]
    pub state: Option<FamilyState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyState {
    #[serde(default)]
    pub state_name: Option<Loose<String>>,
    #[serde(default)]
    pub is_alarm: Option<Loose<bool>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermoData {
    #[serde(default)]
    pub temperature: Option<Loose<f64>>,
    #[serde(default)]
    pub humidity: Option<Loose<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchData {
    /// 0 = normal, 1 = alarm.
    #[serde(default)]
    pub alarm: Option<Loose<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryReading {
    #[serde(default)]
    pub charge_status: Option<Loose<f64>>,
}

/// One settings entry. The first entry of a device carries its
/// user-assigned name and the id used for rename operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSetting {
    #[serde(default, alias = "settingId")]
    pub id: Option<IdValue>,
    #[serde(default)]
    pub name: Option<String>,
}

// ── User ─────────────────────────────────────────────────────────────

/// Payload of `GET user/{id}`.
///
/// Device entries are kept as raw JSON so that a single malformed record
/// can be rejected without failing the whole list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub id: Option<IdValue>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub devices: Vec<serde_json::Value>,
}

impl UserProfile {
    /// Decode each device entry independently.
    pub fn device_records(&self) -> Vec<Result<DeviceRecord, serde_json::Error>> {
        self.devices
            .iter()
            .map(|raw| serde_json::from_value(raw.clone()))
            .collect()
    }
}

// ── Event history ────────────────────────────────────────────────────

/// One entry of `GET watchfamily`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchFamilyEvent {
    #[serde(default)]
    pub id: Option<IdValue>,
    #[serde(default)]
    pub sigfox_id: Option<String>,
    #[serde(default, alias = "updatedOn")]
    pub created_on: Option<WireTimestamp>,
    #[serde(default)]
    pub state: Option<FamilyState>,
    #[serde(default)]
    pub temperature: Option<Loose<f64>>,
    #[serde(default)]
    pub humidity: Option<Loose<f64>>,
    #[serde(default)]
    pub battery: Option<Loose<f64>>,
}

// ── Request bodies ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssociateDeviceBody<'a> {
    pub user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LanguageBody<'a> {
    pub language: &'a str,
}

/// Body of `PUT setting/{id}`. Only the populated fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceSettingsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DeviceSettingsUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}
