// ── Wire → domain conversion ──
//
// The only place that interprets raw server records. Each record is
// validated once here; everything downstream works with typed values and
// never has to defend against missing fields again.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use devwatch_api::models::{
    DeviceRecord, FamilyState as WireFamilyState, Loose, OneOrMany, TermoData, UserProfile,
    WatchFamilyEvent, WireTimestamp,
};

use crate::error::CoreError;
use crate::locale::Locale;
use crate::model::{
    Device, DeviceEvent, DeviceKind, DeviceSetting, FamilyState, ParseIssue, PowerMode, Profile,
    TermoReading,
};

// ── Scalars ──────────────────────────────────────────────────────────

/// Parse a server timestamp. Naive date strings are taken as UTC.
pub(crate) fn parse_timestamp(ts: &WireTimestamp) -> Option<DateTime<Utc>> {
    match ts {
        WireTimestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms),
        WireTimestamp::Text(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        WireTimestamp::Other(_) => None,
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn number_from(raw: &Value) -> Option<f64> {
    match raw {
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn integer_from(raw: &Value) -> Option<i64> {
    match raw {
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn flag_from(raw: &Value) -> Option<bool> {
    match raw {
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn text_from(raw: &Value) -> Option<String> {
    match raw {
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read a lenient wire scalar. Values of the wrong JSON type go through
/// `coerce`; either way the defect is recorded in `issues`.
fn loose<T: Clone>(
    field: &str,
    value: Option<&Loose<T>>,
    coerce: fn(&Value) -> Option<T>,
    issues: &mut Vec<ParseIssue>,
) -> Option<T> {
    match value? {
        Loose::Typed(v) => Some(v.clone()),
        Loose::Raw(Value::Null) => None,
        Loose::Raw(raw) => {
            let coerced = coerce(raw);
            let (field, raw) = (field.to_owned(), raw.to_string());
            issues.push(if coerced.is_some() {
                ParseIssue::CoercedField { field, raw }
            } else {
                ParseIssue::InvalidField { field, raw }
            });
            coerced
        }
    }
}

/// A present state object always yields a state, even when empty, so the
/// legacy alarm field is only consulted for devices without one.
fn convert_family_state(state: &WireFamilyState, issues: &mut Vec<ParseIssue>) -> FamilyState {
    FamilyState {
        name: loose("stateName", state.state_name.as_ref(), text_from, issues).unwrap_or_default(),
        is_alarm: loose("isAlarm", state.is_alarm.as_ref(), flag_from, issues).unwrap_or(false),
    }
}

fn termo_reading(data: &TermoData, issues: &mut Vec<ParseIssue>) -> TermoReading {
    TermoReading {
        temperature: finite(loose(
            "temperature",
            data.temperature.as_ref(),
            number_from,
            issues,
        )),
        humidity: finite(loose("humidity", data.humidity.as_ref(), number_from, issues)),
    }
}

fn infer_kind(
    type_name: Option<&str>,
    record: &DeviceRecord,
    issues: &mut Vec<ParseIssue>,
) -> DeviceKind {
    match type_name.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
        Some("termo") => DeviceKind::Termo {
            reading: record
                .last_termo_data
                .as_ref()
                .and_then(OneOrMany::first)
                .map(|t| termo_reading(t, issues)),
        },
        Some("watch") => DeviceKind::Watch,
        _ => DeviceKind::Other {
            type_name: type_name.map(String::from),
        },
    }
}

// ── Device ───────────────────────────────────────────────────────────

/// Validate one server record into a [`Device`].
///
/// Records without a serial number are rejected. Everything else is
/// lenient: wrong-typed scalars are coerced where the intent is clear,
/// unusable fields become `None`, and both are noted in `issues`.
pub fn device_from_record(record: DeviceRecord) -> Result<Device, CoreError> {
    let serial = record
        .serial_number
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| CoreError::validation("device record has no serial number"))?
        .to_owned();

    let mut issues = Vec::new();

    let type_name = loose("typeName", record.type_name.as_ref(), text_from, &mut issues)
        .filter(|t| !t.trim().is_empty());
    if type_name.is_none() {
        issues.push(ParseIssue::MissingTypeName);
    }
    let kind = infer_kind(type_name.as_deref(), &record, &mut issues);

    let mode_id = loose("modeId", record.mode_id.as_ref(), integer_from, &mut issues);

    let family_state = record
        .last_watch_family_data
        .as_ref()
        .and_then(OneOrMany::first)
        .and_then(|d| d.state.as_ref())
        .map(|state| convert_family_state(state, &mut issues));

    let alarm = record
        .last_watch_data
        .as_ref()
        .and_then(OneOrMany::first)
        .and_then(|w| loose("alarm", w.alarm.as_ref(), integer_from, &mut issues));
    let legacy_alarm = match alarm {
        None => None,
        Some(0) => Some(false),
        Some(1) => Some(true),
        Some(other) => {
            issues.push(ParseIssue::InvalidLegacyAlarm(other));
            None
        }
    };

    let updated_on = record.updated_on.as_ref().and_then(|ts| {
        let parsed = parse_timestamp(ts);
        if parsed.is_none() {
            issues.push(ParseIssue::InvalidTimestamp(format!("{ts:?}")));
        }
        parsed
    });

    let charge = record
        .battery
        .as_ref()
        .and_then(OneOrMany::first)
        .and_then(|b| loose("chargeStatus", b.charge_status.as_ref(), number_from, &mut issues));
    let battery = charge.and_then(|charge| {
        if charge.is_finite() && (0.0..=100.0).contains(&charge) {
            Some(charge)
        } else {
            issues.push(ParseIssue::InvalidBattery(charge.to_string()));
            None
        }
    });

    let settings = record
        .settings
        .iter()
        .map(|s| DeviceSetting {
            id: s.id.as_ref().map(ToString::to_string),
            name: s.name.clone(),
        })
        .collect();

    if !issues.is_empty() {
        debug!(serial, ?issues, "device record parsed with issues");
    }

    Ok(Device {
        serial,
        sigfox_id: record.sigfox_id.filter(|s| !s.trim().is_empty()),
        kind,
        mode: PowerMode::from_mode_id(mode_id),
        family_state,
        legacy_alarm,
        updated_on,
        battery,
        settings,
        issues,
    })
}

/// Parse every device of a profile, dropping (and logging) rejects.
///
/// Returns the parsed devices and the number of rejected records.
pub fn devices_from_profile(profile: &UserProfile) -> (Vec<Device>, usize) {
    let mut devices = Vec::with_capacity(profile.devices.len());
    let mut rejected = 0;

    for (index, record) in profile.device_records().into_iter().enumerate() {
        let parsed = record
            .map_err(|e| CoreError::validation(format!("malformed device record: {e}")))
            .and_then(device_from_record);
        match parsed {
            Ok(device) => devices.push(device),
            Err(e) => {
                warn!(index, error = %e, "rejecting device record");
                rejected += 1;
            }
        }
    }

    (devices, rejected)
}

// ── Profile ──────────────────────────────────────────────────────────

pub fn profile_from_wire(user_id: &str, wire: &UserProfile) -> Profile {
    let (devices, rejected_devices) = devices_from_profile(wire);
    Profile {
        user_id: wire
            .id
            .as_ref()
            .map_or_else(|| user_id.to_owned(), ToString::to_string),
        email: wire.email.clone(),
        name: wire.name.clone(),
        language: wire.language.as_deref().and_then(Locale::from_tag),
        devices,
        rejected_devices,
    }
}

// ── Events ───────────────────────────────────────────────────────────

/// Events are display-only, so coercion defects are logged and dropped.
pub fn event_from_wire(event: &WatchFamilyEvent) -> DeviceEvent {
    let mut issues = Vec::new();
    let converted = DeviceEvent {
        id: event.id.as_ref().map(ToString::to_string),
        timestamp: event.created_on.as_ref().and_then(parse_timestamp),
        state: event
            .state
            .as_ref()
            .map(|state| convert_family_state(state, &mut issues)),
        temperature: finite(loose(
            "temperature",
            event.temperature.as_ref(),
            number_from,
            &mut issues,
        )),
        humidity: finite(loose("humidity", event.humidity.as_ref(), number_from, &mut issues)),
        battery: finite(loose("battery", event.battery.as_ref(), number_from, &mut issues)),
    };
    if !issues.is_empty() {
        debug!(id = ?converted.id, ?issues, "event parsed with issues");
    }
    converted
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: serde_json::Value) -> DeviceRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn termo_record_becomes_termo_kind() {
        let device = device_from_record(record(json!({
            "serialNumber": "TM-1",
            "typeName": "termo",
            "modeId": 1,
            "lastTermoData": [{ "temperature": 21.5, "humidity": 48 }],
            "battery": [{ "chargeStatus": 90 }],
            "settings": [{ "id": 5, "name": "Cellar" }]
        })))
        .unwrap();

        assert_eq!(
            device.kind,
            DeviceKind::Termo {
                reading: Some(TermoReading {
                    temperature: Some(21.5),
                    humidity: Some(48.0),
                })
            }
        );
        assert_eq!(device.mode, PowerMode::Armed);
        assert_eq!(device.battery, Some(90.0));
        assert_eq!(device.display_name(), "Cellar");
        assert_eq!(device.settings_id(), Some("5"));
        assert!(device.issues.is_empty());
    }

    #[test]
    fn termo_data_is_ignored_for_other_kinds() {
        let device = device_from_record(record(json!({
            "serialNumber": "WF-1",
            "typeName": "watch",
            "lastTermoData": { "temperature": 30 }
        })))
        .unwrap();

        assert_eq!(device.kind, DeviceKind::Watch);
        assert!(device.termo_reading().is_none());
    }

    #[test]
    fn missing_serial_is_rejected() {
        let result = device_from_record(record(json!({ "serialNumber": "  ", "modeId": 1 })));
        assert!(matches!(result, Err(CoreError::Validation { .. })));
    }

    #[test]
    fn defects_are_recorded_not_fatal() {
        let device = device_from_record(record(json!({
            "serialNumber": "X-1",
            "updatedOn": "yesterday-ish",
            "battery": { "chargeStatus": -4 },
            "lastWatchData": { "alarm": 7 }
        })))
        .unwrap();

        assert!(device.updated_on.is_none());
        assert!(device.battery.is_none());
        assert!(device.legacy_alarm.is_none());
        assert!(device.issues.contains(&ParseIssue::MissingTypeName));
        assert!(device.issues.contains(&ParseIssue::InvalidLegacyAlarm(7)));
        assert_eq!(device.issues.len(), 4);
    }

    #[test]
    fn timestamps_in_all_server_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 17, 8, 30, 0).unwrap();
        for ts in [
            WireTimestamp::Text("2026-10-17T08:30:00Z".into()),
            WireTimestamp::Text("2026-10-17T10:30:00+02:00".into()),
            WireTimestamp::Text("2026-10-17 08:30:00".into()),
            WireTimestamp::Text("2026-10-17T08:30:00.000".into()),
            WireTimestamp::Millis(expected.timestamp_millis()),
        ] {
            assert_eq!(parse_timestamp(&ts), Some(expected), "{ts:?}");
        }
    }

    #[test]
    fn empty_family_state_is_kept() {
        let device = device_from_record(record(json!({
            "serialNumber": "WF-2",
            "lastWatchFamilyData": { "state": {} },
            "lastWatchData": { "alarm": 1 }
        })))
        .unwrap();
        assert_eq!(
            device.family_state,
            Some(FamilyState {
                name: String::new(),
                is_alarm: false,
            })
        );
        assert_eq!(
            crate::status::state_text(&device, Locale::English),
            "Unknown state"
        );
    }

    #[test]
    fn wrong_typed_telemetry_is_coerced() {
        let device = device_from_record(record(json!({
            "serialNumber": "TM-2",
            "typeName": "termo",
            "modeId": "1",
            "lastTermoData": { "temperature": "21.5", "humidity": "n/a" },
            "lastWatchFamilyData": { "state": { "stateName": "OK", "isAlarm": 0 } },
            "battery": { "chargeStatus": "64" }
        })))
        .unwrap();

        assert_eq!(device.mode, PowerMode::Armed);
        assert_eq!(
            device.termo_reading(),
            Some(&TermoReading {
                temperature: Some(21.5),
                humidity: None,
            })
        );
        assert_eq!(device.family_state.as_ref().map(|s| s.is_alarm), Some(false));
        assert_eq!(device.battery, Some(64.0));
        assert!(device.issues.contains(&ParseIssue::CoercedField {
            field: "temperature".into(),
            raw: "\"21.5\"".into(),
        }));
        assert!(device.issues.contains(&ParseIssue::InvalidField {
            field: "humidity".into(),
            raw: "\"n/a\"".into(),
        }));
        assert!(device.issues.contains(&ParseIssue::CoercedField {
            field: "isAlarm".into(),
            raw: "0".into(),
        }));
        assert_eq!(device.issues.len(), 5);
    }

    #[test]
    fn profile_counts_rejected_devices() {
        let wire: UserProfile = serde_json::from_value(json!({
            "id": "u-1",
            "language": "es-ES",
            "devices": [
                { "serialNumber": "A" },
                { "typeName": "watch" },
                { "serialNumber": "B", "modeId": "nope" },
                "not-a-device"
            ]
        }))
        .unwrap();

        let profile = profile_from_wire("u-1", &wire);

        assert_eq!(profile.devices.len(), 2);
        assert_eq!(profile.rejected_devices, 2);
        let b = &profile.devices[1];
        assert_eq!(b.mode, PowerMode::Off);
        assert!(b.issues.contains(&ParseIssue::InvalidField {
            field: "modeId".into(),
            raw: "\"nope\"".into(),
        }));
        assert_eq!(profile.language, Some(Locale::Spanish));
    }
}
