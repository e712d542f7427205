// ── Client-side field checks ──
//
// Cheap checks run before anything is sent, so obviously bad input fails
// with `CoreError::Validation` instead of a server round-trip.

use crate::error::CoreError;

const MAX_NAME_LEN: usize = 64;
const MAX_SERIAL_LEN: usize = 64;

/// A plausible email address: one `@`, non-empty local part, dotted domain.
pub fn email(input: &str) -> Result<&str, CoreError> {
    let value = input.trim();
    let invalid = || CoreError::validation(format!("invalid email address: {value:?}"));

    if value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty()
        || domain.contains('@')
        || !domain.contains('.')
        || domain.starts_with('.')
        || domain.ends_with('.')
    {
        return Err(invalid());
    }
    Ok(value)
}

/// Device serial numbers are short ASCII alphanumerics plus the URL-safe
/// punctuation `-_.~`. All-dot values would collapse as a path segment.
pub fn serial(input: &str) -> Result<&str, CoreError> {
    let value = input.trim();
    if value.is_empty()
        || value.len() > MAX_SERIAL_LEN
        || value.chars().all(|c| c == '.')
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
    {
        return Err(CoreError::validation(format!(
            "invalid serial number: {value:?}"
        )));
    }
    Ok(value)
}

/// User-assigned device names.
pub fn device_name(input: &str) -> Result<&str, CoreError> {
    let value = input.trim();
    if value.is_empty() {
        return Err(CoreError::validation("device name cannot be empty"));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::validation(format!(
            "device name is longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(value)
}

pub fn password(input: &str) -> Result<&str, CoreError> {
    if input.is_empty() {
        return Err(CoreError::validation("password cannot be empty"));
    }
    Ok(input)
}
