// ── User profile ──

use serde::{Deserialize, Serialize};

use super::device::Device;
use crate::locale::Locale;

/// The signed-in user's profile with their parsed devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    /// Server-side language preference, if it names a supported locale.
    pub language: Option<Locale>,
    pub devices: Vec<Device>,
    /// Number of device records rejected during parsing.
    pub rejected_devices: usize,
}
