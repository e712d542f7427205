//! Domain layer between `devwatch-api` and app views.
//!
//! - **[`SessionController`]**: facade over one signed-in session. Holds the
//!   API client and identity provider, publishes device snapshots and UI
//!   language changes on `watch` channels, and runs background polling.
//!
//! - **Status derivation** ([`status`]): turns a [`Device`] into a
//!   [`DeviceStatus`] plus display strings, given the current time.
//!
//! - **Refresh coordination** ([`refresh`]): [`RefreshHub`] forwards poll and
//!   notification triggers to the visible view; [`FetchGate`] keeps a single
//!   device fetch in flight and drops responses made stale by a mutation.
//!
//! - **Domain model** ([`model`]): typed devices, events, and profiles,
//!   produced only by the validating conversions in [`convert`].

pub mod config;
pub mod convert;
pub mod error;
pub mod locale;
pub mod model;
pub mod notification;
pub mod preferences;
pub mod refresh;
pub mod session;
pub mod status;
pub mod validate;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ClientConfig;
pub use error::CoreError;
pub use locale::{Locale, Message};
pub use model::{Device, DeviceEvent, DeviceKind, FamilyState, PowerMode, Profile};
pub use notification::{Notification, NotificationEvent};
pub use preferences::{MemoryPreferences, PreferenceStore};
pub use refresh::{FetchGate, RefreshHub, RefreshTrigger, Registration};
pub use session::{DeviceSnapshot, RefreshOutcome, SessionController};
pub use status::{DeviceRow, DeviceStatus, Resolution};

pub use devwatch_api::AuthUser;
