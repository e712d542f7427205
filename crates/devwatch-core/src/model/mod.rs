// ── Domain model ──
//
// Canonical types produced by the single validated parse step in
// `convert`. UI code only ever sees these, never the wire records.

pub mod device;
pub mod event;
pub mod user;

pub use device::{
    Device, DeviceKind, DeviceSetting, FamilyState, ParseIssue, PowerMode, StateName,
    TermoReading,
};
pub use event::DeviceEvent;
pub use user::Profile;
