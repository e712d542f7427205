// devwatch-api: Async client for the devwatch device API and identity provider

pub mod client;
pub mod devices;
pub mod error;
pub mod events;
pub mod identity;
pub mod models;
pub mod transport;
pub mod user;

pub use client::{ApiClient, RequestOptions};
pub use error::{Error, ErrorKind};
pub use identity::{AuthUser, IdentityEndpoints, IdentityProvider, RestIdentityProvider};
pub use models::{DeviceRecord, DeviceSettingsUpdate, UserProfile, WatchFamilyEvent};
pub use transport::TransportConfig;
