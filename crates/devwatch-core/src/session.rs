// ── Session controller ──
//
// Owns everything a signed-in app session needs: the API client, the
// identity provider, local preferences, the current device snapshot, and
// the background polling task. Views subscribe to `watch` channels instead
// of holding their own copies of server state.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use devwatch_api::models::DeviceSettingsUpdate;
use devwatch_api::{ApiClient, AuthUser, IdentityProvider, TransportConfig};

use crate::config::ClientConfig;
use crate::convert;
use crate::error::CoreError;
use crate::locale::Locale;
use crate::model::{Device, DeviceEvent, Profile};
use crate::notification::NotificationEvent;
use crate::preferences::{LANGUAGE_KEY, PreferenceStore};
use crate::refresh::{FetchGate, RefreshHub, RefreshTrigger, Registration};
use crate::status::DeviceRow;
use crate::validate;

// ── Snapshot ─────────────────────────────────────────────────────────

/// The last successfully fetched device list.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    pub devices: Vec<Device>,
    /// Server records that failed validation and were left out.
    pub rejected: usize,
    /// `None` until the first fetch completes.
    pub fetched_at: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    pub fn find(&self, serial: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.serial == serial)
    }
}

/// Result of [`SessionController::refresh_devices`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The snapshot was replaced; carries the new device count.
    Updated(usize),
    /// Another fetch was already running. Nothing was sent; the running
    /// fetch will go again.
    AlreadyInFlight,
    /// A mutation or sign-out happened while the last fetch was on the
    /// wire and no further fetch was possible, so the response was dropped.
    Discarded,
}

// ── SessionController ────────────────────────────────────────────────

/// Entry point for app code.
///
/// Cheaply cloneable via `Arc<SessionInner>`. Constructing one restores
/// the persisted UI language without touching the network; call
/// [`start()`](Self::start) to begin background polling.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: ClientConfig,
    api: ApiClient,
    preferences: Arc<dyn PreferenceStore>,
    hub: Arc<RefreshHub>,
    gate: FetchGate,
    snapshot: watch::Sender<Arc<DeviceSnapshot>>,
    locale: watch::Sender<Locale>,
    /// Cancelled on `shutdown`, replaced on the next `start`.
    cancel: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionController {
    /// Build a controller with its own HTTP client.
    pub fn new(
        config: ClientConfig,
        identity: Arc<dyn IdentityProvider>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Result<Self, CoreError> {
        let transport = TransportConfig::default().with_timeout(config.timeout);
        let api = ApiClient::new(config.api_url.clone(), identity, &transport)?;
        Ok(Self::with_api_client(config, api, preferences))
    }

    /// Build a controller around an existing [`ApiClient`].
    pub fn with_api_client(
        config: ClientConfig,
        api: ApiClient,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        let locale = restore_locale(preferences.as_ref());
        debug!(%locale, "restored UI language");

        let (snapshot, _) = watch::channel(Arc::new(DeviceSnapshot::default()));
        let (locale, _) = watch::channel(locale);

        Self {
            inner: Arc::new(SessionInner {
                config,
                api,
                preferences,
                hub: RefreshHub::new(),
                gate: FetchGate::new(),
                snapshot,
                locale,
                cancel: Mutex::new(CancellationToken::new()),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    fn identity(&self) -> &Arc<dyn IdentityProvider> {
        self.inner.api.identity()
    }

    /// The subject polling and notifications publish refresh requests to.
    pub fn refresh_hub(&self) -> &Arc<RefreshHub> {
        &self.inner.hub
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the background polling task. Calling twice is harmless.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;
        if !handles.is_empty() {
            debug!("session already started");
            return;
        }

        let period = self.inner.config.poll_interval;
        if period.is_zero() {
            info!("background polling disabled");
            return;
        }

        let cancel = {
            let mut slot = self.inner.cancel.lock().await;
            if slot.is_cancelled() {
                *slot = CancellationToken::new();
            }
            slot.child_token()
        };
        handles.push(self.inner.hub.spawn_polling(period, cancel));
        info!(period_secs = period.as_secs(), "background polling started");
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("session shut down");
    }

    /// Register a refresh observer that reloads the device list.
    ///
    /// Must be called from within a Tokio runtime; the reload runs on that
    /// runtime whichever thread the trigger comes from. Drop the guard to
    /// stop reloading (e.g. when the list view leaves the screen).
    pub fn attach_device_list(&self) -> Result<Registration, CoreError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::Unknown(format!("no async runtime: {e}")))?;
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);

        Ok(self.inner.hub.register(move |reason| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let session = SessionController { inner };
            runtime.spawn(async move {
                match session.refresh_devices().await {
                    Ok(outcome) => debug!(%reason, ?outcome, "device list reload finished"),
                    Err(e) => warn!(%reason, error = %e, "device list reload failed"),
                }
            });
        }))
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub async fn current_user(&self) -> Option<AuthUser> {
        self.identity().current_user().await
    }

    async fn require_user(&self) -> Result<AuthUser, CoreError> {
        self.current_user().await.ok_or(CoreError::NoSession)
    }

    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<AuthUser, CoreError> {
        let email = validate::email(email)?;
        let user = self.identity().sign_in(email, password).await?;
        info!(user_id = %user.user_id, "signed in");
        Ok(user)
    }

    /// End the session and forget everything fetched under it.
    pub async fn sign_out(&self) {
        self.identity().sign_out().await;
        self.inner.gate.invalidate();
        self.inner
            .snapshot
            .send_replace(Arc::new(DeviceSnapshot::default()));
        info!("signed out");
    }

    /// Change the password after re-checking the current one.
    pub async fn change_password(
        &self,
        current: &SecretString,
        new_password: &SecretString,
    ) -> Result<(), CoreError> {
        use secrecy::ExposeSecret;

        validate::password(new_password.expose_secret())?;
        self.require_user().await?;
        self.identity().reauthenticate(current).await?;
        self.identity().change_password(new_password).await?;
        info!("password changed");
        Ok(())
    }

    /// Change the account email after re-checking the password.
    pub async fn change_email(
        &self,
        password: &SecretString,
        new_email: &str,
    ) -> Result<(), CoreError> {
        let new_email = validate::email(new_email)?;
        self.require_user().await?;
        self.identity().reauthenticate(password).await?;
        self.identity().change_email(new_email).await?;
        info!("account email changed");
        Ok(())
    }

    pub async fn send_password_reset(&self, email: &str) -> Result<(), CoreError> {
        let email = validate::email(email)?;
        self.identity().send_password_reset(email).await?;
        Ok(())
    }

    // ── Language ─────────────────────────────────────────────────────

    /// The active UI language.
    pub fn locale(&self) -> Locale {
        *self.inner.locale.borrow()
    }

    /// Subscribe to UI language changes.
    pub fn locale_changes(&self) -> watch::Receiver<Locale> {
        self.inner.locale.subscribe()
    }

    /// Switch the UI language.
    ///
    /// The choice is persisted and published locally before the server is
    /// told, so it survives a failed or offline request. A missing session
    /// still returns [`CoreError::NoSession`] after the local change.
    pub async fn change_language(&self, locale: Locale) -> Result<(), CoreError> {
        self.inner.preferences.set(LANGUAGE_KEY, locale.code())?;
        self.inner.locale.send_if_modified(|current| {
            let changed = *current != locale;
            *current = locale;
            changed
        });
        info!(%locale, "UI language changed");

        let user = self.require_user().await?;
        self.inner
            .api
            .change_language(locale.code(), &user.user_id)
            .await?;
        Ok(())
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// Subscribe to device list snapshots.
    pub fn devices(&self) -> watch::Receiver<Arc<DeviceSnapshot>> {
        self.inner.snapshot.subscribe()
    }

    pub fn devices_snapshot(&self) -> Arc<DeviceSnapshot> {
        Arc::clone(&self.inner.snapshot.borrow())
    }

    /// Display rows for the current snapshot in the active language.
    pub fn device_rows(&self) -> Vec<DeviceRow> {
        let locale = self.locale();
        let now = Utc::now();
        self.devices_snapshot()
            .devices
            .iter()
            .map(|device| DeviceRow::build(device, locale, now))
            .collect()
    }

    /// Fetch the full user profile, devices included.
    pub async fn profile(&self) -> Result<Profile, CoreError> {
        let user = self.require_user().await?;
        let wire = self.inner.api.get_user_data(&user.user_id, None).await?;
        Ok(convert::profile_from_wire(&user.user_id, &wire))
    }

    /// Re-fetch the device list and publish a new snapshot.
    ///
    /// A caller that finds a fetch already running leaves a rerun request
    /// instead of waiting. The running caller then fetches again until no
    /// request is pending, so a mutation made mid-fetch always ends in a
    /// fresh snapshot. Returns the outcome of the last attempt.
    pub async fn refresh_devices(&self) -> Result<RefreshOutcome, CoreError> {
        let mut last: Option<RefreshOutcome> = None;

        loop {
            let user = match (self.require_user().await, last) {
                (Ok(user), _) => user,
                (Err(e), None) => return Err(e),
                // Signed out between attempts.
                (Err(_), Some(outcome)) => return Ok(outcome),
            };

            let Some(ticket) = self.inner.gate.try_begin() else {
                debug!("device fetch already in flight, rerun requested");
                return Ok(last.unwrap_or(RefreshOutcome::AlreadyInFlight));
            };

            let wire = self
                .inner
                .api
                .get_user_data(&user.user_id, self.inner.config.device_scope.as_deref())
                .await?;
            let profile = convert::profile_from_wire(&user.user_id, &wire);

            let outcome = if ticket.is_current() {
                let count = profile.devices.len();
                self.inner.snapshot.send_replace(Arc::new(DeviceSnapshot {
                    devices: profile.devices,
                    rejected: profile.rejected_devices,
                    fetched_at: Some(Utc::now()),
                }));
                info!(count, rejected = profile.rejected_devices, "device list refreshed");
                RefreshOutcome::Updated(count)
            } else {
                debug!("device list changed during fetch, discarding response");
                RefreshOutcome::Discarded
            };
            last = Some(outcome);

            if !ticket.finish() {
                return Ok(outcome);
            }
            debug!(?outcome, "device list requested again during fetch");
        }
    }

    /// Add a device to the signed-in account.
    pub async fn associate_device(&self, serial: &str, name: Option<&str>) -> Result<(), CoreError> {
        let serial = validate::serial(serial)?;
        let name = name.map(validate::device_name).transpose()?;
        let user = self.require_user().await?;

        self.inner
            .api
            .associate_device(&user.user_id, serial, name)
            .await?;
        info!(serial, "device associated");
        self.after_mutation();
        Ok(())
    }

    /// Remove a device from the signed-in account.
    pub async fn dissociate_device(&self, serial: &str) -> Result<(), CoreError> {
        let serial = validate::serial(serial)?;
        let user = self.require_user().await?;

        self.inner
            .api
            .dissociate_device(&user.user_id, serial)
            .await?;
        info!(serial, "device dissociated");
        self.after_mutation();
        Ok(())
    }

    /// Rename a device through its settings entry.
    pub async fn rename_device(&self, device: &Device, name: &str) -> Result<(), CoreError> {
        let name = validate::device_name(name)?;
        let setting_id = device.settings_id().ok_or_else(|| {
            CoreError::validation(format!("device {} has no settings entry", device.serial))
        })?;
        self.require_user().await?;

        self.inner
            .api
            .update_device_settings(setting_id, &DeviceSettingsUpdate::rename(name))
            .await?;
        info!(serial = %device.serial, "device renamed");
        self.after_mutation();
        Ok(())
    }

    /// Recent events of a device, as returned by the server.
    ///
    /// `limit` falls back to the configured history size.
    pub async fn event_history(
        &self,
        device: &Device,
        limit: Option<u32>,
    ) -> Result<Vec<DeviceEvent>, CoreError> {
        let sigfox_id = device.sigfox_id.as_deref().ok_or_else(|| {
            CoreError::validation(format!("device {} has no radio id", device.serial))
        })?;
        self.require_user().await?;

        let limit = limit.unwrap_or(self.inner.config.history_limit);
        let events = self
            .inner
            .api
            .event_history(sigfox_id, Some(limit))
            .await?;
        Ok(events.iter().map(convert::event_from_wire).collect())
    }

    /// Any in-flight list fetch is now stale; ask the view to reload.
    fn after_mutation(&self) {
        self.inner.gate.invalidate();
        self.inner.hub.trigger(RefreshTrigger::Mutation);
    }

    // ── Notifications ────────────────────────────────────────────────

    /// Feed a push notification in from the host app.
    ///
    /// Both kinds trigger a reload. A tap also returns the serial number of
    /// the device it refers to, so the app can open that device.
    pub fn handle_notification(&self, event: &NotificationEvent) -> Option<String> {
        match event {
            NotificationEvent::Received(notification) => {
                debug!(title = ?notification.title, "notification received");
                self.inner.hub.trigger(RefreshTrigger::Notification);
                None
            }
            NotificationEvent::Tapped(notification) => {
                debug!(title = ?notification.title, "notification tapped");
                self.inner.hub.trigger(RefreshTrigger::NotificationTap);
                notification.serial().map(str::to_owned)
            }
        }
    }
}

fn restore_locale(preferences: &dyn PreferenceStore) -> Locale {
    preferences
        .get(LANGUAGE_KEY)
        .and_then(|tag| Locale::from_tag(&tag))
        .unwrap_or_default()
}
