// ── Refresh coordination ──
//
// `RefreshHub` is the subject the polling task and push notifications
// publish to; the visible device-list view is its single observer.
// `FetchGate` keeps at most one device-list fetch in flight, lets a newer
// mutation invalidate a response that is still on the wire, and remembers
// that the fetch has to run again once the current one is done.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use strum::Display;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Why a refresh was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RefreshTrigger {
    Poll,
    Notification,
    NotificationTap,
    Focus,
    Mutation,
    Manual,
}

type Callback = Box<dyn Fn(RefreshTrigger) + Send + Sync>;

struct Slot {
    id: u64,
    callback: Callback,
}

/// Single-slot observer registry for refresh requests.
///
/// Registering replaces any previous callback: only the view currently on
/// screen gets reloaded.
#[derive(Default)]
pub struct RefreshHub {
    slot: ArcSwapOption<Slot>,
    next_id: AtomicU64,
}

impl RefreshHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install `callback` as the refresh observer.
    ///
    /// The returned guard unregisters on drop, unless another callback has
    /// been registered since.
    pub fn register<F>(self: &Arc<Self>, callback: F) -> Registration
    where
        F: Fn(RefreshTrigger) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.slot.store(Some(Arc::new(Slot {
            id,
            callback: Box::new(callback),
        })));
        debug!(id, "refresh callback registered");
        Registration {
            hub: Arc::downgrade(self),
            id,
        }
    }

    fn unregister(&self, id: u64) {
        self.slot.rcu(|current| match current {
            Some(slot) if slot.id == id => None,
            other => other.clone(),
        });
    }

    pub fn is_registered(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Ask the registered view to reload. Returns `false` if nobody is
    /// listening.
    pub fn trigger(&self, reason: RefreshTrigger) -> bool {
        match self.slot.load_full() {
            Some(slot) => {
                debug!(%reason, "refresh triggered");
                (slot.callback)(reason);
                true
            }
            None => {
                debug!(%reason, "refresh requested with no observer");
                false
            }
        }
    }

    /// Trigger a [`RefreshTrigger::Poll`] every `period` until cancelled.
    pub fn spawn_polling(
        self: &Arc<Self>,
        period: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        hub.trigger(RefreshTrigger::Poll);
                    }
                }
            }
            debug!("refresh polling stopped");
        })
    }
}

/// Guard returned by [`RefreshHub::register`].
pub struct Registration {
    hub: Weak<RefreshHub>,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unregister(self.id);
        }
    }
}

// ── FetchGate ────────────────────────────────────────────────────────

/// At-most-one in-flight fetch, plus a generation counter for discarding
/// stale responses.
///
/// A refused [`try_begin`](Self::try_begin) or an [`invalidate`](Self::invalidate)
/// leaves a rerun request behind; the ticket holder collects it with
/// [`FetchTicket::finish`] and fetches again.
#[derive(Debug, Default)]
pub struct FetchGate {
    in_flight: AtomicBool,
    rerun: AtomicBool,
    generation: AtomicU64,
}

impl FetchGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. `None` if a fetch is already running, in which case
    /// the running fetch is asked to go again.
    pub fn try_begin(&self) -> Option<FetchTicket<'_>> {
        // Set before the exchange so a holder releasing concurrently still
        // sees it in `finish`.
        self.rerun.store(true, Ordering::SeqCst);
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        self.rerun.store(false, Ordering::SeqCst);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        Some(FetchTicket {
            gate: self,
            generation,
        })
    }

    /// Mark any in-flight response as stale and ask for another fetch.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.rerun.store(true, Ordering::SeqCst);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Proof of holding the fetch slot. Releases it on drop.
#[derive(Debug)]
pub struct FetchTicket<'a> {
    gate: &'a FetchGate,
    generation: u64,
}

impl FetchTicket<'_> {
    /// `false` once the gate was invalidated after this fetch began.
    pub fn is_current(&self) -> bool {
        self.gate.generation.load(Ordering::Acquire) == self.generation
    }

    /// Release the slot. Returns `true` if another fetch was requested
    /// while this one was running.
    pub fn finish(self) -> bool {
        let gate = self.gate;
        drop(self);
        gate.rerun.swap(false, Ordering::SeqCst)
    }
}

impl Drop for FetchTicket<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counting(hub: &Arc<RefreshHub>) -> (Registration, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let reg = hub.register(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (reg, count)
    }

    #[test]
    fn trigger_without_observer_is_noop() {
        let hub = RefreshHub::new();
        assert!(!hub.trigger(RefreshTrigger::Manual));
    }

    #[test]
    fn trigger_passes_reason() {
        let hub = RefreshHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let _reg = hub.register(move |reason| s.lock().unwrap().push(reason));

        assert!(hub.trigger(RefreshTrigger::Notification));
        assert!(hub.trigger(RefreshTrigger::Poll));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![RefreshTrigger::Notification, RefreshTrigger::Poll]
        );
    }

    #[test]
    fn newer_registration_replaces_older() {
        let hub = RefreshHub::new();
        let (first, first_count) = counting(&hub);
        let (_second, second_count) = counting(&hub);

        hub.trigger(RefreshTrigger::Focus);
        drop(first); // stale guard must not clear the newer observer
        hub.trigger(RefreshTrigger::Focus);

        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 2);
        assert!(hub.is_registered());
    }

    #[test]
    fn dropping_current_registration_clears_slot() {
        let hub = RefreshHub::new();
        let (reg, _) = counting(&hub);
        drop(reg);
        assert!(!hub.is_registered());
    }

    #[tokio::test(start_paused = true)]
    async fn polling_triggers_every_period() {
        let hub = RefreshHub::new();
        let (_reg, count) = counting(&hub);
        let cancel = CancellationToken::new();

        let handle = hub.spawn_polling(Duration::from_secs(300), cancel.clone());
        tokio::time::sleep(Duration::from_secs(601)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn gate_allows_one_fetch_at_a_time() {
        let gate = FetchGate::new();
        let ticket = gate.try_begin().unwrap();
        assert!(gate.is_in_flight());
        assert!(gate.try_begin().is_none());

        drop(ticket);
        assert!(!gate.is_in_flight());
        assert!(gate.try_begin().is_some());
    }

    #[test]
    fn invalidate_makes_ticket_stale() {
        let gate = FetchGate::new();
        let ticket = gate.try_begin().unwrap();
        assert!(ticket.is_current());

        gate.invalidate();
        assert!(!ticket.is_current());
        assert!(ticket.finish());
    }

    #[test]
    fn refused_begin_requests_rerun() {
        let gate = FetchGate::new();
        let ticket = gate.try_begin().unwrap();
        assert!(gate.try_begin().is_none());

        assert!(ticket.finish());
        assert!(!gate.is_in_flight());

        // Collected once; an undisturbed fetch finishes without rerun.
        let ticket = gate.try_begin().unwrap();
        assert!(ticket.is_current());
        assert!(!ticket.finish());
    }

    #[test]
    fn stale_rerun_request_is_cleared_by_next_begin() {
        let gate = FetchGate::new();
        gate.invalidate();
        let ticket = gate.try_begin().unwrap();
        assert!(!ticket.finish());
    }
}
