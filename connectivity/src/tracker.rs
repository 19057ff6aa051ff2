//  Copyright 2026, The Netwatch Project
//
//  Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
//  following conditions are met:
//
//  1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
//  disclaimer.
//
//  2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
//  following disclaimer in the documentation and/or other materials provided with the distribution.
//
//  3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
//  products derived from this software without specific prior written permission.
//
//  THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
//  INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
//  DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
//  SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
//  SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
//  WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
//  USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use chrono::Utc;
use log::*;
use tokio::sync::watch;

use crate::{
    signal::{NetworkSignal, RegistrationId, SignalSource},
    state::ConnectivityState,
    watch::Watch,
};

const LOG_TARGET: &str = "connectivity::tracker";

type ChangeCallback = Arc<dyn Fn(&ConnectivityState) + Send + Sync>;

/// # Connectivity Tracker
///
/// Bridges the host's push-based availability signals into a pollable, subscribable
/// [`ConnectivityState`].
///
/// The tracker registers a single handler on the injected [`SignalSource`] when [`start`](Self::start)
/// is called and removes it on [`stop`](Self::stop). Each delivered signal produces a new immutable
/// snapshot which replaces the previous one and is pushed to every [`on_change`](Self::on_change)
/// callback in registration order. The host signal is authoritative; the tracker performs no probing
/// of its own, so a signal the host never delivers leaves the state stale until the next one arrives.
///
/// _Note_: The tracker stops itself when dropped, so a forgotten `stop()` cannot leak a handler
/// registration on the source.
pub struct ConnectivityTracker {
    source: Arc<dyn SignalSource>,
    shared: Arc<Shared>,
    registration: Option<RegistrationId>,
}

struct Shared {
    inner: Mutex<Inner>,
    status_watch: Watch<ConnectivityState>,
}

struct Inner {
    state: ConnectivityState,
    callbacks: Vec<(u64, ChangeCallback)>,
    next_callback_id: u64,
}

impl ConnectivityTracker {
    /// Creates a stopped tracker observing `source`. No handler is registered until
    /// [`start`](Self::start) is called.
    pub fn new(source: Arc<dyn SignalSource>) -> Self {
        let state = ConnectivityState::initial(source.is_available());
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state,
                callbacks: Vec::new(),
                next_callback_id: 0,
            }),
            status_watch: Watch::new(state),
        });
        Self {
            source,
            shared,
            registration: None,
        }
    }

    /// Registers the signal handler on the source and takes the source's current availability as
    /// the initial state (`last_changed` unset, since no transition has been observed yet).
    ///
    /// Idempotent with respect to the source: calling `start` on a started tracker is a no-op and
    /// never installs a duplicate handler.
    pub fn start(&mut self) {
        if self.registration.is_some() {
            debug!(target: LOG_TARGET, "start() called on a tracker that is already started");
            return;
        }

        let initial = ConnectivityState::initial(self.source.is_available());
        lock_inner(&self.shared.inner).state = initial;
        self.shared.status_watch.broadcast(initial);

        let shared = self.shared.clone();
        let id = self
            .source
            .subscribe(Box::new(move |signal| Shared::apply_transition(&shared, signal)));
        self.registration = Some(id);
        debug!(
            target: LOG_TARGET,
            "Connectivity tracker started (registration {}, initially {})", id, initial
        );
    }

    /// Removes the signal handler from the source. Safe to call without a prior `start` and safe
    /// to call repeatedly; extra calls are no-ops.
    ///
    /// After `stop`, further source signals produce no callbacks and [`state`](Self::state) keeps
    /// returning the last snapshot taken before the stop.
    pub fn stop(&mut self) {
        if let Some(id) = self.registration.take() {
            self.source.unsubscribe(id);
            debug!(target: LOG_TARGET, "Connectivity tracker stopped (registration {})", id);
        }
    }

    /// Returns the current snapshot. Never blocks on anything but the internal state lock and
    /// cannot fail.
    pub fn state(&self) -> ConnectivityState {
        lock_inner(&self.shared.inner).state
    }

    /// Registers `callback` to be invoked with every new snapshot, after all previously registered
    /// callbacks. The returned handle removes exactly this callback; dropping the handle without
    /// calling [`CallbackHandle::remove`] leaves the callback registered for the life of the
    /// tracker.
    pub fn on_change<F>(&self, callback: F) -> CallbackHandle
    where F: Fn(&ConnectivityState) + Send + Sync + 'static {
        let mut inner = lock_inner(&self.shared.inner);
        let id = inner.next_callback_id;
        inner.next_callback_id += 1;
        inner.callbacks.push((id, Arc::new(callback)));
        CallbackHandle {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }

    /// Returns a watch receiver that holds the latest snapshot, for consumers that prefer to
    /// `.changed().await` rather than install a callback. The watch is last-value-wins: a receiver
    /// that is slow to poll observes only the most recent of any intervening snapshots, unlike the
    /// callback path which sees every transition.
    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.shared.status_watch.get_receiver()
    }
}

impl Drop for ConnectivityTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn apply_transition(shared: &Arc<Shared>, signal: NetworkSignal) {
        let (state, callbacks) = {
            let mut inner = lock_inner(&shared.inner);
            let state = inner.state.transition(signal.is_available(), Utc::now());
            inner.state = state;
            // Snapshot the callback list: removals take effect for future transitions, never for
            // the one in progress.
            (state, inner.callbacks.clone())
        };
        trace!(target: LOG_TARGET, "Network signal {} processed ({})", signal, state);

        shared.status_watch.broadcast(state);

        // Callbacks run outside the state lock, in registration order. One panicking callback must
        // not prevent the rest from running.
        for (id, callback) in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&state))).is_err() {
                warn!(target: LOG_TARGET, "Connectivity change callback {} panicked", id);
            }
        }
    }
}

/// Handle to one registered `on_change` callback.
pub struct CallbackHandle {
    shared: Weak<Shared>,
    id: u64,
}

impl CallbackHandle {
    /// Deregisters the callback. Takes effect for all future transitions; a transition already in
    /// progress still delivers to the callback.
    pub fn remove(self) {
        if let Some(shared) = self.shared.upgrade() {
            lock_inner(&shared.inner).callbacks.retain(|(id, _)| *id != self.id);
        }
    }
}

/// Callback panics are caught before they can poison the lock, but a panic elsewhere on a thread
/// holding the guard must not wedge the tracker: the inner state is a plain value that is always
/// valid, so recover it rather than propagate the poison.
fn lock_inner(mutex: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::test_support::TestSignalSource;

    fn start_tracker(initially_available: bool) -> (TestSignalSource, ConnectivityTracker) {
        let source = TestSignalSource::new(initially_available);
        let mut tracker = ConnectivityTracker::new(Arc::new(source.clone()));
        tracker.start();
        (source, tracker)
    }

    #[test]
    fn initial_state_reflects_source() {
        let (_, tracker) = start_tracker(true);
        let state = tracker.state();
        assert!(state.is_available());
        assert!(state.last_changed().is_none());

        let (_, tracker) = start_tracker(false);
        assert!(!tracker.state().is_available());
    }

    #[test]
    fn transition_updates_state_and_timestamp() {
        let (source, tracker) = start_tracker(true);
        source.emit(NetworkSignal::Unavailable);
        let state = tracker.state();
        assert!(!state.is_available());
        assert!(state.last_changed().is_some());
    }

    #[test]
    fn timestamps_are_monotonic() {
        let (source, tracker) = start_tracker(false);
        let mut previous = None;
        for signal in [
            NetworkSignal::Available,
            NetworkSignal::Unavailable,
            NetworkSignal::Available,
            NetworkSignal::Unavailable,
        ] {
            source.emit(signal);
            let current = tracker.state().last_changed();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn callbacks_preserve_signal_order() {
        let (source, tracker) = start_tracker(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _handle = tracker.on_change(move |state| {
            seen_clone.lock().unwrap().push(state.is_available());
        });

        source.emit(NetworkSignal::Available);
        source.emit(NetworkSignal::Unavailable);
        source.emit(NetworkSignal::Available);

        assert_eq!(*seen.lock().unwrap(), vec![true, false, true]);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let (source, tracker) = start_tracker(false);
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_a = order.clone();
        let order_b = order.clone();
        let _first = tracker.on_change(move |_| order_a.lock().unwrap().push("first"));
        let _second = tracker.on_change(move |_| order_b.lock().unwrap().push("second"));

        source.emit(NetworkSignal::Available);
        source.emit(NetworkSignal::Unavailable);

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "first", "second"]);
    }

    #[test]
    fn no_transitions_are_coalesced() {
        let (source, tracker) = start_tracker(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let _handle = tracker.on_change(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        let n = 7;
        for _ in 0..n {
            source.emit(NetworkSignal::Unavailable);
            source.emit(NetworkSignal::Available);
        }
        assert_eq!(calls.load(Ordering::SeqCst), n * 2);
    }

    #[test]
    fn duplicate_signal_is_a_full_transition() {
        let (source, tracker) = start_tracker(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let _handle = tracker.on_change(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        source.emit(NetworkSignal::Available);
        let first = tracker.state().last_changed();
        source.emit(NetworkSignal::Available);
        let second = tracker.state().last_changed();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(second >= first);
    }

    #[test]
    fn start_is_idempotent() {
        let source = TestSignalSource::new(true);
        let mut tracker = ConnectivityTracker::new(Arc::new(source.clone()));
        tracker.start();
        tracker.start();
        assert_eq!(source.handler_count(), 1);
        assert_eq!(source.subscribe_calls(), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let source = TestSignalSource::new(true);
        let mut tracker = ConnectivityTracker::new(Arc::new(source.clone()));

        // stop without start is a no-op
        tracker.stop();
        assert_eq!(source.unsubscribe_calls(), 0);

        tracker.start();
        tracker.stop();
        tracker.stop();
        assert_eq!(source.unsubscribe_calls(), 1);
        assert_eq!(source.handler_count(), 0);
    }

    #[test]
    fn stop_freezes_state_and_silences_callbacks() {
        let (source, mut tracker) = start_tracker(true);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let _handle = tracker.on_change(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        source.emit(NetworkSignal::Unavailable);
        let frozen = tracker.state();
        tracker.stop();

        source.emit(NetworkSignal::Available);
        source.emit(NetworkSignal::Unavailable);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.state(), frozen);
    }

    #[test]
    fn panicking_callback_does_not_starve_others() {
        let (source, tracker) = start_tracker(true);
        let calls = Arc::new(AtomicUsize::new(0));

        let _bad = tracker.on_change(|_| panic!("callback failure"));
        let calls_clone = calls.clone();
        let _good = tracker.on_change(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        source.emit(NetworkSignal::Unavailable);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // tracker state reflects the transition despite the panic
        assert!(!tracker.state().is_available());

        // and the next transition is still delivered
        source.emit(NetworkSignal::Available);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn removed_callback_no_longer_fires() {
        let (source, tracker) = start_tracker(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let handle = tracker.on_change(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        source.emit(NetworkSignal::Available);
        handle.remove();
        source.emit(NetworkSignal::Unavailable);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_unsubscribes_from_source() {
        let source = TestSignalSource::new(true);
        {
            let mut tracker = ConnectivityTracker::new(Arc::new(source.clone()));
            tracker.start();
            assert_eq!(source.handler_count(), 1);
        }
        assert_eq!(source.handler_count(), 0);
        assert_eq!(source.unsubscribe_calls(), 1);
    }

    #[tokio::test]
    async fn watch_receiver_sees_latest_snapshot() {
        let (source, tracker) = start_tracker(false);
        let mut rx = tracker.watch();
        assert!(!rx.borrow().is_available());

        source.emit(NetworkSignal::Available);
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_available());
    }
}
