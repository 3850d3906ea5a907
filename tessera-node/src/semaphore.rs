//! Per-transaction-reference semaphores: "block until delivered" (§9: "a
//! concurrent map plus a per-TR semaphore is the cleanest expression" of
//! the wait). One entry is created when a request is submitted, signaled
//! once by the delivery pipeline when the result — success or rejection —
//! is observable, and removed from the map on signal.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use tessera_types::TransactionReference;

#[derive(Clone, Copy, PartialEq, Eq)]
enum SignalState {
    Pending,
    Ready,
    /// The node is shutting down; no result will ever arrive
    /// ("Interruption of a polling thread surfaces as an
    /// `interrupted` outcome").
    Closed,
}

struct Signal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

impl Signal {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SignalState::Pending),
            condvar: Condvar::new(),
        })
    }

    fn set(&self, state: SignalState) {
        let mut guard = self.state.lock();
        if *guard == SignalState::Pending {
            *guard = state;
            self.condvar.notify_all();
        }
    }

    /// Blocks until the state leaves `Pending`. Returns `true` iff
    /// released by a real signal, `false` if released by a shutdown.
    fn wait(&self) -> bool {
        let mut guard = self.state.lock();
        while *guard == SignalState::Pending {
            self.condvar.wait(&mut guard);
        }
        *guard == SignalState::Ready
    }
}

/// The concurrent map of outstanding semaphores ("The semaphore map is
/// concurrent; entries are removed on signal.").
#[derive(Default)]
pub struct SemaphoreRegistry {
    inner: Mutex<HashMap<TransactionReference, Arc<Signal>>>,
}

impl SemaphoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh, unsignaled semaphore for `tr`
    /// ("creates a semaphore for TR"). If one already exists
    /// (a racing poller arrived first), returns the existing one instead
    /// of replacing it.
    pub fn register(&self, tr: TransactionReference) {
        self.inner.lock().entry(tr).or_insert_with(Signal::new);
    }

    fn acquire(&self, tr: TransactionReference) -> Arc<Signal> {
        self.inner.lock().entry(tr).or_insert_with(Signal::new).clone()
    }

    /// Signals `tr`'s semaphore, if one is outstanding, and removes it
    /// from the map.
    pub fn signal_and_remove(&self, tr: TransactionReference) {
        if let Some(signal) = self.inner.lock().remove(&tr) {
            signal.set(SignalState::Ready);
        }
    }

    /// Blocks the calling thread until `tr` is signaled. Used by
    /// `get_polled_response` ("acquires the semaphore").
    /// Returns `false` if the node closed while waiting.
    pub fn wait(&self, tr: TransactionReference) -> bool {
        let signal = self.acquire(tr);
        signal.wait()
    }

    /// Releases every outstanding waiter with a shutdown signal, without
    /// removing entries from the map (a concurrent `signal_and_remove`
    /// racing with `close` must still win if it observes `Pending` first).
    pub fn close_all(&self) {
        for signal in self.inner.lock().values() {
            signal.set(SignalState::Closed);
        }
    }
}
