//! Generation-keyed one-shot timers that report back to the coordinator.
//!
//! A timer is a spawned task that sleeps and then posts a [`TimerEvent`] on
//! the coordinator's command channel. Cancelling aborts the task and forgets
//! its generation, so a fire that was already in flight is rejected by
//! [`Timers::take_fired`].

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parlor_core::{RoomId, SessionToken};
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::AbortHandle;

use crate::coordinator::Command;

/// A timer that has fired.
#[derive(Debug)]
pub(crate) enum TimerEvent {
    /// A disconnected host's grace period ran out.
    Eviction {
        token: SessionToken,
        generation: u64,
    },
    /// An empty room's teardown grace period ran out.
    Teardown { room_id: RoomId, generation: u64 },
}

struct Pending {
    generation: u64,
    handle: AbortHandle,
}

/// Pending timers keyed by `K`, at most one per key.
pub(crate) struct Timers<K> {
    pending: HashMap<K, Pending>,
    next_generation: u64,
    sink: WeakUnboundedSender<Command>,
}

impl<K> Timers<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub(crate) fn new(sink: WeakUnboundedSender<Command>) -> Self {
        Self {
            pending: HashMap::new(),
            next_generation: 0,
            sink,
        }
    }

    /// Start (or restart) the timer for `key`.
    pub(crate) fn schedule<F>(&mut self, key: K, delay: Duration, event: F) -> u64
    where
        F: FnOnce(K, u64) -> TimerEvent + Send + 'static,
    {
        let _ = self.cancel(&key);
        self.next_generation += 1;
        let generation = self.next_generation;
        let sink = self.sink.clone();
        let fired_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = sink.upgrade() {
                let _ = tx.send(Command::Timer(event(fired_key, generation)));
            }
        })
        .abort_handle();
        let _ = self.pending.insert(key, Pending { generation, handle });
        generation
    }

    /// Cancel the timer for `key`. Returns whether one was pending.
    pub(crate) fn cancel(&mut self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Accept a fire if `generation` is the current one for `key`.
    pub(crate) fn take_fired(&mut self, key: &K, generation: u64) -> bool {
        match self.pending.get(key) {
            Some(pending) if pending.generation == generation => {
                let _ = self.pending.remove(key);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn cancel_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.handle.abort();
        }
    }

    /// Snapshot of `(key, generation)` for every pending timer.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> Vec<(K, u64)> {
        self.pending
            .iter()
            .map(|(k, p)| (k.clone(), p.generation))
            .collect()
    }
}

impl<K> Drop for Timers<K> {
    fn drop(&mut self) {
        for pending in self.pending.values() {
            pending.handle.abort();
        }
    }
}
