//! In-flight request coalescing.
//!
//! When several batches need the same uncached tile at the same time, only
//! one transport request is made. The first caller becomes the *leader* and
//! performs the fetch; later callers become *followers* and wait for the
//! leader's result on a broadcast channel.
//!
//! ```text
//! resolve(A) ─┐
//!             │                        leader
//! resolve(B) ─┼──► RequestCoalescer ──────────► transport + decode
//!             │         │                              │
//! resolve(C) ─┘         ▼                              │
//!               followers wait on ◄────────────────────┘
//!               the same result
//! ```
//!
//! If a leader is dropped before completing (its future was cancelled), its
//! flight is removed and followers see a closed channel; they then retry
//! registration and one of them takes over.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

use crate::cache::TileKey;
use crate::error::ElevationError;
use crate::tile::TileData;

/// Result shared between a leader and its followers.
pub(crate) type FlightResult = Result<TileData, ElevationError>;

/// Tracks in-flight tile fetches keyed by [`TileKey`].
#[derive(Debug, Default)]
pub(crate) struct RequestCoalescer {
    in_flight: Mutex<HashMap<TileKey, broadcast::Sender<FlightResult>>>,
    leaders: AtomicU64,
    coalesced: AtomicU64,
}

/// Role assigned to a caller by [`RequestCoalescer::register`].
pub(crate) enum Registration<'a> {
    /// Perform the fetch and hand the outcome to [`FlightGuard::complete`].
    Leader(FlightGuard<'a>),
    /// Wait on the receiver for the leader's outcome.
    Follower(broadcast::Receiver<FlightResult>),
}

impl RequestCoalescer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TileKey, broadcast::Sender<FlightResult>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Join the flight for `key`, or start one.
    pub(crate) fn register(&self, key: &TileKey) -> Registration<'_> {
        let mut in_flight = self.lock();

        if let Some(sender) = in_flight.get(key) {
            let coalesced = self.coalesced.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(key = %key, coalesced, "joining in-flight tile fetch");
            return Registration::Follower(sender.subscribe());
        }

        // One result per flight
        let (sender, _) = broadcast::channel(1);
        in_flight.insert(key.clone(), sender.clone());
        self.leaders.fetch_add(1, Ordering::Relaxed);

        Registration::Leader(FlightGuard {
            coalescer: self,
            key: key.clone(),
            sender: Some(sender),
        })
    }

    /// Number of callers that joined an existing flight.
    pub(crate) fn coalesced_count(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Number of flights started.
    pub(crate) fn leader_count(&self) -> u64 {
        self.leaders.load(Ordering::Relaxed)
    }

    /// Number of flights currently in progress.
    pub(crate) fn in_flight_count(&self) -> usize {
        self.lock().len()
    }
}

/// Leadership of one in-flight fetch.
///
/// Dropping the guard without calling [`FlightGuard::complete`] abandons the
/// flight.
pub(crate) struct FlightGuard<'a> {
    coalescer: &'a RequestCoalescer,
    key: TileKey,
    sender: Option<broadcast::Sender<FlightResult>>,
}

impl FlightGuard<'_> {
    /// Finish the flight and broadcast `result` to every follower.
    pub(crate) fn complete(mut self, result: FlightResult) {
        self.coalescer.lock().remove(&self.key);

        if let Some(sender) = self.sender.take() {
            let waiters = sender.receiver_count();
            // No receivers is fine: nobody joined this flight
            let _ = sender.send(result);
            if waiters > 0 {
                debug!(key = %self.key, waiters, "broadcast tile to coalesced waiters");
            }
        }
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.sender.take().is_some() {
            debug!(key = %self.key, "abandoning in-flight tile fetch");
            self.coalescer.lock().remove(&self.key);
        }
    }
}
