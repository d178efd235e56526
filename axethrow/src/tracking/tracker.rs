//! Entity lifecycle tracking.
//!
//! The [`EntityTracker`] owns the polling cadence of an [`EntitySource`],
//! diffs each new snapshot against the retained one and fans the resulting
//! [`TrackerEvent`]s out to subscribers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use axethrow_core::Vec3;
use dashmap::DashMap;
use indexmap::IndexMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::feed::{EntitySource, Snapshot};
use crate::observability::metrics;

// ============================================================================
// Types
// ============================================================================

/// One entity present in the current snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntity {
    /// External id reported by the world.
    pub id: String,
    /// Last observed position.
    pub position: Vec3,
    /// When the id first appeared. Carried over while the id stays present.
    pub first_seen_at: Instant,
}

/// Entity id → entity, in discovery order.
pub type EntitySnapshot = IndexMap<String, TrackedEntity>;

/// Kinds of tracker events a subscriber can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackerEventKind {
    Created,
    Destroyed,
    Update,
}

/// A lifecycle event derived from two consecutive snapshots.
#[derive(Debug, Clone)]
pub enum TrackerEvent {
    /// An id appeared.
    Created(TrackedEntity),
    /// An id disappeared. Carries the last known entity data.
    Destroyed(TrackedEntity),
    /// Sent once per cycle after all lifecycle events.
    Update(Arc<EntitySnapshot>),
}

impl TrackerEvent {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> TrackerEventKind {
        match self {
            Self::Created(_) => TrackerEventKind::Created,
            Self::Destroyed(_) => TrackerEventKind::Destroyed,
            Self::Update(_) => TrackerEventKind::Update,
        }
    }
}

/// Handle returned by [`EntityTracker::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    /// Id to pass to [`EntityTracker::unsubscribe`].
    pub id: u64,
    /// Events of the requested kinds, in emission order.
    pub events: mpsc::UnboundedReceiver<TrackerEvent>,
}

struct Subscriber {
    kinds: HashSet<TrackerEventKind>,
    tx: mpsc::UnboundedSender<TrackerEvent>,
}

// ============================================================================
// Diffing
// ============================================================================

/// Diffs `observed` against `previous`.
///
/// Returns the next snapshot and the events for this cycle: every
/// `Destroyed`, then every `Created`, then one `Update`.
#[must_use]
pub fn diff(
    previous: &EntitySnapshot,
    observed: Snapshot,
    now: Instant,
) -> (Arc<EntitySnapshot>, Vec<TrackerEvent>) {
    let mut events = Vec::new();

    for (id, entity) in previous {
        if !observed.contains_key(id) {
            events.push(TrackerEvent::Destroyed(entity.clone()));
        }
    }

    let mut next = EntitySnapshot::with_capacity(observed.len());
    for (id, position) in observed {
        let entity = match previous.get(&id) {
            Some(known) => TrackedEntity {
                id: id.clone(),
                position,
                first_seen_at: known.first_seen_at,
            },
            None => {
                let entity = TrackedEntity {
                    id: id.clone(),
                    position,
                    first_seen_at: now,
                };
                events.push(TrackerEvent::Created(entity.clone()));
                entity
            }
        };
        next.insert(id, entity);
    }

    let next = Arc::new(next);
    events.push(TrackerEvent::Update(Arc::clone(&next)));
    (next, events)
}

// ============================================================================
// Tracker
// ============================================================================

/// Polls an [`EntitySource`] on a fixed cadence and publishes lifecycle
/// events.
///
/// Cycles never overlap: a poll that outlasts the interval delays the next
/// tick. A failed poll keeps the retained snapshot and emits nothing.
pub struct EntityTracker {
    source: Arc<dyn EntitySource>,
    interval: Duration,
    subscribers: DashMap<u64, Subscriber>,
    next_subscriber: AtomicU64,
    current: RwLock<Arc<EntitySnapshot>>,
    /// Held while a cycle publishes, so `stop` can wait it out.
    publish: Mutex<()>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for EntityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityTracker")
            .field("interval", &self.interval)
            .field("subscribers", &self.subscribers.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl EntityTracker {
    /// Creates a stopped tracker.
    ///
    /// `cancel` is usually a child of a session-wide token, so cancelling
    /// the session also stops the tracker.
    #[must_use]
    pub fn new(source: Arc<dyn EntitySource>, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            source,
            interval,
            subscribers: DashMap::new(),
            next_subscriber: AtomicU64::new(0),
            current: RwLock::new(Arc::new(EntitySnapshot::new())),
            publish: Mutex::new(()),
            cancel,
        }
    }

    /// Spawns the polling loop.
    ///
    /// The loop stops when [`stop`](Self::stop) is called or the token
    /// passed to [`new`](Self::new) is cancelled. An in-flight poll is
    /// abandoned on cancellation.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tracker.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = tracker.cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let started = Instant::now();
                let polled = tokio::select! {
                    () = tracker.cancel.cancelled() => break,
                    polled = tracker.source.poll() => polled,
                };
                metrics::record_feed_poll(started.elapsed());

                match polled {
                    Ok(observed) => tracker.publish_cycle(observed),
                    Err(e) => debug!(error = %e, "feed cycle failed, keeping snapshot"),
                }
            }
            debug!("entity tracker stopped");
        })
    }

    /// Registers a subscriber for the given event kinds.
    pub fn subscribe(&self, kinds: &[TrackerEventKind]) -> Subscription {
        let (tx, events) = mpsc::unbounded_channel();
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(
            id,
            Subscriber {
                kinds: kinds.iter().copied().collect(),
                tx,
            },
        );
        Subscription { id, events }
    }

    /// Removes a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.remove(&id);
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<EntitySnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Stops polling, discards the snapshot and drops every subscriber.
    ///
    /// No event is published after this returns. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
        let _publishing = self
            .publish
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        self.subscribers.clear();
        self.replace_snapshot(Arc::new(EntitySnapshot::new()));
        metrics::set_tracked_entities(0);
    }

    /// Returns `true` once the tracker has been stopped or cancelled.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn publish_cycle(&self, observed: Snapshot) {
        let _publishing = self
            .publish
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.cancel.is_cancelled() {
            trace!("discarding cycle finished after stop");
            return;
        }

        let previous = self.snapshot();
        let (next, events) = diff(&previous, observed, Instant::now());
        metrics::set_tracked_entities(next.len());
        self.replace_snapshot(next);

        for event in events {
            let kind = event.kind();
            // Subscribers whose receiver is gone are dropped here.
            self.subscribers
                .retain(|_, sub| !sub.kinds.contains(&kind) || sub.tx.send(event.clone()).is_ok());
        }
    }

    fn replace_snapshot(&self, next: Arc<EntitySnapshot>) {
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
