//! Table of live stream monitors.
//!
//! A monitor is live exactly while its id is present in the registry. Each
//! entry holds the sending half of a `watch` channel; removing the entry drops
//! the sender, which wakes every consumer waiting on the matching receiver.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use tracing::debug;

/// Candidate draws before a colliding id is accepted anyway.
const ALLOCATION_ATTEMPTS: usize = 5;

/// Identifier of one streaming monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonitorId(u64);

impl MonitorId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of live monitors, shared by every clone of a client.
///
/// Ids are drawn at random from a 63-bit space. A collision is retried a
/// bounded number of times; if every draw collides the last candidate is
/// registered anyway, and the colliding monitors then share one entry, so
/// stopping either stops both.
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    live: RwLock<HashMap<MonitorId, watch::Sender<()>>>,
}

impl MonitorRegistry {
    /// Allocate and register a new monitor id.
    #[must_use]
    pub fn register(&self) -> MonitorId {
        self.register_with(random_id)
    }

    fn register_with(&self, mut draw: impl FnMut() -> MonitorId) -> MonitorId {
        let mut live = self.write();
        let mut candidate = draw();
        for _ in 1..ALLOCATION_ATTEMPTS {
            if !live.contains_key(&candidate) {
                break;
            }
            candidate = draw();
        }
        live.entry(candidate).or_insert_with(|| watch::channel(()).0);
        debug!(monitor = %candidate, "monitor registered");
        candidate
    }

    /// Stop a monitor. Unknown or already stopped ids are ignored.
    pub fn stop(&self, id: MonitorId) {
        if self.write().remove(&id).is_some() {
            debug!(monitor = %id, "monitor stopped");
        }
    }

    /// Returns whether `id` is live.
    #[must_use]
    pub fn is_live(&self, id: MonitorId) -> bool {
        self.read().contains_key(&id)
    }

    /// Returns the number of live monitors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns whether no monitor is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Stop every monitor.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Subscribe to the stop signal of `id`.
    ///
    /// The receiver observes a closed channel once the monitor is stopped.
    /// Returns `None` if the monitor is not live.
    pub(crate) fn watch(&self, id: MonitorId) -> Option<watch::Receiver<()>> {
        self.read().get(&id).map(watch::Sender::subscribe)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<MonitorId, watch::Sender<()>>> {
        self.live.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<MonitorId, watch::Sender<()>>> {
        self.live.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn random_id() -> MonitorId {
    let (high, _) = uuid::Uuid::new_v4().as_u64_pair();
    MonitorId(high >> 1)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn registry() -> MonitorRegistry {
        MonitorRegistry::default()
    }

    #[rstest]
    fn registered_monitor_is_live_until_stopped(registry: MonitorRegistry) {
        let id = registry.register();
        assert!(registry.is_live(id));

        registry.stop(id);
        assert!(!registry.is_live(id));
    }

    #[rstest]
    fn stopping_twice_is_a_no_op(registry: MonitorRegistry) {
        let kept = registry.register();
        let stopped = registry.register();

        registry.stop(stopped);
        registry.stop(stopped);
        registry.stop(MonitorId::from_raw(u64::MAX));

        assert!(!registry.is_live(stopped));
        assert!(registry.is_live(kept));
        assert_eq!(registry.len(), 1);
    }

    #[rstest]
    fn ids_fit_in_63_bits(registry: MonitorRegistry) {
        for _ in 0..64 {
            assert!(registry.register().get() <= u64::MAX >> 1);
        }
    }

    #[rstest]
    fn collision_is_retried(registry: MonitorRegistry) {
        let first = registry.register_with(|| MonitorId::from_raw(7));
        let mut draws = [7_u64, 7, 9].into_iter();
        let second = registry.register_with(|| MonitorId::from_raw(draws.next().unwrap_or(11)));

        assert_eq!(first, MonitorId::from_raw(7));
        assert_eq!(second, MonitorId::from_raw(9));
        assert_eq!(registry.len(), 2);
    }

    #[rstest]
    fn exhausted_retries_share_the_colliding_entry(registry: MonitorRegistry) {
        let first = registry.register_with(|| MonitorId::from_raw(3));
        let second = registry.register_with(|| MonitorId::from_raw(3));

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        registry.stop(second);
        assert!(!registry.is_live(first));
    }

    #[rstest]
    fn clear_stops_everything(registry: MonitorRegistry) {
        let ids: Vec<_> = (0..4).map(|_| registry.register()).collect();
        registry.clear();
        assert!(registry.is_empty());
        assert!(ids.into_iter().all(|id| !registry.is_live(id)));
    }

    #[rstest]
    #[tokio::test]
    async fn stop_closes_the_watch_channel(registry: MonitorRegistry) {
        let id = registry.register();
        let mut receiver = registry.watch(id).expect("live monitor should be watchable");

        registry.stop(id);
        assert!(receiver.changed().await.is_err());
        assert!(registry.watch(id).is_none());
    }

    #[rstest]
    fn concurrent_registration_yields_distinct_ids() {
        let shared = Arc::new(MonitorRegistry::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&shared);
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| registry.register())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("registration thread should not panic") {
                assert!(seen.insert(id), "duplicate live id {id}");
            }
        }
        assert_eq!(shared.len(), seen.len());
    }

    #[rstest]
    fn concurrent_stops_are_idempotent() {
        let shared = Arc::new(MonitorRegistry::default());
        let id = shared.register();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&shared);
                std::thread::spawn(move || registry.stop(id))
            })
            .collect();
        for handle in handles {
            handle.join().expect("stop thread should not panic");
        }
        assert!(!shared.is_live(id));
        assert!(shared.is_empty());
    }
}
