//! Offline Queue
//!
//! The whole queue is one ordered list persisted under [`QUEUE_KEY`] in the
//! queue namespace. Each mutation loads, edits, and saves that list under a
//! lock, so insertion order survives reads and restarts.

use std::future::Future;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::queue::{BackoffPolicy, NewAction, PendingAction};
use crate::store::{envelope, KeyValueStore, SetOptions};

/// Logical key holding the queued actions.
pub const QUEUE_KEY: &str = "pending";

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1000;

// == Replay Report ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Executed and removed
    pub succeeded: usize,
    /// Executor failed; attempt recorded
    pub failed: usize,
    /// Still inside the backoff window
    pub skipped: usize,
}

// == Offline Queue ==
#[derive(Debug)]
pub struct OfflineQueue {
    store: KeyValueStore,
    backoff: BackoffPolicy,
    /// Guards the load-modify-save cycle
    lock: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(store: KeyValueStore) -> Self {
        Self {
            store,
            backoff: BackoffPolicy::default(),
            lock: Mutex::new(()),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn is_available(&self) -> bool {
        self.store.is_available()
    }

    pub fn check_health(&self) -> bool {
        self.store.check_health()
    }

    pub(crate) fn store(&self) -> &KeyValueStore {
        &self.store
    }

    // == Enqueue ==
    /// Appends `action` with a fresh id, the current time, and no attempts.
    pub fn enqueue(&self, action: NewAction) -> Result<PendingAction> {
        let _guard = self.lock.lock();
        let mut actions = self.load()?;

        let pending = PendingAction::from_new(action, Uuid::new_v4().to_string(), self.store.now_ms());
        actions.push(pending.clone());
        self.save(&actions)?;

        debug!(
            "Queued {} {} as {} ({} pending)",
            pending.action_type,
            pending.entity_kind,
            pending.id,
            actions.len()
        );
        Ok(pending)
    }

    // == Dequeue All ==
    /// Every pending action, oldest first. The queue is left as is; actions
    /// leave it through `remove` or pruning.
    pub fn dequeue_all(&self) -> Result<Vec<PendingAction>> {
        let _guard = self.lock.lock();
        self.load()
    }

    // == Remove ==
    /// Removes the action with `id`. Returns false if it was not queued.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut actions = self.load()?;
        let before = actions.len();
        actions.retain(|action| action.id != id);
        if actions.len() == before {
            return Ok(false);
        }
        self.save(&actions)?;
        Ok(true)
    }

    // == Mark Attempt ==
    /// Counts one failed attempt against `id`. Never removes the action.
    pub fn mark_attempt(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut actions = self.load()?;
        let now = self.store.now_ms();

        let Some(action) = actions.iter_mut().find(|action| action.id == id) else {
            return Ok(false);
        };
        action.attempts = action.attempts.saturating_add(1);
        action.last_attempt_at = Some(now);
        let attempts = action.attempts;

        self.save(&actions)?;
        debug!("Action {} has now failed {} times", id, attempts);
        Ok(true)
    }

    // == Pruning ==
    /// Removes actions queued more than `days` days ago.
    pub fn prune_older_than(&self, days: u32) -> Result<usize> {
        let cutoff = self
            .store
            .now_ms()
            .saturating_sub(u64::from(days) * MS_PER_DAY);
        let removed = self.prune(|action| action.enqueued_at < cutoff)?;
        if removed > 0 {
            info!("Pruned {} queued actions older than {} days", removed, days);
        }
        Ok(removed)
    }

    /// Removes actions that have failed `max_attempts` times or more.
    pub fn prune_failed_after(&self, max_attempts: u32) -> Result<usize> {
        let removed = self.prune(|action| action.attempts >= max_attempts)?;
        if removed > 0 {
            warn!(
                "Dropped {} queued actions after {} failed attempts",
                removed, max_attempts
            );
        }
        Ok(removed)
    }

    fn prune(&self, doomed: impl Fn(&PendingAction) -> bool) -> Result<usize> {
        let _guard = self.lock.lock();
        let mut actions = self.load()?;
        let before = actions.len();
        actions.retain(|action| !doomed(action));
        let removed = before - actions.len();
        if removed > 0 {
            self.save(&actions)?;
        }
        Ok(removed)
    }

    // == Length / Clear ==
    pub fn len(&self) -> Result<usize> {
        Ok(self.dequeue_all()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drops every queued action, returning how many there were.
    pub fn clear(&self) -> Result<usize> {
        let _guard = self.lock.lock();
        let count = self.load()?.len();
        self.store.remove(QUEUE_KEY)?;
        Ok(count)
    }

    // == Import ==
    /// Merges an exported queue envelope into the current queue.
    ///
    /// Actions are matched by id and the imported copy wins. Local actions
    /// missing from the import stay queued. The merged queue is ordered by
    /// enqueue time.
    pub(crate) fn import_raw(&self, key: &str, raw: &Value) -> Result<()> {
        if key != QUEUE_KEY {
            return self.store.import_raw(key, raw);
        }
        let entry = envelope::decode_value(key, raw.clone())?;
        let incoming: Vec<PendingAction> =
            serde_json::from_value(entry.value).map_err(|e| StorageError::corrupted(key, e))?;

        let _guard = self.lock.lock();
        let mut actions = self.load()?;
        let local = actions.len();
        for action in incoming {
            match actions.iter_mut().find(|queued| queued.id == action.id) {
                Some(queued) => *queued = action,
                None => actions.push(action),
            }
        }
        actions.sort_by_key(|action| action.enqueued_at);
        self.save(&actions)?;

        debug!(
            "Merged imported queue: {} local, {} after merge",
            local,
            actions.len()
        );
        Ok(())
    }

    // == Replay ==
    /// Earliest time `action` may be retried under this queue's backoff.
    pub fn next_retry_at(&self, action: &PendingAction) -> u64 {
        self.backoff.next_retry_at(action)
    }

    /// Runs `executor` over every due action in queue order.
    ///
    /// Successful actions are removed. Failed ones get an attempt recorded and
    /// stay queued. Actions still backing off are skipped. The queue lock is
    /// not held while the executor runs.
    pub async fn replay<F, Fut>(&self, mut executor: F) -> Result<ReplayReport>
    where
        F: FnMut(PendingAction) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let now = self.store.now_ms();
        let mut report = ReplayReport::default();

        for action in self.dequeue_all()? {
            if self.next_retry_at(&action) > now {
                report.skipped += 1;
                continue;
            }

            let id = action.id.clone();
            match executor(action).await {
                Ok(()) => {
                    self.remove(&id)?;
                    report.succeeded += 1;
                }
                Err(e) => {
                    warn!("Replay of action {} failed: {:#}", id, e);
                    self.mark_attempt(&id)?;
                    report.failed += 1;
                }
            }
        }

        info!(
            "Replay finished: {} succeeded, {} failed, {} skipped",
            report.succeeded, report.failed, report.skipped
        );
        Ok(report)
    }

    // == Internals ==
    fn load(&self) -> Result<Vec<PendingAction>> {
        match self.store.get::<Vec<PendingAction>>(QUEUE_KEY) {
            Ok(actions) => Ok(actions.unwrap_or_default()),
            Err(StorageError::Serialization(e)) => {
                error!("Queued actions are unreadable ({}); starting an empty queue", e);
                self.store.remove(QUEUE_KEY)?;
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, actions: &[PendingAction]) -> Result<()> {
        if actions.is_empty() {
            return self.store.remove(QUEUE_KEY);
        }
        self.store.set(QUEUE_KEY, actions, SetOptions::default())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, StorageBackend};
    use crate::clock::ManualClock;
    use crate::queue::ActionType;
    use crate::store::{KeySpace, Namespace};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn queue_on(backend: &MemoryBackend, clock: Arc<ManualClock>) -> OfflineQueue {
        OfflineQueue::new(KeyValueStore::new(
            Arc::new(backend.clone()),
            KeySpace::new("app"),
            Namespace::Queue,
            clock,
            1 << 20,
        ))
    }

    fn test_queue() -> (OfflineQueue, Arc<ManualClock>, MemoryBackend) {
        let backend = MemoryBackend::new();
        let clock = Arc::new(ManualClock::new(1_000_000_000));
        (queue_on(&backend, clock.clone()), clock, backend)
    }

    fn action(kind: &str, n: i64) -> NewAction {
        NewAction::new(ActionType::Create, kind, json!({ "n": n }))
    }

    #[test]
    fn test_enqueue_assigns_metadata() {
        let (queue, _, backend) = test_queue();

        let pending = queue.enqueue(action("recipe", 1)).unwrap();

        assert!(Uuid::parse_str(&pending.id).is_ok());
        assert_eq!(pending.enqueued_at, 1_000_000_000);
        assert_eq!(pending.attempts, 0);
        assert!(backend.get_item("app:queue:pending").unwrap().is_some());
    }

    #[test]
    fn test_fifo_order_survives_restart() {
        let (queue, clock, backend) = test_queue();
        for n in 0..5 {
            queue.enqueue(action("recipe", n)).unwrap();
        }

        let reopened = queue_on(&backend, clock);
        let payloads: Vec<_> = reopened
            .dequeue_all()
            .unwrap()
            .into_iter()
            .map(|a| a.payload["n"].as_i64().unwrap())
            .collect();

        assert_eq!(payloads, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_dequeue_all_is_non_destructive() {
        let (queue, _, _) = test_queue();
        queue.enqueue(action("recipe", 1)).unwrap();

        queue.dequeue_all().unwrap();

        assert_eq!(queue.len().unwrap(), 1);
    }

    #[test]
    fn test_remove() {
        let (queue, _, backend) = test_queue();
        let a = queue.enqueue(action("recipe", 1)).unwrap();
        let b = queue.enqueue(action("recipe", 2)).unwrap();

        assert!(queue.remove(&a.id).unwrap());
        assert!(!queue.remove(&a.id).unwrap());
        assert_eq!(queue.dequeue_all().unwrap(), vec![b.clone()]);

        queue.remove(&b.id).unwrap();
        assert!(queue.is_empty().unwrap());
        assert!(backend.get_item("app:queue:pending").unwrap().is_none());
    }

    #[test]
    fn test_mark_attempt_then_prune_failed() {
        let (queue, _, _) = test_queue();
        let first = queue.enqueue(action("pantry", 1)).unwrap();
        let second = queue.enqueue(action("pantry", 2)).unwrap();
        let third = queue.enqueue(action("pantry", 3)).unwrap();

        for _ in 0..5 {
            assert!(queue.mark_attempt(&second.id).unwrap());
        }
        assert_eq!(queue.len().unwrap(), 3);

        assert_eq!(queue.prune_failed_after(5).unwrap(), 1);
        let left: Vec<_> = queue.dequeue_all().unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(left, vec![first.id, third.id]);
        assert_eq!(queue.prune_failed_after(5).unwrap(), 0);
    }

    #[test]
    fn test_mark_attempt_unknown_id() {
        let (queue, _, _) = test_queue();
        assert!(!queue.mark_attempt("missing").unwrap());
    }

    #[test]
    fn test_prune_older_than() {
        let (queue, clock, _) = test_queue();
        queue.enqueue(action("recipe", 1)).unwrap();
        clock.advance(Duration::from_secs(6 * 24 * 3600));
        queue.enqueue(action("recipe", 2)).unwrap();
        clock.advance(Duration::from_secs(2 * 24 * 3600));

        assert_eq!(queue.prune_older_than(7).unwrap(), 1);
        assert_eq!(queue.prune_older_than(7).unwrap(), 0);
        assert_eq!(queue.dequeue_all().unwrap()[0].payload["n"], 2);
    }

    #[test]
    fn test_clear() {
        let (queue, _, _) = test_queue();
        queue.enqueue(action("recipe", 1)).unwrap();
        queue.enqueue(action("recipe", 2)).unwrap();

        assert_eq!(queue.clear().unwrap(), 2);
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_unreadable_queue_starts_empty() {
        let (queue, _, _) = test_queue();
        queue
            .store()
            .set(QUEUE_KEY, &json!({"not": "a list"}), SetOptions::default())
            .unwrap();

        assert!(queue.dequeue_all().unwrap().is_empty());
        queue.enqueue(action("recipe", 1)).unwrap();
        assert_eq!(queue.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replay_removes_successes_and_marks_failures() {
        let (queue, _, _) = test_queue();
        let ok = queue.enqueue(action("recipe", 1)).unwrap();
        let bad = queue.enqueue(action("recipe", 2)).unwrap();

        let report = queue
            .replay(|action| async move {
                if action.payload["n"] == 2 {
                    anyhow::bail!("server said no");
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(
            report,
            ReplayReport {
                succeeded: 1,
                failed: 1,
                skipped: 0
            }
        );
        let left = queue.dequeue_all().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, bad.id);
        assert_eq!(left[0].attempts, 1);
        assert_ne!(left[0].id, ok.id);
    }

    #[tokio::test]
    async fn test_replay_respects_backoff() {
        let (queue, clock, _) = test_queue();
        let queue = queue.with_backoff(BackoffPolicy::new(
            Duration::from_secs(10),
            Duration::from_secs(60),
        ));
        let pending = queue.enqueue(action("recipe", 1)).unwrap();
        queue.mark_attempt(&pending.id).unwrap();
        queue.mark_attempt(&pending.id).unwrap();

        let report = queue.replay(|_| async { anyhow::Ok(()) }).await.unwrap();
        assert_eq!(report.skipped, 1);

        // Two failures: wait 20s
        clock.advance(Duration::from_secs(20));
        let report = queue.replay(|_| async { anyhow::Ok(()) }).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert!(queue.is_empty().unwrap());
    }
}
