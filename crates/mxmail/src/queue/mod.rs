//! In-memory delivery queue.
//!
//! Entries are kept in submission order. The scheduler claims at most one
//! eligible entry per tick; claiming counts the attempt and stamps its time
//! under the same lock, so a concurrent `enqueue` can never observe a
//! half-updated entry.

mod retry;

pub use retry::RetryPolicy;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Identifier of a queued message, unique per queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A message waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Queue identifier.
    pub id: EntryId,
    /// Sender address, as submitted.
    pub from: String,
    /// Recipient address, as submitted.
    pub to: String,
    /// Subject, if given.
    pub subject: Option<String>,
    /// Plain-text body, if given.
    pub text: Option<String>,
    /// True once the peer accepted the message.
    pub sent: bool,
    /// Number of attempts started so far.
    pub attempts: u32,
    /// When the latest attempt started.
    pub last_attempt_at: Option<Instant>,
}

impl QueueEntry {
    /// Returns true if the entry may be attempted at `now`.
    #[must_use]
    pub fn is_eligible(&self, policy: &RetryPolicy, now: Instant) -> bool {
        !self.sent && policy.is_eligible(self.attempts, self.last_attempt_at, now)
    }

    /// Returns true if the entry has used up its attempts.
    #[must_use]
    pub const fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        !self.sent && !policy.should_retry(self.attempts)
    }
}

/// Process-wide delivery backlog.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    entries: Mutex<Vec<QueueEntry>>,
    next_id: AtomicU64,
}

impl DeliveryQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message. Never blocks on delivery and never fails.
    pub fn enqueue(
        &self,
        from: impl Into<String>,
        to: impl Into<String>,
        subject: Option<String>,
        text: Option<String>,
    ) -> EntryId {
        let id = EntryId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let entry = QueueEntry {
            id,
            from: from.into(),
            to: to.into(),
            subject,
            text,
            sent: false,
            attempts: 0,
            last_attempt_at: None,
        };

        let mut entries = self.entries.lock();
        entries.push(entry);
        debug!(%id, queued = entries.len(), "message queued");
        id
    }

    /// Selects the first eligible entry in submission order and records a
    /// new attempt on it.
    ///
    /// Returns a copy of the entry as updated.
    pub fn claim_next(&self, policy: &RetryPolicy, now: Instant) -> Option<QueueEntry> {
        let mut entries = self.entries.lock();
        let entry = entries.iter_mut().find(|e| e.is_eligible(policy, now))?;
        entry.attempts += 1;
        entry.last_attempt_at = Some(now);
        Some(entry.clone())
    }

    /// Marks an entry as sent and removes it.
    ///
    /// Returns the removed entry, or `None` if it was not queued.
    pub fn complete(&self, id: EntryId) -> Option<QueueEntry> {
        let mut entries = self.entries.lock();
        let pos = entries.iter().position(|e| e.id == id)?;
        let mut entry = entries.remove(pos);
        entry.sent = true;
        Some(entry)
    }

    /// Returns a copy of an entry.
    #[must_use]
    pub fn get(&self, id: EntryId) -> Option<QueueEntry> {
        self.entries.lock().iter().find(|e| e.id == id).cloned()
    }

    /// Returns the number of queued entries, exhausted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns a copy of every entry in submission order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueueEntry> {
        self.entries.lock().clone()
    }

    /// Returns the entries that will never be attempted again.
    #[must_use]
    pub fn exhausted(&self, policy: &RetryPolicy) -> Vec<QueueEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.is_exhausted(policy))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn queue_with(n: usize) -> (DeliveryQueue, Vec<EntryId>) {
        let queue = DeliveryQueue::new();
        let ids = (0..n)
            .map(|i| queue.enqueue(format!("a{i}@x.com"), "b@y.com", None, None))
            .collect();
        (queue, ids)
    }

    #[test]
    fn test_enqueue_defaults() {
        let (queue, ids) = queue_with(1);
        let entry = queue.get(ids[0]).unwrap();

        assert!(!entry.sent);
        assert_eq!(entry.attempts, 0);
        assert!(entry.last_attempt_at.is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_ids_are_unique() {
        let (_queue, ids) = queue_with(3);
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_in_submission_order() {
        let (queue, ids) = queue_with(2);
        let policy = RetryPolicy::default();
        let now = Instant::now();

        let first = queue.claim_next(&policy, now).unwrap();
        assert_eq!(first.id, ids[0]);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.last_attempt_at, Some(now));

        // the first entry is now waiting out its retry interval
        let second = queue.claim_next(&policy, now).unwrap();
        assert_eq!(second.id, ids[1]);
        assert!(queue.claim_next(&policy, now).is_none());

        let later = now + Duration::from_secs(240);
        assert_eq!(queue.claim_next(&policy, later).unwrap().id, ids[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_removes() {
        let (queue, ids) = queue_with(2);

        let done = queue.complete(ids[0]).unwrap();
        assert!(done.sent);
        assert_eq!(queue.len(), 1);
        assert!(queue.get(ids[0]).is_none());
        assert!(queue.complete(ids[0]).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_entries_stay_queued() {
        let (queue, ids) = queue_with(1);
        let policy = RetryPolicy::new(2, Duration::from_secs(1));
        let mut now = Instant::now();

        for _ in 0..2 {
            assert!(queue.claim_next(&policy, now).is_some());
            now += Duration::from_secs(1);
        }

        assert!(queue.claim_next(&policy, now + Duration::from_secs(3600)).is_none());
        assert_eq!(queue.len(), 1);
        let exhausted = queue.exhausted(&policy);
        assert_eq!(exhausted.len(), 1);
        assert_eq!(exhausted[0].id, ids[0]);
        assert_eq!(exhausted[0].attempts, 2);
    }

    #[test]
    fn test_snapshot_order() {
        let (queue, ids) = queue_with(3);
        let snapshot: Vec<_> = queue.snapshot().into_iter().map(|e| e.id).collect();
        assert_eq!(snapshot, ids);
    }
}
