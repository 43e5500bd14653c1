//! Subscription store.
//!
//! The core only ever reads subscriptions through `SubscriptionStore::
//! snapshot()`; mutation belongs to the external command surface. The
//! in-memory implementation here backs that surface and tolerates concurrent
//! mutation while a matching pass iterates its own stable snapshot.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// One `(recipient, threshold)` binding with the recipient's thread fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub recipient_id: i64,
    /// Empty means "deliver to the recipient's default channel".
    pub thread_ids: Vec<i64>,
    /// Non-negative ETH threshold.
    pub threshold: Decimal,
}

pub trait SubscriptionStore: Send + Sync {
    /// Stable snapshot of all active subscriptions, ordered by recipient and
    /// threshold. Matching passes iterate this copy, never live state.
    fn snapshot(&self) -> Vec<Subscription>;
}

#[derive(Debug, Default)]
struct RecipientEntry {
    thresholds: BTreeSet<Decimal>,
    threads: BTreeSet<i64>,
}

/// DashMap-backed store shared between the command surface and the pipeline.
#[derive(Debug, Default)]
pub struct InMemorySubscriptions {
    entries: DashMap<i64, RecipientEntry>,
}

impl InMemorySubscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a threshold (and optionally a thread binding) for a recipient.
    /// Re-adding an existing threshold is a no-op; returns whether the
    /// threshold was newly added.
    pub fn subscribe(&self, recipient_id: i64, threshold: Decimal, thread_id: Option<i64>) -> bool {
        let mut entry = self.entries.entry(recipient_id).or_default();
        if let Some(thread) = thread_id {
            entry.threads.insert(thread);
        }
        entry.thresholds.insert(threshold)
    }

    /// Removes a threshold; returns whether it existed. A recipient with no
    /// thresholds left disappears from snapshots entirely.
    pub fn unsubscribe(&self, recipient_id: i64, threshold: Decimal) -> bool {
        let Some(mut entry) = self.entries.get_mut(&recipient_id) else {
            return false;
        };
        let removed = entry.thresholds.remove(&threshold);
        let empty = entry.thresholds.is_empty();
        drop(entry);
        if empty {
            self.entries.remove(&recipient_id);
        }
        removed
    }

    /// Active thresholds for a recipient, ascending.
    pub fn thresholds(&self, recipient_id: i64) -> Vec<Decimal> {
        self.entries
            .get(&recipient_id)
            .map(|e| e.thresholds.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl SubscriptionStore for InMemorySubscriptions {
    fn snapshot(&self) -> Vec<Subscription> {
        let mut subscriptions: Vec<Subscription> = self
            .entries
            .iter()
            .flat_map(|entry| {
                let recipient_id = *entry.key();
                let threads: Vec<i64> = entry.threads.iter().copied().collect();
                entry
                    .thresholds
                    .iter()
                    .map(|t| Subscription {
                        recipient_id,
                        thread_ids: threads.clone(),
                        threshold: *t,
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        subscriptions.sort_by(|a, b| {
            a.recipient_id
                .cmp(&b.recipient_id)
                .then(a.threshold.cmp(&b.threshold))
        });
        subscriptions
    }
}
