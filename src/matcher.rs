//! Subscription matching.
//!
//! Compares an enriched candidate against a subscription snapshot and emits
//! the notification events to dispatch. Matching is funding-based: a
//! candidate qualifies for a threshold when its contract balance OR its
//! pooled liquidity reaches it, both compared in decimal ETH.

use ethers::types::Address;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::debug;

use crate::subscriptions::Subscription;
use crate::types::Candidate;

/// One pending dispatch. `thread_id == None` targets the recipient's default
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub contract_address: Address,
    pub recipient_id: i64,
    pub threshold: Decimal,
    pub thread_id: Option<i64>,
}

/// Produces the events for `candidate` against `subscriptions`.
///
/// Subscriptions are evaluated in the snapshot's stable order. A recipient
/// with thread bindings gets one event per thread; one without gets a single
/// default-channel event. Within the pass, at most one event exists per
/// `(contract, recipient, threshold, thread)` tuple.
pub fn match_candidate(
    candidate: &Candidate,
    subscriptions: &[Subscription],
) -> Vec<NotificationEvent> {
    let balance_eth = candidate.balance_eth();
    let liquidity_eth = candidate.liquidity_eth();

    let mut seen: HashSet<(i64, Decimal, Option<i64>)> = HashSet::new();
    let mut events = Vec::new();

    for subscription in subscriptions {
        if balance_eth < subscription.threshold && liquidity_eth < subscription.threshold {
            continue;
        }

        let targets: Vec<Option<i64>> = if subscription.thread_ids.is_empty() {
            vec![None]
        } else {
            subscription.thread_ids.iter().copied().map(Some).collect()
        };

        for thread_id in targets {
            if seen.insert((subscription.recipient_id, subscription.threshold, thread_id)) {
                events.push(NotificationEvent {
                    contract_address: candidate.contract_address,
                    recipient_id: subscription.recipient_id,
                    threshold: subscription.threshold,
                    thread_id,
                });
            }
        }
    }

    debug!(
        contract = ?candidate.contract_address,
        balance_eth = %balance_eth,
        liquidity_eth = %liquidity_eth,
        events = events.len(),
        "matched candidate against subscription snapshot"
    );
    events
}
