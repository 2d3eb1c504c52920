//! Pending-call table: maps correlation tokens to waiting callers.
//!
//! Flow:
//! 1. `send_and_await` calls [`PendingTable::register`] and keeps the receiver
//! 2. The outbound send goes out carrying the token as a header
//! 3. The inbound dispatcher calls [`PendingTable::complete`] on a match
//! 4. The caller awaits the receiver or times out
//!
//! Removal from the map is the atomic claim on an entry: whichever side
//! (reply, timeout, cancel, reaper) removes it owns the terminal outcome,
//! so the wake signal can never fire twice.

use crate::domain::correlation::CorrelationToken;
use crate::error::MediatorError;
use crate::ports::InboundContext;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A completed reply as handed to the waiting caller.
#[derive(Debug)]
pub struct PendingReply<R> {
    /// The reply payload.
    pub reply: R,
    /// Delivery metadata captured from the inbound transport context.
    pub context: InboundContext,
}

/// One entry per outstanding request.
struct PendingCall<R> {
    /// Single-use wake primitive; consumed on completion.
    sender: oneshot::Sender<PendingReply<R>>,
    /// When the call was registered.
    registered_at: Instant,
    /// After this instant the reaper may drop the entry.
    deadline: Instant,
}

/// Outcome of attempting to complete a pending entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Entry found, reply delivered to the waiter.
    Delivered,
    /// Entry found but the waiter had already gone away.
    WaiterGone,
    /// No entry for that token (timed out, cancelled, or never existed).
    NotFound,
}

/// Counters exposed for host observability.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total calls registered.
    pub registered: AtomicU64,
    /// Total calls completed with a reply.
    pub completed: AtomicU64,
    /// Total calls that timed out (caller-side or reaped).
    pub timed_out: AtomicU64,
    /// Total calls cancelled or abandoned before completion.
    pub cancelled: AtomicU64,
    /// Total inbound replies with no matching entry.
    pub orphaned: AtomicU64,
    /// Total replies matched via the headerless most-recent fallback.
    pub fallback_matched: AtomicU64,
}

/// Concurrency-safe registry of outstanding calls.
///
/// The map is the source of truth; the insertion-order side list exists
/// only to answer [`last_inserted`](Self::last_inserted) for the
/// headerless fallback. Registration inserts into the map before pushing
/// the token onto the list, so the list can momentarily lag the map and a
/// headerless fallback racing a registration may miss the newest entry.
pub struct PendingTable<R> {
    entries: DashMap<CorrelationToken, PendingCall<R>>,
    order: Mutex<Vec<CorrelationToken>>,
    stats: Arc<PendingStats>,
}

impl<R: Send> PendingTable<R> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(Vec::new()),
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register a pending call under `token` and get the receiver its
    /// reply will arrive on.
    ///
    /// `timeout` sets the reaper deadline; it should match the wait the
    /// caller is about to perform so an abandoned entry cannot outlive it.
    ///
    /// # Errors
    ///
    /// [`MediatorError::DuplicateToken`] if `token` is already pending.
    pub fn register(
        &self,
        token: CorrelationToken,
        timeout: Duration,
    ) -> Result<oneshot::Receiver<PendingReply<R>>, MediatorError> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();

        match self.entries.entry(token) {
            Entry::Occupied(_) => return Err(MediatorError::DuplicateToken(token)),
            Entry::Vacant(slot) => {
                slot.insert(PendingCall {
                    sender: tx,
                    registered_at: now,
                    deadline: now + timeout,
                });
            }
        }
        self.order.lock().push(token);
        self.stats.registered.fetch_add(1, Ordering::Relaxed);

        debug!(correlation_id = %token, timeout_ms = timeout.as_millis() as u64, "Registered pending call");
        Ok(rx)
    }

    /// Complete the entry for `token` with a reply, waking its caller.
    ///
    /// The entry is removed before the signal fires; a second delivery for
    /// the same token finds nothing and reports [`Completion::NotFound`].
    pub fn complete(
        &self,
        token: &CorrelationToken,
        reply: R,
        context: InboundContext,
    ) -> Completion {
        let Some((_, call)) = self.entries.remove(token) else {
            return Completion::NotFound;
        };
        self.forget_order(token);

        let waited = call.registered_at.elapsed();
        match call.sender.send(PendingReply { reply, context }) {
            Ok(()) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %token,
                    waited_ms = waited.as_millis() as u64,
                    "Completed pending call"
                );
                Completion::Delivered
            }
            Err(_) => {
                // Receiver dropped: the caller gave up between our removal
                // and the send.
                self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(correlation_id = %token, "Pending call waiter already gone");
                Completion::WaiterGone
            }
        }
    }

    /// Remove a timed-out entry. No-op if a reply already claimed it.
    pub fn time_out(&self, token: &CorrelationToken) -> bool {
        if self.entries.remove(token).is_some() {
            self.forget_order(token);
            self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %token, "Pending call timed out");
            true
        } else {
            false
        }
    }

    /// Cancel a pending call. Idempotent; a late reply for a cancelled
    /// token is discarded as an orphan.
    pub fn cancel(&self, token: &CorrelationToken) -> bool {
        if self.entries.remove(token).is_some() {
            self.forget_order(token);
            self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %token, "Cancelled pending call");
            true
        } else {
            false
        }
    }

    /// Most recently registered still-present token.
    ///
    /// Used only by the headerless-reply fallback. Best-effort: under
    /// concurrent registration "most recent" is whatever the order list
    /// observed.
    pub fn last_inserted(&self) -> Option<CorrelationToken> {
        let order = self.order.lock();
        order
            .iter()
            .rev()
            .find(|token| self.entries.contains_key(token))
            .copied()
    }

    /// Drop entries whose deadline has passed.
    ///
    /// Dropping an entry closes its wake channel, so an abandoned waiter
    /// still blocked on it observes a timeout. Returns the number removed.
    pub fn reap_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<CorrelationToken> = self
            .entries
            .iter()
            .filter(|entry| now >= entry.deadline)
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for token in expired {
            // Re-check under the shard lock so a freshly reused slot is safe.
            if self
                .entries
                .remove_if(&token, |_, call| now >= call.deadline)
                .is_some()
            {
                self.forget_order(&token);
                self.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(correlation_id = %token, "Reaped expired pending call");
                removed += 1;
            }
        }
        removed
    }

    /// Whether `token` is currently pending.
    pub fn contains(&self, token: &CorrelationToken) -> bool {
        self.entries.contains_key(token)
    }

    /// Number of outstanding calls.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no calls are outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Shared counters.
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    fn forget_order(&self, token: &CorrelationToken) {
        let mut order = self.order.lock();
        if let Some(pos) = order.iter().rposition(|t| t == token) {
            order.remove(pos);
        }
    }
}

impl<R: Send> Default for PendingTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task dropping expired entries at a fixed interval.
///
/// Spawn this once per table; it runs until the task is aborted.
pub async fn reap_task<R: Send>(table: Arc<PendingTable<R>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let removed = table.reap_expired();
        if removed > 0 {
            debug!(removed = removed, "Reaper dropped expired pending calls");
        }
    }
}
