//! Broadcast relay: records every event and fans it out to the chat.
//!
//! # How a publish works (for beginners)
//!
//! ```text
//! publish(event, audience)
//!   1. take the publish gate      (one publish at a time)
//!   2. append event to history
//!   3. snapshot the registry      (registry lock released immediately)
//!   4. for each session in the snapshot, unless excluded by `audience`:
//!        recipient.deliver(payload)   ← queues only; may fail, logged and skipped
//!   5. release the gate, return a DeliveryReport
//! ```
//!
//! Holding the gate across the whole publish means two publishes never
//! interleave, so every participant observes events in the same relative
//! order and that order matches the history.  Delivery only hands the
//! payload to the peer's outbound queue, so a slow peer never holds the gate
//! for long.  The registry itself is only locked for the snapshot copy in
//! step 3.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lanchat_core::{ChatEvent, MAX_FRAME_LEN};
use tracing::{debug, warn};

use crate::application::history::History;
use crate::application::registry::{ConnectionId, SessionRegistry};

/// Which registered sessions an event is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every registered session.
    Everyone,
    /// Every registered session except the given one (usually the sender).
    AllExcept(ConnectionId),
}

impl Audience {
    pub fn includes(&self, id: ConnectionId) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::AllExcept(excluded) => *excluded != id,
        }
    }
}

/// Outcome of one publish.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipients that accepted the frame.
    pub delivered: usize,
    /// Recipients whose delivery failed or was skipped.
    pub failed: usize,
}

/// Records and delivers chat events.
pub struct BroadcastRelay {
    registry: Arc<SessionRegistry>,
    history: Mutex<History>,
    publish_gate: tokio::sync::Mutex<()>,
}

impl BroadcastRelay {
    pub fn new(registry: Arc<SessionRegistry>, history_capacity: Option<NonZeroUsize>) -> Self {
        Self {
            registry,
            history: Mutex::new(History::new(history_capacity)),
            publish_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Appends `event` to history and delivers it to `audience`.
    ///
    /// Never fails as a whole: each recipient's failure is logged at `warn`
    /// and counted in the returned report.  An event whose payload would not
    /// fit in one frame is still recorded, but nobody receives it.
    pub async fn publish(&self, event: ChatEvent, audience: Audience) -> DeliveryReport {
        let _gate = self.publish_gate.lock().await;

        let payload = event.to_payload();
        self.record(event);

        let targets: Vec<_> = self
            .registry
            .snapshot_active()
            .into_iter()
            .filter(|session| audience.includes(session.id))
            .collect();

        let mut report = DeliveryReport::default();

        if payload.len() > MAX_FRAME_LEN {
            warn!(
                payload_len = payload.len(),
                max = MAX_FRAME_LEN,
                "event payload exceeds the frame limit; recorded but not delivered"
            );
            report.failed = targets.len();
            return report;
        }

        for session in &targets {
            match session.recipient.deliver(payload.as_bytes()).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        connection = %session.id,
                        username = %session.username,
                        "skipping recipient: {e}"
                    );
                    report.failed += 1;
                }
            }
        }

        debug!(
            ?audience,
            delivered = report.delivered,
            failed = report.failed,
            "event published"
        );
        report
    }

    /// Copy of the recorded events, oldest first.
    pub fn history(&self) -> Vec<ChatEvent> {
        self.lock_history().snapshot()
    }

    pub fn history_len(&self) -> usize {
        self.lock_history().len()
    }

    /// Events dropped from a capped history since startup.
    pub fn history_evicted(&self) -> u64 {
        self.lock_history().evicted()
    }

    fn record(&self, event: ChatEvent) {
        let mut history = self.lock_history();
        if history.push(event) > 0 {
            debug!(
                capacity = ?history.capacity(),
                evicted_total = history.evicted(),
                "history full; dropped the oldest event"
            );
        }
    }

    fn lock_history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
