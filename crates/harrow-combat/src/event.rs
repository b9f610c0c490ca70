//! The damage event record.
//!
//! One [`DamageEvent`] describes one damage occurrence. It is created fresh
//! for each occurrence, flows through the Filter and Inspect stages of a
//! single batch, and is never reused across batches. Filter systems may
//! rescale or zero the amount and may cancel the event; cancellation is
//! monotonic -- there is deliberately no API to clear the flag.
//!
//! The amount is only semantically meaningful at the terminal apply step.
//! Mid-pipeline it is a working value: a transient negative amount is legal
//! while filters compose (a big flat reduction followed by a percentage
//! boost, say), and only the apply step clamps.

use harrow_ecs::entity::EntityRef;

use crate::meta::MetaStore;
use crate::source::Source;

// ---------------------------------------------------------------------------
// DamageEvent
// ---------------------------------------------------------------------------

/// A mutable, cancellable record of one damage occurrence.
#[derive(Debug)]
pub struct DamageEvent {
    source: Source,
    cause_id: String,
    amount: f32,
    cancelled: bool,
    target: EntityRef,
    meta: MetaStore,
}

impl DamageEvent {
    /// Create a fresh event. Metadata starts empty.
    pub fn new(
        source: Source,
        cause_id: impl Into<String>,
        amount: f32,
        target: EntityRef,
    ) -> Self {
        Self {
            source,
            cause_id: cause_id.into(),
            amount,
            cancelled: false,
            target,
            meta: MetaStore::new(),
        }
    }

    /// Where the damage came from. Immutable after creation.
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Identifier into the damage-cause definition table.
    pub fn cause_id(&self) -> &str {
        &self.cause_id
    }

    /// The current working amount.
    pub fn amount(&self) -> f32 {
        self.amount
    }

    /// Replace the working amount. Filter-stage only by contract; the
    /// orchestrator's context enforces that.
    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount;
    }

    /// Whether the event has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Cancel the event. Once set the flag stays set; later systems still
    /// observe the event and may react to the cancellation.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// The entity the damage applies to.
    pub fn target(&self) -> EntityRef {
        self.target
    }

    /// Read access to the extension metadata.
    pub fn meta(&self) -> &MetaStore {
        &self.meta
    }

    /// Write access to the extension metadata.
    pub fn meta_mut(&mut self) -> &mut MetaStore {
        &mut self.meta
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
