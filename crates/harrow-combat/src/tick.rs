//! Simulation-loop wiring.
//!
//! The [`CombatLoop`] owns the world and the pipeline and drives one batch
//! per tick. The pipeline itself is single-threaded and non-reentrant;
//! producers on other threads (network handlers, script hosts) never touch it
//! directly. They send a [`DamageRequest`] through the loop's channel, and
//! the loop converts requests into events on the main thread at the start of
//! the next tick.

use std::sync::mpsc::{channel, Receiver, Sender};

use harrow_ecs::entity::EntityRef;
use harrow_ecs::store::World;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::DamageEvent;
use crate::pipeline::{BatchReceipt, DamagePipeline, PipelineError};
use crate::sequence::{ComboConfig, ComboHit, COMBO_HIT};
use crate::source::Source;

// ---------------------------------------------------------------------------
// CombatConfig
// ---------------------------------------------------------------------------

/// Tuning for the combat loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Simulation ticks per second. Informational for embedders; the loop
    /// itself is driven externally and does not sleep.
    pub tick_rate: u32,
    /// Combo window tuning, shared with the sequence modifier.
    pub combo: ComboConfig,
}

impl Default for CombatConfig {
    /// 20 ticks per second, default combo window.
    fn default() -> Self {
        Self {
            tick_rate: 20,
            combo: ComboConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// DamageRequest
// ---------------------------------------------------------------------------

/// A damage occurrence produced off the main thread.
///
/// Requests are plain data; the main thread turns them into [`DamageEvent`]s
/// (attaching combo metadata when asked) at the start of the next tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageRequest {
    /// Where the damage comes from.
    pub source: Source,
    /// Cause id into the damage-cause table.
    pub cause_id: String,
    /// Initial amount before filtering.
    pub amount: f32,
    /// The entity to damage.
    pub target: EntityRef,
    /// When set, the event is tagged combo-eligible for this attacker.
    pub combo_attacker: Option<EntityRef>,
}

impl DamageRequest {
    fn into_event(self) -> DamageEvent {
        let mut event = DamageEvent::new(self.source, self.cause_id, self.amount, self.target);
        if let Some(attacker) = self.combo_attacker {
            event.meta_mut().set(&COMBO_HIT, ComboHit { attacker });
        }
        event
    }
}

// ---------------------------------------------------------------------------
// CombatLoop
// ---------------------------------------------------------------------------

/// Owns the world and pipeline; processes one batch per tick.
pub struct CombatLoop {
    world: World,
    pipeline: DamagePipeline,
    config: CombatConfig,
    requests_tx: Sender<DamageRequest>,
    requests_rx: Receiver<DamageRequest>,
}

impl CombatLoop {
    /// Build a loop around a prepared world and pipeline.
    pub fn new(world: World, pipeline: DamagePipeline, config: CombatConfig) -> Self {
        let (requests_tx, requests_rx) = channel();
        Self {
            world,
            pipeline,
            config,
            requests_tx,
            requests_rx,
        }
    }

    /// A handle producers on any thread can use to enqueue damage.
    pub fn request_handle(&self) -> Sender<DamageRequest> {
        self.requests_tx.clone()
    }

    /// Run one tick: drain queued requests into a batch, let gather systems
    /// append, process the batch, advance the tick counter.
    pub fn tick(&mut self) -> Result<BatchReceipt, PipelineError> {
        let batch: Vec<DamageEvent> = self
            .requests_rx
            .try_iter()
            .map(DamageRequest::into_event)
            .collect();
        if !batch.is_empty() {
            debug!(
                tick = self.pipeline.tick(),
                queued = batch.len(),
                "drained cross-thread damage requests"
            );
        }
        self.pipeline.run_tick(&mut self.world, batch)
    }

    /// Run `count` ticks, returning the accumulated receipt.
    pub fn run_ticks(&mut self, count: u64) -> Result<BatchReceipt, PipelineError> {
        let mut total = BatchReceipt::default();
        for _ in 0..count {
            total.absorb(&self.tick()?);
        }
        Ok(total)
    }

    // -- accessors ----------------------------------------------------------

    /// Ticks executed so far.
    pub fn tick_count(&self) -> u64 {
        self.pipeline.tick()
    }

    /// Read access to the world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access for setup and tests.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The pipeline.
    pub fn pipeline(&self) -> &DamagePipeline {
        &self.pipeline
    }

    /// The loop configuration.
    pub fn config(&self) -> &CombatConfig {
        &self.config
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
