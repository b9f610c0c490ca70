//! Consecutive-hit damage scaling.
//!
//! The [`SequenceModifier`] is a Filter-stage system that scales an event's
//! amount by the attacker's current hit streak, then advances that streak.
//! The streak lives in a [`DamageSequence`] component on the *attacker*, not
//! on the event: it outlives any single event and is shared by every hit the
//! attacker lands.
//!
//! Because the batch may still be iterating entities, the modifier never
//! writes the attacker's components directly. Advancement is tracked in a
//! per-batch pending map (so multi-hit attacks in one batch see each other)
//! and published through the command buffer, which the orchestrator flushes
//! after the Filter barrier.
//!
//! The multiplier curve is pluggable via [`DamageCalculator`]. The shipped
//! [`LinearRampCalculator`] ramps +25 % per consecutive hit and caps at
//! x2.0; the streak resets once the idle gap exceeds the configured window.

use std::collections::HashMap;

use harrow_ecs::command::{CausalReason, SystemId};
use harrow_ecs::entity::EntityRef;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::components::ComboHeat;
use crate::meta::MetaKey;
use crate::system::{DamageSystem, Stage, SystemContext};

/// Command-buffer identity of the sequence modifier.
pub const SEQUENCE_SYSTEM: SystemId = SystemId(20);

// ---------------------------------------------------------------------------
// DamageSequence
// ---------------------------------------------------------------------------

/// Per-attacker combo state. Created lazily on the first qualifying hit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageSequence {
    /// Qualifying hits landed inside the current window.
    pub hit_count: u32,
    /// Tick of the most recent qualifying hit.
    pub last_hit_tick: u64,
}

// ---------------------------------------------------------------------------
// ComboHit meta
// ---------------------------------------------------------------------------

/// Event tag marking a hit as combo-eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboHit {
    /// The entity whose streak this hit belongs to.
    pub attacker: EntityRef,
}

/// Meta key the gatherer sets on combo-eligible events. Events without it
/// pass through the sequence modifier untouched.
pub static COMBO_HIT: Lazy<MetaKey<ComboHit>> = Lazy::new(|| MetaKey::new("combo_hit"));

// ---------------------------------------------------------------------------
// ComboConfig
// ---------------------------------------------------------------------------

/// Tuning for the combo window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComboConfig {
    /// Maximum idle gap, in ticks, before the streak resets.
    pub window_ticks: u64,
}

impl Default for ComboConfig {
    /// 40 ticks: two seconds at the default 20 t/s simulation rate.
    fn default() -> Self {
        Self { window_ticks: 40 }
    }
}

// ---------------------------------------------------------------------------
// DamageCalculator
// ---------------------------------------------------------------------------

/// Multiplier curve strategy. Implementations must be monotonic
/// non-decreasing in `hit_count` and capped.
pub trait DamageCalculator: Send {
    /// The multiplier for a hit landed with `hit_count` prior hits in the
    /// window. `hit_count` 0 is the first hit and should map to 1.0.
    fn multiplier(&self, hit_count: u32) -> f32;
}

/// Linear ramp with a hard cap: `min(1 + per_hit * hit_count, cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearRampCalculator {
    /// Added to the multiplier per prior consecutive hit.
    pub per_hit: f32,
    /// Upper bound on the multiplier.
    pub cap: f32,
}

impl Default for LinearRampCalculator {
    fn default() -> Self {
        Self {
            per_hit: 0.25,
            cap: 2.0,
        }
    }
}

impl DamageCalculator for LinearRampCalculator {
    fn multiplier(&self, hit_count: u32) -> f32 {
        (1.0 + self.per_hit * hit_count as f32).min(self.cap)
    }
}

// ---------------------------------------------------------------------------
// SequenceModifier
// ---------------------------------------------------------------------------

/// Filter-stage system applying and advancing per-attacker combo scaling.
pub struct SequenceModifier {
    calculator: Box<dyn DamageCalculator>,
    window_ticks: u64,
    /// Streak state advanced within the current batch, keyed by attacker.
    /// Published via the command buffer; cleared at every batch start.
    pending: HashMap<EntityRef, DamageSequence>,
}

impl SequenceModifier {
    /// Well-known name for ordering edges.
    pub const NAME: &'static str = "sequence_modifier";

    /// Build with an explicit curve and window.
    pub fn new(calculator: Box<dyn DamageCalculator>, config: ComboConfig) -> Self {
        Self {
            calculator,
            window_ticks: config.window_ticks,
            pending: HashMap::new(),
        }
    }

    /// The shipped default: linear ramp, 40-tick window.
    pub fn with_defaults() -> Self {
        Self::new(Box::<LinearRampCalculator>::default(), ComboConfig::default())
    }

    /// Current streak for an attacker as this batch sees it: the batch-local
    /// pending state if the attacker already hit this batch, else the
    /// persistent component, else a fresh streak.
    fn current_sequence(
        &self,
        ctx: &SystemContext<'_>,
        attacker: EntityRef,
    ) -> DamageSequence {
        self.pending
            .get(&attacker)
            .copied()
            .or_else(|| ctx.world().get::<DamageSequence>(attacker).copied())
            .unwrap_or_default()
    }
}

impl DamageSystem for SequenceModifier {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Filter]
    }

    fn batch_begin(&mut self) {
        self.pending.clear();
    }

    fn handle(&mut self, ctx: &mut SystemContext<'_>) {
        let Some(hit) = ctx.meta().get(&COMBO_HIT).copied() else {
            return; // not tagged combo-eligible
        };
        let attacker = hit.attacker;
        let tick = ctx.tick();

        let mut sequence = self.current_sequence(ctx, attacker);
        if sequence.hit_count > 0 && tick.saturating_sub(sequence.last_hit_tick) > self.window_ticks
        {
            debug!(
                attacker = %attacker,
                idle = tick - sequence.last_hit_tick,
                window = self.window_ticks,
                "combo window lapsed, streak reset"
            );
            sequence.hit_count = 0;
        }

        let multiplier = self.calculator.multiplier(sequence.hit_count);
        ctx.set_amount(ctx.amount() * multiplier);

        sequence.hit_count += 1;
        sequence.last_hit_tick = tick;
        self.pending.insert(attacker, sequence);

        ctx.commands().set_component(
            attacker,
            "damage_sequence",
            sequence,
            SEQUENCE_SYSTEM,
            CausalReason::ComboAdvanced { attacker },
        );
        // On-hit stat effect for the attacker, also deferred.
        ctx.commands().enqueue(
            attacker,
            Some("combo_heat"),
            SEQUENCE_SYSTEM,
            CausalReason::ComboAdvanced { attacker },
            move |world| {
                let heat = world.get::<ComboHeat>(attacker).map_or(1, |h| h.0 + 1);
                world.insert(attacker, ComboHeat(heat))
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cause::CauseTable;
    use crate::components::register_combat_components;
    use crate::event::DamageEvent;
    use crate::source::Source;
    use harrow_ecs::command::CommandBuffer;
    use harrow_ecs::store::World;

    fn setup() -> (World, EntityRef, EntityRef) {
        let mut world = World::new();
        register_combat_components(&mut world);
        let attacker = world.spawn();
        let target = world.spawn();
        (world, attacker, target)
    }

    fn combo_event(attacker: EntityRef, target: EntityRef, amount: f32) -> DamageEvent {
        let mut event = DamageEvent::new(Source::Entity { attacker }, "physical", amount, target);
        event.meta_mut().set(&COMBO_HIT, ComboHit { attacker });
        event
    }

    /// Drive the modifier through one single-event batch the way the
    /// orchestrator would, returning the filtered amount.
    fn run_hit(
        modifier: &mut SequenceModifier,
        world: &mut World,
        attacker: EntityRef,
        target: EntityRef,
        tick: u64,
    ) -> f32 {
        let causes = CauseTable::builtin();
        let mut commands = CommandBuffer::new();
        let mut violations = Vec::new();
        let mut event = combo_event(attacker, target, 10.0);
        modifier.batch_begin();
        {
            let mut ctx = SystemContext::new(
                world,
                &mut commands,
                &causes,
                &mut event,
                Stage::Filter,
                tick,
                SequenceModifier::NAME,
                &mut violations,
            );
            modifier.handle(&mut ctx);
        }
        commands.flush(world);
        assert!(violations.is_empty());
        event.amount()
    }

    #[test]
    fn linear_ramp_is_monotonic_and_capped() {
        let calc = LinearRampCalculator::default();
        let mut last = 0.0;
        for hits in 0..20 {
            let m = calc.multiplier(hits);
            assert!(m >= last, "multiplier must be non-decreasing");
            assert!(m <= calc.cap);
            last = m;
        }
        assert_eq!(calc.multiplier(0), 1.0);
        assert_eq!(calc.multiplier(2), 1.5);
        assert_eq!(calc.multiplier(10), 2.0);
    }

    #[test]
    fn untagged_event_passes_through() {
        let (mut world, attacker, target) = setup();
        let mut modifier = SequenceModifier::with_defaults();
        let causes = CauseTable::builtin();
        let mut commands = CommandBuffer::new();
        let mut violations = Vec::new();
        let mut event = DamageEvent::new(Source::Entity { attacker }, "physical", 10.0, target);
        modifier.batch_begin();
        {
            let mut ctx = SystemContext::new(
                &world,
                &mut commands,
                &causes,
                &mut event,
                Stage::Filter,
                0,
                SequenceModifier::NAME,
                &mut violations,
            );
            modifier.handle(&mut ctx);
        }
        assert_eq!(event.amount(), 10.0);
        assert!(commands.is_empty());
        assert!(!world.has::<DamageSequence>(attacker));
    }

    #[test]
    fn consecutive_hits_ramp_within_window() {
        let (mut world, attacker, target) = setup();
        let mut modifier = SequenceModifier::with_defaults();

        let a1 = run_hit(&mut modifier, &mut world, attacker, target, 0);
        let a2 = run_hit(&mut modifier, &mut world, attacker, target, 10);
        let a3 = run_hit(&mut modifier, &mut world, attacker, target, 20);
        assert_eq!(a1, 10.0);
        assert_eq!(a2, 12.5);
        assert_eq!(a3, 15.0, "third hit in a combo is x1.5");

        let seq = world.get::<DamageSequence>(attacker).unwrap();
        assert_eq!(seq.hit_count, 3);
        assert_eq!(seq.last_hit_tick, 20);
        assert_eq!(world.get::<ComboHeat>(attacker), Some(&ComboHeat(3)));
    }

    #[test]
    fn lapsed_window_resets_streak() {
        let (mut world, attacker, target) = setup();
        let mut modifier = SequenceModifier::with_defaults();

        run_hit(&mut modifier, &mut world, attacker, target, 0);
        run_hit(&mut modifier, &mut world, attacker, target, 10);
        // Idle beyond the 40-tick window.
        let late = run_hit(&mut modifier, &mut world, attacker, target, 100);
        assert_eq!(late, 10.0, "streak reset, back to x1.0");
        assert_eq!(world.get::<DamageSequence>(attacker).unwrap().hit_count, 1);
    }

    #[test]
    fn gap_exactly_at_window_still_counts() {
        let (mut world, attacker, target) = setup();
        let mut modifier = SequenceModifier::with_defaults();
        run_hit(&mut modifier, &mut world, attacker, target, 0);
        let a = run_hit(&mut modifier, &mut world, attacker, target, 40);
        assert_eq!(a, 12.5, "a gap equal to the window does not lapse");
    }

    #[test]
    fn multi_hit_batch_advances_through_pending_state() {
        let (mut world, attacker, target) = setup();
        let mut modifier = SequenceModifier::with_defaults();
        let causes = CauseTable::builtin();
        let mut commands = CommandBuffer::new();
        let mut violations = Vec::new();

        // Three hits in one batch: the world is not updated between them,
        // only the pending map advances.
        modifier.batch_begin();
        let mut amounts = Vec::new();
        for _ in 0..3 {
            let mut event = combo_event(attacker, target, 10.0);
            {
                let mut ctx = SystemContext::new(
                    &world,
                    &mut commands,
                    &causes,
                    &mut event,
                    Stage::Filter,
                    5,
                    SequenceModifier::NAME,
                    &mut violations,
                );
                modifier.handle(&mut ctx);
            }
            amounts.push(event.amount());
        }
        assert_eq!(amounts, vec![10.0, 12.5, 15.0]);

        // World state lands only at the flush point.
        assert!(!world.has::<DamageSequence>(attacker));
        commands.flush(&mut world);
        assert_eq!(world.get::<DamageSequence>(attacker).unwrap().hit_count, 3);
    }

    #[test]
    fn streaks_are_per_attacker() {
        let (mut world, attacker_a, target) = setup();
        let attacker_b = world.spawn();
        let mut modifier = SequenceModifier::with_defaults();

        run_hit(&mut modifier, &mut world, attacker_a, target, 0);
        run_hit(&mut modifier, &mut world, attacker_a, target, 1);
        let b1 = run_hit(&mut modifier, &mut world, attacker_b, target, 2);
        assert_eq!(b1, 10.0, "attacker B starts its own streak");
        assert_eq!(world.get::<DamageSequence>(attacker_a).unwrap().hit_count, 2);
        assert_eq!(world.get::<DamageSequence>(attacker_b).unwrap().hit_count, 1);
    }
}
