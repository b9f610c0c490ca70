//! Stock Inspect-stage systems.
//!
//! Inspect systems run after the Filter barrier and the command flush, see
//! the finalized events, and must not mutate them. Their job is secondary
//! effects keyed off the outcome: logs, sound and particle cues, telemetry.

use std::sync::{Arc, Mutex};

use harrow_ecs::entity::EntityRef;
use tracing::debug;

use crate::system::{DamageSystem, Stage, SystemContext};

// ---------------------------------------------------------------------------
// DamageLogInspector
// ---------------------------------------------------------------------------

/// Emits one structured log line per finalized event, cancelled ones
/// included.
pub struct DamageLogInspector;

impl DamageLogInspector {
    /// Well-known name for ordering edges.
    pub const NAME: &'static str = "damage_log";
}

impl DamageSystem for DamageLogInspector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Inspect]
    }

    fn handle(&mut self, ctx: &mut SystemContext<'_>) {
        debug!(
            target = %ctx.target(),
            cause = ctx.cause_id(),
            amount = ctx.amount(),
            cancelled = ctx.is_cancelled(),
            source = ?ctx.source(),
            "damage event finalized"
        );
    }
}

// ---------------------------------------------------------------------------
// ImpactFxInspector
// ---------------------------------------------------------------------------

/// Coarseness of the impact feedback to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactKind {
    /// Barely-there damage; a soft tick.
    Graze,
    /// A normal hit.
    Hit,
    /// Above the heavy threshold; screen shake territory.
    Heavy,
}

/// One sound/particle cue derived from a finalized event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpactCue {
    /// The entity the feedback plays on.
    pub target: EntityRef,
    /// How hard the hit should read.
    pub kind: ImpactKind,
}

/// Shared sink the presentation layer drains each tick.
pub type CueSink = Arc<Mutex<Vec<ImpactCue>>>;

/// Derives impact cues from finalized amounts. Cancelled and zeroed events
/// produce no feedback.
pub struct ImpactFxInspector {
    heavy_threshold: f32,
    sink: CueSink,
}

impl ImpactFxInspector {
    /// Well-known name for ordering edges.
    pub const NAME: &'static str = "impact_fx";

    /// Build with a cue sink and a heavy-hit threshold.
    pub fn new(sink: CueSink, heavy_threshold: f32) -> Self {
        Self {
            heavy_threshold,
            sink,
        }
    }

    /// Convenience: build with a fresh sink and the default threshold of 8.0,
    /// returning both.
    pub fn with_sink() -> (Self, CueSink) {
        let sink: CueSink = Arc::default();
        (Self::new(Arc::clone(&sink), 8.0), sink)
    }
}

impl DamageSystem for ImpactFxInspector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stages(&self) -> &'static [Stage] {
        &[Stage::Inspect]
    }

    fn handle(&mut self, ctx: &mut SystemContext<'_>) {
        if ctx.is_cancelled() || ctx.amount() <= 0.0 {
            return;
        }
        let kind = if ctx.amount() < 1.0 {
            ImpactKind::Graze
        } else if ctx.amount() >= self.heavy_threshold {
            ImpactKind::Heavy
        } else {
            ImpactKind::Hit
        };
        if let Ok(mut cues) = self.sink.lock() {
            cues.push(ImpactCue {
                target: ctx.target(),
                kind,
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cause::CauseTable;
    use crate::event::DamageEvent;
    use crate::source::{EnvironmentKind, Source};
    use harrow_ecs::command::CommandBuffer;
    use harrow_ecs::store::World;

    fn inspect(system: &mut dyn DamageSystem, event: &mut DamageEvent) {
        let world = World::new();
        let causes = CauseTable::builtin();
        let mut commands = CommandBuffer::new();
        let mut violations = Vec::new();
        let name = system.name().to_owned();
        let mut ctx = SystemContext::new(
            &world,
            &mut commands,
            &causes,
            event,
            Stage::Inspect,
            0,
            &name,
            &mut violations,
        );
        system.handle(&mut ctx);
        assert!(violations.is_empty());
    }

    fn fall(amount: f32) -> DamageEvent {
        DamageEvent::new(
            Source::Environment(EnvironmentKind::Fall),
            "fall",
            amount,
            EntityRef::new(1, 0),
        )
    }

    #[test]
    fn cue_kinds_by_amount() {
        let (mut fx, sink) = ImpactFxInspector::with_sink();
        inspect(&mut fx, &mut fall(0.5));
        inspect(&mut fx, &mut fall(4.0));
        inspect(&mut fx, &mut fall(9.0));
        let cues = sink.lock().unwrap();
        assert_eq!(cues.len(), 3);
        assert_eq!(cues[0].kind, ImpactKind::Graze);
        assert_eq!(cues[1].kind, ImpactKind::Hit);
        assert_eq!(cues[2].kind, ImpactKind::Heavy);
    }

    #[test]
    fn cancelled_and_zeroed_events_make_no_cue() {
        let (mut fx, sink) = ImpactFxInspector::with_sink();
        let mut cancelled = fall(5.0);
        cancelled.cancel();
        inspect(&mut fx, &mut cancelled);
        inspect(&mut fx, &mut fall(0.0));
        assert!(sink.lock().unwrap().is_empty());
    }

    #[test]
    fn log_inspector_reads_without_violations() {
        let mut log = DamageLogInspector;
        let mut event = fall(3.0);
        inspect(&mut log, &mut event);
        assert_eq!(event.amount(), 3.0);
    }
}
