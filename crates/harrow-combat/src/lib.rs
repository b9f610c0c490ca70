//! Harrow Combat -- the staged damage-event pipeline.
//!
//! This crate builds on [`harrow_ecs`] to compute, filter, and finalize
//! damage against simulated entities inside a tick-based server. One batch of
//! [`DamageEvent`](event::DamageEvent)s per tick flows through three ordered
//! stages with a hard barrier between them:
//!
//! - **Gather**: producers create events and the batch freezes.
//! - **Filter**: dependency-ordered systems rescale amounts, attach typed
//!   metadata, or cancel events; deferred world mutation queues in the
//!   command buffer, which flushes at the end of the stage.
//! - **Inspect**: read-only systems trigger secondary effects off the
//!   finalized events.
//!
//! A terminal apply step then commits health reductions for events that are
//! uncancelled and still positive, and discards everything else.
//!
//! # Quick Start
//!
//! ```
//! use harrow_combat::prelude::*;
//!
//! let mut world = World::new();
//! register_combat_components(&mut world);
//!
//! let target = world.spawn();
//! world.insert(target, Health::full(20.0)).unwrap();
//! world.insert(target, Resistance { reduction: 0.3 }).unwrap();
//!
//! let mut pipeline = PipelineBuilder::new()
//!     .add_system(Box::new(ResistanceFilter))
//!     .add_system(Box::new(SequenceModifier::with_defaults()))
//!     .add_system(Box::new(DamageLogInspector))
//!     .build()
//!     .expect("static system set cannot cycle");
//!
//! let attacker = world.spawn();
//! let event = DamageEvent::new(Source::Entity { attacker }, "physical", 10.0, target);
//! let receipt = pipeline.submit(&mut world, vec![event]).unwrap();
//!
//! assert_eq!(receipt.applied, 1);
//! assert_eq!(world.get::<Health>(target).unwrap().current, 13.0);
//! ```

#![deny(unsafe_code)]

pub mod cause;
pub mod components;
pub mod event;
pub mod filters;
pub mod inspect;
pub mod meta;
pub mod pipeline;
pub mod sequence;
pub mod source;
pub mod system;
pub mod telemetry;
pub mod tick;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the ECS facade for convenience.
pub use harrow_ecs;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use harrow_ecs::prelude::*;

    pub use crate::cause::{CauseFlags, CauseTable};
    pub use crate::components::{
        register_combat_components, Armor, ComboHeat, Health, Invulnerable, Resistance,
    };
    pub use crate::event::DamageEvent;
    pub use crate::filters::{ArmorFilter, InvulnerabilityFilter, ResistanceFilter};
    pub use crate::inspect::{DamageLogInspector, ImpactCue, ImpactFxInspector, ImpactKind};
    pub use crate::meta::{MetaKey, MetaStore};
    pub use crate::pipeline::{BatchReceipt, DamagePipeline, PipelineBuilder, PipelineError};
    pub use crate::sequence::{
        ComboConfig, ComboHit, DamageCalculator, DamageSequence, LinearRampCalculator,
        SequenceModifier, COMBO_HIT,
    };
    pub use crate::source::{DeathMessage, EnvironmentKind, Source};
    pub use crate::system::{
        ContractViolation, DamageSystem, GatherSystem, OrderingHints, Stage, SystemContext,
    };
    pub use crate::tick::{CombatConfig, CombatLoop, DamageRequest};
}
