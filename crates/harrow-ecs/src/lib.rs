//! Harrow ECS -- the narrow entity/component facade for the Harrow combat
//! core.
//!
//! This crate provides exactly what the damage pipeline consumes and nothing
//! more: generational entity handles ([`entity`]), a registration-first typed
//! component store ([`store`]), a causality-carrying command buffer for
//! deferred mutation ([`command`]), and a dependency graph with topological
//! resolution for ordering named processing units ([`schedule`]).
//!
//! # Quick Start
//!
//! ```
//! use harrow_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Health { current: f32, max: f32 }
//!
//! let mut world = World::new();
//! world.register_component::<Health>("health");
//!
//! let goblin = world.spawn();
//! world.insert(goblin, Health { current: 12.0, max: 12.0 }).unwrap();
//!
//! let mut commands = CommandBuffer::new();
//! commands.set_component(
//!     goblin,
//!     "health",
//!     Health { current: 7.0, max: 12.0 },
//!     SystemId(1),
//!     CausalReason::DamageApplied { target: goblin },
//! );
//! commands.flush(&mut world);
//!
//! assert_eq!(world.get::<Health>(goblin).map(|h| h.current), Some(7.0));
//! ```

#![deny(unsafe_code)]

pub mod command;
pub mod entity;
pub mod schedule;
pub mod store;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or already despawned).
    #[error("entity {entity} does not exist (stale or despawned)")]
    StaleEntity {
        /// The offending handle.
        entity: entity::EntityRef,
    },

    /// A component type was used without being registered first.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent {
        /// Rust type name of the unregistered component.
        name: String,
        /// The names that are registered, for the error message.
        registered: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{CausalReason, Command, CommandBuffer, FlushReport, SystemId};
    pub use crate::entity::{EntityAllocator, EntityRef};
    pub use crate::schedule::{DependencyGraph, ScheduleError};
    pub use crate::store::{ComponentId, World};
    pub use crate::EcsError;
}
