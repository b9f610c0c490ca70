//! Combat components stored on entities.
//!
//! These are the component types the pipeline reads and writes through the
//! world facade. [`register_combat_components`] wires all of them into a
//! world in one call; embedders that only use a subset can register
//! individually instead.

use harrow_ecs::store::World;
use serde::{Deserialize, Serialize};

use crate::sequence::DamageSequence;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// Hit points. The apply step subtracts finalized damage here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Health {
    /// Current hit points, floored at zero by the apply step.
    pub current: f32,
    /// Maximum hit points.
    pub max: f32,
}

impl Health {
    /// Full health at `max`.
    pub fn full(max: f32) -> Self {
        Self { current: max, max }
    }

    /// Whether the entity is out of hit points.
    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }
}

// ---------------------------------------------------------------------------
// Resistance
// ---------------------------------------------------------------------------

/// Fractional damage reduction applied by the resistance filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resistance {
    /// Fraction of incoming damage removed, expected in `0.0..=1.0`.
    pub reduction: f32,
}

// ---------------------------------------------------------------------------
// Armor
// ---------------------------------------------------------------------------

/// Flat damage reduction applied by the armor filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Armor {
    /// Points subtracted from incoming damage.
    pub flat: f32,
}

// ---------------------------------------------------------------------------
// Invulnerable
// ---------------------------------------------------------------------------

/// Marker: the entity cannot currently be damaged (void damage excepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Invulnerable;

// ---------------------------------------------------------------------------
// ComboHeat
// ---------------------------------------------------------------------------

/// On-hit stat effect accumulated by the sequence modifier: total hits the
/// entity has landed while combos were running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ComboHeat(pub u32);

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Register every combat component type on a world.
pub fn register_combat_components(world: &mut World) {
    world.register_component::<Health>("health");
    world.register_component::<Resistance>("resistance");
    world.register_component::<Armor>("armor");
    world.register_component::<Invulnerable>("invulnerable");
    world.register_component::<DamageSequence>("damage_sequence");
    world.register_component::<ComboHeat>("combo_heat");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
