//! Damage provenance.
//!
//! [`Source`] is a closed set of variants so that message formatting (and any
//! other per-provenance dispatch) is an exhaustive match the compiler checks,
//! rather than open virtual dispatch.

use std::fmt;

use harrow_ecs::entity::EntityRef;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// EnvironmentKind
// ---------------------------------------------------------------------------

/// The kinds of environmental damage the simulation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvironmentKind {
    /// Fall damage from height.
    Fall,
    /// Standing in fire or lava.
    Fire,
    /// Out of air underwater.
    Drowning,
    /// Below the bottom of the world.
    Void,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Where a damage event came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Source {
    /// Another entity dealt the damage.
    Entity {
        /// The attacking entity.
        attacker: EntityRef,
    },
    /// The environment dealt the damage.
    Environment(EnvironmentKind),
    /// An operator command dealt the damage.
    Command {
        /// Who issued the command.
        issuer: String,
    },
}

impl Source {
    /// The attacking entity, when one exists.
    pub fn attacker(&self) -> Option<EntityRef> {
        match self {
            Source::Entity { attacker } => Some(*attacker),
            Source::Environment(_) | Source::Command { .. } => None,
        }
    }

    /// Format the death message for `target` dying to this source.
    pub fn death_message(&self, target: EntityRef) -> DeathMessage {
        let text = match self {
            Source::Entity { attacker } => format!("{target} was slain by {attacker}"),
            Source::Environment(EnvironmentKind::Fall) => {
                format!("{target} fell from a high place")
            }
            Source::Environment(EnvironmentKind::Fire) => format!("{target} went up in flames"),
            Source::Environment(EnvironmentKind::Drowning) => format!("{target} drowned"),
            Source::Environment(EnvironmentKind::Void) => {
                format!("{target} fell out of the world")
            }
            Source::Command { issuer } => format!("{target} was removed by {issuer}"),
        };
        DeathMessage { target, text }
    }
}

// ---------------------------------------------------------------------------
// DeathMessage
// ---------------------------------------------------------------------------

/// A formatted death announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathMessage {
    /// The entity that died.
    pub target: EntityRef,
    /// The rendered announcement text.
    pub text: String,
}

impl fmt::Display for DeathMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
