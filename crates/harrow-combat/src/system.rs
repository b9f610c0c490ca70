//! The contract between the pipeline and its systems.
//!
//! A [`DamageSystem`] participates in the Filter and/or Inspect stages and
//! sees each event of a batch through a [`SystemContext`]. The context is the
//! enforcement point for stage rights: `set_amount`, `cancel`, and `meta_mut`
//! only work during Filter. Called during Inspect they leave the event
//! untouched, log an error, and record a [`ContractViolation`] that surfaces
//! in the batch receipt -- a programming error made loud at development and
//! test time rather than silently accepted.
//!
//! `handle` is invoked by the orchestrator only. Calling it directly from
//! gameplay code bypasses stage ordering and the command-buffer flush point;
//! don't.

use harrow_ecs::command::CommandBuffer;
use harrow_ecs::entity::EntityRef;
use harrow_ecs::store::World;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::cause::{CauseFlags, CauseTable};
use crate::event::DamageEvent;
use crate::meta::MetaStore;
use crate::source::Source;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The ordered processing stages of one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    /// Events are created and collected into the batch.
    Gather,
    /// Systems may rescale amounts, write metadata, and cancel events.
    Filter,
    /// Systems observe finalized events; mutation rights are revoked.
    Inspect,
}

// ---------------------------------------------------------------------------
// OrderingHints
// ---------------------------------------------------------------------------

/// Ordering edges a system declares against other systems in its stage.
///
/// Systems with no hints run in registration order.
#[derive(Debug, Clone, Default)]
pub struct OrderingHints {
    /// Names of systems that must run before this one.
    pub run_after: Vec<String>,
    /// Names of systems that must run after this one.
    pub run_before: Vec<String>,
}

impl OrderingHints {
    /// No constraints.
    pub fn none() -> Self {
        Self::default()
    }

    /// Add a must-run-after edge.
    pub fn after(mut self, name: &str) -> Self {
        self.run_after.push(name.to_owned());
        self
    }

    /// Add a must-run-before edge.
    pub fn before(mut self, name: &str) -> Self {
        self.run_before.push(name.to_owned());
        self
    }
}

// ---------------------------------------------------------------------------
// ContractViolation
// ---------------------------------------------------------------------------

/// A recorded attempt to mutate an event outside the Filter stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    /// The offending system.
    pub system: String,
    /// The stage it was running in.
    pub stage: Stage,
    /// Which mutator it called.
    pub action: &'static str,
}

// ---------------------------------------------------------------------------
// DamageSystem
// ---------------------------------------------------------------------------

/// A system participating in the Filter and/or Inspect stage.
pub trait DamageSystem: Send {
    /// Unique name, used for ordering edges and diagnostics.
    fn name(&self) -> &str;

    /// Which stages this system runs in. Must be a non-empty subset of
    /// `{Filter, Inspect}`.
    fn stages(&self) -> &'static [Stage];

    /// Ordering edges against other systems in the same stage.
    fn ordering(&self) -> OrderingHints {
        OrderingHints::none()
    }

    /// Called once before each batch, before any `handle` call. Stateful
    /// systems reset per-batch scratch state here.
    fn batch_begin(&mut self) {}

    /// Process one event. Invoked by the orchestrator only.
    fn handle(&mut self, ctx: &mut SystemContext<'_>);
}

// ---------------------------------------------------------------------------
// GatherSystem
// ---------------------------------------------------------------------------

/// A producer that opens a batch by appending fresh events.
///
/// Gather systems only append; no ordering among them is guaranteed or
/// needed.
pub trait GatherSystem: Send {
    /// Diagnostic name.
    fn name(&self) -> &str;

    /// Append this tick's events to `out`.
    fn gather(&mut self, world: &World, tick: u64, out: &mut Vec<DamageEvent>);
}

// ---------------------------------------------------------------------------
// SystemContext
// ---------------------------------------------------------------------------

/// Everything a [`DamageSystem`] sees while handling one event.
pub struct SystemContext<'a> {
    world: &'a World,
    commands: &'a mut CommandBuffer,
    causes: &'a CauseTable,
    event: &'a mut DamageEvent,
    stage: Stage,
    tick: u64,
    system_name: &'a str,
    violations: &'a mut Vec<ContractViolation>,
}

impl<'a> SystemContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        world: &'a World,
        commands: &'a mut CommandBuffer,
        causes: &'a CauseTable,
        event: &'a mut DamageEvent,
        stage: Stage,
        tick: u64,
        system_name: &'a str,
        violations: &'a mut Vec<ContractViolation>,
    ) -> Self {
        Self {
            world,
            commands,
            causes,
            event,
            stage,
            tick,
            system_name,
            violations,
        }
    }

    // -- surroundings -------------------------------------------------------

    /// Read access to the world. Mutation goes through [`commands`](Self::commands).
    pub fn world(&self) -> &World {
        self.world
    }

    /// The command buffer for deferred world mutation.
    pub fn commands(&mut self) -> &mut CommandBuffer {
        self.commands
    }

    /// The damage-cause definition table.
    pub fn causes(&self) -> &CauseTable {
        self.causes
    }

    /// The stage this system is currently running in.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The simulation tick this batch belongs to.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    // -- event reads --------------------------------------------------------

    /// The event's provenance.
    pub fn source(&self) -> &Source {
        self.event.source()
    }

    /// The event's cause id.
    pub fn cause_id(&self) -> &str {
        self.event.cause_id()
    }

    /// The cause flags for this event, via the table.
    pub fn cause_flags(&self) -> CauseFlags {
        self.causes.lookup(self.event.cause_id())
    }

    /// The working amount.
    pub fn amount(&self) -> f32 {
        self.event.amount()
    }

    /// Whether the event has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.event.is_cancelled()
    }

    /// The entity the damage applies to.
    pub fn target(&self) -> EntityRef {
        self.event.target()
    }

    /// Read access to event metadata.
    pub fn meta(&self) -> &MetaStore {
        self.event.meta()
    }

    // -- event mutation (Filter stage only) ---------------------------------

    /// Replace the working amount. Outside Filter this records a violation
    /// and the event is untouched.
    pub fn set_amount(&mut self, amount: f32) {
        if self.check_filter_stage("set_amount") {
            self.event.set_amount(amount);
        }
    }

    /// Cancel the event. Outside Filter this records a violation and the
    /// event is untouched.
    pub fn cancel(&mut self) {
        if self.check_filter_stage("cancel") {
            self.event.cancel();
        }
    }

    /// Write access to event metadata, or `None` outside the Filter stage
    /// (which records a violation).
    pub fn meta_mut(&mut self) -> Option<&mut MetaStore> {
        if self.check_filter_stage("meta_mut") {
            Some(self.event.meta_mut())
        } else {
            None
        }
    }

    fn check_filter_stage(&mut self, action: &'static str) -> bool {
        if self.stage == Stage::Filter {
            return true;
        }
        error!(
            system = %self.system_name,
            stage = ?self.stage,
            action,
            "stage contract violation: event mutation outside the Filter stage"
        );
        self.violations.push(ContractViolation {
            system: self.system_name.to_owned(),
            stage: self.stage,
            action,
        });
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
