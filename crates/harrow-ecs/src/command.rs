//! Command buffer for deferred world mutations.
//!
//! Systems never mutate the [`World`] while a batch is in flight; they queue
//! a [`Command`] and the owner of the world flushes the buffer at a defined
//! synchronization point. Each command carries causality metadata
//! ([`SystemId`], [`CausalReason`]) so logs and telemetry can trace every
//! state change back to the system that asked for it.
//!
//! Commands are applied in strict FIFO order. Two commands that target the
//! same (entity, component) pair within one flush are last-write-wins; the
//! flush logs the conflict but does not treat it as an error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entity::EntityRef;
use crate::store::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// SystemId
// ---------------------------------------------------------------------------

/// Numeric identity of the system that issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemId(pub u32);

impl SystemId {
    /// Engine-internal bookkeeping, not tied to a registered system.
    pub const INTERNAL: SystemId = SystemId(0);
}

// ---------------------------------------------------------------------------
// CausalReason
// ---------------------------------------------------------------------------

/// Why a command was issued. Prefer the most specific variant; `Internal` is
/// a last resort that weakens the diagnostic value of the flush log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CausalReason {
    /// A damage event finished processing against this target.
    DamageApplied { target: EntityRef },
    /// An attacker's hit sequence advanced.
    ComboAdvanced { attacker: EntityRef },
    /// An attacker's hit sequence lapsed and was reset.
    ComboLapsed { attacker: EntityRef },
    /// A named gameplay rule fired.
    Rule(String),
    /// Internal system logic.
    Internal(String),
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// The deferred mutation itself.
enum CommandOp {
    /// Run an arbitrary typed mutation against the world.
    Mutate(Box<dyn FnOnce(&mut World) -> Result<(), EcsError> + Send>),
    /// Despawn the target entity.
    Despawn,
}

/// A single deferred mutation with causality metadata.
pub struct Command {
    /// The entity this command targets.
    pub target: EntityRef,
    /// Registered component name, when the mutation is component-scoped.
    /// Used for conflict detection and diagnostics; `None` for despawns.
    pub component_name: Option<String>,
    /// Which system issued this command.
    pub issued_by: SystemId,
    /// Why it was issued.
    pub reason: CausalReason,
    /// Position within the buffer, assigned on insertion.
    pub command_index: u32,
    op: CommandOp,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("target", &self.target)
            .field("component_name", &self.component_name)
            .field("issued_by", &self.issued_by)
            .field("reason", &self.reason)
            .field("command_index", &self.command_index)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FlushReport
// ---------------------------------------------------------------------------

/// Summary of the last [`CommandBuffer::flush`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Commands that mutated the world.
    pub success_count: usize,
    /// Commands that failed (stale entity, unregistered component).
    pub failed_count: usize,
    /// (entity, component) pairs targeted by more than one command.
    pub conflict_count: usize,
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// Collects deferred mutations and applies them FIFO at flush time.
///
/// Failed commands warn and are skipped; a stale target is an ordinary race
/// between a queued mutation and a despawn earlier in the same flush, not a
/// bug in the issuing system.
#[derive(Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    next_index: u32,
    last_report: FlushReport,
}

impl CommandBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a typed component write (insert or overwrite).
    ///
    /// `component_name` is the name the type was registered under; it feeds
    /// conflict detection and the flush log.
    pub fn set_component<T: Send + Sync + 'static>(
        &mut self,
        target: EntityRef,
        component_name: &str,
        value: T,
        issued_by: SystemId,
        reason: CausalReason,
    ) {
        self.push(
            target,
            Some(component_name.to_owned()),
            issued_by,
            reason,
            CommandOp::Mutate(Box::new(move |world| world.insert(target, value))),
        );
    }

    /// Queue an arbitrary mutation closure.
    ///
    /// Pass `component_name` when the mutation is scoped to one component so
    /// conflict detection can see it.
    pub fn enqueue(
        &mut self,
        target: EntityRef,
        component_name: Option<&str>,
        issued_by: SystemId,
        reason: CausalReason,
        mutation: impl FnOnce(&mut World) -> Result<(), EcsError> + Send + 'static,
    ) {
        self.push(
            target,
            component_name.map(str::to_owned),
            issued_by,
            reason,
            CommandOp::Mutate(Box::new(mutation)),
        );
    }

    /// Queue a despawn.
    pub fn despawn(&mut self, target: EntityRef, issued_by: SystemId, reason: CausalReason) {
        self.push(target, None, issued_by, reason, CommandOp::Despawn);
    }

    /// Queued commands in insertion order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Report from the last flush. Zeroed until `flush` is called.
    pub fn last_report(&self) -> FlushReport {
        self.last_report
    }

    /// Drop all queued commands without applying them.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.next_index = 0;
    }

    /// Apply every queued command to the world in FIFO order.
    ///
    /// The buffer is empty afterwards. Failures are logged and counted, never
    /// propagated: by the time a flush runs, the issuing system has already
    /// returned and has no way to react.
    pub fn flush(&mut self, world: &mut World) -> FlushReport {
        let commands = std::mem::take(&mut self.commands);
        self.next_index = 0;

        // Conflict scan before application.
        let mut seen: HashMap<(EntityRef, &str), u32> = HashMap::new();
        let mut conflict_count = 0;
        for cmd in &commands {
            if let Some(name) = cmd.component_name.as_deref() {
                let hits = seen.entry((cmd.target, name)).or_insert(0);
                *hits += 1;
                if *hits == 2 {
                    conflict_count += 1;
                    warn!(
                        entity = %cmd.target,
                        component = %name,
                        "multiple commands target the same entity+component this flush (last-write-wins)"
                    );
                }
            }
        }

        // The scan map borrows names out of `commands`; end those borrows
        // before the apply loop consumes the vector.
        drop(seen);

        let mut success_count = 0;
        let mut failed_count = 0;
        for cmd in commands {
            let result = match cmd.op {
                CommandOp::Mutate(mutation) => mutation(world),
                CommandOp::Despawn => world.despawn(cmd.target),
            };
            match result {
                Ok(()) => success_count += 1,
                Err(e) => {
                    failed_count += 1;
                    warn!(
                        command_index = cmd.command_index,
                        target = %cmd.target,
                        system_id = cmd.issued_by.0,
                        reason = ?cmd.reason,
                        error = %e,
                        "deferred command failed to apply"
                    );
                }
            }
        }

        self.last_report = FlushReport {
            success_count,
            failed_count,
            conflict_count,
        };
        self.last_report
    }

    // -- internal helpers ---------------------------------------------------

    fn push(
        &mut self,
        target: EntityRef,
        component_name: Option<String>,
        issued_by: SystemId,
        reason: CausalReason,
        op: CommandOp,
    ) {
        let command_index = self.next_index;
        self.next_index += 1;
        self.commands.push(Command {
            target,
            component_name,
            issued_by,
            reason,
            command_index,
            op,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Health(f32);

    #[derive(Debug, Clone, PartialEq)]
    struct Heat(u32);

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_component::<Health>("health");
        world.register_component::<Heat>("heat");
        world
    }

    #[test]
    fn set_component_applies_on_flush() {
        let mut world = setup_world();
        let e = world.spawn();

        let mut buf = CommandBuffer::new();
        buf.set_component(
            e,
            "health",
            Health(14.0),
            SystemId(3),
            CausalReason::DamageApplied { target: e },
        );
        assert_eq!(world.get::<Health>(e), None, "nothing applied before flush");

        let report = buf.flush(&mut world);
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failed_count, 0);
        assert_eq!(world.get::<Health>(e), Some(&Health(14.0)));
        assert!(buf.is_empty());
    }

    #[test]
    fn fifo_order_last_write_wins() {
        let mut world = setup_world();
        let e = world.spawn();

        let mut buf = CommandBuffer::new();
        buf.set_component(
            e,
            "heat",
            Heat(1),
            SystemId(1),
            CausalReason::Internal("first".to_owned()),
        );
        buf.set_component(
            e,
            "heat",
            Heat(2),
            SystemId(2),
            CausalReason::Internal("second".to_owned()),
        );

        let report = buf.flush(&mut world);
        assert_eq!(world.get::<Heat>(e), Some(&Heat(2)));
        assert_eq!(report.conflict_count, 1);
    }

    #[test]
    fn no_conflict_across_entities_or_components() {
        let mut world = setup_world();
        let e1 = world.spawn();
        let e2 = world.spawn();

        let mut buf = CommandBuffer::new();
        buf.set_component(
            e1,
            "heat",
            Heat(1),
            SystemId(1),
            CausalReason::Internal("a".to_owned()),
        );
        buf.set_component(
            e2,
            "heat",
            Heat(1),
            SystemId(1),
            CausalReason::Internal("b".to_owned()),
        );
        buf.set_component(
            e1,
            "health",
            Health(5.0),
            SystemId(1),
            CausalReason::Internal("c".to_owned()),
        );

        let report = buf.flush(&mut world);
        assert_eq!(report.conflict_count, 0);
        assert_eq!(report.success_count, 3);
    }

    #[test]
    fn stale_target_fails_without_aborting_flush() {
        let mut world = setup_world();
        let dead = world.spawn();
        let alive = world.spawn();
        world.despawn(dead).unwrap();

        let mut buf = CommandBuffer::new();
        buf.set_component(
            dead,
            "heat",
            Heat(1),
            SystemId(1),
            CausalReason::Internal("stale".to_owned()),
        );
        buf.set_component(
            alive,
            "heat",
            Heat(2),
            SystemId(1),
            CausalReason::Internal("ok".to_owned()),
        );

        let report = buf.flush(&mut world);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.success_count, 1);
        assert_eq!(world.get::<Heat>(alive), Some(&Heat(2)));
    }

    #[test]
    fn despawn_via_command() {
        let mut world = setup_world();
        let e = world.spawn();

        let mut buf = CommandBuffer::new();
        buf.despawn(e, SystemId(4), CausalReason::Rule("overkill".to_owned()));
        buf.flush(&mut world);
        assert!(!world.is_alive(e));
    }

    #[test]
    fn enqueue_closure_reads_then_writes() {
        let mut world = setup_world();
        let e = world.spawn();
        world.insert(e, Heat(10)).unwrap();

        let mut buf = CommandBuffer::new();
        buf.enqueue(
            e,
            Some("heat"),
            SystemId(7),
            CausalReason::ComboAdvanced { attacker: e },
            move |world| {
                let next = world.get::<Heat>(e).map_or(1, |h| h.0 + 1);
                world.insert(e, Heat(next))
            },
        );
        buf.flush(&mut world);
        assert_eq!(world.get::<Heat>(e), Some(&Heat(11)));
    }

    #[test]
    fn empty_flush_is_noop() {
        let mut world = setup_world();
        let mut buf = CommandBuffer::new();
        let report = buf.flush(&mut world);
        assert_eq!(report, FlushReport::default());
    }

    #[test]
    fn command_indices_are_sequential() {
        let mut world = setup_world();
        let e = world.spawn();
        let mut buf = CommandBuffer::new();
        for i in 0..5u32 {
            buf.set_component(
                e,
                "heat",
                Heat(i),
                SystemId(i),
                CausalReason::Internal(format!("step_{i}")),
            );
        }
        for (i, cmd) in buf.commands().iter().enumerate() {
            assert_eq!(cmd.command_index, i as u32);
        }
    }
}
