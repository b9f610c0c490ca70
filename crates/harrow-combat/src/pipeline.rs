//! The pipeline orchestrator.
//!
//! A [`DamagePipeline`] owns the registered systems, the per-stage execution
//! orders, and the command buffer. One batch of events flows:
//!
//! 1. **Gather** -- registered [`GatherSystem`]s append fresh events (and
//!    external callers may seed the batch). The batch is immutable once
//!    gathering completes.
//! 2. **Filter** -- every Filter system runs over the whole batch in its
//!    resolved dependency order. Systems rescale amounts, write metadata, or
//!    cancel events. Cancellation never short-circuits: later systems still
//!    run and may react to the flag.
//! 3. The command buffer is flushed. Deferred state (combo advancement,
//!    on-hit effects) becomes visible here, after Filter and before Inspect,
//!    never mid-Filter.
//! 4. **Inspect** -- read-only systems observe the finalized events.
//! 5. **Apply** -- uncancelled events with positive amounts commit a health
//!    reduction; everything else is discarded without touching the world.
//!
//! Each stage fully completes over the batch before the next begins. That
//! barrier is a contract, not an accident of the single-threaded loop: an
//! implementation that parallelizes within a stage must still honor it.
//!
//! Ordering within Filter and within Inspect comes from each system's
//! declared edges, resolved once at build time via topological sort.
//! A cycle fails [`PipelineBuilder::build`]; it can never hang a tick.

use harrow_ecs::command::CommandBuffer;
use harrow_ecs::schedule::{DependencyGraph, ScheduleError};
use harrow_ecs::store::World;
use tracing::{debug, info, warn};

use crate::cause::CauseTable;
use crate::components::Health;
use crate::event::DamageEvent;
use crate::system::{ContractViolation, DamageSystem, GatherSystem, Stage, SystemContext};

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Configuration and submission errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The declared ordering edges of one stage contain a cycle.
    #[error("dependency cycle in {stage:?} stage among: [{names}]")]
    DependencyCycle {
        /// The stage whose graph is cyclic.
        stage: Stage,
        /// Names of the systems stuck in the cycle.
        names: String,
    },

    /// An ordering edge names a system that is not registered anywhere.
    #[error("system '{system}' orders against unknown system '{target}'")]
    UnknownOrderingTarget {
        /// The system declaring the edge.
        system: String,
        /// The name that matched nothing.
        target: String,
    },

    /// Two systems were registered under the same name.
    #[error("duplicate system name '{name}'")]
    DuplicateSystem {
        /// The colliding name.
        name: String,
    },

    /// A system declared an empty stage set, or claimed the Gather stage.
    #[error("system '{name}' must declare a non-empty subset of {{Filter, Inspect}}")]
    InvalidStages {
        /// The offending system.
        name: String,
    },

    /// `submit` was called while a batch was already in flight.
    #[error("submit rejected: a batch is already in flight (the pipeline is not reentrant)")]
    ReentrantSubmit,
}

// ---------------------------------------------------------------------------
// BatchReceipt
// ---------------------------------------------------------------------------

/// Telemetry for one processed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchReceipt {
    /// Events in the batch after gathering.
    pub submitted: usize,
    /// Events that committed a health reduction.
    pub applied: usize,
    /// Events discarded because they were cancelled.
    pub cancelled: usize,
    /// Events discarded for a non-positive amount or an unusable target.
    pub discarded: usize,
    /// Applied events that emptied the target's health.
    pub kills: usize,
    /// Total health actually removed (post-clamping).
    pub total_applied: f32,
    /// Stage-contract violations recorded during the batch.
    pub violations: usize,
    /// Result of the command-buffer flush between Filter and Inspect.
    pub flush: harrow_ecs::command::FlushReport,
}

impl BatchReceipt {
    /// Fold another receipt into this one (for multi-tick accumulation).
    pub fn absorb(&mut self, other: &BatchReceipt) {
        self.submitted += other.submitted;
        self.applied += other.applied;
        self.cancelled += other.cancelled;
        self.discarded += other.discarded;
        self.kills += other.kills;
        self.total_applied += other.total_applied;
        self.violations += other.violations;
        self.flush.success_count += other.flush.success_count;
        self.flush.failed_count += other.flush.failed_count;
        self.flush.conflict_count += other.flush.conflict_count;
    }
}

// ---------------------------------------------------------------------------
// PipelineBuilder
// ---------------------------------------------------------------------------

/// Registers systems and resolves stage ordering into a [`DamagePipeline`].
///
/// This is the extension point for third parties: plugins register their own
/// Filter/Inspect systems with ordering edges and never touch the pipeline
/// internals.
pub struct PipelineBuilder {
    causes: CauseTable,
    gather: Vec<Box<dyn GatherSystem>>,
    systems: Vec<Box<dyn DamageSystem>>,
}

impl PipelineBuilder {
    /// Start a builder with the built-in cause table.
    pub fn new() -> Self {
        Self {
            causes: CauseTable::builtin(),
            gather: Vec::new(),
            systems: Vec::new(),
        }
    }

    /// Replace the cause table.
    pub fn with_causes(mut self, causes: CauseTable) -> Self {
        self.causes = causes;
        self
    }

    /// Register a gather-stage producer.
    pub fn add_gather(mut self, system: Box<dyn GatherSystem>) -> Self {
        self.gather.push(system);
        self
    }

    /// Register a Filter/Inspect system. It is routed into every stage group
    /// its [`DamageSystem::stages`] declares.
    pub fn add_system(mut self, system: Box<dyn DamageSystem>) -> Self {
        self.systems.push(system);
        self
    }

    /// Resolve stage ordering and produce the pipeline.
    ///
    /// Fails fast on configuration errors: duplicate names, invalid stage
    /// sets, unknown ordering targets, and dependency cycles all refuse to
    /// build. None of these can surface later at runtime.
    pub fn build(self) -> Result<DamagePipeline, PipelineError> {
        for (i, system) in self.systems.iter().enumerate() {
            let name = system.name();
            if self.systems[..i].iter().any(|s| s.name() == name) {
                return Err(PipelineError::DuplicateSystem {
                    name: name.to_owned(),
                });
            }
            let stages = system.stages();
            if stages.is_empty() || stages.contains(&Stage::Gather) {
                return Err(PipelineError::InvalidStages {
                    name: name.to_owned(),
                });
            }
        }

        let filter_order = resolve_stage(&self.systems, Stage::Filter)?;
        let inspect_order = resolve_stage(&self.systems, Stage::Inspect)?;
        debug!(
            filter = ?order_names(&self.systems, &filter_order),
            inspect = ?order_names(&self.systems, &inspect_order),
            "damage pipeline built"
        );

        Ok(DamagePipeline {
            causes: self.causes,
            gather: self.gather,
            systems: self.systems,
            filter_order,
            inspect_order,
            commands: CommandBuffer::new(),
            tick: 0,
            in_flight: false,
        })
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the execution order for one stage group.
///
/// Edges naming a system in another stage group are dropped: the stage
/// barrier already orders them. Edges naming nothing at all are errors.
fn resolve_stage(
    systems: &[Box<dyn DamageSystem>],
    stage: Stage,
) -> Result<Vec<usize>, PipelineError> {
    let members: Vec<usize> = (0..systems.len())
        .filter(|&i| systems[i].stages().contains(&stage))
        .collect();

    let mut graph = DependencyGraph::new();
    for &i in &members {
        graph
            .add_node(systems[i].name())
            .map_err(|_| PipelineError::DuplicateSystem {
                name: systems[i].name().to_owned(),
            })?;
    }

    for &i in &members {
        let name = systems[i].name().to_owned();
        let hints = systems[i].ordering();
        for target in &hints.run_after {
            match edge_disposition(systems, &graph, target) {
                EdgeDisposition::InGroup => {
                    graph
                        .run_after(&name, target)
                        .map_err(|e| map_schedule_error(e, stage))?;
                }
                EdgeDisposition::OtherStage => {}
                EdgeDisposition::Unknown => {
                    return Err(PipelineError::UnknownOrderingTarget {
                        system: name,
                        target: target.clone(),
                    })
                }
            }
        }
        for target in &hints.run_before {
            match edge_disposition(systems, &graph, target) {
                EdgeDisposition::InGroup => {
                    graph
                        .run_before(&name, target)
                        .map_err(|e| map_schedule_error(e, stage))?;
                }
                EdgeDisposition::OtherStage => {}
                EdgeDisposition::Unknown => {
                    return Err(PipelineError::UnknownOrderingTarget {
                        system: name,
                        target: target.clone(),
                    })
                }
            }
        }
    }

    let order = graph.resolve().map_err(|e| map_schedule_error(e, stage))?;
    Ok(order.into_iter().map(|gi| members[gi]).collect())
}

enum EdgeDisposition {
    InGroup,
    OtherStage,
    Unknown,
}

fn edge_disposition(
    systems: &[Box<dyn DamageSystem>],
    graph: &DependencyGraph,
    target: &str,
) -> EdgeDisposition {
    if graph.index_of(target).is_some() {
        EdgeDisposition::InGroup
    } else if systems.iter().any(|s| s.name() == target) {
        EdgeDisposition::OtherStage
    } else {
        EdgeDisposition::Unknown
    }
}

fn map_schedule_error(err: ScheduleError, stage: Stage) -> PipelineError {
    match err {
        ScheduleError::Cycle { names } => PipelineError::DependencyCycle { stage, names },
        ScheduleError::UnknownNode { from, name } => PipelineError::UnknownOrderingTarget {
            system: from,
            target: name,
        },
        ScheduleError::DuplicateNode { name } => PipelineError::DuplicateSystem { name },
    }
}

fn order_names<'a>(systems: &'a [Box<dyn DamageSystem>], order: &[usize]) -> Vec<&'a str> {
    order.iter().map(|&i| systems[i].name()).collect()
}

// ---------------------------------------------------------------------------
// DamagePipeline
// ---------------------------------------------------------------------------

/// The built pipeline: stage groups, resolved orders, and the command buffer.
pub struct DamagePipeline {
    causes: CauseTable,
    gather: Vec<Box<dyn GatherSystem>>,
    systems: Vec<Box<dyn DamageSystem>>,
    filter_order: Vec<usize>,
    inspect_order: Vec<usize>,
    commands: CommandBuffer,
    tick: u64,
    in_flight: bool,
}

impl DamagePipeline {
    /// Process one externally gathered batch: Filter, flush, Inspect, Apply.
    ///
    /// Does not advance the tick counter; use [`run_tick`](Self::run_tick)
    /// from the simulation loop.
    pub fn submit(
        &mut self,
        world: &mut World,
        events: Vec<DamageEvent>,
    ) -> Result<BatchReceipt, PipelineError> {
        self.process_batch(world, events)
    }

    /// Run one full tick's batch: registered gather systems append to
    /// `batch`, the batch is processed, and the tick counter advances.
    pub fn run_tick(
        &mut self,
        world: &mut World,
        mut batch: Vec<DamageEvent>,
    ) -> Result<BatchReceipt, PipelineError> {
        for producer in &mut self.gather {
            producer.gather(world, self.tick, &mut batch);
        }
        let receipt = self.process_batch(world, batch)?;
        self.tick += 1;
        Ok(receipt)
    }

    /// The current simulation tick.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Override the tick counter (snapshot restore, testing).
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// The cause table in use.
    pub fn causes(&self) -> &CauseTable {
        &self.causes
    }

    /// Filter-stage system names in execution order.
    pub fn filter_order(&self) -> Vec<&str> {
        order_names(&self.systems, &self.filter_order)
    }

    /// Inspect-stage system names in execution order.
    pub fn inspect_order(&self) -> Vec<&str> {
        order_names(&self.systems, &self.inspect_order)
    }

    // -- batch processing ---------------------------------------------------

    fn process_batch(
        &mut self,
        world: &mut World,
        mut events: Vec<DamageEvent>,
    ) -> Result<BatchReceipt, PipelineError> {
        if self.in_flight {
            warn!("reentrant submit rejected; the pipeline processes one batch at a time");
            return Err(PipelineError::ReentrantSubmit);
        }
        self.in_flight = true;
        let receipt = self.run_stages(world, &mut events);
        self.in_flight = false;
        Ok(receipt)
    }

    fn run_stages(&mut self, world: &mut World, events: &mut [DamageEvent]) -> BatchReceipt {
        let mut violations: Vec<ContractViolation> = Vec::new();

        for system in &mut self.systems {
            system.batch_begin();
        }

        run_group(
            &mut self.systems,
            &self.filter_order,
            &mut self.commands,
            &self.causes,
            world,
            events,
            Stage::Filter,
            self.tick,
            &mut violations,
        );

        // Flush point: after the Filter barrier, before Inspect. Deferred
        // combo/stat state becomes visible to Inspect and Apply here.
        let flush = self.commands.flush(world);

        run_group(
            &mut self.systems,
            &self.inspect_order,
            &mut self.commands,
            &self.causes,
            world,
            events,
            Stage::Inspect,
            self.tick,
            &mut violations,
        );

        let mut receipt = BatchReceipt {
            submitted: events.len(),
            violations: violations.len(),
            flush,
            ..BatchReceipt::default()
        };
        apply_batch(world, events, &mut receipt);
        debug!(
            tick = self.tick,
            submitted = receipt.submitted,
            applied = receipt.applied,
            cancelled = receipt.cancelled,
            discarded = receipt.discarded,
            kills = receipt.kills,
            "batch processed"
        );
        receipt
    }
}

/// Run one stage group over the whole batch, system-major: each system in
/// resolved order sees every event before the next system starts.
#[allow(clippy::too_many_arguments)]
fn run_group(
    systems: &mut [Box<dyn DamageSystem>],
    order: &[usize],
    commands: &mut CommandBuffer,
    causes: &CauseTable,
    world: &World,
    events: &mut [DamageEvent],
    stage: Stage,
    tick: u64,
    violations: &mut Vec<ContractViolation>,
) {
    for &idx in order {
        let system = &mut systems[idx];
        let name = system.name().to_owned();
        for event in events.iter_mut() {
            let mut ctx = SystemContext::new(
                world, commands, causes, event, stage, tick, &name, violations,
            );
            system.handle(&mut ctx);
        }
    }
}

/// The terminal apply step. Only here do `cancelled` and the sign of the
/// amount matter; a non-positive amount is a discard, never a heal.
fn apply_batch(world: &mut World, events: &[DamageEvent], receipt: &mut BatchReceipt) {
    for event in events {
        if event.is_cancelled() {
            receipt.cancelled += 1;
            continue;
        }
        let amount = event.amount();
        if amount <= 0.0 {
            receipt.discarded += 1;
            continue;
        }
        let target = event.target();
        let Some(health) = world.get_mut::<Health>(target) else {
            debug!(target = %target, "damage target has no health, discarding");
            receipt.discarded += 1;
            continue;
        };
        let before = health.current;
        health.current = (before - amount).max(0.0);
        receipt.applied += 1;
        receipt.total_applied += before - health.current;
        if before > 0.0 && health.is_dead() {
            receipt.kills += 1;
            let message = event.source().death_message(target);
            info!(target = %target, cause = event.cause_id(), %message, "entity died");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
