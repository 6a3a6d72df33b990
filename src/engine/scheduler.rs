//! # Phase Scheduler
//!
//! Runs registered systems once per tick, phase by phase, and replays
//! deferred commands at the barrier closing each phase.
//!
//! ## Tick layout
//!
//! ```text
//! advance Time
//! BeginTick barrier
//! Initialization   -> EndInitialization barrier
//! Simulation       -> EndSimulation barrier
//! PhysicsReaction  -> EndPhysicsReaction barrier
//! Presentation     -> EndPresentation barrier
//! ```
//!
//! ## Stages
//!
//! Within a phase, systems are grouped into **stages**:
//! * systems in a stage have pairwise non-conflicting access and run in
//!   parallel on the rayon pool,
//! * stages run sequentially,
//! * a system is always placed after every earlier-registered system it
//!   conflicts with, so conflicting systems observe registration order.
//!
//! ## Command playback
//!
//! Buffers recorded for a barrier are queued in (phase, stage, registration)
//! order and replayed when that barrier next fires. A buffer targeting a
//! barrier that already fired this tick therefore applies next tick.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::commands::{CommandBuffer, PlaybackReport};
use crate::engine::error::{ECSError, ECSResult, ExecutionError};
use crate::engine::systems::{Requirement, System, SystemContext};
use crate::engine::time::Time;
use crate::engine::types::{AccessSets, SystemID, Tick};
use crate::engine::world::World;
use crate::profiling::profiler::{self, Scope};

/// Ordered execution phases of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    /// Input sampling and per-tick setup.
    Initialization,
    /// Gameplay logic: movement, cooldowns, attacks, spawning.
    Simulation,
    /// Physics step and everything reacting to collisions.
    PhysicsReaction,
    /// Read-only consumers feeding UI and camera.
    Presentation,
}

impl Phase {
    /// Phases in execution order.
    pub const ALL: [Phase; 4] = [
        Phase::Initialization,
        Phase::Simulation,
        Phase::PhysicsReaction,
        Phase::Presentation,
    ];

    /// Barrier that closes this phase.
    pub fn barrier(self) -> Barrier {
        match self {
            Phase::Initialization => Barrier::EndInitialization,
            Phase::Simulation => Barrier::EndSimulation,
            Phase::PhysicsReaction => Barrier::EndPhysicsReaction,
            Phase::Presentation => Barrier::EndPresentation,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Display name used in logs and traces.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Initialization => "Initialization",
            Phase::Simulation => "Simulation",
            Phase::PhysicsReaction => "PhysicsReaction",
            Phase::Presentation => "Presentation",
        }
    }
}

/// Points in the tick at which queued command buffers are replayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Barrier {
    /// Before the Initialization phase.
    BeginTick,
    /// After the Initialization phase.
    EndInitialization,
    /// After the Simulation phase.
    EndSimulation,
    /// After the PhysicsReaction phase.
    EndPhysicsReaction,
    /// After the Presentation phase.
    EndPresentation,
}

impl Barrier {
    /// Display name used in logs and traces.
    pub fn name(self) -> &'static str {
        match self {
            Barrier::BeginTick => "BeginTick",
            Barrier::EndInitialization => "EndInitialization",
            Barrier::EndSimulation => "EndSimulation",
            Barrier::EndPhysicsReaction => "EndPhysicsReaction",
            Barrier::EndPresentation => "EndPresentation",
        }
    }
}

/// A group of systems that can be executed in parallel.
///
/// ## Invariants
/// * All systems within a `Stage` have **non-conflicting access sets**
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stage {
    /// Positions of the member systems in the input slice.
    pub systems: Vec<usize>,
}

/// Partitions systems into parallel execution stages.
///
/// ## Algorithm
/// Systems are visited in slice order. Each one goes into the stage right
/// after the last stage holding a system it conflicts with, creating that
/// stage if needed. That stage cannot contain a conflict, otherwise it would
/// itself be the last conflicting stage.
pub fn make_stages(access: &[AccessSets]) -> Vec<Stage> {
    let mut stages: Vec<Stage> = Vec::new();

    for (position, sets) in access.iter().enumerate() {
        let after = stages
            .iter()
            .rposition(|stage| {
                stage.systems.iter().any(|&other| sets.conflicts_with(&access[other]))
            })
            .map_or(0, |last| last + 1);

        match stages.get_mut(after) {
            Some(stage) => stage.systems.push(position),
            None => stages.push(Stage { systems: vec![position] }),
        }
    }
    stages
}

/// Summary of one tick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number.
    pub tick: Tick,
    /// Systems that ran.
    pub systems_run: usize,
    /// Systems skipped because a requirement was unmet.
    pub systems_skipped: usize,
    /// Entities created by playback.
    pub created: usize,
    /// Aggregated playback counters.
    pub playback: PlaybackReport,
}

struct SystemEntry {
    id: SystemID,
    phase: Phase,
    system: Box<dyn System>,
    access: AccessSets,
    requirements: Vec<Requirement>,
}

type StageOutput = Option<ECSResult<BTreeMap<Barrier, CommandBuffer>>>;

/// Owns the registered systems and the pending command buffers.
#[derive(Default)]
pub struct Scheduler {
    systems: Vec<SystemEntry>,
    stages: Option<Vec<Vec<Stage>>>,
    pending: BTreeMap<Barrier, Vec<CommandBuffer>>,
    pool: Option<rayon::ThreadPool>,
}

impl Scheduler {
    /// Creates a scheduler running on the global rayon pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheduler with a dedicated pool of `threads` workers.
    ///
    /// `0` falls back to the global pool.
    pub fn with_threads(threads: usize) -> ECSResult<Self> {
        if threads == 0 {
            return Ok(Self::new());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("sim-worker-{i}"))
            .build()
            .map_err(|e| ExecutionError::ThreadPool(e.to_string()))?;
        Ok(Self { pool: Some(pool), ..Self::default() })
    }

    /// Registers `system` in `phase`, resolving its access against `world`.
    pub fn add_system(
        &mut self,
        world: &World,
        phase: Phase,
        system: impl System + 'static,
    ) -> ECSResult<SystemID> {
        let id = self.systems.len() as SystemID;
        let access = system.access(world.registry())?;
        let requirements = system.requirements(world.registry())?;
        log::debug!("registered system {} ({}) in {}", id, system.name(), phase.name());
        self.systems.push(SystemEntry {
            id,
            phase,
            system: Box::new(system),
            access,
            requirements,
        });
        self.stages = None;
        Ok(id)
    }

    /// Queues an externally recorded buffer for `barrier`.
    pub fn defer(&mut self, barrier: Barrier, buffer: CommandBuffer) {
        if !buffer.is_empty() {
            self.pending.entry(barrier).or_default().push(buffer);
        }
    }

    /// Number of buffers waiting for `barrier`.
    pub fn pending(&self, barrier: Barrier) -> usize {
        self.pending.get(&barrier).map_or(0, Vec::len)
    }

    /// Number of registered systems.
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no system is registered.
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    fn build_stages(&self) -> Vec<Vec<Stage>> {
        Phase::ALL
            .iter()
            .map(|&phase| {
                let members: Vec<usize> = (0..self.systems.len())
                    .filter(|&i| self.systems[i].phase == phase)
                    .collect();
                let access: Vec<AccessSets> =
                    members.iter().map(|&i| self.systems[i].access.clone()).collect();
                make_stages(&access)
                    .into_iter()
                    .map(|stage| Stage {
                        systems: stage.systems.into_iter().map(|p| members[p]).collect(),
                    })
                    .collect()
            })
            .collect()
    }

    /// System names of `phase`, grouped by stage.
    pub fn stage_names(&mut self, phase: Phase) -> Vec<Vec<&'static str>> {
        let stages = match self.stages.take() {
            Some(stages) => stages,
            None => self.build_stages(),
        };
        let names = stages[phase.index()]
            .iter()
            .map(|stage| stage.systems.iter().map(|&i| self.systems[i].system.name()).collect())
            .collect();
        self.stages = Some(stages);
        names
    }

    /// Advances the clock by `delta` and runs one full tick.
    ///
    /// A failing system aborts the tick after its stage; buffers already
    /// queued stay pending.
    pub fn tick(&mut self, world: &mut World, delta: f32) -> ECSResult<TickReport> {
        if !world.has_resource::<Time>() {
            world.insert_resource(Time::default())?;
        }
        let time = {
            let mut clock = world.resource_mut::<Time>()?;
            clock.advance(delta);
            *clock
        };
        let _tick_span = profiler::span(Scope::Tick, "tick").arg("tick", time.tick);

        let stages = match self.stages.take() {
            Some(stages) => stages,
            None => self.build_stages(),
        };
        let mut report = TickReport { tick: time.tick, ..TickReport::default() };

        let outcome = self.run_phases(world, &stages, time, &mut report);
        self.stages = Some(stages);
        outcome?;

        log::trace!(
            "tick {} done: {} systems run, {} skipped, {} created, {} destroyed",
            report.tick,
            report.systems_run,
            report.systems_skipped,
            report.created,
            report.playback.destroyed
        );
        Ok(report)
    }

    fn run_phases(
        &mut self,
        world: &mut World,
        stages: &[Vec<Stage>],
        time: Time,
        report: &mut TickReport,
    ) -> ECSResult<()> {
        self.fire(world, Barrier::BeginTick, report)?;
        for phase in Phase::ALL {
            let _phase_span = profiler::span(Scope::Phase, phase.name());
            for stage in &stages[phase.index()] {
                self.run_stage(world, stage, time, report)?;
            }
            self.fire(world, phase.barrier(), report)?;
        }
        Ok(())
    }

    fn run_stage(
        &mut self,
        world: &World,
        stage: &Stage,
        time: Time,
        report: &mut TickReport,
    ) -> ECSResult<()> {
        let _stage_span =
            profiler::span(Scope::Stage, "stage").arg("systems", stage.systems.len() as u64);
        let systems = &self.systems;
        let run = |&index: &usize| -> StageOutput { run_system(&systems[index], world, time) };

        let outputs: Vec<StageOutput> = match &self.pool {
            Some(pool) => pool.install(|| stage.systems.par_iter().map(run).collect()),
            None => stage.systems.par_iter().map(run).collect(),
        };

        let mut first_error: Option<ECSError> = None;
        for output in outputs {
            match output {
                None => report.systems_skipped += 1,
                Some(Ok(buffers)) => {
                    report.systems_run += 1;
                    for (barrier, buffer) in buffers {
                        self.pending.entry(barrier).or_default().push(buffer);
                    }
                }
                Some(Err(error)) => {
                    log::error!("{error}");
                    first_error.get_or_insert(error);
                }
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn fire(&mut self, world: &mut World, barrier: Barrier, report: &mut TickReport) -> ECSResult<()> {
        let Some(buffers) = self.pending.remove(&barrier) else {
            return Ok(());
        };
        let _span = profiler::span(Scope::Barrier, barrier.name());
        for buffer in buffers {
            let applied = world.playback(buffer)?;
            report.created += applied.created.iter().flatten().count();
            report.playback.absorb(&applied);
        }
        log::trace!("barrier {} replayed", barrier.name());
        Ok(())
    }
}

fn run_system(entry: &SystemEntry, world: &World, time: Time) -> StageOutput {
    if let Some(unmet) = entry.requirements.iter().find(|r| !r.is_met(world)) {
        log::trace!("skipping {} ({}): {unmet:?} unmet", entry.system.name(), entry.id);
        return None;
    }
    let _span = profiler::span(Scope::System, entry.system.name());
    let mut ctx = SystemContext::new(world, time);
    Some(match entry.system.run(&mut ctx) {
        Ok(()) => Ok(ctx.into_buffers()),
        Err(error) => Err(ExecutionError::SystemFailed {
            system: entry.system.name(),
            message: error.to_string(),
        }
        .into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::AccessMode;

    fn sets(read: &[u16], write: &[u16]) -> AccessSets {
        let mut sets = AccessSets::default();
        for &id in read {
            sets.declare(id, AccessMode::Read);
        }
        for &id in write {
            sets.declare(id, AccessMode::Write);
        }
        sets
    }

    #[test]
    fn independent_systems_share_a_stage() {
        let stages = make_stages(&[sets(&[0], &[1]), sets(&[0], &[2]), sets(&[1], &[])]);
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].systems, vec![0, 1]);
        assert_eq!(stages[1].systems, vec![2]);
    }

    #[test]
    fn conflicting_systems_keep_registration_order() {
        // 2 does not conflict with 1 but must follow 0, which 1 also follows.
        let stages = make_stages(&[
            sets(&[], &[0]),
            sets(&[0], &[]),
            sets(&[], &[0, 3]),
            sets(&[5], &[]),
        ]);
        let position = |s: usize| stages.iter().position(|st| st.systems.contains(&s)).unwrap();
        assert!(position(0) < position(1));
        assert!(position(1) < position(2));
        assert_eq!(position(3), 0);
    }

    #[test]
    fn phase_barriers_follow_phase_order() {
        let barriers: Vec<_> = Phase::ALL.iter().map(|p| p.barrier()).collect();
        let mut sorted = barriers.clone();
        sorted.sort();
        assert_eq!(barriers, sorted);
        assert!(Barrier::BeginTick < barriers[0]);
    }
}
