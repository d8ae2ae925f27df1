//! Stage engine.
//!
//! Owns one observation set, its cached statistics and the current stage,
//! and answers every query a renderer needs:
//! - Deterministic sample generation (PCG with partitioned seeds)
//! - Stage navigation with boundary no-ops
//! - Per-stage statistics and layout snapshots
//! - Finite-value guard before anything is committed
//!
//! The engine never renders and never sleeps. Pacing of the reveal
//! animation lives in [`scheduler::RevealScheduler`].

pub mod guard;
pub mod rng;
pub mod scheduler;
pub mod stage;
pub mod view;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use rng::SampleRng;
pub use scheduler::{CancellationToken, RevealScheduler, RevealTask, Walkthrough};
pub use stage::{AnovaStage, StageMachine, StageSequence};
pub use view::{visible_statistics, GroupSummary, StageStatistics};

use crate::config::{EngineConfig, ResetPolicy};
use crate::error::{StageError, StageResult};
use crate::layout::{Layout, LayoutSnapshot, Point};
use crate::sample::{generate_seeded, Observation, ObservationSet};
use crate::stats::{
    compute_aggregate_statistics, compute_group_statistics, AggregateStatistics, GroupStatsMap,
};

/// One generated observation set with its cached statistics.
#[derive(Debug, Clone, PartialEq)]
struct Run {
    observations: ObservationSet,
    group_stats: GroupStatsMap,
    aggregate: AggregateStatistics,
}

impl Run {
    /// Derive and guard statistics for `observations`.
    fn derive(
        observations: ObservationSet,
        config: &EngineConfig,
        layout: &Layout,
    ) -> StageResult<Self> {
        let group_stats = compute_group_statistics(observations.as_slice());
        let aggregate =
            compute_aggregate_statistics(observations.as_slice(), &group_stats, &config.analysis);
        guard::check_statistics(&group_stats, &aggregate)?;
        guard::check_layout(&layout.snapshot(
            AnovaStage::Conclusion,
            observations.as_slice(),
            &group_stats,
        ))?;
        Ok(Self {
            observations,
            group_stats,
            aggregate,
        })
    }
}

/// Result of one reveal step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealFrame {
    /// Index of the observation just revealed.
    pub index: usize,
    /// The observation itself.
    pub observation: Observation,
    /// Its position at the current stage.
    pub point: Point,
    /// Statistics over the revealed prefix, including this observation.
    pub statistics: StageStatistics,
}

/// Serializable view of everything a renderer needs at the current stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Current stage.
    pub stage: AnovaStage,
    /// Seed of the current observation set, if one exists.
    pub seed: Option<u64>,
    /// Observations in generation order.
    pub observations: Vec<Observation>,
    /// Statistics visible at `stage`.
    pub statistics: StageStatistics,
    /// Point positions and overlays at `stage`.
    pub layout: LayoutSnapshot,
}

/// Stateful orchestration of sample, statistics and stage.
///
/// # Example
///
/// ```rust
/// use seeing_science::prelude::*;
///
/// let config = EngineConfig::builder()
///     .seed(42)
///     .group("lecture", 75.0, 8.0, 12)
///     .group("flipped", 82.0, 6.0, 12)
///     .group("hybrid", 78.0, 7.0, 12)
///     .build();
///
/// let mut engine = StageSampleEngine::new(config).unwrap();
/// engine.generate().unwrap();
/// engine.jump_to("conclusion").unwrap();
///
/// let stats = engine.stage_statistics();
/// assert!(stats.test_statistic.unwrap().is_finite());
/// ```
#[derive(Debug, Clone)]
pub struct StageSampleEngine {
    config: EngineConfig,
    machine: StageMachine<AnovaStage>,
    layout: Layout,
    seeds: SampleRng,
    run_seed: u64,
    run: Option<Run>,
    revealed: usize,
}

impl StageSampleEngine {
    /// Create an engine at the intro stage with no observations.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(config: EngineConfig) -> StageResult<Self> {
        config.check()?;
        let (seeds, run_seed) = seed_chain(&config);
        Ok(Self {
            layout: Layout::new(config.sample.domain),
            config,
            machine: StageMachine::new(),
            seeds,
            run_seed,
            run: None,
            revealed: 0,
        })
    }

    /// Draw an observation set.
    ///
    /// A seeded config draws from the current seed in its chain, so repeated
    /// calls give the same set. An unseeded config draws a fresh entropy
    /// seed on every call.
    ///
    /// Replaces the set and every cached statistic as one unit: on error the
    /// previous set is kept.
    ///
    /// # Errors
    ///
    /// Returns error if generation fails or a derived value is non-finite.
    pub fn generate(&mut self) -> StageResult<&ObservationSet> {
        let seed = if self.config.sample.seed.is_some() {
            self.run_seed
        } else {
            rand::random()
        };
        self.draw(seed)
    }

    fn draw(&mut self, seed: u64) -> StageResult<&ObservationSet> {
        let observations = generate_seeded(&self.config.sample, seed)?;
        let run = Run::derive(observations, &self.config, &self.layout)?;
        self.run_seed = seed;
        Ok(self.commit(run))
    }

    /// Replace the configuration and draw with it.
    ///
    /// The configuration is only adopted if generation succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if `config` is invalid or generation fails.
    pub fn generate_with(&mut self, config: EngineConfig) -> StageResult<&ObservationSet> {
        config.check()?;
        let (seeds, run_seed) = seed_chain(&config);
        let layout = Layout::new(config.sample.domain);
        let observations = generate_seeded(&config.sample, run_seed)?;
        let run = Run::derive(observations, &config, &layout)?;

        self.config = config;
        self.layout = layout;
        self.seeds = seeds;
        self.run_seed = run_seed;
        Ok(self.commit(run))
    }

    fn commit(&mut self, run: Run) -> &ObservationSet {
        info!(
            seed = self.run_seed,
            observations = run.observations.len(),
            groups = run.group_stats.len(),
            statistic = run.aggregate.test_statistic,
            significant = run.aggregate.is_significant,
            "observation set generated"
        );
        self.revealed = 0;
        &self.run.insert(run).observations
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Seed of the current observation set, `None` before generation.
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.run.as_ref().map(|r| r.observations.seed())
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> AnovaStage {
        self.machine.current()
    }

    /// Observations in generation order; empty before generation.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        self.run
            .as_ref()
            .map_or_else(Default::default, |r| r.observations.as_slice())
    }

    /// Per-group statistics of the full set.
    #[must_use]
    pub fn group_statistics(&self) -> Option<&GroupStatsMap> {
        self.run.as_ref().map(|r| &r.group_stats)
    }

    /// Aggregate statistics of the full set.
    #[must_use]
    pub fn aggregate_statistics(&self) -> Option<&AggregateStatistics> {
        self.run.as_ref().map(|r| &r.aggregate)
    }

    /// Statistics visible at the current stage.
    #[must_use]
    pub fn stage_statistics(&self) -> StageStatistics {
        let stage = self.stage();
        self.run.as_ref().map_or_else(
            || StageStatistics::hidden(stage),
            |r| visible_statistics(stage, &r.group_stats, &r.aggregate),
        )
    }

    /// Layout at the current stage.
    #[must_use]
    pub fn layout_snapshot(&self) -> LayoutSnapshot {
        let stage = self.stage();
        self.run.as_ref().map_or_else(
            || LayoutSnapshot::empty(stage),
            |r| {
                self.layout
                    .snapshot(stage, r.observations.as_slice(), &r.group_stats)
            },
        )
    }

    /// Everything a renderer needs, in one serializable value.
    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            stage: self.stage(),
            seed: self.seed(),
            observations: self.observations().to_vec(),
            statistics: self.stage_statistics(),
            layout: self.layout_snapshot(),
        }
    }

    /// Advance one stage; no-op at `conclusion`.
    pub fn next_stage(&mut self) -> bool {
        self.machine.next()
    }

    /// Step back one stage; no-op at `intro`.
    pub fn previous_stage(&mut self) -> bool {
        self.machine.previous()
    }

    /// Jump to a stage by name.
    ///
    /// # Errors
    ///
    /// Returns `StageError::InvalidStage` for an unknown name; the stage is
    /// unchanged.
    pub fn jump_to(&mut self, name: &str) -> StageResult<AnovaStage> {
        self.machine.jump_to(name)
    }

    /// Jump to a stage.
    pub fn jump_to_stage(&mut self, stage: AnovaStage) {
        self.machine.jump_to_stage(stage);
    }

    /// Return to `intro` and apply the reset policy.
    ///
    /// `Regenerate` draws a new set from the next seed in the chain, so a
    /// sequence of resets is itself reproducible. `Clear` drops the set.
    ///
    /// # Errors
    ///
    /// Returns error if regeneration fails.
    pub fn reset(&mut self) -> StageResult<()> {
        self.machine.reset();
        self.revealed = 0;
        match self.config.reset {
            ResetPolicy::Regenerate => {
                let seed = self.seeds.gen_u64();
                debug!(seed, "reset with regeneration");
                self.draw(seed).map(|_| ())
            }
            ResetPolicy::Clear => {
                debug!("reset cleared observation set");
                self.run = None;
                Ok(())
            }
        }
    }
}

impl Walkthrough for StageSampleEngine {
    type Frame = RevealFrame;

    fn reveal_len(&self) -> usize {
        self.observations().len()
    }

    fn revealed(&self) -> usize {
        self.revealed
    }

    fn reveal(&mut self, index: usize) -> StageResult<RevealFrame> {
        if index != self.revealed || index >= self.reveal_len() {
            return Err(StageError::OutOfOrderReveal {
                expected: self.revealed,
                found: index,
            });
        }
        let run = self
            .run
            .as_ref()
            .ok_or_else(|| StageError::config("no observation set to reveal"))?;

        let stage = self.machine.current();
        let all = run.observations.as_slice();
        let prefix = run.observations.prefix(index + 1);
        let observation = &all[index];

        let point = self.layout.position(stage, observation, index, all);
        guard::check_point(&point, index)?;

        let group_stats = compute_group_statistics(prefix);
        let aggregate = compute_aggregate_statistics(prefix, &group_stats, &self.config.analysis);
        guard::check_statistics(&group_stats, &aggregate)?;

        let frame = RevealFrame {
            index,
            observation: observation.clone(),
            point,
            statistics: visible_statistics(stage, &group_stats, &aggregate),
        };
        self.revealed += 1;
        debug!(index, group = %observation.group, "observation revealed");
        Ok(frame)
    }
}

/// Seed chain for `config`: the configured seed (or entropy) drives the
/// first run, later runs take successive draws from the chain.
fn seed_chain(config: &EngineConfig) -> (SampleRng, u64) {
    let seeds = config
        .sample
        .seed
        .map_or_else(SampleRng::from_entropy_seed, SampleRng::new);
    let first = seeds.master_seed();
    (seeds, first)
}
