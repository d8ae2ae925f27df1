//! Binomial trial simulator.
//!
//! Repeats an experiment of `n` Bernoulli(p) trials and tallies how many
//! successes each experiment produced. As experiments accumulate, the
//! tally approaches the binomial distribution.
//!
//! # Governing Equations
//!
//! ```text
//! P(X = k) = C(n, k) p^k (1 - p)^(n - k)
//! E[X]     = n p
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::engine::rng::SampleRng;
use crate::engine::scheduler::Walkthrough;
use crate::engine::stage::{StageMachine, StageSequence};
use crate::error::{StageError, StageResult};
use crate::stats::special::binomial_pmf;

/// Parameters of the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BinomialConfig {
    /// Trials per experiment (n).
    #[validate(range(min = 1, max = 1000))]
    pub trials: u32,

    /// Success probability per trial (p).
    #[validate(range(min = 0.0, max = 1.0))]
    pub probability: f64,

    /// Number of experiments to run.
    #[validate(range(min = 1, max = 100_000))]
    pub experiments: u32,

    /// Master seed; `None` draws one from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for BinomialConfig {
    fn default() -> Self {
        Self {
            trials: 10,
            probability: 0.5,
            experiments: 100,
            seed: Some(42),
        }
    }
}

impl BinomialConfig {
    /// Parse and validate from YAML.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> StageResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Run field validation.
    ///
    /// # Errors
    ///
    /// Returns the violated constraint.
    pub fn check(&self) -> StageResult<()> {
        if !self.probability.is_finite() {
            return Err(StageError::config("probability must be finite"));
        }
        self.validate()?;
        Ok(())
    }
}

/// Stages of the binomial walkthrough.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum BinomialStage {
    /// The single trial and its probability.
    #[default]
    Intro,
    /// Experiments play out trial by trial.
    Trials,
    /// Success counts are tallied.
    Tally,
    /// Tally overlaid with the theoretical distribution.
    Distribution,
    /// Empirical mean against n·p.
    Conclusion,
}

impl StageSequence for BinomialStage {
    const ALL: &'static [Self] = &[
        Self::Intro,
        Self::Trials,
        Self::Tally,
        Self::Distribution,
        Self::Conclusion,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Trials => "trials",
            Self::Tally => "tally",
            Self::Distribution => "distribution",
            Self::Conclusion => "conclusion",
        }
    }
}

/// One experiment's outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialFrame {
    /// Experiment index.
    pub index: usize,
    /// Outcome of each trial, in order.
    pub flips: Vec<bool>,
    /// Successes in this experiment.
    pub successes: u32,
    /// Tally after this experiment, indexed by success count.
    pub histogram: Vec<u64>,
}

/// One bar of the distribution chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionBar {
    /// Success count k.
    pub successes: u32,
    /// Fraction of experiments with k successes.
    pub observed: f64,
    /// P(X = k).
    pub expected: f64,
}

/// Stateful binomial simulator.
#[derive(Debug, Clone)]
pub struct BinomialTrials {
    config: BinomialConfig,
    machine: StageMachine<BinomialStage>,
    seeds: SampleRng,
    rng: SampleRng,
    histogram: Vec<u64>,
    completed: usize,
}

impl BinomialTrials {
    /// Create a simulator with no experiments run.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid.
    pub fn new(config: BinomialConfig) -> StageResult<Self> {
        config.check()?;
        let seeds = config
            .seed
            .map_or_else(SampleRng::from_entropy_seed, SampleRng::new);
        let rng = SampleRng::new(seeds.master_seed());
        Ok(Self {
            histogram: vec![0; config.trials as usize + 1],
            config,
            machine: StageMachine::new(),
            seeds,
            rng,
            completed: 0,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BinomialConfig {
        &self.config
    }

    /// Current stage.
    #[must_use]
    pub const fn stage(&self) -> BinomialStage {
        self.machine.current()
    }

    /// Advance one stage.
    pub fn next_stage(&mut self) -> bool {
        self.machine.next()
    }

    /// Step back one stage.
    pub fn previous_stage(&mut self) -> bool {
        self.machine.previous()
    }

    /// Jump to a stage by name.
    ///
    /// # Errors
    ///
    /// Returns `StageError::InvalidStage` for an unknown name.
    pub fn jump_to(&mut self, name: &str) -> StageResult<BinomialStage> {
        self.machine.jump_to(name)
    }

    /// Back to `intro` with an empty tally and the next seed in the chain.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.rng = SampleRng::new(self.seeds.gen_u64());
        self.histogram.iter_mut().for_each(|c| *c = 0);
        self.completed = 0;
    }

    /// Tally indexed by success count.
    #[must_use]
    pub fn histogram(&self) -> &[u64] {
        &self.histogram
    }

    /// Observed frequency against the binomial pmf for every k in `0..=n`.
    #[must_use]
    pub fn distribution(&self) -> Vec<DistributionBar> {
        let n = u64::from(self.config.trials);
        let runs = self.completed.max(1) as f64;
        self.histogram
            .iter()
            .enumerate()
            .map(|(k, count)| DistributionBar {
                successes: k as u32,
                observed: *count as f64 / runs,
                expected: binomial_pmf(k as u64, n, self.config.probability),
            })
            .collect()
    }

    /// Mean successes per experiment so far; 0 before any experiment.
    #[must_use]
    pub fn empirical_mean(&self) -> f64 {
        if self.completed == 0 {
            return 0.0;
        }
        let total: u64 = self
            .histogram
            .iter()
            .enumerate()
            .map(|(k, count)| k as u64 * count)
            .sum();
        total as f64 / self.completed as f64
    }

    /// n·p.
    #[must_use]
    pub fn expected_mean(&self) -> f64 {
        f64::from(self.config.trials) * self.config.probability
    }
}

impl Walkthrough for BinomialTrials {
    type Frame = TrialFrame;

    fn reveal_len(&self) -> usize {
        self.config.experiments as usize
    }

    fn revealed(&self) -> usize {
        self.completed
    }

    fn reveal(&mut self, index: usize) -> StageResult<TrialFrame> {
        if index != self.completed || index >= self.reveal_len() {
            return Err(StageError::OutOfOrderReveal {
                expected: self.completed,
                found: index,
            });
        }

        let p = self.config.probability;
        let flips: Vec<bool> = (0..self.config.trials)
            .map(|_| self.rng.gen_bernoulli(p))
            .collect();
        let successes = flips.iter().filter(|f| **f).count();
        if let Some(bin) = self.histogram.get_mut(successes) {
            *bin += 1;
        }
        self.completed += 1;
        debug!(index, successes, "experiment completed");

        Ok(TrialFrame {
            index,
            flips,
            successes: successes as u32,
            histogram: self.histogram.clone(),
        })
    }
}
