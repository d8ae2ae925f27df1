//! Stage sequences and the navigation state machine.
//!
//! A walkthrough moves through a closed, totally ordered list of stages one
//! step at a time. The first and last stages are boundaries: `next` at the
//! end and `previous` at the start are no-ops, never wraparounds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StageError, StageResult};

/// A closed, totally ordered stage enumeration.
pub trait StageSequence: Copy + Eq + fmt::Debug + 'static {
    /// Every stage, in walk order. Must not be empty.
    const ALL: &'static [Self];

    /// Stable kebab-case name.
    fn name(self) -> &'static str;

    /// Position in [`StageSequence::ALL`].
    fn index(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }

    /// Look up a stage by name.
    ///
    /// # Errors
    ///
    /// Returns `StageError::InvalidStage` if no stage has that name.
    fn from_name(name: &str) -> StageResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.name() == name)
            .ok_or_else(|| StageError::invalid_stage(name))
    }

    /// Initial stage.
    fn first() -> Self {
        Self::ALL[0]
    }

    /// Terminal stage.
    fn last() -> Self {
        Self::ALL[Self::ALL.len() - 1]
    }

    /// Following stage, `None` at the terminal stage.
    fn following(self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Preceding stage, `None` at the initial stage.
    fn preceding(self) -> Option<Self> {
        self.index()
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i))
            .copied()
    }
}

/// Stages of the one-way ANOVA walkthrough.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AnovaStage {
    /// Every observation on one line, group unknown.
    #[default]
    Intro,
    /// Observations lined up by group.
    Grouped,
    /// Values revealed as heights.
    Scored,
    /// Group means and spreads overlaid.
    Analysis,
    /// The two variance sources introduced.
    VarianceSetup,
    /// Pooled within-group variance.
    WithinVariance,
    /// Between-group variance.
    BetweenVariance,
    /// The test statistic.
    FTest,
    /// Significance decision.
    Conclusion,
}

impl StageSequence for AnovaStage {
    const ALL: &'static [Self] = &[
        Self::Intro,
        Self::Grouped,
        Self::Scored,
        Self::Analysis,
        Self::VarianceSetup,
        Self::WithinVariance,
        Self::BetweenVariance,
        Self::FTest,
        Self::Conclusion,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Grouped => "grouped",
            Self::Scored => "scored",
            Self::Analysis => "analysis",
            Self::VarianceSetup => "variance-setup",
            Self::WithinVariance => "within-variance",
            Self::BetweenVariance => "between-variance",
            Self::FTest => "f-test",
            Self::Conclusion => "conclusion",
        }
    }
}

impl AnovaStage {
    /// Observation values drive the layout from this stage on.
    #[must_use]
    pub fn reveals_values(self) -> bool {
        self >= Self::Scored
    }

    /// Group mean and spread bands are drawn from this stage on.
    #[must_use]
    pub fn shows_bands(self) -> bool {
        self >= Self::Analysis
    }
}

impl fmt::Display for AnovaStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AnovaStage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Navigation state over a stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMachine<S> {
    current: S,
}

impl<S: StageSequence> Default for StageMachine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StageSequence> StageMachine<S> {
    /// Start at the initial stage.
    #[must_use]
    pub fn new() -> Self {
        Self { current: S::first() }
    }

    /// Current stage.
    #[must_use]
    pub const fn current(&self) -> S {
        self.current
    }

    /// Advance one stage. Returns whether the stage changed.
    pub fn next(&mut self) -> bool {
        match self.current.following() {
            Some(stage) => {
                debug!(from = self.current.name(), to = stage.name(), "stage advanced");
                self.current = stage;
                true
            }
            None => false,
        }
    }

    /// Step back one stage. Returns whether the stage changed.
    pub fn previous(&mut self) -> bool {
        match self.current.preceding() {
            Some(stage) => {
                debug!(from = self.current.name(), to = stage.name(), "stage rewound");
                self.current = stage;
                true
            }
            None => false,
        }
    }

    /// Return to the initial stage.
    pub fn reset(&mut self) {
        self.current = S::first();
    }

    /// Jump directly to a named stage. The current stage is unchanged on error.
    ///
    /// # Errors
    ///
    /// Returns `StageError::InvalidStage` for an unknown name.
    pub fn jump_to(&mut self, name: &str) -> StageResult<S> {
        let stage = S::from_name(name)?;
        self.jump_to_stage(stage);
        Ok(stage)
    }

    /// Jump directly to a stage.
    pub fn jump_to_stage(&mut self, stage: S) {
        debug!(from = self.current.name(), to = stage.name(), "stage jump");
        self.current = stage;
    }

    /// At the initial stage.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.current == S::first()
    }

    /// At the terminal stage.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.current == S::last()
    }

    /// `(index, total)` for progress indicators.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        (self.current.index(), S::ALL.len())
    }
}
