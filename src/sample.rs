//! Synthetic grouped samples.
//!
//! An [`ObservationSet`] is drawn once per run and never mutated afterwards.
//! Each group draws from its own partitioned RNG stream, so the values of
//! group `g` depend only on the master seed, `g`, and the group's own spec.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{GroupSpec, NoiseModel, SampleConfig, ValueDomain};
use crate::engine::rng::SampleRng;
use crate::error::StageResult;

/// Label of a group (e.g. a teaching method or experimental condition).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupLabel(String);

impl GroupLabel {
    /// Create a label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Label text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for GroupLabel {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// One synthetic data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Position in generation order, starting at 0.
    pub id: u32,
    /// Group the observation belongs to.
    pub group: GroupLabel,
    /// Drawn value.
    pub value: f64,
}

impl Observation {
    /// Create an observation.
    #[must_use]
    pub fn new(id: u32, group: impl Into<GroupLabel>, value: f64) -> Self {
        Self {
            id,
            group: group.into(),
            value,
        }
    }
}

/// Immutable, generation-ordered set of observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationSet {
    observations: Vec<Observation>,
    seed: u64,
    noise: NoiseModel,
}

impl ObservationSet {
    /// Wrap hand-built observations (ids are kept as given).
    #[must_use]
    pub fn from_observations(observations: Vec<Observation>) -> Self {
        Self {
            observations,
            seed: 0,
            noise: NoiseModel::default(),
        }
    }

    /// Observations in generation order.
    #[must_use]
    pub fn as_slice(&self) -> &[Observation] {
        &self.observations
    }

    /// First `n` observations (all of them if `n >= len`).
    #[must_use]
    pub fn prefix(&self, n: usize) -> &[Observation] {
        &self.observations[..n.min(self.observations.len())]
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Observation at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.observations.get(index)
    }

    /// Iterate in generation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    /// Seed the set was drawn with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Noise model the set was drawn with.
    #[must_use]
    pub const fn noise(&self) -> NoiseModel {
        self.noise
    }

    /// Distinct labels in first-appearance order.
    #[must_use]
    pub fn labels(&self) -> Vec<&GroupLabel> {
        group_order(&self.observations)
    }

    /// Values of one group, in generation order.
    #[must_use]
    pub fn group_values(&self, label: &str) -> Vec<f64> {
        self.observations
            .iter()
            .filter(|o| o.group.as_str() == label)
            .map(|o| o.value)
            .collect()
    }
}

impl<'a> IntoIterator for &'a ObservationSet {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

/// Distinct labels of `observations` in first-appearance order.
#[must_use]
pub fn group_order(observations: &[Observation]) -> Vec<&GroupLabel> {
    let mut labels: Vec<&GroupLabel> = Vec::new();
    for obs in observations {
        if !labels.contains(&&obs.group) {
            labels.push(&obs.group);
        }
    }
    labels
}

/// Draw a new observation set.
///
/// A config without a seed gets a fresh entropy seed, recorded on the set.
///
/// # Errors
///
/// Returns `StageError::Config` for an empty group list, duplicate labels,
/// a zero size, a negative spread, or an invalid domain.
///
/// # Example
///
/// ```rust
/// use seeing_science::config::{GroupSpec, SampleConfig};
/// use seeing_science::sample::generate;
///
/// let config = SampleConfig::new(vec![
///     GroupSpec::new("A", 75.0, 8.0, 12),
///     GroupSpec::new("B", 82.0, 6.0, 12),
/// ])
/// .with_seed(42);
///
/// let first = generate(&config).unwrap();
/// let second = generate(&config).unwrap();
/// assert_eq!(first.len(), 24);
/// assert_eq!(first, second);
/// ```
pub fn generate(config: &SampleConfig) -> StageResult<ObservationSet> {
    config.check()?;
    let seed = config.seed.unwrap_or_else(rand::random);
    Ok(draw(config, seed))
}

/// Draw with an explicit seed, overriding `config.seed`.
///
/// # Errors
///
/// Same as [`generate`].
pub fn generate_seeded(config: &SampleConfig, seed: u64) -> StageResult<ObservationSet> {
    config.check()?;
    Ok(draw(config, seed))
}

fn draw(config: &SampleConfig, seed: u64) -> ObservationSet {
    let mut master = SampleRng::new(seed);
    let streams = master.partition(config.groups.len());

    let mut observations = Vec::with_capacity(config.total_size());
    for (spec, mut rng) in config.groups.iter().zip(streams) {
        let label = GroupLabel::new(spec.label.clone());
        for _ in 0..spec.size {
            let value = draw_value(spec, config.noise, &config.domain, &mut rng);
            let id = observations.len() as u32;
            observations.push(Observation {
                id,
                group: label.clone(),
                value,
            });
        }
    }

    debug!(
        seed,
        groups = config.groups.len(),
        observations = observations.len(),
        "drew observation set"
    );

    ObservationSet {
        observations,
        seed,
        noise: config.noise,
    }
}

fn draw_value(spec: &GroupSpec, noise: NoiseModel, domain: &ValueDomain, rng: &mut SampleRng) -> f64 {
    let raw = match noise {
        NoiseModel::Uniform => spec.base_value + rng.gen_range_f64(-spec.spread, spec.spread),
        NoiseModel::Gaussian => rng.gen_normal(spec.base_value, spec.spread),
    };
    domain.apply(raw)
}
