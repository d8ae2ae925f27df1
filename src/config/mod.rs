//! Configuration system with YAML schema and validation.
//!
//! Mistake-proofing happens in three layers:
//! - Type-safe configuration structs (closed enums for every mode)
//! - Field constraints via `validator`
//! - Semantic validation for rules that span fields (unique labels,
//!   group count, domain ordering)
//!
//! # Example
//!
//! ```rust
//! use seeing_science::config::EngineConfig;
//!
//! let yaml = r#"
//! sample:
//!   seed: 42
//!   groups:
//!     - { label: lecture, base_value: 75.0, spread: 8.0, size: 12 }
//!     - { label: flipped, base_value: 82.0, spread: 6.0, size: 12 }
//! "#;
//! let config = EngineConfig::from_yaml(yaml).unwrap();
//! assert_eq!(config.sample.groups.len(), 2);
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{StageError, StageResult};

/// Critical value used when no rule is configured. Stands in for a
/// tabulated F critical value; see [`SignificanceRule::Alpha`] for the
/// computed alternative.
pub const DEFAULT_SIGNIFICANCE_THRESHOLD: f64 = 3.2;

/// Largest magnitude accepted for domain bounds and `|base| + spread`.
/// Squared deviations of values this size still sum to a finite number.
pub const MAX_VALUE_MAGNITUDE: f64 = 1e100;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Schema version for forward compatibility.
    #[validate(length(min = 1))]
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Human-readable name of the walkthrough.
    #[serde(default)]
    pub name: String,

    /// How the synthetic sample is drawn.
    #[validate(nested)]
    pub sample: SampleConfig,

    /// Which test statistic is computed and how it is judged.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// What `reset` does with the observation set.
    #[serde(default)]
    pub reset: ResetPolicy,
}

fn default_schema_version() -> String {
    "1.0".to_string()
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsing fails or
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> StageResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns error if parsing or validation fails.
    pub fn from_yaml(yaml: &str) -> StageResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Serialize to YAML.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_yaml(&self) -> StageResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Create a builder for configuration.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Run field and semantic validation.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn check(&self) -> StageResult<()> {
        self.sample.check()?;
        self.validate()?;
        self.validate_semantic()
    }

    fn validate_semantic(&self) -> StageResult<()> {
        let groups = self.sample.groups.len();
        if groups < 2 {
            return Err(StageError::config(format!(
                "the engine compares groups and needs at least 2, got {groups}"
            )));
        }
        if self.analysis.test == TestKind::PooledT && groups != 2 {
            return Err(StageError::config(format!(
                "pooled t-test compares exactly 2 groups, got {groups}"
            )));
        }
        self.analysis.significance.check()
    }
}

/// Parameters of the synthetic sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SampleConfig {
    /// Master seed. `None` draws a fresh seed per generation.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Noise added around each group's base value.
    #[serde(default)]
    pub noise: NoiseModel,

    /// Valid value range; values are clamped into it when `clamp` is set.
    #[serde(default)]
    pub domain: ValueDomain,

    /// Group definitions, in presentation order.
    #[validate(nested)]
    pub groups: Vec<GroupSpec>,
}

impl SampleConfig {
    /// Create a sample config from groups with default noise and domain.
    #[must_use]
    pub fn new(groups: Vec<GroupSpec>) -> Self {
        Self {
            seed: None,
            noise: NoiseModel::default(),
            domain: ValueDomain::default(),
            groups,
        }
    }

    /// Set the master seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validate everything [`crate::sample::generate`] depends on.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` naming the offending group or field.
    pub fn check(&self) -> StageResult<()> {
        if self.groups.is_empty() {
            return Err(StageError::config("at least one group is required"));
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.label.trim().is_empty() {
                return Err(StageError::config("group label must not be empty"));
            }
            if !seen.insert(group.label.as_str()) {
                return Err(StageError::config(format!(
                    "duplicate group label '{}'",
                    group.label
                )));
            }
            if group.size == 0 {
                return Err(StageError::config(format!(
                    "group '{}' size must be >= 1",
                    group.label
                )));
            }
            if !group.base_value.is_finite() {
                return Err(StageError::config(format!(
                    "group '{}' base value must be finite",
                    group.label
                )));
            }
            if !group.spread.is_finite() || group.spread < 0.0 {
                return Err(StageError::config(format!(
                    "group '{}' spread must be finite and >= 0, got {}",
                    group.label, group.spread
                )));
            }
            if group.base_value.abs() + group.spread > MAX_VALUE_MAGNITUDE {
                return Err(StageError::config(format!(
                    "group '{}' |base| + spread must not exceed {MAX_VALUE_MAGNITUDE:e}",
                    group.label
                )));
            }
        }

        self.domain.check()
    }

    /// Total number of observations this config generates.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.groups.iter().map(|g| g.size).sum()
    }
}

/// One group of the synthetic sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    /// Group label (e.g. a teaching method).
    #[validate(length(min = 1))]
    pub label: String,
    /// Center of the group's values.
    pub base_value: f64,
    /// Noise half-width (uniform) or standard deviation (gaussian).
    #[validate(range(min = 0.0))]
    pub spread: f64,
    /// Number of observations.
    #[validate(range(min = 1))]
    pub size: usize,
}

impl GroupSpec {
    /// Create a group spec.
    #[must_use]
    pub fn new(label: impl Into<String>, base_value: f64, spread: f64, size: usize) -> Self {
        Self {
            label: label.into(),
            base_value,
            spread,
            size,
        }
    }
}

/// Noise model for generated values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseModel {
    /// `base + uniform(-spread, spread)`.
    #[default]
    Uniform,
    /// `base + spread * N(0, 1)` via Box-Muller.
    Gaussian,
}

/// Valid range of observation values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValueDomain {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Clamp generated values into `[min, max]`.
    #[serde(default = "default_clamp")]
    pub clamp: bool,
}

fn default_clamp() -> bool {
    true
}

impl Default for ValueDomain {
    fn default() -> Self {
        Self::PERCENT
    }
}

impl ValueDomain {
    /// Percentage scores, clamped.
    pub const PERCENT: Self = Self {
        min: 0.0,
        max: 100.0,
        clamp: true,
    };

    /// Create a clamped domain.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            clamp: true,
        }
    }

    /// Validate bounds.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` if bounds are not finite, not ordered or
    /// larger than [`MAX_VALUE_MAGNITUDE`].
    pub fn check(&self) -> StageResult<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min >= self.max {
            return Err(StageError::config(format!(
                "value domain must satisfy min < max, got [{}, {}]",
                self.min, self.max
            )));
        }
        if self.min.abs() > MAX_VALUE_MAGNITUDE || self.max.abs() > MAX_VALUE_MAGNITUDE {
            return Err(StageError::config(format!(
                "value domain bounds must not exceed {MAX_VALUE_MAGNITUDE:e} in magnitude"
            )));
        }
        Ok(())
    }

    /// Apply the clamp policy to a drawn value.
    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        if self.clamp {
            value.clamp(self.min, self.max)
        } else {
            value
        }
    }

    /// Position of `value` inside the domain, clamped to [0, 1].
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        let width = self.max - self.min;
        if !width.is_finite() || width <= 0.0 || !value.is_finite() {
            return 0.5;
        }
        ((value - self.min) / width).clamp(0.0, 1.0)
    }
}

/// Analysis settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Test statistic to compute.
    #[serde(default)]
    pub test: TestKind,
    /// How the statistic is judged significant.
    #[serde(default)]
    pub significance: SignificanceRule,
}

/// Test statistic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// One-way ANOVA F ratio.
    #[default]
    OneWayAnova,
    /// Two-sample pooled-variance t statistic.
    PooledT,
}

/// Significance decision rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignificanceRule {
    /// Fixed critical value.
    Threshold {
        /// Statistic must exceed this (absolute value for t).
        value: f64,
    },
    /// Critical value from the statistic's distribution at level `alpha`.
    Alpha {
        /// Significance level in (0, 1).
        alpha: f64,
    },
}

impl Default for SignificanceRule {
    fn default() -> Self {
        Self::Threshold {
            value: DEFAULT_SIGNIFICANCE_THRESHOLD,
        }
    }
}

impl SignificanceRule {
    /// Validate rule parameters.
    ///
    /// # Errors
    ///
    /// Returns `StageError::Config` for a negative/non-finite threshold or an
    /// alpha outside (0, 1).
    pub fn check(&self) -> StageResult<()> {
        match *self {
            Self::Threshold { value } if !value.is_finite() || value < 0.0 => Err(
                StageError::config(format!("threshold must be finite and >= 0, got {value}")),
            ),
            Self::Alpha { alpha } if !(alpha > 0.0 && alpha < 1.0) => Err(StageError::config(
                format!("alpha must lie in (0, 1), got {alpha}"),
            )),
            _ => Ok(()),
        }
    }
}

/// What `reset` does with the current observation set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Draw a fresh set from the next RNG run stream.
    #[default]
    Regenerate,
    /// Drop the set; the caller generates again explicitly.
    Clear,
}

/// Configuration builder for programmatic construction.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    name: Option<String>,
    seed: Option<u64>,
    noise: Option<NoiseModel>,
    domain: Option<ValueDomain>,
    groups: Vec<GroupSpec>,
    analysis: AnalysisConfig,
    reset: Option<ResetPolicy>,
}

impl EngineConfigBuilder {
    /// Set the walkthrough name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the random seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Add a group.
    #[must_use]
    pub fn group(mut self, label: impl Into<String>, base_value: f64, spread: f64, size: usize) -> Self {
        self.groups.push(GroupSpec::new(label, base_value, spread, size));
        self
    }

    /// Set the noise model.
    #[must_use]
    pub const fn noise(mut self, noise: NoiseModel) -> Self {
        self.noise = Some(noise);
        self
    }

    /// Set the value domain.
    #[must_use]
    pub const fn domain(mut self, domain: ValueDomain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Set the test statistic.
    #[must_use]
    pub const fn test(mut self, test: TestKind) -> Self {
        self.analysis.test = test;
        self
    }

    /// Judge significance against a fixed critical value.
    #[must_use]
    pub const fn threshold(mut self, value: f64) -> Self {
        self.analysis.significance = SignificanceRule::Threshold { value };
        self
    }

    /// Judge significance at level `alpha`.
    #[must_use]
    pub const fn alpha(mut self, alpha: f64) -> Self {
        self.analysis.significance = SignificanceRule::Alpha { alpha };
        self
    }

    /// Set the reset policy.
    #[must_use]
    pub const fn reset_policy(mut self, reset: ResetPolicy) -> Self {
        self.reset = Some(reset);
        self
    }

    /// Build the configuration. Validation happens when it is used.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        EngineConfig {
            schema_version: default_schema_version(),
            name: self.name.unwrap_or_default(),
            sample: SampleConfig {
                seed: self.seed,
                noise: self.noise.unwrap_or_default(),
                domain: self.domain.unwrap_or_default(),
                groups: self.groups,
            },
            analysis: self.analysis,
            reset: self.reset.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn two_groups() -> EngineConfig {
        EngineConfig::builder()
            .seed(42)
            .group("A", 75.0, 8.0, 12)
            .group("B", 82.0, 6.0, 12)
            .build()
    }

    #[test]
    fn test_builder_defaults() {
        let config = two_groups();
        assert_eq!(config.schema_version, "1.0");
        assert_eq!(config.sample.seed, Some(42));
        assert_eq!(config.sample.noise, NoiseModel::Uniform);
        assert_eq!(config.sample.domain, ValueDomain::PERCENT);
        assert_eq!(config.analysis.test, TestKind::OneWayAnova);
        assert_eq!(config.analysis.significance, SignificanceRule::default());
        assert_eq!(config.reset, ResetPolicy::Regenerate);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_yaml_full() {
        let yaml = r#"
name: teaching methods
sample:
  seed: 7
  noise: gaussian
  domain: { min: 0.0, max: 100.0, clamp: false }
  groups:
    - { label: lecture, base_value: 75.0, spread: 8.0, size: 12 }
    - { label: flipped, base_value: 82.0, spread: 6.0, size: 12 }
    - { label: project, base_value: 78.0, spread: 10.0, size: 12 }
analysis:
  test: one_way_anova
  significance: { kind: alpha, alpha: 0.05 }
reset: clear
"#;
        let config = EngineConfig::from_yaml(yaml).expect("parse");
        assert_eq!(config.name, "teaching methods");
        assert_eq!(config.sample.noise, NoiseModel::Gaussian);
        assert!(!config.sample.domain.clamp);
        assert_eq!(config.sample.total_size(), 36);
        assert_eq!(
            config.analysis.significance,
            SignificanceRule::Alpha { alpha: 0.05 }
        );
        assert_eq!(config.reset, ResetPolicy::Clear);
    }

    #[test]
    fn test_yaml_minimal_uses_defaults() {
        let yaml = r#"
sample:
  groups:
    - { label: a, base_value: 50.0, spread: 5.0, size: 3 }
    - { label: b, base_value: 60.0, spread: 5.0, size: 3 }
"#;
        let config = EngineConfig::from_yaml(yaml).expect("parse");
        assert_eq!(config.sample.seed, None);
        assert_eq!(
            config.analysis.significance,
            SignificanceRule::Threshold { value: 3.2 }
        );
    }

    #[test]
    fn test_yaml_rejects_unknown_field() {
        let yaml = r#"
sample:
  groups: []
colour: red
"#;
        assert!(matches!(
            EngineConfig::from_yaml(yaml),
            Err(StageError::YamlParse(_))
        ));
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = two_groups();
        let yaml = config.to_yaml().expect("serialize");
        let restored = EngineConfig::from_yaml(&yaml).expect("parse");
        assert_eq!(config, restored);
    }

    #[test]
    fn test_zero_size_rejected() {
        let config = EngineConfig::builder()
            .group("A", 75.0, 8.0, 0)
            .group("B", 82.0, 6.0, 12)
            .build();
        let err = config.check().expect_err("zero size");
        assert!(matches!(err, StageError::Config { .. }));
        assert!(err.to_string().contains("size"));
    }

    #[test]
    fn test_negative_spread_rejected() {
        let config = EngineConfig::builder()
            .group("A", 75.0, -1.0, 3)
            .group("B", 82.0, 6.0, 3)
            .build();
        assert!(matches!(config.check(), Err(StageError::Config { .. })));
    }

    #[test]
    fn test_huge_magnitudes_rejected() {
        let huge_groups = EngineConfig::builder()
            .group("A", 1e200, 1e200, 5)
            .group("B", -1e200, 1e200, 5)
            .domain(ValueDomain::new(-1e90, 1e90))
            .build();
        let err = huge_groups.check().expect_err("huge base");
        assert!(err.to_string().contains("'A'"));

        let huge_domain = EngineConfig::builder()
            .group("A", 1.0, 1.0, 5)
            .group("B", 2.0, 1.0, 5)
            .domain(ValueDomain::new(-1e300, 1e300))
            .build();
        assert!(matches!(huge_domain.check(), Err(StageError::Config { .. })));

        let at_limit = EngineConfig::builder()
            .group("A", 4e99, 4e99, 5)
            .group("B", -4e99, 4e99, 5)
            .domain(ValueDomain::new(-MAX_VALUE_MAGNITUDE, MAX_VALUE_MAGNITUDE))
            .build();
        assert!(at_limit.check().is_ok());
    }

    #[test]
    fn test_single_group_rejected_by_engine_config() {
        let config = EngineConfig::builder().group("A", 75.0, 8.0, 3).build();
        assert!(config.sample.check().is_ok());
        assert!(matches!(config.check(), Err(StageError::Config { .. })));
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let config = EngineConfig::builder()
            .group("A", 75.0, 8.0, 3)
            .group("A", 82.0, 6.0, 3)
            .build();
        let err = config.check().expect_err("duplicate");
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_pooled_t_needs_two_groups() {
        let config = EngineConfig::builder()
            .group("A", 75.0, 8.0, 3)
            .group("B", 82.0, 6.0, 3)
            .group("C", 78.0, 6.0, 3)
            .test(TestKind::PooledT)
            .build();
        assert!(matches!(config.check(), Err(StageError::Config { .. })));
    }

    #[test]
    fn test_bad_domain_rejected() {
        let config = EngineConfig::builder()
            .group("A", 75.0, 8.0, 3)
            .group("B", 82.0, 6.0, 3)
            .domain(ValueDomain::new(10.0, 10.0))
            .build();
        assert!(matches!(config.check(), Err(StageError::Config { .. })));
    }

    #[test]
    fn test_significance_rule_bounds() {
        assert!(SignificanceRule::Threshold { value: 0.0 }.check().is_ok());
        assert!(SignificanceRule::Threshold { value: -1.0 }.check().is_err());
        assert!(SignificanceRule::Threshold { value: f64::NAN }.check().is_err());
        assert!(SignificanceRule::Alpha { alpha: 0.05 }.check().is_ok());
        assert!(SignificanceRule::Alpha { alpha: 0.0 }.check().is_err());
        assert!(SignificanceRule::Alpha { alpha: 1.0 }.check().is_err());
    }

    #[test]
    fn test_domain_normalize() {
        let d = ValueDomain::PERCENT;
        assert!((d.normalize(50.0) - 0.5).abs() < 1e-12);
        assert!((d.normalize(-20.0)).abs() < 1e-12);
        assert!((d.normalize(150.0) - 1.0).abs() < 1e-12);
        assert!((d.normalize(f64::NAN) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_domain_apply_respects_clamp_flag() {
        let clamped = ValueDomain::PERCENT;
        assert!((clamped.apply(104.0) - 100.0).abs() < f64::EPSILON);

        let open = ValueDomain {
            clamp: false,
            ..ValueDomain::PERCENT
        };
        assert!((open.apply(104.0) - 104.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("walkthrough.yaml");
        std::fs::write(&path, two_groups().to_yaml().expect("yaml")).expect("write");

        let config = EngineConfig::load(&path).expect("load");
        assert_eq!(config.sample.groups.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load("/definitely/not/here.yaml");
        assert!(matches!(result, Err(StageError::Io(_))));
    }
}
