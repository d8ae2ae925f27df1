//! Group and aggregate statistics.
//!
//! # Governing Equations
//!
//! ```text
//! grand mean:        x̄ = Σ x / N
//! between variance:  MSB = Σ n_g (x̄_g − x̄)² / (k − 1)
//! within variance:   MSW = Σ (n_g − 1) s²_g / (N − k)
//! F ratio:           F = MSB / MSW
//! pooled t:          t = (x̄_1 − x̄_2) / √(MSW (1/n_1 + 1/n_2))
//! ```
//!
//! Every function here is pure and total. Degenerate samples (a single
//! group, singleton groups, zero spread) produce finite sentinel values
//! instead of NaN or infinity, and are never judged significant.

pub mod special;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, SignificanceRule, TestKind};
use crate::error::{StageError, StageResult};
use crate::sample::{GroupLabel, Observation};

/// Per-group statistics keyed by label, in first-appearance order.
pub type GroupStatsMap = IndexMap<GroupLabel, GroupStatistics>;

/// Welford accumulator for mean and sample variance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStatistics {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStatistics {
    /// Empty accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Incorporate one value.
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Number of values seen.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Mean, 0 when empty.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance (n − 1), defined as 0 below two values.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).max(0.0)
        }
    }

    /// Freeze into [`GroupStatistics`].
    #[must_use]
    pub fn finish(&self) -> GroupStatistics {
        GroupStatistics {
            mean: self.mean,
            variance: self.variance(),
            count: self.count,
        }
    }
}

/// Derived statistics of one group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupStatistics {
    /// Group mean.
    pub mean: f64,
    /// Sample variance; 0 for a singleton group.
    pub variance: f64,
    /// Number of observations.
    pub count: usize,
}

impl GroupStatistics {
    /// Sample standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Statistics derived from all groups together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    /// Mean over every observation regardless of group.
    pub grand_mean: f64,
    /// Mean square between groups (MSB).
    pub between_group_variance: f64,
    /// Pooled mean square within groups (MSW).
    pub within_group_variance: f64,
    /// F ratio or pooled t, per `test`.
    pub test_statistic: f64,
    /// Statistic exceeds the critical value.
    pub is_significant: bool,
    /// Which statistic `test_statistic` holds.
    pub test: TestKind,
    /// Critical value the statistic was compared against, when one exists.
    pub critical_value: Option<f64>,
    /// Sum of squares between groups.
    pub ss_between: f64,
    /// Sum of squares within groups.
    pub ss_within: f64,
    /// k − 1.
    pub df_between: usize,
    /// N − k.
    pub df_within: usize,
    /// A sentinel replaced an undefined quantity.
    pub degenerate: bool,
}

/// Compute per-group statistics.
///
/// Pure and total: an empty slice gives an empty map, a singleton group has
/// variance 0.
#[must_use]
pub fn compute_group_statistics(observations: &[Observation]) -> GroupStatsMap {
    let mut running: IndexMap<GroupLabel, RunningStatistics> = IndexMap::new();
    for obs in observations {
        running
            .entry(obs.group.clone())
            .or_default()
            .push(obs.value);
    }
    running
        .into_iter()
        .map(|(label, acc)| (label, acc.finish()))
        .collect()
}

/// Fail with `DegenerateInput` unless at least two groups are present.
///
/// # Errors
///
/// Returns `StageError::DegenerateInput` for fewer than two groups.
pub fn ensure_comparable(group_stats: &GroupStatsMap) -> StageResult<()> {
    if group_stats.len() < 2 {
        return Err(StageError::degenerate(format!(
            "comparison needs at least 2 groups, got {}",
            group_stats.len()
        )));
    }
    Ok(())
}

/// Compute aggregate statistics and the significance decision.
///
/// `group_stats` must come from [`compute_group_statistics`] on the same
/// observations.
#[must_use]
pub fn compute_aggregate_statistics(
    observations: &[Observation],
    group_stats: &GroupStatsMap,
    analysis: &AnalysisConfig,
) -> AggregateStatistics {
    let total = observations.len();
    let groups = group_stats.len();

    let grand_mean = if total == 0 {
        0.0
    } else {
        observations.iter().map(|o| o.value).sum::<f64>() / total as f64
    };

    let ss_between: f64 = group_stats
        .values()
        .map(|g| g.count as f64 * (g.mean - grand_mean).powi(2))
        .sum();
    let ss_within: f64 = group_stats
        .values()
        .map(|g| g.count.saturating_sub(1) as f64 * g.variance)
        .sum();

    let df_between = groups.saturating_sub(1);
    let df_within = total.saturating_sub(groups);

    let mut degenerate = false;

    let between_group_variance = if df_between == 0 {
        degenerate = true;
        0.0
    } else {
        ss_between / df_between as f64
    };

    let within_group_variance = if df_within == 0 {
        degenerate = true;
        0.0
    } else {
        ss_within / df_within as f64
    };

    let raw_statistic = match analysis.test {
        TestKind::OneWayAnova => {
            if within_group_variance > 0.0 && df_between > 0 {
                Some(between_group_variance / within_group_variance)
            } else {
                None
            }
        }
        TestKind::PooledT => pooled_t(group_stats, within_group_variance),
    };

    let test_statistic = match raw_statistic {
        Some(value) if value.is_finite() => value,
        _ => {
            degenerate = true;
            0.0
        }
    };

    let critical_value = critical_value(
        analysis.significance,
        analysis.test,
        df_between,
        df_within,
    );

    let is_significant = !degenerate
        && critical_value.is_some_and(|critical| test_statistic.abs() > critical);

    AggregateStatistics {
        grand_mean,
        between_group_variance,
        within_group_variance,
        test_statistic,
        is_significant,
        test: analysis.test,
        critical_value,
        ss_between,
        ss_within,
        df_between,
        df_within,
        degenerate,
    }
}

fn pooled_t(group_stats: &GroupStatsMap, pooled_variance: f64) -> Option<f64> {
    if group_stats.len() != 2 || pooled_variance <= 0.0 {
        return None;
    }
    let first = group_stats.get_index(0)?.1;
    let second = group_stats.get_index(1)?.1;
    let scale = pooled_variance * (1.0 / first.count as f64 + 1.0 / second.count as f64);
    if scale <= 0.0 {
        return None;
    }
    Some((first.mean - second.mean) / scale.sqrt())
}

/// Critical value for `test` under `rule` and the given degrees of freedom.
///
/// `Threshold` returns its constant. `Alpha` looks the value up in the F
/// (upper tail) or t (two-sided) distribution and returns `None` when the
/// degrees of freedom do not support a lookup.
#[must_use]
pub fn critical_value(
    rule: SignificanceRule,
    test: TestKind,
    df_between: usize,
    df_within: usize,
) -> Option<f64> {
    match rule {
        SignificanceRule::Threshold { value } => Some(value),
        SignificanceRule::Alpha { alpha } => {
            if df_within == 0 {
                return None;
            }
            match test {
                TestKind::OneWayAnova if df_between > 0 => {
                    special::f_critical(alpha, df_between as f64, df_within as f64)
                }
                TestKind::OneWayAnova => None,
                TestKind::PooledT => special::t_critical_two_sided(alpha, df_within as f64),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn obs(group: &str, values: &[f64], start: u32) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Observation::new(start + i as u32, group, *v))
            .collect()
    }

    /// A = 1,2,3  B = 4,5,6  C = 7,8,9: MSB = 27, MSW = 1, F = 27.
    fn textbook() -> Vec<Observation> {
        let mut all = obs("A", &[1.0, 2.0, 3.0], 0);
        all.extend(obs("B", &[4.0, 5.0, 6.0], 3));
        all.extend(obs("C", &[7.0, 8.0, 9.0], 6));
        all
    }

    #[test]
    fn test_group_statistics_textbook() {
        let stats = compute_group_statistics(&textbook());
        assert_eq!(stats.len(), 3);
        let b = stats["B"];
        assert!((b.mean - 5.0).abs() < 1e-12);
        assert!((b.variance - 1.0).abs() < 1e-12);
        assert_eq!(b.count, 3);
        let order: Vec<&str> = stats.keys().map(GroupLabel::as_str).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_aggregate_textbook_anova() {
        let data = textbook();
        let groups = compute_group_statistics(&data);
        let agg = compute_aggregate_statistics(&data, &groups, &AnalysisConfig::default());

        assert!((agg.grand_mean - 5.0).abs() < 1e-12);
        assert!((agg.ss_between - 54.0).abs() < 1e-9);
        assert!((agg.ss_within - 6.0).abs() < 1e-9);
        assert!((agg.between_group_variance - 27.0).abs() < 1e-9);
        assert!((agg.within_group_variance - 1.0).abs() < 1e-9);
        assert!((agg.test_statistic - 27.0).abs() < 1e-9);
        assert_eq!((agg.df_between, agg.df_within), (2, 6));
        assert_eq!(agg.critical_value, Some(3.2));
        assert!(agg.is_significant);
        assert!(!agg.degenerate);
    }

    #[test]
    fn test_alpha_rule_uses_f_table() {
        let data = textbook();
        let groups = compute_group_statistics(&data);
        let analysis = AnalysisConfig {
            test: TestKind::OneWayAnova,
            significance: SignificanceRule::Alpha { alpha: 0.05 },
        };
        let agg = compute_aggregate_statistics(&data, &groups, &analysis);
        // F(0.95; 2, 6) = 5.1433
        let critical = agg.critical_value.expect("lookup");
        assert!((critical - 5.1433).abs() < 1e-3, "{critical}");
        assert!(agg.is_significant);
    }

    #[test]
    fn test_pooled_t_matches_f() {
        let mut data = obs("A", &[70.0, 74.0, 78.0, 72.0], 0);
        data.extend(obs("B", &[80.0, 85.0, 79.0, 84.0], 4));
        let groups = compute_group_statistics(&data);

        let f = compute_aggregate_statistics(&data, &groups, &AnalysisConfig::default());
        let t = compute_aggregate_statistics(
            &data,
            &groups,
            &AnalysisConfig {
                test: TestKind::PooledT,
                significance: SignificanceRule::Alpha { alpha: 0.05 },
            },
        );

        assert!(t.test_statistic < 0.0, "A has the lower mean");
        assert!((t.test_statistic.powi(2) - f.test_statistic).abs() < 1e-9);
        // t(0.975; 6) = 2.4469
        assert!((t.critical_value.expect("lookup") - 2.4469).abs() < 1e-3);
        assert!(t.is_significant);
    }

    #[test]
    fn test_single_observation_group() {
        let data = obs("only", &[50.0], 0);
        let stats = compute_group_statistics(&data);
        assert_eq!(
            stats["only"],
            GroupStatistics {
                mean: 50.0,
                variance: 0.0,
                count: 1
            }
        );
    }

    #[test]
    fn test_single_group_is_finite_sentinel() {
        let data = obs("only", &[40.0, 50.0, 60.0], 0);
        let groups = compute_group_statistics(&data);
        let agg = compute_aggregate_statistics(&data, &groups, &AnalysisConfig::default());

        assert!(agg.degenerate);
        assert_eq!(agg.between_group_variance, 0.0);
        assert_eq!(agg.test_statistic, 0.0);
        assert!(!agg.is_significant);
        assert!(matches!(
            ensure_comparable(&groups),
            Err(StageError::DegenerateInput { .. })
        ));
    }

    #[test]
    fn test_all_singletons_within_zero() {
        let mut data = obs("A", &[10.0], 0);
        data.extend(obs("B", &[90.0], 1));
        let groups = compute_group_statistics(&data);
        let agg = compute_aggregate_statistics(&data, &groups, &AnalysisConfig::default());

        assert_eq!(agg.df_within, 0);
        assert_eq!(agg.within_group_variance, 0.0);
        assert_eq!(agg.test_statistic, 0.0);
        assert!(agg.between_group_variance.is_finite());
        assert!(!agg.is_significant);
        assert!(ensure_comparable(&groups).is_ok());
    }

    #[test]
    fn test_zero_spread_groups() {
        let mut data = obs("A", &[60.0, 60.0, 60.0], 0);
        data.extend(obs("B", &[70.0, 70.0, 70.0], 3));
        let groups = compute_group_statistics(&data);
        let agg = compute_aggregate_statistics(&data, &groups, &AnalysisConfig::default());

        assert_eq!(agg.within_group_variance, 0.0);
        assert_eq!(agg.test_statistic, 0.0);
        assert!(agg.degenerate);
        assert!(!agg.is_significant);
    }

    #[test]
    fn test_empty_observations() {
        let groups = compute_group_statistics(&[]);
        assert!(groups.is_empty());
        let agg = compute_aggregate_statistics(&[], &groups, &AnalysisConfig::default());
        assert_eq!(agg.grand_mean, 0.0);
        assert!(!agg.is_significant);
    }

    #[test]
    fn test_idempotent() {
        let data = textbook();
        let g1 = compute_group_statistics(&data);
        let g2 = compute_group_statistics(&data);
        assert_eq!(g1, g2);
        let a1 = compute_aggregate_statistics(&data, &g1, &AnalysisConfig::default());
        let a2 = compute_aggregate_statistics(&data, &g2, &AnalysisConfig::default());
        assert_eq!(a1, a2);
    }

    #[test]
    fn test_running_statistics() {
        let mut acc = RunningStatistics::new();
        assert_eq!(acc.variance(), 0.0);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            acc.push(v);
        }
        assert_eq!(acc.count(), 8);
        assert!((acc.mean() - 5.0).abs() < 1e-12);
        // Population variance 4, sample variance 32/7.
        assert!((acc.variance() - 32.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_critical_value_without_df() {
        let rule = SignificanceRule::Alpha { alpha: 0.05 };
        assert_eq!(critical_value(rule, TestKind::OneWayAnova, 2, 0), None);
        assert_eq!(critical_value(rule, TestKind::OneWayAnova, 0, 10), None);
        assert!(critical_value(rule, TestKind::PooledT, 1, 10).is_some());
    }
}
