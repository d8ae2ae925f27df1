//! Statistics visible at each stage.
//!
//! The walkthrough reveals figures progressively: nothing while the sample
//! is introduced, counts once values appear, group summaries at `analysis`,
//! then each variance source, the statistic, and finally the decision.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::engine::stage::AnovaStage;
use crate::sample::GroupLabel;
use crate::stats::{AggregateStatistics, GroupStatsMap};

/// Summary line for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Group label.
    pub group: GroupLabel,
    /// Group mean.
    pub mean: f64,
    /// Sample standard deviation.
    pub std_dev: f64,
    /// Observation count.
    pub count: usize,
}

/// Derived statistics a renderer may show at a stage. `None` means hidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStatistics {
    /// Stage this view belongs to.
    pub stage: AnovaStage,
    /// Observations per group.
    pub group_counts: Option<IndexMap<GroupLabel, usize>>,
    /// Mean and spread per group.
    pub group_summaries: Option<Vec<GroupSummary>>,
    /// Mean of all observations.
    pub grand_mean: Option<f64>,
    /// Pooled within-group variance.
    pub within_group_variance: Option<f64>,
    /// Between-group variance.
    pub between_group_variance: Option<f64>,
    /// F or t statistic.
    pub test_statistic: Option<f64>,
    /// Critical value used for the decision.
    pub critical_value: Option<f64>,
    /// Significance decision.
    pub is_significant: Option<bool>,
}

impl StageStatistics {
    /// View with everything hidden.
    #[must_use]
    pub const fn hidden(stage: AnovaStage) -> Self {
        Self {
            stage,
            group_counts: None,
            group_summaries: None,
            grand_mean: None,
            within_group_variance: None,
            between_group_variance: None,
            test_statistic: None,
            critical_value: None,
            is_significant: None,
        }
    }
}

/// Filter the full statistics down to what `stage` shows.
#[must_use]
pub fn visible_statistics(
    stage: AnovaStage,
    group_stats: &GroupStatsMap,
    aggregate: &AggregateStatistics,
) -> StageStatistics {
    let mut view = StageStatistics::hidden(stage);

    if stage >= AnovaStage::Scored {
        view.group_counts = Some(
            group_stats
                .iter()
                .map(|(label, stats)| (label.clone(), stats.count))
                .collect(),
        );
    }

    if stage >= AnovaStage::Analysis {
        view.group_summaries = Some(
            group_stats
                .iter()
                .map(|(label, stats)| GroupSummary {
                    group: label.clone(),
                    mean: stats.mean,
                    std_dev: stats.std_dev(),
                    count: stats.count,
                })
                .collect(),
        );
        view.grand_mean = Some(aggregate.grand_mean);
    }

    if stage >= AnovaStage::WithinVariance {
        view.within_group_variance = Some(aggregate.within_group_variance);
    }
    if stage >= AnovaStage::BetweenVariance {
        view.between_group_variance = Some(aggregate.between_group_variance);
    }
    if stage >= AnovaStage::FTest {
        view.test_statistic = Some(aggregate.test_statistic);
    }
    if stage == AnovaStage::Conclusion {
        view.critical_value = aggregate.critical_value;
        view.is_significant = Some(aggregate.is_significant);
    }

    view
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::engine::stage::StageSequence;
    use crate::sample::Observation;
    use crate::stats::{compute_aggregate_statistics, compute_group_statistics};

    fn stats() -> (GroupStatsMap, AggregateStatistics) {
        let data = vec![
            Observation::new(0, "A", 60.0),
            Observation::new(1, "A", 64.0),
            Observation::new(2, "B", 80.0),
            Observation::new(3, "B", 84.0),
        ];
        let groups = compute_group_statistics(&data);
        let agg = compute_aggregate_statistics(&data, &groups, &AnalysisConfig::default());
        (groups, agg)
    }

    #[test]
    fn test_intro_and_grouped_hide_everything() {
        let (groups, agg) = stats();
        for stage in [AnovaStage::Intro, AnovaStage::Grouped] {
            assert_eq!(
                visible_statistics(stage, &groups, &agg),
                StageStatistics::hidden(stage)
            );
        }
    }

    #[test]
    fn test_visibility_is_monotonic() {
        let (groups, agg) = stats();
        let mut shown = 0;
        for stage in AnovaStage::ALL {
            let view = visible_statistics(*stage, &groups, &agg);
            let count = [
                view.group_counts.is_some(),
                view.group_summaries.is_some(),
                view.grand_mean.is_some(),
                view.within_group_variance.is_some(),
                view.between_group_variance.is_some(),
                view.test_statistic.is_some(),
                view.is_significant.is_some(),
            ]
            .iter()
            .filter(|v| **v)
            .count();
            assert!(count >= shown, "{stage} hides something shown earlier");
            shown = count;
        }
        assert_eq!(shown, 7);
    }

    #[test]
    fn test_between_before_statistic() {
        let (groups, agg) = stats();
        let view = visible_statistics(AnovaStage::BetweenVariance, &groups, &agg);
        assert_eq!(view.between_group_variance, Some(agg.between_group_variance));
        assert!(view.test_statistic.is_none());
        assert!(view.is_significant.is_none());
    }

    #[test]
    fn test_conclusion_shows_decision() {
        let (groups, agg) = stats();
        let view = visible_statistics(AnovaStage::Conclusion, &groups, &agg);
        assert_eq!(view.is_significant, Some(agg.is_significant));
        assert_eq!(view.critical_value, Some(3.2));
        let summaries = view.group_summaries.expect("shown");
        assert!((summaries[1].mean - 82.0).abs() < 1e-12);
    }
}
