//! Finite-value guard.
//!
//! Runs over every derived statistic and layout before the engine commits
//! it. The statistics functions are built never to produce NaN or infinity,
//! so a trip here means a bug; the engine refuses the result and keeps its
//! previous state instead of handing a broken snapshot to the renderer.

use tracing::warn;

use crate::error::{StageError, StageResult};
use crate::layout::{LayoutSnapshot, Point};
use crate::stats::{AggregateStatistics, GroupStatsMap};

/// Fail with `NonFiniteValue` if `value` is NaN or infinite.
///
/// # Errors
///
/// Returns `StageError::NonFiniteValue` naming `location`.
pub fn ensure_finite(value: f64, location: impl FnOnce() -> String) -> StageResult<()> {
    if value.is_finite() {
        return Ok(());
    }
    let location = location();
    warn!(%location, value, "non-finite value rejected");
    Err(StageError::NonFiniteValue { location })
}

/// Check per-group and aggregate statistics.
///
/// # Errors
///
/// Returns the first non-finite field found.
pub fn check_statistics(
    group_stats: &GroupStatsMap,
    aggregate: &AggregateStatistics,
) -> StageResult<()> {
    for (label, stats) in group_stats {
        ensure_finite(stats.mean, || format!("groups[{label}].mean"))?;
        ensure_finite(stats.variance, || format!("groups[{label}].variance"))?;
    }

    ensure_finite(aggregate.grand_mean, || "grand_mean".to_string())?;
    ensure_finite(aggregate.between_group_variance, || {
        "between_group_variance".to_string()
    })?;
    ensure_finite(aggregate.within_group_variance, || {
        "within_group_variance".to_string()
    })?;
    ensure_finite(aggregate.test_statistic, || "test_statistic".to_string())?;
    if let Some(critical) = aggregate.critical_value {
        ensure_finite(critical, || "critical_value".to_string())?;
    }
    Ok(())
}

/// Check a single point.
///
/// # Errors
///
/// Returns `NonFiniteValue` for a NaN or infinite coordinate.
pub fn check_point(point: &Point, index: usize) -> StageResult<()> {
    ensure_finite(point.x, || format!("points[{index}].x"))?;
    ensure_finite(point.y, || format!("points[{index}].y"))
}

/// Check every point and band of a layout snapshot.
///
/// # Errors
///
/// Returns the first non-finite coordinate found.
pub fn check_layout(layout: &LayoutSnapshot) -> StageResult<()> {
    for (i, point) in layout.points.iter().enumerate() {
        check_point(point, i)?;
    }
    for band in &layout.bands {
        for (name, value) in [
            ("x_start", band.x_start),
            ("x_end", band.x_end),
            ("mean_y", band.mean_y),
            ("lower_y", band.lower_y),
            ("upper_y", band.upper_y),
        ] {
            ensure_finite(value, || format!("bands[{}].{name}", band.group))?;
        }
    }
    Ok(())
}
