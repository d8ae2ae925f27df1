//! Renderer-independent layout.
//!
//! Coordinates are normalized to `[0, 1] × [0, 1]`; the renderer scales
//! them to pixels and tweens between two snapshots. A position depends only
//! on the stage, the observation's group, its index, the set size and (from
//! `scored` on) its value. Time and animation progress play no part.
//!
//! ```text
//! intro      ● ● ● ● ● ● ● ● ●            one line, generation order
//! grouped    ● ● ●                        one band per group, each group
//!                  ● ● ●                  in its own x segment
//!                        ● ● ●
//! scored     x as grouped, y = value within the domain
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ValueDomain;
use crate::engine::stage::AnovaStage;
use crate::sample::{group_order, GroupLabel, Observation};
use crate::stats::GroupStatsMap;

/// Fraction of a group segment left empty on each side.
const SEGMENT_PADDING: f64 = 0.1;

/// Vertical position of the single intro line.
const INTRO_LINE_Y: f64 = 0.5;

/// A normalized position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate in [0, 1].
    pub x: f64,
    /// Vertical coordinate in [0, 1].
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both coordinates finite and inside the unit square.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

/// Mean and ±1 standard deviation overlay for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBand {
    /// Group the band belongs to.
    pub group: GroupLabel,
    /// Left edge of the group's segment.
    pub x_start: f64,
    /// Right edge of the group's segment.
    pub x_end: f64,
    /// Height of the group mean.
    pub mean_y: f64,
    /// Height of mean − 1 sd (clamped).
    pub lower_y: f64,
    /// Height of mean + 1 sd (clamped).
    pub upper_y: f64,
}

/// Everything a renderer needs to draw one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutSnapshot {
    /// Stage the snapshot was computed for.
    pub stage: AnovaStage,
    /// One point per observation, in generation order.
    pub points: Vec<Point>,
    /// Derived overlays (empty before `analysis`).
    pub bands: Vec<GroupBand>,
}

impl LayoutSnapshot {
    /// Snapshot with nothing to draw.
    #[must_use]
    pub const fn empty(stage: AnovaStage) -> Self {
        Self {
            stage,
            points: Vec::new(),
            bands: Vec::new(),
        }
    }
}

/// Layout calculator for one value domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    domain: ValueDomain,
}

/// Where a group sits: its ordinal among `groups` and its size.
#[derive(Debug, Clone, Copy)]
struct Slot {
    group: usize,
    groups: usize,
    size: usize,
}

impl Slot {
    fn segment(self) -> (f64, f64) {
        let width = 1.0 / self.groups.max(1) as f64;
        let start = self.group as f64 * width;
        (
            start + width * SEGMENT_PADDING,
            start + width * (1.0 - SEGMENT_PADDING),
        )
    }

    fn x(self, within: usize) -> f64 {
        let (start, end) = self.segment();
        let fraction = (within as f64 + 0.5) / self.size.max(1) as f64;
        (start + (end - start) * fraction).clamp(0.0, 1.0)
    }

    fn band_y(self) -> f64 {
        (self.group as f64 + 0.5) / self.groups.max(1) as f64
    }
}

impl Layout {
    /// Layout over `domain`.
    #[must_use]
    pub const fn new(domain: ValueDomain) -> Self {
        Self { domain }
    }

    /// Domain values are normalized against.
    #[must_use]
    pub const fn domain(&self) -> ValueDomain {
        self.domain
    }

    /// Position of `observation`, the `index`-th element of `observations`.
    ///
    /// Total: an observation whose group is missing from `observations` is
    /// placed as an extra trailing group, and an out-of-range index is
    /// clamped.
    #[must_use]
    pub fn position(
        &self,
        stage: AnovaStage,
        observation: &Observation,
        index: usize,
        observations: &[Observation],
    ) -> Point {
        let total = observations.len().max(1);

        if stage == AnovaStage::Intro {
            let i = index.min(total - 1);
            return Point::new((i as f64 + 0.5) / total as f64, INTRO_LINE_Y);
        }

        let labels = group_order(observations);
        let (group, groups) = labels
            .iter()
            .position(|l| **l == observation.group)
            .map_or((labels.len(), labels.len() + 1), |g| (g, labels.len()));
        let size = observations
            .iter()
            .filter(|o| o.group == observation.group)
            .count();
        let within = observations[..index.min(observations.len())]
            .iter()
            .filter(|o| o.group == observation.group)
            .count();

        let slot = Slot {
            group,
            groups,
            size: size.max(within + 1),
        };
        self.place(stage, slot, within, observation.value)
    }

    fn place(&self, stage: AnovaStage, slot: Slot, within: usize, value: f64) -> Point {
        let x = slot.x(within);
        let y = if stage.reveals_values() {
            self.domain.normalize(value)
        } else {
            slot.band_y()
        };
        Point::new(x, y)
    }

    /// Mean ±1 sd overlays; empty before `analysis`.
    #[must_use]
    pub fn bands(&self, stage: AnovaStage, group_stats: &GroupStatsMap) -> Vec<GroupBand> {
        if !stage.shows_bands() {
            return Vec::new();
        }

        let groups = group_stats.len();
        group_stats
            .iter()
            .enumerate()
            .map(|(g, (label, stats))| {
                let (x_start, x_end) = Slot {
                    group: g,
                    groups,
                    size: stats.count,
                }
                .segment();
                let sd = stats.std_dev();
                GroupBand {
                    group: label.clone(),
                    x_start,
                    x_end,
                    mean_y: self.domain.normalize(stats.mean),
                    lower_y: self.domain.normalize(stats.mean - sd),
                    upper_y: self.domain.normalize(stats.mean + sd),
                }
            })
            .collect()
    }

    /// Points for every observation plus overlays.
    ///
    /// Same result as calling [`Layout::position`] per observation, in one
    /// pass over the set.
    #[must_use]
    pub fn snapshot(
        &self,
        stage: AnovaStage,
        observations: &[Observation],
        group_stats: &GroupStatsMap,
    ) -> LayoutSnapshot {
        let labels = group_order(observations);
        let sizes: Vec<usize> = labels
            .iter()
            .map(|l| observations.iter().filter(|o| &o.group == *l).count())
            .collect();
        let mut seen = vec![0usize; labels.len()];
        let total = observations.len().max(1);

        let points = observations
            .iter()
            .enumerate()
            .map(|(index, obs)| {
                if stage == AnovaStage::Intro {
                    return Point::new((index as f64 + 0.5) / total as f64, INTRO_LINE_Y);
                }
                let group = labels.iter().position(|l| **l == obs.group).unwrap_or(0);
                let within = seen[group];
                seen[group] += 1;
                let slot = Slot {
                    group,
                    groups: labels.len(),
                    size: sizes[group],
                };
                self.place(stage, slot, within, obs.value)
            })
            .collect();

        LayoutSnapshot {
            stage,
            points,
            bands: self.bands(stage, group_stats),
        }
    }
}

/// [`Layout::position`] over the default percentage domain.
#[must_use]
pub fn layout_for(
    stage: AnovaStage,
    observation: &Observation,
    index: usize,
    observations: &[Observation],
) -> Point {
    Layout::default().position(stage, observation, index, observations)
}
