//! # seeing-science
//!
//! Stage engine for step-by-step statistics walkthroughs.
//!
//! A walkthrough draws a deterministic synthetic sample, derives group and
//! aggregate statistics, and moves through a fixed sequence of named stages.
//! At every stage it can answer where each observation sits in a unit
//! square and which figures are visible. Rendering is left to the host.
//!
//! ## Example
//!
//! ```rust
//! use seeing_science::prelude::*;
//!
//! let config = EngineConfig::builder()
//!     .seed(42)
//!     .group("lecture", 75.0, 8.0, 12)
//!     .group("flipped", 82.0, 6.0, 12)
//!     .build();
//!
//! let mut engine = StageSampleEngine::new(config).unwrap();
//! engine.generate().unwrap();
//! assert_eq!(engine.observations().len(), 24);
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops,  // Written out to match the textbook formulas
    clippy::imprecise_flops,
    clippy::too_many_lines,
    clippy::missing_const_for_fn,
    clippy::needless_range_loop,
)]

pub mod config;
pub mod demos;
pub mod engine;
pub mod error;
pub mod layout;
pub mod sample;
pub mod stats;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{
        AnalysisConfig, EngineConfig, EngineConfigBuilder, GroupSpec, NoiseModel, ResetPolicy,
        SampleConfig, SignificanceRule, TestKind, ValueDomain,
    };
    pub use crate::engine::{
        AnovaStage, CancellationToken, EngineSnapshot, RevealFrame, RevealScheduler, SampleRng,
        StageSampleEngine, StageSequence, StageStatistics, Walkthrough,
    };
    pub use crate::error::{StageError, StageResult};
    pub use crate::layout::{layout_for, Layout, LayoutSnapshot, Point};
    pub use crate::sample::{generate, GroupLabel, Observation, ObservationSet};
    pub use crate::stats::{
        compute_aggregate_statistics, compute_group_statistics, AggregateStatistics,
        GroupStatistics,
    };
}

/// Re-export for public API
pub use engine::StageSampleEngine;
pub use error::{StageError, StageResult};
