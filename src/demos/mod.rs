//! Additional stage-driven walkthroughs.
//!
//! Each demo reuses the engine pieces (stage machine, seeded RNG, reveal
//! scheduler) with its own stages and statistics.
//!
//! # Demos
//!
//! 1. [`binomial`] - Repeated Bernoulli experiments against the binomial pmf

pub mod binomial;

pub use binomial::{BinomialConfig, BinomialStage, BinomialTrials, DistributionBar, TrialFrame};
