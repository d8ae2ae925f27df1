//! Reveal scheduler with deterministic ordering.
//!
//! Drives a [`Walkthrough`] one observation at a time:
//! - Tasks are processed in sequence order (generation order)
//! - Cancellation is checked before a step starts, never mid-step
//! - A cancelled scheduler drops its queue and starts nothing further
//!
//! There is no clock here. The host calls [`RevealScheduler::tick`] from
//! its frame loop or timer at whatever pace it wants.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StageResult;

/// A stage-driven visualization that can reveal its items one at a time.
pub trait Walkthrough {
    /// What a single reveal step returns.
    type Frame;

    /// Number of items that can be revealed.
    fn reveal_len(&self) -> usize;

    /// Number of items revealed so far.
    fn revealed(&self) -> usize;

    /// Reveal item `index`, which must equal [`Walkthrough::revealed`].
    ///
    /// # Errors
    ///
    /// Returns error for an out-of-order index or a failed step.
    fn reveal(&mut self, index: usize) -> StageResult<Self::Frame>;
}

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a UI handler can hold one and cancel
/// the scheduler that owns another.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A pending reveal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RevealTask {
    /// Sequence number; lower runs first.
    pub sequence: u64,
    /// Item to reveal.
    pub index: usize,
}

/// Single-threaded queue of reveal steps.
///
/// # Example
///
/// ```rust
/// use seeing_science::prelude::*;
///
/// let config = EngineConfig::builder()
///     .seed(1)
///     .group("A", 40.0, 5.0, 3)
///     .group("B", 60.0, 5.0, 3)
///     .build();
/// let mut engine = StageSampleEngine::new(config).unwrap();
/// engine.generate().unwrap();
///
/// let mut scheduler = RevealScheduler::new();
/// scheduler.plan(&engine);
/// let frames = scheduler.run_to_completion(&mut engine).unwrap();
/// assert_eq!(frames.len(), 6);
/// ```
#[derive(Debug, Default)]
pub struct RevealScheduler {
    /// Min-heap ordered by sequence.
    queue: BinaryHeap<Reverse<RevealTask>>,
    /// Monotonic sequence counter.
    sequence: u64,
    token: CancellationToken,
}

impl RevealScheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scheduler that obeys an externally held token.
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }

    /// Token that cancels this scheduler.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Queue every step `target` has not revealed yet, replacing any
    /// existing plan. A cancelled token is replaced by a fresh one; fetch it
    /// again with [`RevealScheduler::token`].
    pub fn plan<W: Walkthrough>(&mut self, target: &W) {
        if self.token.is_cancelled() {
            self.token = CancellationToken::new();
        }
        self.queue.clear();
        for index in target.revealed()..target.reveal_len() {
            self.queue.push(Reverse(RevealTask {
                sequence: self.sequence,
                index,
            }));
            self.sequence += 1;
        }
        debug!(pending = self.queue.len(), "reveal planned");
    }

    /// Run the next step, if any.
    ///
    /// Returns `Ok(None)` once the queue is empty or the token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the step's error; the remaining plan is dropped.
    pub fn tick<W: Walkthrough>(&mut self, target: &mut W) -> StageResult<Option<W::Frame>> {
        if self.token.is_cancelled() {
            if !self.queue.is_empty() {
                warn!(pending = self.queue.len(), "reveal cancelled");
                self.queue.clear();
            }
            return Ok(None);
        }

        let Some(Reverse(task)) = self.queue.pop() else {
            return Ok(None);
        };
        match target.reveal(task.index) {
            Ok(frame) => Ok(Some(frame)),
            Err(err) => {
                self.queue.clear();
                Err(err)
            }
        }
    }

    /// Tick until idle, collecting every frame.
    ///
    /// # Errors
    ///
    /// Returns the first step error.
    pub fn run_to_completion<W: Walkthrough>(
        &mut self,
        target: &mut W,
    ) -> StageResult<Vec<W::Frame>> {
        let mut frames = Vec::with_capacity(self.queue.len());
        while let Some(frame) = self.tick(target)? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Cancel and drop the plan.
    pub fn stop(&mut self) {
        self.token.cancel();
        self.queue.clear();
    }

    /// Steps still queued.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Nothing queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::StageError;

    /// Counts reveals and records their order.
    #[derive(Default)]
    struct Counter {
        len: usize,
        seen: Vec<usize>,
        cancel_at: Option<(usize, CancellationToken)>,
    }

    impl Walkthrough for Counter {
        type Frame = usize;

        fn reveal_len(&self) -> usize {
            self.len
        }

        fn revealed(&self) -> usize {
            self.seen.len()
        }

        fn reveal(&mut self, index: usize) -> StageResult<usize> {
            if index != self.seen.len() {
                return Err(StageError::OutOfOrderReveal {
                    expected: self.seen.len(),
                    found: index,
                });
            }
            self.seen.push(index);
            if let Some((at, token)) = &self.cancel_at {
                if *at == index {
                    token.cancel();
                }
            }
            Ok(index)
        }
    }

    #[test]
    fn test_runs_in_order() {
        let mut target = Counter {
            len: 5,
            ..Counter::default()
        };
        let mut scheduler = RevealScheduler::new();
        scheduler.plan(&target);
        assert_eq!(scheduler.pending(), 5);

        let frames = scheduler.run_to_completion(&mut target).expect("run");
        assert_eq!(frames, vec![0, 1, 2, 3, 4]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_plan_skips_revealed() {
        let mut target = Counter {
            len: 4,
            ..Counter::default()
        };
        target.reveal(0).expect("reveal");
        let mut scheduler = RevealScheduler::new();
        scheduler.plan(&target);
        assert_eq!(scheduler.pending(), 3);
        let frames = scheduler.run_to_completion(&mut target).expect("run");
        assert_eq!(frames, vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel_mid_run_finishes_current_step_only() {
        let mut scheduler = RevealScheduler::new();
        let mut target = Counter {
            len: 10,
            cancel_at: Some((2, scheduler.token())),
            ..Counter::default()
        };
        scheduler.plan(&target);

        let frames = scheduler.run_to_completion(&mut target).expect("run");
        assert_eq!(frames, vec![0, 1, 2]);
        assert_eq!(target.seen, vec![0, 1, 2]);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_stop_prevents_further_steps() {
        let mut target = Counter {
            len: 3,
            ..Counter::default()
        };
        let mut scheduler = RevealScheduler::new();
        scheduler.plan(&target);
        scheduler.tick(&mut target).expect("tick");
        scheduler.stop();

        assert!(scheduler.tick(&mut target).expect("tick").is_none());
        assert_eq!(target.seen, vec![0]);
    }

    #[test]
    fn test_external_token() {
        let token = CancellationToken::new();
        let mut scheduler = RevealScheduler::with_token(token.clone());
        let mut target = Counter {
            len: 3,
            ..Counter::default()
        };
        scheduler.plan(&target);
        token.cancel();
        assert!(scheduler.tick(&mut target).expect("tick").is_none());
        assert!(target.seen.is_empty());
    }

    #[test]
    fn test_plan_after_stop_rearms() {
        let mut target = Counter {
            len: 2,
            ..Counter::default()
        };
        let mut scheduler = RevealScheduler::new();
        scheduler.stop();
        scheduler.plan(&target);
        assert!(!scheduler.token().is_cancelled());
        assert_eq!(scheduler.run_to_completion(&mut target).expect("run").len(), 2);
    }

    #[test]
    fn test_error_drops_plan() {
        let mut target = Counter {
            len: 3,
            ..Counter::default()
        };
        let mut scheduler = RevealScheduler::new();
        scheduler.plan(&target);
        // Reveal behind the scheduler's back so its next index is stale.
        target.reveal(0).expect("reveal");

        assert!(scheduler.tick(&mut target).is_err());
        assert!(scheduler.is_idle());
    }

    #[test]
    fn test_sequence_orders_tasks() {
        let early = RevealTask {
            sequence: 1,
            index: 9,
        };
        let late = RevealTask {
            sequence: 2,
            index: 0,
        };
        assert!(early < late);
    }
}
