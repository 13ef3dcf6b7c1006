//! Per-group outcomes, run summaries and cooperative cancellation.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::aggregate::AggregatedGrid;
use crate::error::{EngineError, Result};

/// Why a group produced no grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum SkipReason {
    /// There were no candidate inputs at all.
    NoCandidates,
    /// Candidates exist, but none fall inside the requested year range.
    EmptyForRange { start: i32, end: i32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoCandidates => write!(f, "no candidate inputs"),
            SkipReason::EmptyForRange { start, end } => {
                write!(f, "no inputs within {}-{}", start, end)
            }
        }
    }
}

/// Result of reducing one group.
#[derive(Debug, Clone)]
pub enum GroupOutcome {
    Produced(AggregatedGrid),
    Skipped(SkipReason),
}

impl GroupOutcome {
    pub fn is_produced(&self) -> bool {
        matches!(self, GroupOutcome::Produced(_))
    }

    pub fn grid(&self) -> Option<&AggregatedGrid> {
        match self {
            GroupOutcome::Produced(grid) => Some(grid),
            GroupOutcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            GroupOutcome::Produced(_) => None,
            GroupOutcome::Skipped(reason) => Some(*reason),
        }
    }
}

/// A group skip, as reported in a [`RunSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedGroup {
    pub group: String,
    #[serde(flatten)]
    pub reason: SkipReason,
}

/// Merged per-group bookkeeping for one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub produced: Vec<String>,
    pub skipped: Vec<SkippedGroup>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of the group labelled `group`.
    pub fn record(&mut self, group: impl Into<String>, outcome: &GroupOutcome) {
        match outcome {
            GroupOutcome::Produced(_) => self.produced.push(group.into()),
            GroupOutcome::Skipped(reason) => self.skipped.push(SkippedGroup {
                group: group.into(),
                reason: *reason,
            }),
        }
    }

    pub fn record_produced(&mut self, group: impl Into<String>) {
        self.produced.push(group.into());
    }

    pub fn merge(&mut self, other: RunSummary) {
        self.produced.extend(other.produced);
        self.skipped.extend(other.skipped);
    }

    pub fn produced_count(&self) -> usize {
        self.produced.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_skipped(&self, group: &str) -> bool {
        self.skipped.iter().any(|s| s.group == group)
    }
}

/// Shared flag checked between group boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
