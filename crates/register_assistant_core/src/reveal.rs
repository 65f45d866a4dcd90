//! crates/register_assistant_core/src/reveal.rs
//!
//! The state machine that exposes an extracted record list to the UI one
//! record at a time.
//!
//! ```text
//! Idle --start--> Extracting --resolve(n>0)--> Revealing --last tick--> Complete
//!                     |      --resolve(0)----------------------------> Complete
//!                     +--fail--> Failed <--fail-- Revealing
//! ```
//!
//! The scheduler only counts; the session owns the lists and decides which
//! record a tick appends.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Extracting,
    Revealing,
    Complete,
    Failed,
}

impl Phase {
    /// `Complete` and `Failed` end the current cycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }

    /// A cycle is in flight and owns pending callbacks.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Extracting | Phase::Revealing)
    }
}

/// What the next scheduler tick should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// The record at `index` is being revealed; append it after the delay.
    Pending { index: usize, total: usize },
    /// Every record has been revealed and the cycle is complete.
    Done { total: usize },
    /// The callback belongs to a cycle that was cancelled or replaced.
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealScheduler {
    phase: Phase,
    revealed_count: usize,
    cursor: Option<usize>,
}

impl RevealScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed_count
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Back to `Idle` with all counters cleared.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Processing has been triggered. Clears counters from any previous cycle.
    pub fn start(&mut self) {
        self.revealed_count = 0;
        self.cursor = None;
        self.phase = Phase::Extracting;
    }

    /// Extraction finished with `total` records.
    pub fn resolve(&mut self, total: usize) -> Phase {
        if self.phase != Phase::Extracting {
            return self.phase;
        }
        self.phase = if total == 0 {
            Phase::Complete
        } else {
            Phase::Revealing
        };
        self.phase
    }

    pub fn fail(&mut self) {
        self.cursor = None;
        self.phase = Phase::Failed;
    }

    /// Starts the next tick: points the cursor at the next record, or
    /// completes the cycle when nothing is left.
    pub fn begin_tick(&mut self, total: usize) -> Tick {
        match self.phase {
            Phase::Revealing if self.revealed_count < total => {
                self.cursor = Some(self.revealed_count);
                Tick::Pending {
                    index: self.revealed_count,
                    total,
                }
            }
            Phase::Revealing | Phase::Complete => {
                self.cursor = None;
                self.phase = Phase::Complete;
                Tick::Done { total }
            }
            Phase::Idle | Phase::Extracting | Phase::Failed => Tick::Stale,
        }
    }

    /// Ends a pending tick. Returns the index of the record to append.
    pub fn finish_tick(&mut self, total: usize) -> Option<usize> {
        match (self.phase, self.cursor) {
            (Phase::Revealing, Some(index)) if index == self.revealed_count && index < total => {
                self.revealed_count += 1;
                self.cursor = None;
                Some(index)
            }
            _ => None,
        }
    }

    /// Percentage of records revealed so far; 100 once the cycle is complete.
    pub fn progress(&self, total: usize) -> u8 {
        match self.phase {
            Phase::Complete => 100,
            _ if total == 0 => 0,
            _ => ((self.revealed_count.min(total) * 100) / total) as u8,
        }
    }
}
