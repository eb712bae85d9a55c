//! Symbolic uniform-cost exploration in one or both directions.
//!
//! - [`uniform`]: one direction, expanding one cost layer per step, with the
//!   zero-cost fixpoint inside each layer.
//! - [`bidirectional`]: coordinates a forward and a backward search (either
//!   may be absent) and maintains the meet-in-the-middle lower bound.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

pub mod bidirectional;
pub mod uniform;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }
}

/// Which searches take part.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum SearchMode {
    Forward,
    Backward,
    #[default]
    Bidirectional,
}

impl SearchMode {
    pub fn uses(self, direction: Direction) -> bool {
        match self {
            SearchMode::Forward => direction == Direction::Forward,
            SearchMode::Backward => direction == Direction::Backward,
            SearchMode::Bidirectional => true,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SearchPhase {
    Init,
    /// The layer of this cost was expanded last.
    Expanding(u32),
    /// The last popped layer held no new states.
    Stalled,
    /// Nothing left to expand.
    Done,
}

/// How a frontier is matched against the opposite closed list.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrontierCheck {
    /// Report a cut for every layer met, then stop expanding states the
    /// opposite side has closed.
    AllCuts,
    /// Report the cheapest layer met only and keep expanding.
    CheapestCut,
}

/// Wall-clock budget of a search session.
#[derive(Debug, Copy, Clone)]
pub struct TimeBudget {
    started: Instant,
    limit: Option<Duration>,
}

impl TimeBudget {
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn check(&self) -> Result<()> {
        match self.limit {
            Some(limit) if self.elapsed() > limit => Err(Error::TimeLimit {
                limit,
                elapsed: self.elapsed(),
            }),
            _ => Ok(()),
        }
    }
}
