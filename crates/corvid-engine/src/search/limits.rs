//! Launch configuration for a search.

use std::time::Duration;

use super::MAX_DEPTH;
use crate::time::compute_limits;

/// Moves assumed left in the time control when the clock does not say.
pub const DEFAULT_MOVES_TO_GO: u32 = 25;

/// A configuration [`SearchLimits::validate`] refuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitsError {
    #[error("search depth must be at least 1")]
    ZeroDepth,
    #[error("search depth {depth} exceeds the maximum of {max}")]
    DepthTooDeep { depth: u8, max: u8 },
    #[error("at least one principal variation must be requested")]
    ZeroMultiPv,
    #[error("soft time limit {soft:?} exceeds hard time limit {hard:?}")]
    SoftAboveHard { soft: Duration, hard: Duration },
}

/// Budgets and options for one search.
///
/// Absent time and node limits mean the search runs until it reaches
/// `depth` or the stop flag is raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchLimits {
    /// Wall-clock deadline after which the tree walk is abandoned.
    pub hard_time: Option<Duration>,
    /// Target after which no new iteration is started.
    pub soft_time: Option<Duration>,
    pub depth: u8,
    /// Node budget of the main thread.
    pub nodes: Option<u64>,
    pub moves_to_go: u32,
    /// Number of principal variations to search.
    pub multi_pv: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            hard_time: None,
            soft_time: None,
            depth: MAX_DEPTH,
            nodes: None,
            moves_to_go: DEFAULT_MOVES_TO_GO,
            multi_pv: 1,
        }
    }
}

impl SearchLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamps into `1..=MAX_DEPTH`.
    pub fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth.clamp(1, MAX_DEPTH);
        self
    }

    pub fn with_nodes(mut self, nodes: u64) -> Self {
        self.nodes = Some(nodes);
        self
    }

    /// Fixed time per move: soft and hard limit coincide.
    pub fn with_move_time(mut self, time: Duration) -> Self {
        self.soft_time = Some(time);
        self.hard_time = Some(time);
        self
    }

    pub fn with_time(mut self, soft: Duration, hard: Duration) -> Self {
        self.soft_time = Some(soft);
        self.hard_time = Some(hard);
        self
    }

    /// Derives both time limits from a game clock.
    pub fn with_clock(
        mut self,
        remaining: Duration,
        increment: Duration,
        moves_to_go: Option<u32>,
    ) -> Self {
        if let Some(moves_to_go) = moves_to_go {
            self.moves_to_go = moves_to_go.max(1);
        }
        let (soft, hard) = compute_limits(remaining, increment, self.moves_to_go);
        self.with_time(soft.min(hard), hard)
    }

    pub fn with_multi_pv(mut self, lines: usize) -> Self {
        self.multi_pv = lines.max(1);
        self
    }

    pub fn validate(&self) -> Result<(), LimitsError> {
        if self.depth == 0 {
            return Err(LimitsError::ZeroDepth);
        }
        if self.depth > MAX_DEPTH {
            return Err(LimitsError::DepthTooDeep {
                depth: self.depth,
                max: MAX_DEPTH,
            });
        }
        if self.multi_pv == 0 {
            return Err(LimitsError::ZeroMultiPv);
        }
        if let (Some(soft), Some(hard)) = (self.soft_time, self.hard_time) {
            if soft > hard {
                return Err(LimitsError::SoftAboveHard { soft, hard });
            }
        }
        Ok(())
    }
}
