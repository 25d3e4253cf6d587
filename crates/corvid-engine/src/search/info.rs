//! Per-thread limits, clocks and live statistics.

use std::time::{Duration, Instant};

use cozy_chess::Move;

use super::limits::SearchLimits;

/// Limits one thread searches under, plus what it has produced so far.
#[derive(Debug, Clone)]
pub struct SearchInfo {
    pub start: Instant,
    pub limits: SearchLimits,
    pub nodes: u64,
    pub seldepth: usize,
    /// Principal variation of the last completed iteration.
    pub searched_pv: Vec<Move>,
    pub score: i32,
    pub completed_depth: u8,
    /// Soft limit multiplier in hundredths, driven by [`StabilityTracker`].
    soft_scale: u32,
}

impl SearchInfo {
    pub fn new(limits: SearchLimits) -> Self {
        Self {
            start: Instant::now(),
            limits,
            nodes: 0,
            seldepth: 0,
            searched_pv: Vec::new(),
            score: 0,
            completed_depth: 0,
            soft_scale: 100,
        }
    }

    /// Restarts the clock and clears all outputs.
    pub fn reset(&mut self) {
        self.start = Instant::now();
        self.nodes = 0;
        self.seldepth = 0;
        self.searched_pv.clear();
        self.score = 0;
        self.completed_depth = 0;
        self.soft_scale = 100;
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn hard_limit_reached(&self) -> bool {
        self.limits
            .hard_time
            .is_some_and(|hard| self.elapsed() >= hard)
    }

    pub fn node_limit_reached(&self) -> bool {
        self.limits.nodes.is_some_and(|limit| self.nodes >= limit)
    }

    pub fn set_soft_scale(&mut self, scale: u32) {
        self.soft_scale = scale;
    }

    /// Whether there is time left to begin another iteration.
    ///
    /// An iteration is not started past the stability-scaled soft limit, nor
    /// past half the hard limit, since it would most likely be cut off.
    pub fn can_start_iteration(&self) -> bool {
        let elapsed = self.elapsed();
        if let Some(soft) = self.limits.soft_time {
            if elapsed >= soft * self.soft_scale / 100 {
                return false;
            }
        }
        if let Some(hard) = self.limits.hard_time {
            if elapsed >= hard / 2 {
                return false;
            }
        }
        true
    }
}

/// Scales the soft time limit by how settled the search looks.
///
/// A falling score buys more time; a best move that survives several
/// iterations gives time back.
#[derive(Debug, Default)]
pub struct StabilityTracker {
    last: Option<(Move, i32)>,
    streak: u32,
}

impl StabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one completed iteration, returning the soft-limit scale in hundredths.
    pub fn update(&mut self, best_move: Move, score: i32) -> u32 {
        let scale = match self.last {
            None => 100,
            Some((_, last_score)) if last_score - score > 100 => {
                self.streak = 0;
                250
            }
            Some((_, last_score)) if last_score - score > 50 => {
                self.streak = 0;
                180
            }
            Some((last_move, _)) if last_move == best_move => {
                self.streak += 1;
                if self.streak >= 3 { 60 } else { 100 }
            }
            Some(_) => {
                self.streak = 0;
                100
            }
        };
        self.last = Some((best_move, score));
        scale
    }
}
