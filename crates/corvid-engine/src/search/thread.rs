//! One search thread: its private state, the context it shares with the
//! other threads, and the iterative-deepening driver.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cozy_chess::{Board, Move};
use tracing::debug;

use super::data::SearchData;
use super::info::{SearchInfo, StabilityTracker};
use super::limits::SearchLimits;
use super::negamax::PvTable;
use super::ordering::{MoveList, score_moves};
use super::tt::TranspositionTable;
use super::{Aborted, DRAW_SCORE, IterationReport, PvLine, mated_in};
use crate::eval::evaluate;

/// Nodes between wall-clock checks and node-count publications.
pub const CHECK_INTERVAL: u64 = 2048;

/// Everything the threads of one search have in common.
pub struct SearchShared<'a> {
    pub tt: &'a TranspositionTable,
    pub stop: &'a AtomicBool,
    /// One published node count per thread, indexed by thread id.
    pub nodes: &'a [AtomicU64],
    /// Hashes of the positions played before the root, oldest first.
    pub game_history: &'a [u64],
}

impl SearchShared<'_> {
    pub fn total_nodes(&self) -> u64 {
        self.nodes
            .iter()
            .map(|count| count.load(Ordering::Relaxed))
            .sum()
    }
}

/// What one thread had completed when it stopped.
#[derive(Debug, Clone)]
pub struct ThreadOutcome {
    pub id: usize,
    /// Deepest completed iteration, 0 if none.
    pub depth: u8,
    pub seldepth: usize,
    /// Lines of the deepest completed iteration, best first.
    pub lines: Vec<PvLine>,
    /// Legal move to fall back on when no iteration completed.
    pub fallback: Option<Move>,
    /// Score reported alongside the fallback, or the terminal score of a root
    /// without legal moves.
    pub fallback_score: i32,
}

/// Private state of one search thread.
pub struct ThreadData<'a> {
    pub id: usize,
    pub root: Board,
    pub data: SearchData,
    pub info: SearchInfo,
    pub(crate) pv: Box<PvTable>,
    /// Root moves already claimed by earlier multi-PV lines of this iteration.
    pub(crate) root_exclusions: Vec<Move>,
    pub(crate) shared: &'a SearchShared<'a>,
}

impl<'a> ThreadData<'a> {
    pub fn new(
        id: usize,
        root: Board,
        limits: SearchLimits,
        shared: &'a SearchShared<'a>,
    ) -> Self {
        Self {
            id,
            root,
            data: SearchData::new(),
            info: SearchInfo::new(limits),
            pv: Box::new(PvTable::new()),
            root_exclusions: Vec::new(),
            shared,
        }
    }

    /// Thread 0 owns the clock, the node budget, and reporting.
    pub fn is_main(&self) -> bool {
        self.id == 0
    }

    pub fn must_stop(&self) -> bool {
        self.shared.stop.load(Ordering::Relaxed)
    }

    /// Raises the shared stop flag for every thread.
    pub fn abort(&self) {
        self.shared.stop.store(true, Ordering::Relaxed);
    }

    pub fn reset(&mut self) {
        self.data.reset();
        self.info.reset();
        self.pv.clear(0);
        self.root_exclusions.clear();
    }

    /// Called once per visited node, after the node has been counted.
    pub(crate) fn check_limits(&mut self) -> Result<(), Aborted> {
        if self.info.nodes % CHECK_INTERVAL == 0 {
            self.publish_nodes();
            if self.info.hard_limit_reached() {
                self.abort();
            }
        }
        if self.is_main() && self.info.node_limit_reached() {
            self.abort();
        }
        if self.must_stop() {
            return Err(Aborted);
        }
        Ok(())
    }

    fn publish_nodes(&self) {
        if let Some(count) = self.shared.nodes.get(self.id) {
            count.store(self.info.nodes, Ordering::Relaxed);
        }
    }

    /// This thread's exact count plus what the others last published.
    fn reported_nodes(&self) -> u64 {
        let others: u64 = self
            .shared
            .nodes
            .iter()
            .enumerate()
            .filter(|&(id, _)| id != self.id)
            .map(|(_, count)| count.load(Ordering::Relaxed))
            .sum();
        others + self.info.nodes
    }

    /// Best-ordered legal root move, preferring the table's suggestion.
    fn fallback_move(&self) -> Option<Move> {
        let tt_move = self
            .shared
            .tt
            .probe(self.root.hash(), 0)
            .and_then(|entry| entry.best_move);
        let mut moves = MoveList::legal(&self.root);
        score_moves(&self.root, &self.data, &mut moves, tt_move);
        moves.pick_move()
    }

    /// Iterative deepening until a limit, the stop flag, or the maximum depth.
    ///
    /// Only the main thread consults the soft time limit, reports through
    /// `on_iter`, and raises the stop flag once it is done so helpers wind
    /// down with it.
    pub fn go<F>(&mut self, mut on_iter: F) -> ThreadOutcome
    where
        F: FnMut(&IterationReport<'_>),
    {
        self.reset();

        let root_moves = MoveList::legal(&self.root).len();
        if root_moves == 0 {
            let score = if self.root.checkers().is_empty() {
                DRAW_SCORE
            } else {
                mated_in(0)
            };
            return ThreadOutcome {
                id: self.id,
                depth: 0,
                seldepth: 0,
                lines: Vec::new(),
                fallback: None,
                fallback_score: score,
            };
        }

        let fallback = self.fallback_move();
        let static_score = evaluate(&self.root);
        let wanted = self.info.limits.multi_pv.clamp(1, root_moves);
        let first_depth = if self.is_main() {
            1
        } else {
            1 + (self.id % 2) as u8
        };

        let mut lines: Vec<PvLine> = Vec::new();
        let mut stability = StabilityTracker::new();

        for depth in first_depth..=self.info.limits.depth {
            if self.must_stop() {
                break;
            }
            if self.is_main() && depth > first_depth && !self.info.can_start_iteration() {
                break;
            }

            self.data.history.age();
            let completed = match self.search_lines(depth, wanted, &lines, static_score) {
                Ok(completed) if !completed.is_empty() => completed,
                _ => break,
            };
            lines = completed;

            let best = &lines[0];
            self.info.completed_depth = depth;
            self.info.score = best.score;
            self.info.searched_pv.clone_from(&best.moves);

            if self.is_main() {
                let nodes = self.reported_nodes();
                let elapsed = self.info.elapsed();
                let hashfull = self.shared.tt.hashfull();
                for (index, line) in lines.iter().enumerate() {
                    on_iter(&IterationReport {
                        depth,
                        seldepth: self.info.seldepth,
                        multipv: index + 1,
                        score: line.score,
                        nodes,
                        elapsed,
                        hashfull,
                        pv: &line.moves,
                    });
                }
                let scale = stability.update(lines[0].moves[0], lines[0].score);
                self.info.set_soft_scale(scale);
            }

            debug!(
                thread = self.id,
                depth,
                score = self.info.score,
                nodes = self.info.nodes,
                "iteration complete"
            );
        }

        if self.is_main() {
            self.abort();
        }
        self.publish_nodes();

        ThreadOutcome {
            id: self.id,
            depth: self.info.completed_depth,
            seldepth: self.info.seldepth,
            lines,
            fallback,
            fallback_score: static_score,
        }
    }

    /// Searches `wanted` root lines at `depth`, each excluding the first moves
    /// of the lines before it. Each line is seeded with its own score from the
    /// previous iteration.
    fn search_lines(
        &mut self,
        depth: u8,
        wanted: usize,
        previous: &[PvLine],
        seed: i32,
    ) -> Result<Vec<PvLine>, Aborted> {
        self.root_exclusions.clear();
        let mut lines = Vec::with_capacity(wanted);

        for index in 0..wanted {
            let prior = previous.get(index).map_or(seed, |line| line.score);
            let score = self.aspiration_search(depth, prior)?;
            let moves = self.pv.root_line().to_vec();
            let Some(&first) = moves.first() else {
                break;
            };
            self.root_exclusions.push(first);
            lines.push(PvLine { score, moves });
        }

        self.root_exclusions.clear();
        lines.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(lines)
    }
}
