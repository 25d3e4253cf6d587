//! Lazy SMP thread pool for parallel search.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::thread;

use cozy_chess::Board;
use tracing::{info, warn};

use super::limits::SearchLimits;
use super::thread::{SearchShared, ThreadData, ThreadOutcome};
use super::tt::TranspositionTable;
use super::{IterationReport, SearchResult};

/// Stack reserved for each helper thread.
const HELPER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Lazy SMP thread pool. Owns the shared transposition table.
pub struct ThreadPool {
    tt: TranspositionTable,
    num_threads: usize,
}

impl ThreadPool {
    /// Creates a single-threaded pool with a `hash_mb` MB transposition table.
    pub fn new(hash_mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(hash_mb),
            num_threads: 1,
        }
    }

    pub fn set_num_threads(&mut self, n: usize) {
        self.num_threads = n.max(1);
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn resize_tt(&mut self, mb: usize) {
        self.tt = TranspositionTable::new(mb);
    }

    pub fn clear_tt(&self) {
        self.tt.clear();
    }

    /// Runs a Lazy SMP search from `board`.
    ///
    /// `game_history` holds the hashes of the positions played before
    /// `board`, oldest first. Thread 0 runs on the calling thread and is the
    /// only one to call `on_iter`; threads 1.. search silently and feed the
    /// shared table. The search ends when a limit is reached or `stop` is
    /// raised, and `stop` is left raised afterwards.
    pub fn search<F>(
        &self,
        board: &Board,
        game_history: &[u64],
        limits: &SearchLimits,
        stop: &AtomicBool,
        on_iter: F,
    ) -> SearchResult
    where
        F: FnMut(&IterationReport<'_>),
    {
        self.tt.new_generation();

        let counters: Vec<AtomicU64> = (0..self.num_threads).map(|_| AtomicU64::new(0)).collect();
        let shared = SearchShared {
            tt: &self.tt,
            stop,
            nodes: &counters,
            game_history,
        };

        info!(
            threads = self.num_threads,
            depth = limits.depth,
            multi_pv = limits.multi_pv,
            "search started"
        );

        let outcome = thread::scope(|scope| {
            let mut helpers = Vec::with_capacity(self.num_threads.saturating_sub(1));
            for id in 1..self.num_threads {
                let shared = &shared;
                let root = board.clone();
                let limits = limits.clone();
                let spawned = thread::Builder::new()
                    .name(format!("corvid-helper-{id}"))
                    .stack_size(HELPER_STACK_SIZE)
                    .spawn_scoped(scope, move || {
                        ThreadData::new(id, root, limits, shared).go(|_| {})
                    });
                match spawned {
                    Ok(handle) => helpers.push(handle),
                    Err(error) => warn!(id, %error, "failed to spawn helper thread"),
                }
            }

            let mut main = ThreadData::new(0, board.clone(), limits.clone(), &shared);
            let mut best = main.go(on_iter);

            for handle in helpers {
                match handle.join() {
                    Ok(outcome) => {
                        if outcome.depth > best.depth && !outcome.lines.is_empty() {
                            best = outcome;
                        }
                    }
                    Err(_) => warn!("helper thread panicked"),
                }
            }
            best
        });

        let result = build_result(outcome, shared.total_nodes());
        info!(
            depth = result.depth,
            score = result.score,
            nodes = result.nodes,
            best_move = ?result.best_move.map(|mv| mv.to_string()),
            "search finished"
        );
        result
    }
}

/// The main thread's answer, unless a helper completed a strictly deeper
/// iteration.
fn build_result(outcome: ThreadOutcome, nodes: u64) -> SearchResult {
    let ThreadOutcome {
        depth,
        seldepth,
        lines,
        fallback,
        fallback_score,
        ..
    } = outcome;

    let (best_move, ponder_move, pv, score) = match lines.first() {
        Some(line) => (
            line.moves.first().copied(),
            line.moves.get(1).copied(),
            line.moves.clone(),
            line.score,
        ),
        None => (fallback, None, fallback.into_iter().collect(), fallback_score),
    };

    SearchResult {
        best_move,
        ponder_move,
        pv,
        score,
        depth,
        seldepth,
        nodes,
        lines,
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("tt_entries", &self.tt.len())
            .field("num_threads", &self.num_threads)
            .finish()
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::PvLine;

    fn outcome(depth: u8, lines: Vec<PvLine>) -> ThreadOutcome {
        ThreadOutcome {
            id: 0,
            depth,
            seldepth: depth as usize,
            lines,
            fallback: None,
            fallback_score: -15,
        }
    }

    #[test]
    fn result_without_lines_uses_fallback() {
        let board = Board::default();
        let mut fallback = None;
        board.generate_moves(|moves| {
            fallback = moves.into_iter().next();
            true
        });
        let mut done = outcome(0, Vec::new());
        done.fallback = fallback;

        let result = build_result(done, 7);
        assert_eq!(result.best_move, fallback);
        assert_eq!(result.pv, fallback.into_iter().collect::<Vec<_>>());
        assert_eq!(result.score, -15);
        assert_eq!(result.nodes, 7);
        assert!(result.ponder_move.is_none());
    }

    #[test]
    fn result_reads_best_line() {
        let line = PvLine {
            score: 42,
            moves: vec!["e2e4".parse().unwrap(), "e7e5".parse().unwrap()],
        };
        let result = build_result(outcome(5, vec![line.clone()]), 1000);
        assert_eq!(result.best_move, Some(line.moves[0]));
        assert_eq!(result.ponder_move, Some(line.moves[1]));
        assert_eq!(result.score, 42);
        assert_eq!(result.depth, 5);
        assert_eq!(result.lines, vec![line]);
    }

    #[test]
    fn thread_count_is_at_least_one() {
        let mut pool = ThreadPool::new(1);
        pool.set_num_threads(0);
        assert_eq!(pool.num_threads(), 1);
        pool.set_num_threads(4);
        assert_eq!(pool.num_threads(), 4);
    }
}
