//! Search algorithms and move ordering.

pub mod data;
pub mod draw;
pub mod info;
pub mod limits;
pub mod negamax;
pub mod ordering;
pub mod pool;
pub mod see;
pub mod thread;
pub mod tt;

use std::time::Duration;

use cozy_chess::{Move, Square};

/// Larger than any reachable score.
pub const INF: i32 = 32_000;
/// Score of delivering mate at the root.
pub const MATE_SCORE: i32 = 30_000;
/// Hard cap on search ply, including quiescence.
pub const MAX_PLY: usize = 128;
/// Scores at least this far from zero announce a forced mate.
pub const MATE_THRESHOLD: i32 = MATE_SCORE - MAX_PLY as i32;
pub const DRAW_SCORE: i32 = 0;
/// Deepest iteration the driver will start.
pub const MAX_DEPTH: u8 = 100;

/// Filler for fixed move buffers; a1a1 is never a legal move.
pub(crate) const NULL_MOVE: Move = Move {
    from: Square::A1,
    to: Square::A1,
    promotion: None,
};

/// Score for the side to move being checkmated at `ply`.
pub const fn mated_in(ply: usize) -> i32 {
    -MATE_SCORE + ply as i32
}

/// Score for delivering checkmate at `ply`.
pub const fn mate_in(ply: usize) -> i32 {
    MATE_SCORE - ply as i32
}

pub fn is_mate_score(score: i32) -> bool {
    score.abs() >= MATE_THRESHOLD
}

/// Signed number of full moves until mate, as reported by `score mate N`.
pub fn mate_distance(score: i32) -> Option<i32> {
    if !is_mate_score(score) {
        return None;
    }
    let moves = (MATE_SCORE - score.abs() + 1) / 2;
    Some(if score > 0 { moves } else { -moves })
}

/// Raised from deep inside the tree when the stop flag is observed.
///
/// Callers discard whatever the unfinished iteration produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("search aborted")]
pub struct Aborted;

/// One principal variation with its score, as produced by one multi-PV slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvLine {
    pub score: i32,
    pub moves: Vec<Move>,
}

/// Progress report emitted by the main thread after every completed line.
#[derive(Debug, Clone, Copy)]
pub struct IterationReport<'a> {
    pub depth: u8,
    pub seldepth: usize,
    /// 1-based multi-PV slot.
    pub multipv: usize,
    pub score: i32,
    /// Nodes across all threads, as far as they have been published.
    pub nodes: u64,
    pub elapsed: Duration,
    pub hashfull: usize,
    pub pv: &'a [Move],
}

/// Result of a completed search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// `None` only when the root has no legal move.
    pub best_move: Option<Move>,
    /// Expected reply, the second move of the principal variation.
    pub ponder_move: Option<Move>,
    pub pv: Vec<Move>,
    pub score: i32,
    /// Deepest fully completed iteration; 0 if none finished.
    pub depth: u8,
    pub seldepth: usize,
    /// Nodes across all threads.
    pub nodes: u64,
    /// Every multi-PV line of the final iteration, best first.
    pub lines: Vec<PvLine>,
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use cozy_chess::Board;

    use super::*;
    use crate::search::limits::SearchLimits;
    use crate::search::pool::ThreadPool;

    fn board(fen: &str) -> Board {
        Board::from_fen(fen, false).unwrap()
    }

    fn search_depth(board: &Board, depth: u8) -> SearchResult {
        let pool = ThreadPool::new(16);
        let stop = AtomicBool::new(false);
        pool.search(board, &[], &SearchLimits::new().with_depth(depth), &stop, |_| {})
    }

    #[test]
    fn mate_helpers_agree() {
        assert_eq!(mate_in(1), MATE_SCORE - 1);
        assert_eq!(mated_in(0), -MATE_SCORE);
        assert!(is_mate_score(mate_in(40)));
        assert!(!is_mate_score(900));
        assert_eq!(mate_distance(mate_in(1)), Some(1));
        assert_eq!(mate_distance(mate_in(3)), Some(2));
        assert_eq!(mate_distance(mated_in(2)), Some(-1));
        assert_eq!(mate_distance(35), None);
    }

    #[test]
    fn depth_1_returns_legal_move() {
        let start = Board::default();
        let result = search_depth(&start, 1);
        let mv = result.best_move.expect("a move at depth 1");
        assert!(start.is_legal(mv));
        assert_eq!(result.depth, 1);
    }

    #[test]
    fn finds_mate_in_one() {
        let result = search_depth(
            &board("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4"),
            3,
        );
        assert_eq!(result.best_move.map(|mv| mv.to_string()).as_deref(), Some("h5f7"));
        assert_eq!(result.score, mate_in(1));
    }

    #[test]
    fn stalemate_root_scores_zero_without_move() {
        let result = search_depth(&board("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1"), 4);
        assert_eq!(result.score, DRAW_SCORE);
        assert!(result.best_move.is_none());
        assert!(result.pv.is_empty());
    }

    #[test]
    fn checkmated_root_scores_mated() {
        let result = search_depth(&board("7k/6Q1/5K2/8/8/8/8/8 b - - 0 1"), 4);
        assert_eq!(result.score, mated_in(0));
        assert!(result.best_move.is_none());
    }

    #[test]
    fn callback_sees_every_depth_in_order() {
        let pool = ThreadPool::new(16);
        let stop = AtomicBool::new(false);
        let mut depths = Vec::new();
        pool.search(
            &Board::default(),
            &[],
            &SearchLimits::new().with_depth(5),
            &stop,
            |report| {
                assert!(!report.pv.is_empty());
                depths.push(report.depth);
            },
        );
        assert_eq!(depths, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn pv_starts_with_best_move_and_is_playable() {
        let start = Board::default();
        let result = search_depth(&start, 4);
        assert!(!result.pv.is_empty());
        assert_eq!(result.pv.first().copied(), result.best_move);
        assert_eq!(result.pv.get(1).copied(), result.ponder_move);

        let mut board = start;
        for &mv in &result.pv {
            assert!(board.is_legal(mv), "{mv} is illegal in the PV");
            board.play_unchecked(mv);
        }
    }

    #[test]
    fn stop_from_callback_ends_search_early() {
        let pool = ThreadPool::new(16);
        let stop = AtomicBool::new(false);
        let result = pool.search(
            &Board::default(),
            &[],
            &SearchLimits::new(),
            &stop,
            |_| stop.store(true, Ordering::Relaxed),
        );
        assert_eq!(result.depth, 1);
        assert!(result.best_move.is_some());
    }

    #[test]
    fn prestopped_search_still_returns_legal_move() {
        let start = Board::default();
        let pool = ThreadPool::new(16);
        let stop = AtomicBool::new(true);
        let result = pool.search(&start, &[], &SearchLimits::new(), &stop, |_| {});
        assert_eq!(result.depth, 0);
        let mv = result.best_move.expect("fallback move");
        assert!(start.is_legal(mv));
    }

    #[test]
    fn mate_score_survives_aspiration_windows() {
        let result = search_depth(
            &board("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4"),
            6,
        );
        assert_eq!(result.best_move.map(|mv| mv.to_string()).as_deref(), Some("h5f7"));
        assert_eq!(result.score, mate_in(1));
    }

    #[test]
    fn multi_pv_lines_are_distinct_and_sorted() {
        let pool = ThreadPool::new(16);
        let stop = AtomicBool::new(false);
        let limits = SearchLimits::new().with_depth(4).with_multi_pv(3);
        let result = pool.search(&Board::default(), &[], &limits, &stop, |_| {});

        assert_eq!(result.lines.len(), 3);
        let firsts: Vec<Move> = result.lines.iter().map(|line| line.moves[0]).collect();
        assert_ne!(firsts[0], firsts[1]);
        assert_ne!(firsts[1], firsts[2]);
        assert_ne!(firsts[0], firsts[2]);
        assert!(result.lines.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(result.best_move, Some(firsts[0]));
    }

    #[test]
    fn multi_pv_is_capped_by_legal_moves() {
        // Only the king can move: Ka2, Kb1, Kb2.
        let pool = ThreadPool::new(16);
        let stop = AtomicBool::new(false);
        let limits = SearchLimits::new().with_depth(3).with_multi_pv(10);
        let result = pool.search(&board("7k/8/8/8/8/8/8/K6r w - - 0 1"), &[], &limits, &stop, |_| {});
        assert!(result.lines.len() <= 3);
        assert!(!result.lines.is_empty());
    }
}
