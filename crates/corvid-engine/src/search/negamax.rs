//! Negamax alpha-beta search with quiescence and aspiration windows.

use cozy_chess::{Board, Move};
use tracing::trace;

use super::draw::is_draw;
use super::ordering::{MoveList, is_quiet, score_moves};
use super::see::see_ge;
use super::thread::ThreadData;
use super::tt::Bound;
use super::{Aborted, DRAW_SCORE, INF, MAX_PLY, NULL_MOVE, is_mate_score, mated_in};
use crate::eval::evaluate;

/// Initial half-width of the aspiration window.
pub const ASPIRATION_DELTA: i32 = 25;
/// Iterations shallower than this search the full window.
pub const ASPIRATION_MIN_DEPTH: u8 = 3;
/// Past this half-width the window is opened completely.
pub const ASPIRATION_MAX_DELTA: i32 = 1000;
/// Captures losing more than this much material are skipped in quiescence.
pub const QSEARCH_SEE_MARGIN: i32 = 100;

/// Triangular PV table.
///
/// Row `ply` holds the best line found from that ply onward. Boxed by its
/// owner, since it is too large for the stack of a helper thread.
pub struct PvTable {
    moves: [[Move; MAX_PLY]; MAX_PLY],
    len: [usize; MAX_PLY],
}

impl PvTable {
    pub fn new() -> Self {
        Self {
            moves: [[NULL_MOVE; MAX_PLY]; MAX_PLY],
            len: [0; MAX_PLY],
        }
    }

    /// Empties the line at `ply`, called on entering a node.
    pub fn clear(&mut self, ply: usize) {
        if ply < MAX_PLY {
            self.len[ply] = 0;
        }
    }

    /// Sets `mv` as the best move at `ply`, followed by the child's line.
    pub fn update(&mut self, ply: usize, mv: Move) {
        if ply >= MAX_PLY {
            return;
        }
        self.moves[ply][0] = mv;

        let child = ply + 1;
        if child >= MAX_PLY {
            self.len[ply] = 1;
            return;
        }
        let copy_len = self.len[child].min(MAX_PLY - 1);
        let (top, bottom) = self.moves.split_at_mut(child);
        top[ply][1..1 + copy_len].copy_from_slice(&bottom[0][..copy_len]);
        self.len[ply] = 1 + copy_len;
    }

    pub fn root_line(&self) -> &[Move] {
        &self.moves[0][..self.len[0]]
    }
}

impl Default for PvTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadData<'_> {
    /// Root search of one multi-PV slot, windowed around `previous`.
    ///
    /// A fail low or fail high widens the failing side by a doubling delta
    /// and searches again; once the delta grows past
    /// [`ASPIRATION_MAX_DELTA`] the window is opened fully. Mate scores and
    /// shallow iterations search the full window from the start.
    pub(crate) fn aspiration_search(&mut self, depth: u8, previous: i32) -> Result<i32, Aborted> {
        let mut delta = ASPIRATION_DELTA;
        let (mut alpha, mut beta) = if depth < ASPIRATION_MIN_DEPTH || is_mate_score(previous) {
            (-INF, INF)
        } else {
            ((previous - delta).max(-INF), (previous + delta).min(INF))
        };

        loop {
            let root = self.root.clone();
            let score = self.negamax(&root, i32::from(depth), alpha, beta)?;

            if score <= alpha && alpha > -INF {
                trace!(depth, score, alpha, beta, "aspiration fail low");
                alpha = (score - delta).max(-INF);
            } else if score >= beta && beta < INF {
                trace!(depth, score, alpha, beta, "aspiration fail high");
                beta = (score + delta).min(INF);
            } else {
                return Ok(score);
            }

            delta *= 2;
            if delta > ASPIRATION_MAX_DELTA {
                alpha = -INF;
                beta = INF;
            }
        }
    }

    /// Fail-soft alpha-beta.
    ///
    /// Returns `Err(Aborted)` as soon as the stop flag is seen; the partial
    /// result of the tree is then worthless and must be thrown away.
    pub(crate) fn negamax(
        &mut self,
        board: &Board,
        mut depth: i32,
        mut alpha: i32,
        beta: i32,
    ) -> Result<i32, Aborted> {
        let ply = self.data.ply();
        self.pv.clear(ply);
        self.info.nodes += 1;
        // Stop flag, clock and node budget
        self.check_limits()?;
        self.info.seldepth = self.info.seldepth.max(ply);

        // Fifty-move rule, repetition, dead material
        if ply > 0 && is_draw(board, &self.data, self.shared.game_history) {
            return Ok(DRAW_SCORE);
        }
        // Ply ceiling
        if ply >= MAX_PLY - 1 {
            return Ok(evaluate(board));
        }

        // Check extension
        let in_check = !board.checkers().is_empty();
        if in_check {
            depth += 1;
        }

        // Probe transposition table; never cut at the root
        let hash = board.hash();
        let mut tt_move = None;
        if let Some(entry) = self.shared.tt.probe(hash, ply) {
            tt_move = entry.best_move;
            if ply > 0 && i32::from(entry.depth) >= depth {
                let cutoff = match entry.bound {
                    Bound::Exact => true,
                    Bound::Lower => entry.score >= beta,
                    Bound::Upper => entry.score <= alpha,
                };
                if cutoff {
                    return Ok(entry.score);
                }
            }
        }

        // Leaf node, drop into quiescence search
        if depth <= 0 {
            return self.qsearch(board, alpha, beta);
        }

        let mut moves = MoveList::legal(board);
        // No legal moves: checkmate or stalemate
        if moves.is_empty() {
            return Ok(if in_check { mated_in(ply) } else { DRAW_SCORE });
        }
        score_moves(board, &self.data, &mut moves, tt_move);

        let excluding = ply == 0 && !self.root_exclusions.is_empty();
        let side = board.side_to_move();
        let original_alpha = alpha;
        let mut best_score = -INF;
        let mut best_move = None;
        let mut quiets_tried = MoveList::new();

        while let Some(mv) = moves.pick_move() {
            // Claimed by an earlier multi-PV line
            if ply == 0 && self.root_exclusions.contains(&mv) {
                continue;
            }

            let quiet = is_quiet(board, mv);
            let mut child = board.clone();
            child.play_unchecked(mv);

            self.data.push(hash);
            let result = self.negamax(&child, depth - 1, -beta, -alpha);
            self.data.pop();
            let score = -result?;

            if score > best_score {
                best_score = score;
                best_move = Some(mv);

                if score > alpha {
                    alpha = score;
                    self.pv.update(ply, mv);
                }
                if alpha >= beta {
                    // Reward the cutting quiet move, penalize those tried before it
                    if quiet {
                        self.data.killers.store(ply, mv);
                        self.data.history.reward(side, mv, depth);
                        for tried in quiets_tried.moves() {
                            self.data.history.penalize(side, tried, depth);
                        }
                    }
                    break;
                }
            }

            if quiet {
                quiets_tried.push(mv);
            }
        }

        // Every root move excluded: nothing was searched.
        if best_move.is_none() && excluding {
            return Ok(best_score);
        }

        // Store in the table, unless some root moves were left out
        if !excluding {
            let bound = if best_score >= beta {
                Bound::Lower
            } else if best_score > original_alpha {
                Bound::Exact
            } else {
                Bound::Upper
            };
            let stored_move = if bound == Bound::Upper { tt_move } else { best_move };
            let stored_depth = depth.clamp(0, i32::from(u8::MAX)) as u8;
            self.shared
                .tt
                .store(hash, stored_depth, best_score, stored_move, bound, ply);
        }

        Ok(best_score)
    }

    /// Resolves captures until the position is quiet.
    ///
    /// In check every evasion is searched and there is no stand-pat.
    /// Otherwise only noisy moves are tried, minus those losing more than
    /// [`QSEARCH_SEE_MARGIN`].
    fn qsearch(&mut self, board: &Board, mut alpha: i32, beta: i32) -> Result<i32, Aborted> {
        let ply = self.data.ply();
        self.pv.clear(ply);
        self.info.nodes += 1;
        self.check_limits()?;
        self.info.seldepth = self.info.seldepth.max(ply);

        if ply > 0 && is_draw(board, &self.data, self.shared.game_history) {
            return Ok(DRAW_SCORE);
        }
        if ply >= MAX_PLY - 1 {
            return Ok(evaluate(board));
        }

        let in_check = !board.checkers().is_empty();
        let mut best_score;
        let mut moves;
        if in_check {
            moves = MoveList::legal(board);
            if moves.is_empty() {
                return Ok(mated_in(ply));
            }
            best_score = -INF;
        } else {
            // Stand pat: the side to move may decline every capture
            let stand_pat = evaluate(board);
            if stand_pat >= beta {
                return Ok(stand_pat);
            }
            alpha = alpha.max(stand_pat);
            best_score = stand_pat;
            moves = MoveList::noisy(board);
        }
        score_moves(board, &self.data, &mut moves, None);

        let hash = board.hash();
        while let Some(mv) = moves.pick_move() {
            // Skip clearly losing captures
            if !in_check && !see_ge(board, mv, -QSEARCH_SEE_MARGIN) {
                continue;
            }

            let mut child = board.clone();
            child.play_unchecked(mv);

            self.data.push(hash);
            let result = self.qsearch(&child, -beta, -alpha);
            self.data.pop();
            let score = -result?;

            if score > best_score {
                best_score = score;
                if score > alpha {
                    alpha = score;
                    self.pv.update(ply, mv);
                }
                if alpha >= beta {
                    break;
                }
            }
        }

        Ok(best_score)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64};

    use cozy_chess::Square;

    use super::*;
    use crate::search::limits::SearchLimits;
    use crate::search::thread::SearchShared;
    use crate::search::tt::TranspositionTable;

    fn mv(from: Square, to: Square) -> Move {
        Move {
            from,
            to,
            promotion: None,
        }
    }

    fn board(fen: &str) -> Board {
        Board::from_fen(fen, false).unwrap()
    }

    /// Runs `f` on a single fresh thread searching `root` with its own table.
    fn with_thread<R>(root: &Board, f: impl FnOnce(&mut ThreadData<'_>) -> R) -> R {
        let tt = TranspositionTable::new(8);
        let stop = AtomicBool::new(false);
        let nodes = [AtomicU64::new(0)];
        let shared = SearchShared {
            tt: &tt,
            stop: &stop,
            nodes: &nodes,
            game_history: &[],
        };
        let mut thread = ThreadData::new(0, root.clone(), SearchLimits::new(), &shared);
        f(&mut thread)
    }

    #[test]
    fn pv_update_prepends_child_line() {
        let mut pv = Box::new(PvTable::new());
        pv.clear(2);
        pv.update(2, mv(Square::E7, Square::E5));
        pv.clear(1);
        pv.update(1, mv(Square::G1, Square::F3));
        pv.update(0, mv(Square::E2, Square::E4));
        assert_eq!(
            pv.root_line(),
            &[
                mv(Square::E2, Square::E4),
                mv(Square::G1, Square::F3),
                mv(Square::E7, Square::E5)
            ]
        );
    }

    #[test]
    fn pv_clear_empties_root() {
        let mut pv = Box::new(PvTable::new());
        pv.update(0, mv(Square::E2, Square::E4));
        pv.clear(0);
        assert!(pv.root_line().is_empty());
    }

    #[test]
    fn pv_update_at_last_ply_is_single_move() {
        let mut pv = Box::new(PvTable::new());
        pv.update(MAX_PLY - 1, mv(Square::A2, Square::A3));
        pv.update(MAX_PLY, mv(Square::A2, Square::A3));
    }

    #[test]
    fn aspiration_matches_full_window() {
        let positions = [
            Board::default(),
            board("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3"),
        ];
        for root in &positions {
            let full = with_thread(root, |thread| thread.negamax(root, 3, -INF, INF)).unwrap();
            for seed in [full, 0, 300, -300] {
                let windowed =
                    with_thread(root, |thread| thread.aspiration_search(3, seed)).unwrap();
                assert_eq!(windowed, full, "seed {seed}");
            }
        }
    }

    #[test]
    fn aspiration_keeps_root_line() {
        let root = Board::default();
        with_thread(&root, |thread| {
            let score = thread.aspiration_search(4, 400).unwrap();
            assert!(!is_mate_score(score));
            let line = thread.pv.root_line();
            assert!(!line.is_empty());
            assert!(root.is_legal(line[0]));
        });
    }

    #[test]
    fn excluded_root_moves_are_skipped() {
        let root = board("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4");
        with_thread(&root, |thread| {
            let mate = mv(Square::H5, Square::F7);
            thread.root_exclusions.push(mate);
            let score = thread.negamax(&root, 2, -INF, INF).unwrap();
            assert!(!is_mate_score(score));
            assert_ne!(thread.pv.root_line().first().copied(), Some(mate));
        });
    }

    #[test]
    fn qsearch_wins_hanging_queen() {
        // White to move captures the undefended queen on d5.
        let root = board("4k3/8/8/3q4/8/8/8/3RK3 w - - 0 1");
        let score = with_thread(&root, |thread| thread.qsearch(&root, -INF, INF)).unwrap();
        assert!(score > 300, "score {score}");
    }

    #[test]
    fn qsearch_in_check_without_evasion_is_mate() {
        let root = board("7k/6Q1/5K2/8/8/8/8/8 b - - 0 1");
        let score = with_thread(&root, |thread| thread.qsearch(&root, -INF, INF)).unwrap();
        assert_eq!(score, mated_in(0));
    }

    #[test]
    fn raised_stop_flag_aborts() {
        let root = Board::default();
        let tt = TranspositionTable::new(1);
        let stop = AtomicBool::new(true);
        let nodes = [AtomicU64::new(0)];
        let shared = SearchShared {
            tt: &tt,
            stop: &stop,
            nodes: &nodes,
            game_history: &[],
        };
        let mut thread = ThreadData::new(0, root.clone(), SearchLimits::new(), &shared);
        assert_eq!(thread.negamax(&root, 3, -INF, INF), Err(Aborted));
    }
}
