//! Move generation into fixed buffers, banded ordering scores, and a lazy
//! selection-sort picker.
//!
//! Bands, best first:
//!
//! | band                         | score                          |
//! |------------------------------|--------------------------------|
//! | transposition-table move     | [`TT_MOVE_SCORE`]              |
//! | good captures, queen promos  | [`NOISY_SCORE`] + MVV-LVA      |
//! | first and second killer      | [`KILLER_0`], [`KILLER_1`]     |
//! | quiet moves                  | history, within ±`HISTORY_MAX` |
//! | losing captures              | [`BAD_CAPTURE`] + MVV-LVA      |
//! | under-promotions             | [`BAD_PROMOTION`]              |

use cozy_chess::{Board, Move, Piece, Rank};

use super::NULL_MOVE;
use super::data::SearchData;
use super::see::{captured_piece, see};

pub type MoveScore = i32;

pub const TT_MOVE_SCORE: MoveScore = 1_000_000_000;
pub const NOISY_SCORE: MoveScore = 200_000_000;
pub const KILLER_0: MoveScore = 90_000_000;
pub const KILLER_1: MoveScore = 80_000_000;
pub const BAD_CAPTURE: MoveScore = -90_000_000;
pub const BAD_PROMOTION: MoveScore = -200_000_000;

/// Puts queen promotions above every ordinary capture.
const PROMOTION_BONUS: MoveScore = 1_000_000;

/// Capture bonus indexed `[attacker][victim]`: the most valuable victim
/// first, then the least valuable attacker.
const MVV_LVA: [[MoveScore; 6]; 6] = {
    let mut table = [[0; 6]; 6];
    let mut attacker = 0;
    while attacker < 6 {
        let mut victim = 0;
        while victim < 6 {
            table[attacker][victim] = 100_000 * (victim as MoveScore + 1) + (5 - attacker as MoveScore);
            victim += 1;
        }
        attacker += 1;
    }
    table
};

pub const MAX_MOVES: usize = 256;

#[derive(Debug, Clone, Copy)]
struct ScoredMove {
    mv: Move,
    score: MoveScore,
}

/// Fixed-capacity move buffer with per-move ordering scores.
pub struct MoveList {
    entries: [ScoredMove; MAX_MOVES],
    len: usize,
    cursor: usize,
}

impl MoveList {
    pub fn new() -> Self {
        Self {
            entries: [ScoredMove {
                mv: NULL_MOVE,
                score: 0,
            }; MAX_MOVES],
            len: 0,
            cursor: 0,
        }
    }

    /// Every legal move.
    pub fn legal(board: &Board) -> Self {
        let mut list = Self::new();
        board.generate_moves(|moves| {
            for mv in moves {
                list.push(mv);
            }
            false
        });
        list
    }

    /// Captures, en passant and queen promotions.
    pub fn noisy(board: &Board) -> Self {
        let mut list = Self::new();
        let enemies = board.colors(!board.side_to_move());
        let back_ranks = Rank::First.bitboard() | Rank::Eighth.bitboard();

        board.generate_moves(|mut moves| {
            let mut targets = enemies;
            if moves.piece == Piece::Pawn {
                // Off-file pawn moves capture; back-rank pawn moves promote.
                targets |= !moves.from.file().bitboard() | back_ranks;
            }
            moves.to &= targets;
            for mv in moves {
                if matches!(mv.promotion, None | Some(Piece::Queen)) {
                    list.push(mv);
                }
            }
            false
        });
        list
    }

    pub fn push(&mut self, mv: Move) {
        self.entries[self.len] = ScoredMove { mv, score: 0 };
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, mv: Move) -> bool {
        self.moves().any(|m| m == mv)
    }

    /// All moves in their current buffer order, picked or not.
    pub fn moves(&self) -> impl Iterator<Item = Move> + '_ {
        self.entries[..self.len].iter().map(|entry| entry.mv)
    }

    /// Returns the highest-scored move not yet picked.
    ///
    /// Each call is a single selection-sort pass over the unpicked tail, so a
    /// node that cuts off early never pays for sorting the rest.
    pub fn pick_move(&mut self) -> Option<Move> {
        if self.cursor >= self.len {
            return None;
        }
        let mut best = self.cursor;
        for i in self.cursor + 1..self.len {
            if self.entries[i].score > self.entries[best].score {
                best = i;
            }
        }
        self.entries.swap(self.cursor, best);
        self.cursor += 1;
        Some(self.entries[self.cursor - 1].mv)
    }

    #[cfg(test)]
    fn score_of(&self, mv: Move) -> Option<MoveScore> {
        self.entries[..self.len]
            .iter()
            .find(|entry| entry.mv == mv)
            .map(|entry| entry.score)
    }
}

impl Default for MoveList {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `mv` takes an enemy piece, en passant included.
pub fn is_capture(board: &Board, mv: Move) -> bool {
    captured_piece(board, mv).is_some()
}

/// Quiet moves are neither captures nor promotions.
pub fn is_quiet(board: &Board, mv: Move) -> bool {
    mv.promotion.is_none() && !is_capture(board, mv)
}

/// Scores every move in `list` for the node `data` is currently at.
pub fn score_moves(board: &Board, data: &SearchData, list: &mut MoveList, tt_move: Option<Move>) {
    for entry in &mut list.entries[..list.len] {
        entry.score = if Some(entry.mv) == tt_move {
            TT_MOVE_SCORE
        } else {
            score_move(board, data, entry.mv)
        };
    }
}

fn score_move(board: &Board, data: &SearchData, mv: Move) -> MoveScore {
    let victim = captured_piece(board, mv);

    if let Some(promotion) = mv.promotion {
        if promotion != Piece::Queen {
            return BAD_PROMOTION + promotion as MoveScore;
        }
        let capture = victim.map_or(0, |victim| MVV_LVA[Piece::Pawn as usize][victim as usize]);
        return if see(board, mv) >= 0 {
            NOISY_SCORE + PROMOTION_BONUS + capture
        } else {
            BAD_CAPTURE + capture
        };
    }

    if let Some(victim) = victim {
        let attacker = board.piece_on(mv.from).unwrap_or(Piece::Pawn);
        let mvv_lva = MVV_LVA[attacker as usize][victim as usize];
        return if see(board, mv) >= 0 {
            NOISY_SCORE + mvv_lva
        } else {
            BAD_CAPTURE + mvv_lva
        };
    }

    match data.killers.slot(data.ply(), mv) {
        Some(0) => KILLER_0,
        Some(_) => KILLER_1,
        None => data.history.get(board.side_to_move(), mv),
    }
}
