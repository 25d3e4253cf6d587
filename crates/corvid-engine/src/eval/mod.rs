//! Static evaluation: tapered material and piece-square terms.

pub mod pst;

use cozy_chess::{Board, Color, Piece};

use pst::piece_square;

/// Phase of a full set of minor and major pieces.
pub const MAX_PHASE: i32 = 24;

/// Bonus for the side to move.
pub const TEMPO: i32 = 10;

const BISHOP_PAIR: (i32, i32) = (30, 50);

/// Remaining non-pawn material, from 0 (pawn ending) to [`MAX_PHASE`].
///
/// Knights and bishops count 1, rooks 2, queens 4. Promotions cannot push
/// the result past the maximum.
pub fn game_phase(board: &Board) -> i32 {
    let count = |piece| board.pieces(piece).len() as i32;
    let phase = count(Piece::Knight)
        + count(Piece::Bishop)
        + 2 * count(Piece::Rook)
        + 4 * count(Piece::Queen);
    phase.min(MAX_PHASE)
}

/// Static score of `board` in centipawns, from the side to move's point of view.
pub fn evaluate(board: &Board) -> i32 {
    let (mut mg, mut eg) = (0, 0);

    for color in Color::ALL {
        let sign = if color == Color::White { 1 } else { -1 };
        for piece in Piece::ALL {
            for sq in board.colored_pieces(color, piece) {
                let (m, e) = piece_square(piece, color, sq);
                mg += sign * m;
                eg += sign * e;
            }
        }
        if board.colored_pieces(color, Piece::Bishop).len() >= 2 {
            mg += sign * BISHOP_PAIR.0;
            eg += sign * BISHOP_PAIR.1;
        }
    }

    let phase = game_phase(board);
    let white = (mg * phase + eg * (MAX_PHASE - phase)) / MAX_PHASE;
    let relative = match board.side_to_move() {
        Color::White => white,
        Color::Black => -white,
    };
    relative + TEMPO
}
