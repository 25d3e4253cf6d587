//! Material values and piece-square tables.
//!
//! Tables are laid out the way a board diagram reads from White's side:
//! the first row is rank 8, the last row rank 1. [`piece_square`] flips the
//! index for White and uses it directly for Black.

use cozy_chess::{Color, Piece, Square};

/// Middlegame and endgame material, indexed by `Piece as usize`.
pub const MATERIAL: [(i32, i32); 6] = [
    (100, 120),
    (320, 300),
    (330, 320),
    (500, 530),
    (950, 980),
    (0, 0),
];

#[rustfmt::skip]
const PAWN: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
     60,  60,  60,  60,  60,  60,  60,  60,
     15,  15,  25,  35,  35,  25,  15,  15,
      5,   5,  10,  28,  28,  10,   5,   5,
      0,   0,   5,  22,  22,   5,   0,   0,
      5,  -5,  -8,   2,   2,  -8,  -5,   5,
      5,  10,  10, -20, -20,  10,  10,   5,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const PAWN_END: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
    120, 120, 115, 110, 110, 115, 120, 120,
     60,  60,  55,  50,  50,  55,  60,  60,
     30,  30,  25,  20,  20,  25,  30,  30,
     12,  12,  10,   8,   8,  10,  12,  12,
      4,   4,   2,   0,   0,   2,   4,   4,
      0,   0,   0,   0,   0,   0,   0,   0,
      0,   0,   0,   0,   0,   0,   0,   0,
];

#[rustfmt::skip]
const KNIGHT: [i32; 64] = [
    -50, -40, -30, -30, -30, -30, -40, -50,
    -40, -20,   0,   0,   0,   0, -20, -40,
    -30,   0,  10,  15,  15,  10,   0, -30,
    -30,   5,  15,  20,  20,  15,   5, -30,
    -30,   0,  15,  20,  20,  15,   0, -30,
    -30,   5,  10,  15,  15,  10,   5, -30,
    -40, -20,   0,   5,   5,   0, -20, -40,
    -50, -40, -30, -30, -30, -30, -40, -50,
];

#[rustfmt::skip]
const BISHOP: [i32; 64] = [
    -20, -10, -10, -10, -10, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,  10,  10,   5,   0, -10,
    -10,   5,   5,  10,  10,   5,   5, -10,
    -10,   0,  10,  10,  10,  10,   0, -10,
    -10,  10,  10,  10,  10,  10,  10, -10,
    -10,   5,   0,   0,   0,   0,   5, -10,
    -20, -10, -10, -10, -10, -10, -10, -20,
];

#[rustfmt::skip]
const ROOK: [i32; 64] = [
      0,   0,   0,   0,   0,   0,   0,   0,
      5,  10,  10,  10,  10,  10,  10,   5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
     -5,   0,   0,   0,   0,   0,   0,  -5,
      0,   0,   0,   5,   5,   0,   0,   0,
];

#[rustfmt::skip]
const QUEEN: [i32; 64] = [
    -20, -10, -10,  -5,  -5, -10, -10, -20,
    -10,   0,   0,   0,   0,   0,   0, -10,
    -10,   0,   5,   5,   5,   5,   0, -10,
     -5,   0,   5,   5,   5,   5,   0,  -5,
      0,   0,   5,   5,   5,   5,   0,  -5,
    -10,   5,   5,   5,   5,   5,   0, -10,
    -10,   0,   5,   0,   0,   0,   0, -10,
    -20, -10, -10,  -5,  -5, -10, -10, -20,
];

#[rustfmt::skip]
const KING: [i32; 64] = [
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -30, -40, -40, -50, -50, -40, -40, -30,
    -20, -30, -30, -40, -40, -30, -30, -20,
    -10, -20, -20, -20, -20, -20, -20, -10,
     20,  20,   0,   0,   0,   0,  20,  20,
     20,  30,  10,   0,   0,  10,  30,  20,
];

#[rustfmt::skip]
const KING_END: [i32; 64] = [
    -50, -40, -30, -20, -20, -30, -40, -50,
    -30, -20, -10,   0,   0, -10, -20, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  30,  40,  40,  30, -10, -30,
    -30, -10,  20,  30,  30,  20, -10, -30,
    -30, -30,   0,   0,   0,   0, -30, -30,
    -50, -30, -30, -30, -30, -30, -30, -50,
];

/// `(middlegame, endgame)` value of `piece` on `sq`, material included.
pub fn piece_square(piece: Piece, color: Color, sq: Square) -> (i32, i32) {
    let index = match color {
        Color::White => sq as usize ^ 56,
        Color::Black => sq as usize,
    };
    let (mg_table, eg_table) = match piece {
        Piece::Pawn => (&PAWN, &PAWN_END),
        Piece::Knight => (&KNIGHT, &KNIGHT),
        Piece::Bishop => (&BISHOP, &BISHOP),
        Piece::Rook => (&ROOK, &ROOK),
        Piece::Queen => (&QUEEN, &QUEEN),
        Piece::King => (&KING, &KING_END),
    };
    let (mg, eg) = MATERIAL[piece as usize];
    (mg + mg_table[index], eg + eg_table[index])
}
