//! Conversion between UCI long algebraic moves and board moves.
//!
//! The board encodes castling as the king capturing its own rook; UCI
//! writes it as a two-square king move. Everything else maps one to one.

use cozy_chess::{Board, File, Move, Piece, Square};

/// Parses `text` as a legal move in `board`, or `None`.
pub fn parse_uci_move(board: &Board, text: &str) -> Option<Move> {
    let mut mv: Move = text.parse().ok()?;

    if board.piece_on(mv.from) == Some(Piece::King) && mv.from.rank() == mv.to.rank() {
        let from_file = mv.from.file() as i32;
        let to_file = mv.to.file() as i32;
        if (to_file - from_file).abs() == 2 {
            let rights = board.castle_rights(board.side_to_move());
            let rook_file = if to_file > from_file {
                rights.short
            } else {
                rights.long
            };
            if let Some(rook_file) = rook_file {
                mv.to = Square::new(rook_file, mv.from.rank());
            }
        }
    }

    board.is_legal(mv).then_some(mv)
}

/// Formats `mv`, played from `board`, in UCI notation.
pub fn format_uci_move(board: &Board, mv: Move) -> String {
    let castles = board.piece_on(mv.from) == Some(Piece::King)
        && board.color_on(mv.to) == Some(board.side_to_move());
    if !castles {
        return mv.to_string();
    }

    let file = if (mv.to.file() as i32) > (mv.from.file() as i32) {
        File::G
    } else {
        File::C
    };
    Move {
        from: mv.from,
        to: Square::new(file, mv.from.rank()),
        promotion: None,
    }
    .to_string()
}

/// Formats a line of moves starting at `board`, space separated.
pub fn format_line(board: &Board, moves: &[Move]) -> String {
    let mut position = board.clone();
    let mut parts = Vec::with_capacity(moves.len());
    for &mv in moves {
        if !position.is_legal(mv) {
            break;
        }
        parts.push(format_uci_move(&position, mv));
        position.play_unchecked(mv);
    }
    parts.join(" ")
}
