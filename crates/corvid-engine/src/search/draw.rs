//! Rule-based draw detection, independent of search depth.

use cozy_chess::{BitBoard, Board, Piece};

use super::data::SearchData;

const LIGHT_SQUARES: BitBoard = BitBoard(0x55AA_55AA_55AA_55AA);

/// Whether the node the search is currently at is a forced draw.
///
/// The root itself is never declared drawn so the search always produces a move.
pub fn is_draw(board: &Board, data: &SearchData, game_history: &[u64]) -> bool {
    if data.ply() == 0 {
        return false;
    }
    is_fifty_move_draw(board)
        || is_insufficient_material(board)
        || is_repetition(board, data.line(), game_history)
}

pub fn is_fifty_move_draw(board: &Board) -> bool {
    board.halfmove_clock() >= 100
}

/// Whether `board` already occurred at least twice before.
///
/// `game_history` holds the positions played before the search root, oldest
/// first. `line` continues it from the root down to the parent of `board`.
/// Only positions with the same side to move and inside the halfmove-clock
/// window can match, so the scan walks back two plies at a time and stops
/// at the last irreversible move.
pub fn is_repetition(board: &Board, line: &[u64], game_history: &[u64]) -> bool {
    let key = board.hash();
    let window = usize::from(board.halfmove_clock());
    let total = game_history.len() + line.len();

    let nth_back = |back: usize| {
        let index = total - back;
        if index >= game_history.len() {
            line[index - game_history.len()]
        } else {
            game_history[index]
        }
    };

    let mut seen = 0;
    let mut back = 2;
    while back <= window && back <= total {
        if nth_back(back) == key {
            seen += 1;
            if seen >= 2 {
                return true;
            }
        }
        back += 2;
    }
    false
}

/// Coarse dead-position check.
///
/// Covers bare kings, a single minor piece against a bare king, and one
/// bishop each on squares of the same colour. Other dead positions such as
/// two knights against a bare king are left to the search.
pub fn is_insufficient_material(board: &Board) -> bool {
    let occupied = board.occupied();
    let minors = board.pieces(Piece::Knight) | board.pieces(Piece::Bishop);

    match occupied.len() {
        2 => true,
        3 => minors.len() == 1,
        4 => {
            let bishops = board.pieces(Piece::Bishop);
            if bishops.len() != 2 || minors.len() != 2 {
                return false;
            }
            let white_bishops = bishops & board.colors(cozy_chess::Color::White);
            let on_light = (bishops & LIGHT_SQUARES).len();
            white_bishops.len() == 1 && (on_light == 0 || on_light == 2)
        }
        _ => false,
    }
}
