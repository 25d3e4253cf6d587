//! Static exchange evaluation.
//!
//! Plays out every capture on the destination square, each side always
//! recapturing with its cheapest attacker, and reports the material balance
//! for the side making the first move.

use cozy_chess::{
    BitBoard, Board, Color, Move, Piece, Square, get_bishop_moves, get_king_moves,
    get_knight_moves, get_pawn_attacks, get_rook_moves,
};

/// Exchange values, indexed by `Piece as usize`.
pub const SEE_VALUE: [i32; 6] = [100, 320, 330, 500, 900, 20_000];

fn value(piece: Piece) -> i32 {
    SEE_VALUE[piece as usize]
}

/// Every piece of either colour attacking `sq` through `occ`.
fn attackers_to(board: &Board, sq: Square, occ: BitBoard) -> BitBoard {
    let queens = board.pieces(Piece::Queen);
    let diagonal = board.pieces(Piece::Bishop) | queens;
    let orthogonal = board.pieces(Piece::Rook) | queens;

    (get_knight_moves(sq) & board.pieces(Piece::Knight))
        | (get_king_moves(sq) & board.pieces(Piece::King))
        | (get_bishop_moves(sq, occ) & diagonal)
        | (get_rook_moves(sq, occ) & orthogonal)
        | (get_pawn_attacks(sq, Color::Black) & board.colored_pieces(Color::White, Piece::Pawn))
        | (get_pawn_attacks(sq, Color::White) & board.colored_pieces(Color::Black, Piece::Pawn))
}

fn cheapest(board: &Board, attackers: BitBoard, side: Color) -> Option<(Square, Piece)> {
    Piece::ALL.into_iter().find_map(|piece| {
        (attackers & board.colored_pieces(side, piece))
            .next_square()
            .map(|sq| (sq, piece))
    })
}

/// Whether `mv` is an en passant capture on `board`.
pub fn is_en_passant(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.from) == Some(Piece::Pawn)
        && mv.from.file() != mv.to.file()
        && board.piece_on(mv.to).is_none()
}

/// The piece `mv` removes from the board, if any. Castling is not a capture.
pub fn captured_piece(board: &Board, mv: Move) -> Option<Piece> {
    if board.colors(!board.side_to_move()).has(mv.to) {
        board.piece_on(mv.to)
    } else if is_en_passant(board, mv) {
        Some(Piece::Pawn)
    } else {
        None
    }
}

/// Net material outcome of `mv` for the side to move, in centipawns.
pub fn see(board: &Board, mv: Move) -> i32 {
    let us = board.side_to_move();
    if board.colors(us).has(mv.to) {
        return 0;
    }
    let Some(mover) = board.piece_on(mv.from) else {
        return 0;
    };

    let target = mv.to;
    let mut occ = board.occupied() ^ mv.from.bitboard();
    let mut gain = [0i32; 32];

    gain[0] = captured_piece(board, mv).map_or(0, value);
    let mut on_target = value(mover);
    if let Some(promotion) = mv.promotion {
        gain[0] += value(promotion) - value(Piece::Pawn);
        on_target = value(promotion);
    }
    if is_en_passant(board, mv) {
        occ ^= Square::new(target.file(), mv.from.rank()).bitboard();
    }

    let diagonal = board.pieces(Piece::Bishop) | board.pieces(Piece::Queen);
    let orthogonal = board.pieces(Piece::Rook) | board.pieces(Piece::Queen);
    let mut attackers = attackers_to(board, target, occ) & occ;
    let mut side = !us;
    let mut depth = 0;

    while let Some((sq, piece)) = cheapest(board, attackers, side) {
        if depth + 1 == gain.len() {
            break;
        }
        depth += 1;
        gain[depth] = on_target - gain[depth - 1];
        on_target = value(piece);

        occ ^= sq.bitboard();
        if matches!(piece, Piece::Pawn | Piece::Bishop | Piece::Queen) {
            attackers |= get_bishop_moves(target, occ) & diagonal;
        }
        if matches!(piece, Piece::Rook | Piece::Queen) {
            attackers |= get_rook_moves(target, occ) & orthogonal;
        }
        attackers &= occ;
        side = !side;
    }

    // Either side may decline to continue the exchange.
    while depth > 0 {
        depth -= 1;
        gain[depth] = -(-gain[depth]).max(gain[depth + 1]);
    }
    gain[0]
}

/// `see(board, mv) >= threshold`.
pub fn see_ge(board: &Board, mv: Move, threshold: i32) -> bool {
    see(board, mv) >= threshold
}
