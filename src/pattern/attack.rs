//! Which pieces reach a square on a given board.
//!
//! Sliding pieces see through a friendly partner standing on the same line:
//! a queen through its own bishop on a diagonal or its own rook on a rank or
//! file, and bishops and rooks through their own queen.

use crate::board::square::ray;
use crate::board::{Board, Color, Piece, PieceKind, Square};

const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
const LINES: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

/// Whether a piece like `attacker` reaches `target`.
pub fn attacks(board: &Board, attacker: Piece, target: Square) -> bool {
    let color = attacker.color;
    match attacker.kind {
        PieceKind::King => king_next_to(board, color, target),
        PieceKind::Knight => KNIGHT_JUMPS
            .iter()
            .filter_map(|&(df, dr)| target.offset(df, dr))
            .any(|square| board.piece_at(square) == Some(attacker)),
        PieceKind::Pawn => {
            // the attacking pawn stands one rank behind the target
            let behind = -color.forward();
            [-1, 1]
                .iter()
                .filter_map(|&df| target.offset(df, behind))
                .any(|square| board.piece_at(square) == Some(attacker))
        }
        PieceKind::Bishop => slides(board, attacker, target, &DIAGONALS, PieceKind::Queen),
        PieceKind::Rook => slides(board, attacker, target, &LINES, PieceKind::Queen),
        PieceKind::Queen => {
            slides(board, attacker, target, &DIAGONALS, PieceKind::Bishop)
                || slides(board, attacker, target, &LINES, PieceKind::Rook)
        }
    }
}

/// The `color` king stands on one of the eight squares around `square`.
pub fn king_next_to(board: &Board, color: Color, square: Square) -> bool {
    let king = board.king(color);
    king != square && king.file().abs_diff(square.file()) <= 1 && king.rank().abs_diff(square.rank()) <= 1
}

/// A square the `color` king could step to but may not: it holds one of
/// the king's own pieces or an enemy piece reaches it.
pub fn is_taboo(board: &Board, square: Square, color: Color) -> bool {
    if !king_next_to(board, color, square) {
        return false;
    }
    if board.piece_at(square).is_some_and(|piece| piece.color == color) {
        return true;
    }
    let enemy = color.opposite();
    [
        PieceKind::Queen,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Knight,
        PieceKind::Pawn,
        PieceKind::King,
    ]
    .into_iter()
    .any(|kind| attacks(board, Piece::new(kind, enemy), square))
}

fn slides(
    board: &Board,
    attacker: Piece,
    target: Square,
    directions: &[(i8, i8)],
    partner: PieceKind,
) -> bool {
    let partner = Piece::new(partner, attacker.color);
    directions.iter().any(|&step| {
        for square in ray(target, step) {
            match board.piece_at(square) {
                None => continue,
                Some(piece) if piece == attacker => return true,
                Some(piece) if piece == partner => continue,
                Some(_) => return false,
            }
        }
        false
    })
}
