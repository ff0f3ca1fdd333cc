use super::piece::{Color, PieceKind};
use super::position::Board;
use super::square::{ray, same_diagonal, same_file, same_rank, step_toward, Square};

const LINE_ATTACKERS: [PieceKind; 2] = [PieceKind::Rook, PieceKind::Queen];
const DIAGONAL_ATTACKERS: [PieceKind; 2] = [PieceKind::Bishop, PieceKind::Queen];

/// Would moving the piece on `mover` to `destination` uncover an attack on
/// the `color` king standing on `king`?
///
/// Only discovered attacks along the king-mover line are considered:
/// - the mover must share a rank, file or diagonal with the king;
/// - a destination on the same rank (file) keeps the line covered, and on a
///   diagonal the destination must stay on the same ray from the king;
/// - walking from the king past the mover, the first piece decides: an enemy
///   rook or queen on a rank or file, an enemy bishop or queen on a diagonal.
///
/// A piece between the king and the mover already shields the king.
pub fn exposes_king(
    board: &Board,
    king: Square,
    mover: Square,
    color: Color,
    destination: Square,
) -> bool {
    if king == mover {
        return false;
    }

    if same_rank(king, mover) {
        if destination.rank() == king.rank() {
            return false;
        }
        return attacked_through(board, king, mover, color, &LINE_ATTACKERS);
    }

    if same_file(king, mover) {
        if destination.file() == king.file() {
            return false;
        }
        return attacked_through(board, king, mover, color, &LINE_ATTACKERS);
    }

    if same_diagonal(king, mover) {
        let stays_on_ray =
            same_diagonal(king, destination) && step_toward(king, destination) == step_toward(king, mover);
        if stays_on_ray {
            return false;
        }
        return attacked_through(board, king, mover, color, &DIAGONAL_ATTACKERS);
    }

    false
}

fn attacked_through(
    board: &Board,
    king: Square,
    mover: Square,
    color: Color,
    attackers: &[PieceKind],
) -> bool {
    let Some(step) = step_toward(king, mover) else {
        return false;
    };
    let mut passed_mover = false;
    for square in ray(king, step) {
        if square == mover {
            passed_mover = true;
            continue;
        }
        if let Some(piece) = board.piece_at(square) {
            if !passed_mover {
                return false;
            }
            return piece.color != color && attackers.contains(&piece.kind);
        }
    }
    false
}
