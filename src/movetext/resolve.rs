//! Origin resolution: which piece of the mover's color makes a SAN move.
//!
//! Every resolver narrows the registry of the moving kind in the same
//! steps: origin hints, movement geometry, path clearance (sliding pieces
//! only) and finally the check-safety filter. Registry order decides when
//! the filters leave more than one candidate.

use tracing::debug;

use crate::board::square::{is_knight_distance, same_diagonal, same_file, same_rank};
use crate::board::{exposes_king, Board, Color, Piece, PieceKind, Square};

use super::token::PieceMove;

/// Origin file and/or rank given in the SAN token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OriginHint {
    pub file: Option<u8>,
    pub rank: Option<u8>,
}

impl OriginHint {
    pub fn file(file: u8) -> Self {
        OriginHint {
            file: Some(file),
            rank: None,
        }
    }

    pub fn rank(rank: u8) -> Self {
        OriginHint {
            file: None,
            rank: Some(rank),
        }
    }

    pub fn square(square: Square) -> Self {
        OriginHint {
            file: Some(square.file()),
            rank: Some(square.rank()),
        }
    }

    /// The origin itself when both file and rank are given.
    pub fn exact(&self) -> Option<Square> {
        Square::new(self.file?, self.rank?)
    }

    pub fn matches(&self, square: Square) -> bool {
        self.file.map_or(true, |file| square.file() == file)
            && self.rank.map_or(true, |rank| square.rank() == rank)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no {piece} can reach {destination}")]
    NoCandidate { piece: Piece, destination: Square },

    #[error("every {piece} that could reach {destination} is blocked")]
    PathBlocked { piece: Piece, destination: Square },
}

/// Origin square of `mv` played by `color`.
pub fn resolve_origin(board: &Board, color: Color, mv: &PieceMove) -> Result<Square, ResolveError> {
    match mv.kind {
        PieceKind::King => Ok(resolve_king(board, color)),
        PieceKind::Queen => resolve_queen(board, color, mv.destination, mv.hint),
        PieceKind::Rook => resolve_rook(board, color, mv.destination, mv.hint),
        PieceKind::Bishop => resolve_bishop(board, color, mv.destination, mv.hint),
        PieceKind::Knight => resolve_knight(board, color, mv.destination, mv.hint),
        PieceKind::Pawn => resolve_pawn(board, color, mv.destination, mv.hint, mv.capture),
    }
}

pub fn resolve_king(board: &Board, color: Color) -> Square {
    board.king(color)
}

pub fn resolve_queen(
    board: &Board,
    color: Color,
    destination: Square,
    hint: OriginHint,
) -> Result<Square, ResolveError> {
    resolve_slider(board, Piece::new(PieceKind::Queen, color), destination, hint, |a, b| {
        same_rank(a, b) || same_file(a, b) || same_diagonal(a, b)
    })
}

pub fn resolve_rook(
    board: &Board,
    color: Color,
    destination: Square,
    hint: OriginHint,
) -> Result<Square, ResolveError> {
    resolve_slider(board, Piece::new(PieceKind::Rook, color), destination, hint, |a, b| {
        same_rank(a, b) || same_file(a, b)
    })
}

pub fn resolve_bishop(
    board: &Board,
    color: Color,
    destination: Square,
    hint: OriginHint,
) -> Result<Square, ResolveError> {
    resolve_slider(
        board,
        Piece::new(PieceKind::Bishop, color),
        destination,
        hint,
        same_diagonal,
    )
}

pub fn resolve_knight(
    board: &Board,
    color: Color,
    destination: Square,
    hint: OriginHint,
) -> Result<Square, ResolveError> {
    let piece = Piece::new(PieceKind::Knight, color);
    let candidates = candidates(board, piece, hint, |square| {
        is_knight_distance(square, destination)
    });
    match candidates.as_slice() {
        [] => Err(ResolveError::NoCandidate { piece, destination }),
        [only] => Ok(*only),
        _ => Ok(first_safe(board, color, &candidates, destination)),
    }
}

/// Pawn origins are found from the destination backwards.
///
/// A push comes from one square behind when a pawn of the mover stands
/// there, otherwise from two squares behind. A capture comes from the
/// hinted file one rank behind; without a hint both diagonals behind are
/// tried, and a destination on the a- or h-file has only one of them.
pub fn resolve_pawn(
    board: &Board,
    color: Color,
    destination: Square,
    hint: OriginHint,
    capture: bool,
) -> Result<Square, ResolveError> {
    let piece = Piece::new(PieceKind::Pawn, color);
    let back = -color.forward();
    let none = ResolveError::NoCandidate { piece, destination };

    if !capture {
        let one = destination.offset(0, back).ok_or_else(|| none.clone())?;
        if board.piece_at(one) == Some(piece) {
            return Ok(one);
        }
        return destination.offset(0, 2 * back).ok_or(none);
    }

    if let Some(origin) = hint.exact() {
        return Ok(origin);
    }
    if let Some(file) = hint.file {
        let files = file as i8 - destination.file() as i8;
        return destination.offset(files, back).ok_or(none);
    }

    match destination.file() {
        0 => return destination.offset(1, back).ok_or(none),
        7 => return destination.offset(-1, back).ok_or(none),
        _ => {}
    }

    // Index order: White tries dest+9 before dest+7, Black dest-9 before dest-7.
    let sides: [i8; 2] = match color {
        Color::White => [1, -1],
        Color::Black => [-1, 1],
    };
    let candidates: Vec<Square> = sides
        .iter()
        .filter_map(|&files| destination.offset(files, back))
        .filter(|&square| board.piece_at(square) == Some(piece))
        .collect();
    match candidates.as_slice() {
        [] => Err(none),
        [only] => Ok(*only),
        _ => Ok(first_safe(board, color, &candidates, destination)),
    }
}

fn resolve_slider(
    board: &Board,
    piece: Piece,
    destination: Square,
    hint: OriginHint,
    aligned: impl Fn(Square, Square) -> bool,
) -> Result<Square, ResolveError> {
    if let Some(origin) = hint.exact() {
        return Ok(origin);
    }

    let candidates = candidates(board, piece, hint, |square| aligned(square, destination));
    match candidates.as_slice() {
        [] => return Err(ResolveError::NoCandidate { piece, destination }),
        [only] => return Ok(*only),
        _ => {}
    }

    let open: Vec<Square> = candidates
        .into_iter()
        .filter(|&square| board.path_is_clear(square, destination))
        .collect();
    match open.as_slice() {
        [] => Err(ResolveError::PathBlocked { piece, destination }),
        [only] => Ok(*only),
        _ => Ok(first_safe(board, piece.color, &open, destination)),
    }
}

/// Registry entries of `piece` matching the hint and the geometric test.
fn candidates(
    board: &Board,
    piece: Piece,
    hint: OriginHint,
    reaches: impl Fn(Square) -> bool,
) -> Vec<Square> {
    board
        .registry(piece.color)
        .squares(piece.kind)
        .iter()
        .copied()
        .filter(|&square| hint.matches(square) && reaches(square))
        .collect()
}

/// First candidate whose move keeps the king covered, else the first one.
fn first_safe(board: &Board, color: Color, candidates: &[Square], destination: Square) -> Square {
    let king = board.king(color);
    let safe = candidates
        .iter()
        .copied()
        .find(|&square| !exposes_king(board, king, square, color, destination));
    match safe {
        Some(square) => square,
        None => {
            debug!(
                candidates = ?candidates,
                destination = %destination,
                "every candidate exposes the king, taking the first"
            );
            candidates[0]
        }
    }
}
