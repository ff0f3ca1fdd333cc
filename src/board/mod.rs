//! Virtual board kept in lock-step with the move stream.
//!
//! The board is a 64 entry grid plus one [`PieceRegistry`] per color that
//! lists the squares of the active pieces by kind. The grid answers "what
//! is on this square", the registries answer "where are the white rooks",
//! which is the question origin resolution asks for every move.

pub mod check;
pub mod piece;
pub mod position;
pub mod registry;
pub mod square;

pub use check::exposes_king;
pub use piece::{Color, Piece, PieceKind};
pub use position::Board;
pub use registry::{PieceList, PieceRegistry};
pub use square::Square;

/// A move whose origin is known: the decision of an origin resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMove {
    pub piece: Piece,
    pub origin: Square,
    pub destination: Square,
}

impl ResolvedMove {
    pub fn new(piece: Piece, origin: Square, destination: Square) -> Self {
        ResolvedMove {
            piece,
            origin,
            destination,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastleSide {
    Kingside,
    Queenside,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("{piece} is not registered at {square}")]
    NotInRegistry { piece: Piece, square: Square },

    #[error("no room for another {piece} (capacity {capacity})")]
    RegistryFull { piece: Piece, capacity: usize },

    #[error("the {color} king at {square} cannot be removed")]
    CannotRemoveKing { color: Color, square: Square },

    #[error("a second {color} king cannot be added")]
    CannotAddKing { color: Color },

    #[error("expected {expected} at {square}, found {}", describe(.found))]
    PieceMismatch {
        square: Square,
        expected: Piece,
        found: Option<Piece>,
    },

    #[error("{square} is occupied by {found}")]
    SquareOccupied { square: Square, found: Piece },

    #[error("cannot promote to {0}")]
    InvalidPromotion(PieceKind),
}

fn describe(piece: &Option<Piece>) -> String {
    match piece {
        Some(piece) => piece.to_string(),
        None => "an empty square".to_string(),
    }
}
