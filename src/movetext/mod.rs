//! SAN move tokens: parsing, origin resolution and the per-game simulator.

pub mod game;
pub mod resolve;
pub mod token;

pub use game::Game;
pub use resolve::{resolve_origin, OriginHint, ResolveError};
pub use token::{MoveToken, PieceMove, TokenError};

use crate::board::BoardError;
use crate::record::RecordError;

/// Why a token produced no move.
#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    #[error("malformed token: {0}")]
    Token(#[from] TokenError),

    #[error("unresolved origin: {0}")]
    Unresolved(#[from] ResolveError),

    #[error("board rejected the move: {0}")]
    Board(#[from] BoardError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl MoveError {
    /// The game cannot continue, as opposed to a single skipped move.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MoveError::Record(_))
    }
}
