use crate::board::{Board, BoardError, ResolvedMove};

use super::{EncodedMove, GameRecord};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    #[error("move {ply} ({description}): {source}")]
    Board {
        ply: usize,
        description: String,
        #[source]
        source: BoardError,
    },

    #[error("move {ply} changes the color of the moving piece")]
    ColorChange { ply: usize },
}

/// Play a stored game on a fresh board.
///
/// Every record is a plain relocation; castling was stored as its rook and
/// king moves. A record whose destination piece differs from its origin
/// piece promotes on arrival.
pub fn replay(record: &GameRecord) -> Result<Board, ReplayError> {
    let mut replayer = Replayer::new(record);
    while replayer.step()?.is_some() {}
    Ok(replayer.into_board())
}

/// Move-by-move replay, for callers that inspect every position.
pub struct Replayer<'a> {
    board: Board,
    moves: &'a [EncodedMove],
    ply: usize,
}

impl<'a> Replayer<'a> {
    pub fn new(record: &'a GameRecord) -> Self {
        Replayer {
            board: Board::starting_position(),
            moves: &record.moves,
            ply: 0,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Records applied so far.
    pub fn ply(&self) -> usize {
        self.ply
    }

    /// The record the next step applies.
    pub fn peek(&self) -> Option<&'a EncodedMove> {
        self.moves.get(self.ply)
    }

    /// Apply the next record; `None` once the game is over.
    pub fn step(&mut self) -> Result<Option<&'a EncodedMove>, ReplayError> {
        let Some(mv) = self.peek() else {
            return Ok(None);
        };
        let ply = self.ply + 1;
        let fail = |source| ReplayError::Board {
            ply,
            description: mv.to_string(),
            source,
        };

        if mv.origin_piece.color != mv.dest_piece.color {
            return Err(ReplayError::ColorChange { ply });
        }
        if mv.is_promotion() {
            self.board
                .check_promotion(mv.dest_piece.color, mv.dest_piece.kind)
                .map_err(fail)?;
        }

        self.board
            .apply_move(ResolvedMove::new(mv.origin_piece, mv.origin, mv.destination))
            .map_err(fail)?;

        if mv.is_promotion() {
            self.board
                .promote(mv.dest_piece.color, mv.destination, mv.dest_piece.kind)
                .map_err(fail)?;
        }
        self.ply = ply;
        Ok(Some(mv))
    }

    pub fn into_board(self) -> Board {
        self.board
    }
}
