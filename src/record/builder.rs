use super::{EncodedMove, GameFlags, GameHeader, GameRecord, GameResult, RecordError};

/// Most moves a single game record may hold.
pub const MAX_MOVES: usize = 1000;

/// Accumulates the encoded moves of the game in progress.
#[derive(Debug, Clone)]
pub struct GameRecordBuilder {
    moves: Vec<EncodedMove>,
    limit: usize,
}

impl GameRecordBuilder {
    pub fn new() -> Self {
        GameRecordBuilder::with_limit(MAX_MOVES)
    }

    pub fn with_limit(limit: usize) -> Self {
        GameRecordBuilder {
            moves: Vec::new(),
            limit: limit.min(u16::MAX as usize),
        }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn moves(&self) -> &[EncodedMove] {
        &self.moves
    }

    /// Fails unless `count` more moves fit.
    pub fn ensure_room(&self, count: usize) -> Result<(), RecordError> {
        if self.moves.len() + count > self.limit {
            return Err(RecordError::MoveLimit { limit: self.limit });
        }
        Ok(())
    }

    pub fn push(&mut self, mv: EncodedMove) -> Result<(), RecordError> {
        self.ensure_room(1)?;
        self.moves.push(mv);
        Ok(())
    }

    pub fn finish(
        self,
        average_rating: u16,
        game_index: u32,
        result: GameResult,
        normal_termination: bool,
    ) -> GameRecord {
        GameRecord {
            header: GameHeader {
                flags: GameFlags::new(result, normal_termination),
                // the limit is clamped to u16 on construction
                move_count: self.moves.len() as u16,
                average_rating,
                game_index,
            },
            moves: self.moves,
        }
    }
}

impl Default for GameRecordBuilder {
    fn default() -> Self {
        GameRecordBuilder::new()
    }
}
