use crate::board::{Board, Color, Piece, PieceKind, ResolvedMove};
use crate::record::{EncodedMove, GameRecord, GameRecordBuilder, GameResult};

use super::resolve::resolve_origin;
use super::token::{MoveToken, PieceMove};
use super::MoveError;

/// One game being converted: the virtual board and the moves emitted so far.
///
/// A token that fails leaves both untouched, so the caller may log it and
/// carry on with the next one.
#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    record: GameRecordBuilder,
}

impl Game {
    /// Fresh game from the standard starting position.
    pub fn begin() -> Self {
        Game {
            board: Board::starting_position(),
            record: GameRecordBuilder::new(),
        }
    }

    /// Start with a custom move limit.
    pub fn with_move_limit(limit: usize) -> Self {
        Game {
            board: Board::starting_position(),
            record: GameRecordBuilder::with_limit(limit),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn moves(&self) -> &[EncodedMove] {
        self.record.moves()
    }

    /// Resolve and apply one SAN token played by `color`.
    ///
    /// Returns the records it produced: two for castling (rook first), one
    /// otherwise.
    pub fn process_token(&mut self, token: &str, color: Color) -> Result<Vec<EncodedMove>, MoveError> {
        let emitted = match MoveToken::parse(token)? {
            MoveToken::Castle(side) => {
                self.record.ensure_room(2)?;
                let [rook, king] = self.board.castle(color, side)?;
                vec![EncodedMove::from(rook), EncodedMove::from(king)]
            }
            MoveToken::Move(mv) => {
                self.record.ensure_room(1)?;
                vec![self.play(color, &mv)?]
            }
        };
        for mv in &emitted {
            self.record.push(*mv)?;
        }
        Ok(emitted)
    }

    fn play(&mut self, color: Color, mv: &PieceMove) -> Result<EncodedMove, MoveError> {
        if let Some(kind) = mv.promotion {
            self.board.check_promotion(color, kind)?;
        }

        let origin = resolve_origin(&self.board, color, mv)?;
        let resolved = ResolvedMove::new(Piece::new(mv.kind, color), origin, mv.destination);
        self.board.apply_move(resolved)?;

        match mv.promotion {
            Some(kind) if mv.kind == PieceKind::Pawn => {
                let promoted = self.board.promote(color, mv.destination, kind)?;
                Ok(EncodedMove::promotion(resolved, promoted))
            }
            _ => Ok(EncodedMove::from(resolved)),
        }
    }

    /// Close the game into a record, discarding the board.
    pub fn finalize(
        self,
        average_rating: u16,
        game_index: u32,
        result: GameResult,
        normal_termination: bool,
    ) -> GameRecord {
        self.record
            .finish(average_rating, game_index, result, normal_termination)
    }
}

impl Default for Game {
    fn default() -> Self {
        Game::begin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardError, Square};
    use crate::movetext::ResolveError;
    use crate::record::RecordError;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn play_all(game: &mut Game, tokens: &[&str]) {
        let mut color = Color::White;
        for token in tokens {
            game.process_token(token, color).unwrap();
            color = color.opposite();
        }
    }

    #[test]
    fn test_begin_has_full_registries() {
        let game = Game::begin();
        let board = game.board();
        for color in [Color::White, Color::Black] {
            let registry = board.registry(color);
            assert_eq!(registry.count(PieceKind::Pawn), 8);
            assert_eq!(registry.count(PieceKind::Rook), 2);
            assert_eq!(registry.count(PieceKind::Knight), 2);
            assert_eq!(registry.count(PieceKind::Bishop), 2);
            assert_eq!(registry.count(PieceKind::Queen), 1);
        }
        assert!(board.is_consistent());
        assert!(game.moves().is_empty());
    }

    #[test]
    fn test_first_move() {
        let mut game = Game::begin();
        let emitted = game.process_token("e4", Color::White).unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].origin.index(), 52);
        assert_eq!(emitted[0].destination.index(), 36);
        assert_eq!(emitted[0].to_bytes(), [0x01, 0x01, 52, 36]);
    }

    #[test]
    fn test_castling_emits_rook_then_king() {
        let mut game = Game::begin();
        play_all(&mut game, &["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5"]);
        let emitted = game.process_token("O-O", Color::White).unwrap();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].origin_piece.kind, PieceKind::Rook);
        assert_eq!((emitted[0].origin.index(), emitted[0].destination.index()), (63, 61));
        assert_eq!(emitted[1].origin_piece.kind, PieceKind::King);
        assert_eq!((emitted[1].origin.index(), emitted[1].destination.index()), (60, 62));
        assert_eq!(game.board().king(Color::White), sq("g1"));
        assert_eq!(game.moves().len(), 8);
    }

    #[test]
    fn test_blocked_castling_is_rejected() {
        let mut game = Game::begin();
        let before = game.board().clone();
        let err = game.process_token("O-O-O", Color::Black).unwrap_err();
        assert!(matches!(err, MoveError::Board(BoardError::SquareOccupied { .. })));
        assert_eq!(game.board(), &before);
        assert!(game.moves().is_empty());
    }

    #[test]
    fn test_en_passant() {
        let mut game = Game::begin();
        play_all(&mut game, &["e4", "a6", "e5", "d5", "exd6"]);
        let board = game.board();
        assert!(board.is_empty(sq("d5")));
        assert_eq!(board.registry(Color::Black).count(PieceKind::Pawn), 7);
        assert!(board.is_consistent());
    }

    #[test]
    fn test_promotion_record() {
        let mut game = Game::begin();
        play_all(
            &mut game,
            &["h4", "g5", "hxg5", "Nf6", "g6", "Rg8", "gxh7", "Bg7"],
        );
        let emitted = game.process_token("hxg8=Q", Color::White).unwrap();
        assert_eq!(emitted.len(), 1);
        let mv = emitted[0];
        assert_eq!(mv.to_bytes()[0], 0x01);
        assert_eq!(mv.to_bytes()[1], 0x05);
        assert_eq!(mv.origin, sq("h7"));
        assert_eq!(mv.destination, sq("g8"));
        let board = game.board();
        assert_eq!(board.registry(Color::White).squares(PieceKind::Queen), &[sq("d1"), sq("g8")]);
        assert_eq!(board.registry(Color::White).count(PieceKind::Pawn), 7);
        assert_eq!(board.registry(Color::Black).count(PieceKind::Rook), 1);
        assert!(board.is_consistent());
    }

    #[test]
    fn test_unresolved_move_leaves_game_untouched() {
        let mut game = Game::begin();
        let before = game.board().clone();
        let err = game.process_token("Qa5", Color::White).unwrap_err();
        assert!(matches!(err, MoveError::Unresolved(ResolveError::NoCandidate { .. })));
        assert!(!err.is_fatal());
        assert_eq!(game.board(), &before);
        assert!(game.moves().is_empty());
    }

    #[test]
    fn test_malformed_token() {
        let mut game = Game::begin();
        let err = game.process_token("Z", Color::White).unwrap_err();
        assert!(matches!(err, MoveError::Token(_)));
    }

    #[test]
    fn test_move_limit_is_fatal() {
        let mut game = Game::with_move_limit(2);
        play_all(&mut game, &["Nf3", "Nf6"]);
        let err = game.process_token("Ng1", Color::White).unwrap_err();
        assert!(matches!(err, MoveError::Record(RecordError::MoveLimit { limit: 2 })));
        assert!(err.is_fatal());
        assert_eq!(game.board().piece_at(sq("f3")).map(|p| p.kind), Some(PieceKind::Knight));
    }

    #[test]
    fn test_finalize() {
        let mut game = Game::begin();
        play_all(&mut game, &["d4", "d5"]);
        let record = game.finalize(2200, 5, GameResult::WhiteWins, true);
        assert_eq!(record.header.move_count, 2);
        assert_eq!(record.header.average_rating, 2200);
        assert_eq!(record.header.game_index, 5);
        assert_eq!(record.header.flags.to_byte(), 0x05);
        assert_eq!(record.moves.len(), 2);
    }
}
