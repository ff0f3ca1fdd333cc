use std::fmt;
use std::io::{self, BufRead};

use tracing::{debug, error, info, warn};

use crate::board::Color;
use crate::movetext::{Game, MoveError};
use crate::record::{GameRecord, MAX_MOVES};
use crate::store::{StoreError, StoreWriter};

use super::reader::{PgnGame, PgnReader};

/// Destination of finished game records.
pub trait RecordSink {
    fn accept(&mut self, record: &GameRecord) -> Result<(), StoreError>;
}

impl RecordSink for StoreWriter {
    fn accept(&mut self, record: &GameRecord) -> Result<(), StoreError> {
        self.append(record)
    }
}

impl RecordSink for Vec<GameRecord> {
    fn accept(&mut self, record: &GameRecord) -> Result<(), StoreError> {
        self.push(record.clone());
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("failed to read PGN input: {0}")]
    Read(#[source] io::Error),

    #[error("failed to store game {game_index}: {source}")]
    Store {
        game_index: u32,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionSummary {
    /// Games written to the sink.
    pub games: u64,
    /// Move records written.
    pub moves: u64,
    /// Tokens that produced no move.
    pub skipped_moves: u64,
    /// Games abandoned, e.g. for exceeding the move limit.
    pub dropped_games: u64,
}

/// Where a token sits in the input, for log lines.
#[derive(Debug, Clone, Copy)]
pub struct MoveContext<'a> {
    pub game_index: u32,
    pub move_number: u32,
    pub color: Color,
    pub token: &'a str,
    pub previous: Option<&'a str>,
}

impl fmt::Display for MoveContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dots = match self.color {
            Color::White => ".",
            Color::Black => "...",
        };
        write!(
            f,
            "game {} move {}{}{}",
            self.game_index, self.move_number, dots, self.token
        )?;
        if let Some(previous) = self.previous {
            write!(f, " (after {})", previous)?;
        }
        Ok(())
    }
}

/// A converted game and the number of tokens it had to skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedGame {
    pub record: GameRecord,
    pub skipped_moves: u64,
}

/// Drives PGN games through the simulator into a [`RecordSink`].
pub struct PgnConverter {
    max_games: Option<usize>,
    move_limit: usize,
}

impl PgnConverter {
    pub fn new() -> Self {
        PgnConverter {
            max_games: None,
            move_limit: MAX_MOVES,
        }
    }

    /// Stop after this many games have been read.
    pub fn with_max_games(mut self, max: usize) -> Self {
        self.max_games = Some(max);
        self
    }

    pub fn with_move_limit(mut self, limit: usize) -> Self {
        self.move_limit = limit;
        self
    }

    /// Convert every game of `input` and hand the records to `sink`.
    pub fn convert<R: BufRead, S: RecordSink>(
        &self,
        input: R,
        sink: &mut S,
    ) -> Result<ConversionSummary, ConvertError> {
        let mut summary = ConversionSummary::default();
        let mut games = PgnReader::new(input);
        let mut read = 0usize;

        loop {
            if self.max_games.is_some_and(|max| read >= max) {
                break;
            }
            let Some(game) = games.next() else {
                break;
            };
            let game = game.map_err(ConvertError::Read)?;
            read += 1;

            match self.convert_game(&game) {
                Ok(converted) => {
                    sink.accept(&converted.record)
                        .map_err(|source| ConvertError::Store {
                            game_index: game.index,
                            source,
                        })?;
                    summary.games += 1;
                    summary.moves += converted.record.moves.len() as u64;
                    summary.skipped_moves += converted.skipped_moves;

                    if summary.games % 1000 == 0 {
                        info!("Converted {} games...", summary.games);
                    }
                }
                Err(err) => {
                    error!(game = game.index, error = %err, "dropping game");
                    summary.dropped_games += 1;
                }
            }
        }

        info!(
            games = summary.games,
            moves = summary.moves,
            skipped_moves = summary.skipped_moves,
            dropped_games = summary.dropped_games,
            "conversion finished"
        );
        Ok(summary)
    }

    /// Play one game; a token that fails is logged and skipped, only a fatal
    /// error (the move limit) abandons the game.
    pub fn convert_game(&self, pgn: &PgnGame) -> Result<ConvertedGame, MoveError> {
        let mut game = Game::with_move_limit(self.move_limit);
        let mut skipped_moves = 0;
        let mut previous: Option<&str> = None;

        let tokens = pgn.tokens();
        for token in &tokens {
            let context = MoveContext {
                game_index: pgn.index,
                move_number: token.number,
                color: token.color,
                token: &token.san,
                previous,
            };
            match game.process_token(&token.san, token.color) {
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(
                        game = context.game_index,
                        move_number = context.move_number,
                        color = %context.color,
                        token = context.token,
                        previous = context.previous.unwrap_or("-"),
                        error = %err,
                        "skipping move"
                    );
                    debug!("{}\n{}", context, game.board().display_board());
                    skipped_moves += 1;
                }
            }
            previous = Some(&token.san);
        }

        let record = game.finalize(
            pgn.average_rating(),
            pgn.index,
            pgn.result(),
            pgn.normal_termination(),
        );
        Ok(ConvertedGame {
            record,
            skipped_moves,
        })
    }
}

impl Default for PgnConverter {
    fn default() -> Self {
        PgnConverter::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::GameResult;

    const PGN: &str = r#"[Event "One"]
[WhiteElo "2000"]
[BlackElo "2100"]
[Result "0-1"]

1. f3 e5 2. g4 Qh4# 0-1

[Event "Two"]
[Result "*"]

1. e4 Qh5 2. Nf3 *

[Event "Three"]
[Result "1-0"]

1. d4 1-0
"#;

    #[test]
    fn test_convert_into_vec() {
        let mut records: Vec<GameRecord> = Vec::new();
        let summary = PgnConverter::new()
            .convert(PGN.as_bytes(), &mut records)
            .unwrap();

        assert_eq!(summary.games, 3);
        assert_eq!(summary.moves, 4 + 2 + 1);
        assert_eq!(summary.skipped_moves, 1);
        assert_eq!(summary.dropped_games, 0);

        assert_eq!(records[0].header.game_index, 1);
        assert_eq!(records[0].header.average_rating, 2050);
        assert_eq!(records[0].result(), GameResult::BlackWins);
        assert_eq!(records[0].moves[3].to_string(), "qd8-h4");
        assert_eq!(records[1].moves.len(), 2);
        assert_eq!(records[2].header.game_index, 3);
    }

    #[test]
    fn test_max_games() {
        let mut records: Vec<GameRecord> = Vec::new();
        let summary = PgnConverter::new()
            .with_max_games(2)
            .convert(PGN.as_bytes(), &mut records)
            .unwrap();
        assert_eq!(summary.games, 2);
        assert_eq!(records.len(), 2);
    }

    /// Fails every read, standing in for input that must not be touched.
    struct Unreadable;

    impl io::Read for Unreadable {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "read past the last wanted game"))
        }
    }

    #[test]
    fn test_max_games_stops_reading() {
        let head = "[Event \"One\"]\n\n1. e4 e5 *\n\n[Event \"Two\"]\n";
        let input = io::BufReader::new(io::Read::chain(head.as_bytes(), Unreadable));
        let mut records: Vec<GameRecord> = Vec::new();
        let summary = PgnConverter::new()
            .with_max_games(1)
            .convert(input, &mut records)
            .unwrap();
        assert_eq!(summary.games, 1);
        assert_eq!(records[0].moves.len(), 2);
    }

    #[test]
    fn test_game_over_move_limit_is_dropped() {
        let mut records: Vec<GameRecord> = Vec::new();
        let summary = PgnConverter::new()
            .with_move_limit(3)
            .convert(PGN.as_bytes(), &mut records)
            .unwrap();
        assert_eq!(summary.dropped_games, 1);
        assert_eq!(summary.games, 2);
        assert_eq!(records[0].header.game_index, 2);
    }

    #[test]
    fn test_context_display() {
        let context = MoveContext {
            game_index: 4,
            move_number: 12,
            color: Color::Black,
            token: "Nf6",
            previous: Some("Bg5"),
        };
        assert_eq!(context.to_string(), "game 4 move 12...Nf6 (after Bg5)");
    }
}
