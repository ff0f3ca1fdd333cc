//! Pattern search over the games of a store.
//!
//! Every stored game is replayed from the starting position and the pattern
//! is checked after each move. The first matching position of a game is
//! reported together with the move that was played from it.

use std::fmt;

use tracing::{debug, info, warn};

use crate::board::{Color, PieceKind};
use crate::pattern::Pattern;
use crate::record::{EncodedMove, GameRecord, GameResult, ReplayError, Replayer};
use crate::store::{GameStore, StoreError};

/// Header conditions a game must meet to be searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchFilter {
    pub min_rating: u16,
    pub max_rating: Option<u16>,
    pub result: Option<GameResult>,
}

impl SearchFilter {
    pub fn accepts(&self, record: &GameRecord) -> bool {
        let rating = record.header.average_rating;
        rating >= self.min_rating
            && self.max_rating.map_or(true, |max| rating <= max)
            && self.result.map_or(true, |result| record.result() == result)
    }
}

/// First position of a game that fits a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub game_index: u32,
    pub average_rating: u16,
    pub result: GameResult,
    pub normal_termination: bool,
    /// Records applied when the pattern held.
    pub ply: usize,
    /// Full move number of the last move played.
    pub move_number: u32,
    pub last_mover: Color,
    /// Move played from the matching position, `None` at the end of the game.
    pub next_move: Option<EncodedMove>,
}

impl fmt::Display for PatternMatch {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dots = match self.last_mover {
            Color::White => ".",
            Color::Black => "...",
        };
        write!(
            f,
            "game {} after {}{} (ply {})  rating {}  result {}",
            self.game_index, self.move_number, dots, self.ply, self.average_rating, self.result
        )?;
        if self.normal_termination {
            write!(f, " normal")?;
        }
        match &self.next_move {
            Some(mv) => write!(f, "  next {}", mv),
            None => write!(f, "  game over"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchSummary {
    /// Games read from the store.
    pub games: u64,
    /// Games that passed the filter and were replayed.
    pub searched: u64,
    pub matched: u64,
    /// Games abandoned because a record did not replay.
    pub failed: u64,
}

/// Rook half of a castling pair: the same side's king leaves its start
/// square two files sideways next.
fn is_castling_rook(mv: &EncodedMove, next: &EncodedMove) -> bool {
    mv.origin_piece.kind == PieceKind::Rook
        && next.origin_piece.kind == PieceKind::King
        && next.origin_piece.color == mv.origin_piece.color
        && next.origin.file() == 4
        && next.origin.rank() == next.destination.rank()
        && next.destination.file().abs_diff(4) == 2
}

/// Replay `record` and return its first position matching `pattern`.
///
/// The position between the rook and king records of a castling move is
/// never checked.
pub fn find_match(pattern: &Pattern, record: &GameRecord) -> Result<Option<PatternMatch>, ReplayError> {
    let mut replayer = Replayer::new(record);
    let mut move_number = 1u32;
    let mut previous = None;

    while let Some(mv) = replayer.step()? {
        let mover = mv.origin_piece.color;
        if previous == Some(Color::Black) && mover == Color::White {
            move_number += 1;
        }
        previous = Some(mover);

        let next = replayer.peek();
        if next.is_some_and(|next| is_castling_rook(mv, next)) {
            continue;
        }
        if pattern.matches(replayer.board(), mover) {
            return Ok(Some(PatternMatch {
                game_index: record.header.game_index,
                average_rating: record.header.average_rating,
                result: record.result(),
                normal_termination: record.header.flags.normal_termination,
                ply: replayer.ply(),
                move_number,
                last_mover: mover,
                next_move: next.copied(),
            }));
        }
    }
    Ok(None)
}

/// Runs one pattern over a whole store.
pub struct PatternSearch<'p> {
    pattern: &'p Pattern,
    filter: SearchFilter,
}

impl<'p> PatternSearch<'p> {
    pub fn new(pattern: &'p Pattern) -> Self {
        PatternSearch {
            pattern,
            filter: SearchFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: SearchFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Search every game of `store`, handing each match to `on_match`.
    ///
    /// A game that does not replay is logged and skipped; a store that
    /// cannot be read ends the search.
    pub fn run<F>(&self, store: &GameStore, mut on_match: F) -> Result<SearchSummary, StoreError>
    where
        F: FnMut(&PatternMatch),
    {
        let mut summary = SearchSummary::default();
        for record in store.records()? {
            let record = record?;
            summary.games += 1;
            if !self.filter.accepts(&record) {
                continue;
            }
            summary.searched += 1;

            match find_match(self.pattern, &record) {
                Ok(Some(found)) => {
                    debug!(game_index = found.game_index, ply = found.ply, "pattern matched");
                    summary.matched += 1;
                    on_match(&found);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(game_index = record.header.game_index, "game skipped: {}", e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            games = summary.games,
            searched = summary.searched,
            matched = summary.matched,
            failed = summary.failed,
            "search finished"
        );
        Ok(summary)
    }
}
