//! PGN to binary game database converter library
//!
//! This library turns PGN movetext into fixed-layout binary game records.
//! SAN leaves out where a piece comes from, so every game is played on a
//! virtual board that finds the origin of each move before it is encoded.
//! Stored games can be replayed and searched for positions matching a
//! [`Pattern`].

pub mod board;
pub mod config;
pub mod movetext;
pub mod pattern;
pub mod pgn;
pub mod record;
pub mod search;
pub mod store;

pub use board::{Board, Color, Piece, PieceKind, Square};
pub use movetext::{Game, MoveError};
pub use pattern::{Pattern, PatternError};
pub use pgn::{ConversionSummary, PgnConverter, PgnReader};
pub use record::{EncodedMove, GameHeader, GameRecord, GameResult};
pub use search::{PatternMatch, PatternSearch, SearchFilter};
pub use store::{GameStore, StoreWriter};
