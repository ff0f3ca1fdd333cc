use std::str::FromStr;

use crate::board::square::{pgn_file, pgn_rank};
use crate::board::{CastleSide, PieceKind, Square};

use super::resolve::OriginHint;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token {token:?} has {len} characters after normalization, expected 2-5")]
    BadLength { token: String, len: usize },

    #[error("token {token:?} has an invalid square {square:?}")]
    BadSquare { token: String, square: String },

    #[error("token {token:?} has an invalid origin hint {hint:?}")]
    BadHint { token: String, hint: char },

    #[error("token {token:?} promotes to an unknown piece {letter:?}")]
    BadPromotion { token: String, letter: char },

    #[error("token {token:?} promotes a piece that is not a pawn")]
    PromotionNotPawn { token: String },
}

/// A non-castling move as written in SAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceMove {
    pub kind: PieceKind,
    pub destination: Square,
    pub hint: OriginHint,
    pub capture: bool,
    pub promotion: Option<PieceKind>,
}

/// One normalized SAN move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveToken {
    Castle(CastleSide),
    Move(PieceMove),
}

impl MoveToken {
    /// Parse a SAN token stripped of move numbers and annotation suffixes.
    ///
    /// - `O-O-O` castles queen side, any other token containing `O` castles
    ///   king side (zeros are accepted as well);
    /// - every `x` is dropped and sets the capture flag;
    /// - `=Q`, `=R`, `=B` or `=N` is a promotion;
    /// - a leading `K Q R B N` selects the piece, otherwise it is a pawn;
    /// - what is left is the destination, optionally preceded by a file or
    ///   rank hint or a full origin square.
    pub fn parse(token: &str) -> Result<MoveToken, TokenError> {
        let token = token.trim();
        if token.contains('O') || token.starts_with("0-0") {
            let side = if token.contains("O-O-O") || token.starts_with("0-0-0") {
                CastleSide::Queenside
            } else {
                CastleSide::Kingside
            };
            return Ok(MoveToken::Castle(side));
        }

        let capture = token.contains('x');
        let mut text: String = token.chars().filter(|&c| c != 'x').collect();

        let promotion = match text.find('=') {
            Some(at) => {
                let letter = text[at + 1..].chars().next().unwrap_or('=');
                let kind = promotion_kind(letter).ok_or_else(|| TokenError::BadPromotion {
                    token: token.to_string(),
                    letter,
                })?;
                text.truncate(at);
                Some(kind)
            }
            None => None,
        };

        if !(2..=5).contains(&text.len()) || !text.is_ascii() {
            return Err(TokenError::BadLength {
                token: token.to_string(),
                len: text.chars().count(),
            });
        }

        let bytes = text.as_bytes();
        let (kind, rest) = match PieceKind::from_letter(bytes[0]) {
            Some(kind) => (kind, &bytes[1..]),
            None => (PieceKind::Pawn, bytes),
        };
        if promotion.is_some() && kind != PieceKind::Pawn {
            return Err(TokenError::PromotionNotPawn {
                token: token.to_string(),
            });
        }

        let square = |file: u8, rank: u8| {
            Square::from_chars(file, rank).ok_or_else(|| TokenError::BadSquare {
                token: token.to_string(),
                square: format!("{}{}", file as char, rank as char),
            })
        };

        let (hint, destination) = match rest {
            [file, rank] => (OriginHint::default(), square(*file, *rank)?),
            [hint, file, rank] => (parse_hint(token, *hint)?, square(*file, *rank)?),
            [from_file, from_rank, file, rank, ..] => (
                OriginHint::square(square(*from_file, *from_rank)?),
                square(*file, *rank)?,
            ),
            _ => {
                return Err(TokenError::BadLength {
                    token: token.to_string(),
                    len: text.len(),
                })
            }
        };

        Ok(MoveToken::Move(PieceMove {
            kind,
            destination,
            hint,
            capture,
            promotion,
        }))
    }
}

impl FromStr for MoveToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoveToken::parse(s)
    }
}

fn promotion_kind(letter: char) -> Option<PieceKind> {
    match letter {
        'Q' => Some(PieceKind::Queen),
        'R' => Some(PieceKind::Rook),
        'B' => Some(PieceKind::Bishop),
        'N' => Some(PieceKind::Knight),
        _ => None,
    }
}

fn parse_hint(token: &str, hint: u8) -> Result<OriginHint, TokenError> {
    if hint.is_ascii_alphabetic() {
        pgn_file(hint).map(OriginHint::file)
    } else {
        pgn_rank(hint).map(OriginHint::rank)
    }
    .ok_or_else(|| TokenError::BadHint {
        token: token.to_string(),
        hint: hint as char,
    })
}
