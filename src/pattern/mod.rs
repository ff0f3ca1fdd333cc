//! Position patterns searched for in replayed games.
//!
//! A pattern is written as text:
//!
//! ```text
//! / white queen and bishop aim at f7
//! Qh5, Bc4, Q(pf7), B(f7),
//! Nc3; nc6       / either knight
//! 1.
//! ```
//!
//! Terms separated by `,` must all hold. A run of terms joined by `;` is an
//! either-or group, closed by the next `,` or the end of the pattern, and
//! holds when any one of its terms does. A line that ends without a
//! separator ends as if with `,`. `/` starts a comment. The line holding
//! `1.` closes the pattern and names the side to move: `1.` for White,
//! `1...` for Black. Keywords ignore case, piece letters do not: upper case
//! is White, lower case Black.
//!
//! | term            | holds when                                          |
//! |-----------------|-----------------------------------------------------|
//! | `Pe4`           | the piece stands on the square                      |
//! | `empty(e4)`     | the square is empty                                 |
//! | `taboo(e4)`     | the defending king is next to the square and may not step on it |
//! | `Q(e4)`         | a white queen reaches e4, which holds no white piece |
//! | `Q(ke8)`        | the black king stands on e8 and a white queen reaches it |
//! | `structw(a2b3)` | white pawns stand on every listed square (not in groups) |
//!
//! The defending king belongs to the side that is not to move. A pattern is
//! only checked right after the defending side has moved.
//!
//! Compiled patterns have a fixed layout of [`PATTERN_LEN`] bytes: the side
//! to move (0 or 0x08), the number of groups, then the list of required terms
//! and [`MAX_GROUPS`] group lists. Each list is a count followed by
//! [`MAX_TERMS`] slots of three bytes: attacker code, target code, square.

pub mod attack;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::board::{Board, Color, Piece, PieceKind, Square};
use crate::record::{piece_code, piece_from_code};

pub use attack::{attacks, is_taboo};

/// Either-or groups per pattern.
pub const MAX_GROUPS: usize = 8;
/// Terms per list.
pub const MAX_TERMS: usize = 32;

const TERM_LEN: usize = 3;
const LIST_LEN: usize = 1 + MAX_TERMS * TERM_LEN;
pub const PATTERN_LEN: usize = 2 + LIST_LEN * (1 + MAX_GROUPS);

const NOTHING: u8 = 0;
const TABOO: u8 = 7;
const BLACK_TO_MOVE: u8 = 0x08;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("no `1.` or `1...` line says which side is to move")]
    MissingSideToMove,

    #[error("cannot read term `{0}`")]
    Malformed(String),

    #[error("`{term}`: '{letter}' is not a piece letter")]
    InvalidPiece { term: String, letter: char },

    #[error("`{term}`: invalid square")]
    InvalidSquare { term: String },

    #[error("pawn structure `{0}` cannot be part of an either-or group")]
    StructureInGroup(String),

    #[error("more than {} terms in one list", MAX_TERMS)]
    TooManyTerms,

    #[error("more than {} either-or groups", MAX_GROUPS)]
    TooManyGroups,

    #[error("`{term}` contradicts an earlier term on {square}")]
    Conflict { term: String, square: Square },

    #[error("compiled pattern is {0} bytes, expected {len}", len = PATTERN_LEN)]
    BadLength(usize),

    #[error("corrupt compiled pattern: {0}")]
    Corrupt(String),
}

/// One condition on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Placement { piece: Piece, square: Square },
    Empty(Square),
    Taboo(Square),
    /// `attacker` reaches a square not held by its own side.
    Controls { attacker: Piece, square: Square },
    /// `target` stands on `square` and `attacker` reaches it.
    Targets {
        attacker: Piece,
        target: Piece,
        square: Square,
    },
}

impl Term {
    pub fn square(&self) -> Square {
        match *self {
            Term::Placement { square, .. }
            | Term::Empty(square)
            | Term::Taboo(square)
            | Term::Controls { square, .. }
            | Term::Targets { square, .. } => square,
        }
    }

    /// Content the term demands of its square, if any.
    fn required(&self) -> Option<Option<Piece>> {
        match *self {
            Term::Placement { piece, .. } => Some(Some(piece)),
            Term::Targets { target, .. } => Some(Some(target)),
            Term::Empty(_) => Some(None),
            Term::Taboo(_) | Term::Controls { .. } => None,
        }
    }

    /// Whether the term holds with `to_move` about to play.
    pub fn holds(&self, board: &Board, to_move: Color) -> bool {
        match *self {
            Term::Placement { piece, square } => board.piece_at(square) == Some(piece),
            Term::Empty(square) => board.is_empty(square),
            Term::Taboo(square) => is_taboo(board, square, to_move.opposite()),
            Term::Controls { attacker, square } => {
                !board
                    .piece_at(square)
                    .is_some_and(|piece| piece.color == attacker.color)
                    && attacks(board, attacker, square)
            }
            Term::Targets {
                attacker,
                target,
                square,
            } => board.piece_at(square) == Some(target) && attacks(board, attacker, square),
        }
    }

    fn to_bytes(self) -> [u8; TERM_LEN] {
        let (attacker, target) = match self {
            Term::Placement { piece, .. } => (NOTHING, piece_code(piece)),
            Term::Empty(_) => (NOTHING, NOTHING),
            Term::Taboo(_) => (NOTHING, TABOO),
            Term::Controls { attacker, .. } => (piece_code(attacker), NOTHING),
            Term::Targets {
                attacker, target, ..
            } => (piece_code(attacker), piece_code(target)),
        };
        [attacker, target, self.square().index()]
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, PatternError> {
        let decode = |code| piece_from_code(code).map_err(|e| PatternError::Corrupt(e.to_string()));
        let square = Square::from_index(bytes[2])
            .ok_or_else(|| PatternError::Corrupt(format!("square index {}", bytes[2])))?;
        let term = match (bytes[0], bytes[1]) {
            (NOTHING, NOTHING) => Term::Empty(square),
            (NOTHING, TABOO) => Term::Taboo(square),
            (NOTHING, target) => Term::Placement {
                piece: decode(target)?,
                square,
            },
            (attacker, NOTHING) => Term::Controls {
                attacker: decode(attacker)?,
                square,
            },
            (attacker, target) => Term::Targets {
                attacker: decode(attacker)?,
                target: decode(target)?,
                square,
            },
        };
        Ok(term)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Term::Placement { piece, square } => write!(f, "{}{}", piece.symbol(), square),
            Term::Empty(square) => write!(f, "empty({})", square),
            Term::Taboo(square) => write!(f, "taboo({})", square),
            Term::Controls { attacker, square } => write!(f, "{}({})", attacker.symbol(), square),
            Term::Targets {
                attacker,
                target,
                square,
            } => write!(f, "{}({}{})", attacker.symbol(), target.symbol(), square),
        }
    }
}

/// A compiled pattern: terms that must all hold plus either-or groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    to_move: Color,
    all: Vec<Term>,
    any: Vec<Vec<Term>>,
}

impl Pattern {
    /// Compile pattern text.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let (merged, to_move) = merge_lines(text)?;

        let mut all = Vec::new();
        let mut any = Vec::new();
        let mut group: Option<Vec<Term>> = None;
        let mut demanded: HashMap<Square, Option<Piece>> = HashMap::new();

        let mut rest = merged.as_str();
        while !rest.is_empty() {
            let end = rest.find(|c: char| c == ',' || c == ';').unwrap_or(rest.len());
            let text = &rest[..end];
            let separator = rest[end..].chars().next();
            rest = rest.get(end + 1..).unwrap_or("");

            if !text.is_empty() {
                let terms = parse_term(text)?;
                if group.is_some() || separator == Some(';') {
                    if is_structure(text) {
                        return Err(PatternError::StructureInGroup(text.to_string()));
                    }
                    let open = group.get_or_insert_with(Vec::new);
                    open.extend(terms);
                    if open.len() > MAX_TERMS {
                        return Err(PatternError::TooManyTerms);
                    }
                } else {
                    for term in terms {
                        if let Some(content) = term.required() {
                            let earlier = demanded.entry(term.square()).or_insert(content);
                            if *earlier != content {
                                return Err(PatternError::Conflict {
                                    term: text.to_string(),
                                    square: term.square(),
                                });
                            }
                        }
                        all.push(term);
                    }
                    if all.len() > MAX_TERMS {
                        return Err(PatternError::TooManyTerms);
                    }
                }
            }

            if separator != Some(';') {
                if let Some(closed) = group.take() {
                    any.push(closed);
                    if any.len() > MAX_GROUPS {
                        return Err(PatternError::TooManyGroups);
                    }
                }
            }
        }

        debug!(
            to_move = %to_move,
            terms = all.len(),
            groups = any.len(),
            "compiled pattern"
        );
        Ok(Pattern { to_move, all, any })
    }

    pub fn to_move(&self) -> Color {
        self.to_move
    }

    /// Terms that must all hold.
    pub fn all(&self) -> &[Term] {
        &self.all
    }

    /// Groups of which one term each must hold.
    pub fn any(&self) -> &[Vec<Term>] {
        &self.any
    }

    /// Check the board left by a move of `last_mover`.
    ///
    /// Only positions with the pattern's side to move qualify, i.e. right
    /// after the other side has moved.
    pub fn matches(&self, board: &Board, last_mover: Color) -> bool {
        if last_mover == self.to_move {
            return false;
        }
        self.all.iter().all(|term| term.holds(board, self.to_move))
            && self
                .any
                .iter()
                .all(|group| group.iter().any(|term| term.holds(board, self.to_move)))
    }

    pub fn to_bytes(&self) -> [u8; PATTERN_LEN] {
        let mut bytes = [0u8; PATTERN_LEN];
        bytes[0] = match self.to_move {
            Color::White => 0,
            Color::Black => BLACK_TO_MOVE,
        };
        bytes[1] = self.any.len() as u8;
        let lists = std::iter::once(&self.all).chain(self.any.iter());
        for (list, out) in lists.zip(bytes[2..].chunks_exact_mut(LIST_LEN)) {
            out[0] = list.len() as u8;
            for (term, slot) in list.iter().zip(out[1..].chunks_exact_mut(TERM_LEN)) {
                slot.copy_from_slice(&term.to_bytes());
            }
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PatternError> {
        if bytes.len() != PATTERN_LEN {
            return Err(PatternError::BadLength(bytes.len()));
        }
        let to_move = match bytes[0] {
            0 => Color::White,
            BLACK_TO_MOVE => Color::Black,
            other => return Err(PatternError::Corrupt(format!("side to move {}", other))),
        };
        let groups = bytes[1] as usize;
        if groups > MAX_GROUPS {
            return Err(PatternError::TooManyGroups);
        }

        let mut lists = bytes[2..].chunks_exact(LIST_LEN).map(read_list);
        let all = match lists.next() {
            Some(list) => list?,
            None => return Err(PatternError::BadLength(bytes.len())),
        };
        let any = lists.take(groups).collect::<Result<Vec<_>, _>>()?;
        Ok(Pattern { to_move, all, any })
    }
}

impl FromStr for Pattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pattern::parse(s)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut parts: Vec<String> = self.all.iter().map(Term::to_string).collect();
        for group in &self.any {
            let terms: Vec<String> = group.iter().map(Term::to_string).collect();
            parts.push(terms.join("; "));
        }
        if !parts.is_empty() {
            writeln!(f, "{}", parts.join(", "))?;
        }
        match self.to_move {
            Color::White => write!(f, "1."),
            Color::Black => write!(f, "1..."),
        }
    }
}

/// Drop comments and blanks, join lines, stop at the side-to-move line.
fn merge_lines(text: &str) -> Result<(String, Color), PatternError> {
    let mut merged = String::new();
    for line in text.lines() {
        let line = line.split_once('/').map_or(line, |(code, _)| code);
        let (line, to_move) = match line.find("1.") {
            Some(at) if line[at..].starts_with("1...") => (&line[..at], Some(Color::Black)),
            Some(at) => (&line[..at], Some(Color::White)),
            None => (line, None),
        };
        let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        merged.push_str(&compact);
        if !compact.is_empty() && !compact.ends_with(|c: char| c == ',' || c == ';') {
            merged.push(',');
        }
        if let Some(color) = to_move {
            return Ok((merged, color));
        }
    }
    Err(PatternError::MissingSideToMove)
}

fn is_structure(text: &str) -> bool {
    text.to_ascii_lowercase().starts_with("struct")
}

fn keyword_argument<'a>(lower: &'a str, keyword: &str) -> Option<&'a str> {
    lower.strip_prefix(keyword)?.strip_prefix('(')?.strip_suffix(')')
}

fn parse_term(text: &str) -> Result<Vec<Term>, PatternError> {
    let malformed = || PatternError::Malformed(text.to_string());
    if !text.is_ascii() {
        return Err(malformed());
    }
    let square = |s: &str| {
        Square::from_algebraic(s).ok_or_else(|| PatternError::InvalidSquare {
            term: text.to_string(),
        })
    };
    let lower = text.to_ascii_lowercase();

    if let Some(inner) = keyword_argument(&lower, "taboo") {
        return Ok(vec![Term::Taboo(square(inner)?)]);
    }
    if let Some(inner) = keyword_argument(&lower, "empty") {
        return Ok(vec![Term::Empty(square(inner)?)]);
    }
    for (keyword, color) in [("structw", Color::White), ("structb", Color::Black)] {
        if let Some(inner) = keyword_argument(&lower, keyword) {
            if inner.is_empty() || inner.len() % 2 != 0 {
                return Err(malformed());
            }
            let pawn = Piece::new(PieceKind::Pawn, color);
            return (0..inner.len())
                .step_by(2)
                .map(|at| {
                    square(&inner[at..at + 2]).map(|square| Term::Placement { piece: pawn, square })
                })
                .collect();
        }
    }

    if let Some((letter, inner)) = text.split_once('(') {
        let inner = inner.strip_suffix(')').ok_or_else(malformed)?;
        let attacker = piece_for_letter(text, letter)?;
        let term = match inner.len() {
            2 => Term::Controls {
                attacker,
                square: square(inner)?,
            },
            3 => Term::Targets {
                attacker,
                target: piece_for_letter(text, &inner[..1])?,
                square: square(&inner[1..])?,
            },
            _ => return Err(malformed()),
        };
        return Ok(vec![term]);
    }

    if text.len() != 3 {
        return Err(malformed());
    }
    Ok(vec![Term::Placement {
        piece: piece_for_letter(text, &text[..1])?,
        square: square(&text[1..])?,
    }])
}

fn piece_for_letter(term: &str, letter: &str) -> Result<Piece, PatternError> {
    let invalid = |letter| PatternError::InvalidPiece {
        term: term.to_string(),
        letter,
    };
    let mut chars = letter.chars();
    let (Some(c), None) = (chars.next(), chars.next()) else {
        return Err(PatternError::Malformed(term.to_string()));
    };
    let color = if c.is_ascii_uppercase() {
        Color::White
    } else {
        Color::Black
    };
    let kind = match c.to_ascii_uppercase() {
        'P' => PieceKind::Pawn,
        upper => PieceKind::from_letter(upper as u8).ok_or_else(|| invalid(c))?,
    };
    Ok(Piece::new(kind, color))
}

fn read_list(bytes: &[u8]) -> Result<Vec<Term>, PatternError> {
    let count = bytes[0] as usize;
    if count > MAX_TERMS {
        return Err(PatternError::TooManyTerms);
    }
    bytes[1..]
        .chunks_exact(TERM_LEN)
        .take(count)
        .map(Term::from_bytes)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movetext::Game;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    const ATTACK_ON_F7: &str = "\
/ white queen and bishop aim at f7
Qh5, Bc4, Q(pf7),
B(f7)
Nc3; nc6   / either knight
1.
";

    /// Plies after which the pattern holds, playing from the start.
    fn matching_plies(pattern: &Pattern, moves: &[&str]) -> Vec<usize> {
        let mut game = Game::begin();
        let mut color = Color::White;
        let mut plies = Vec::new();
        for (index, san) in moves.iter().enumerate() {
            game.process_token(san, color).unwrap();
            if pattern.matches(game.board(), color) {
                plies.push(index + 1);
            }
            color = color.opposite();
        }
        plies
    }

    const SCHOLARS_MATE: [&str; 7] = ["e4", "e5", "Bc4", "Nc6", "Qh5", "Nf6", "Qxf7"];

    #[test]
    fn test_parse_terms_and_groups() {
        let pattern = Pattern::parse(ATTACK_ON_F7).unwrap();
        let white = |kind| Piece::new(kind, Color::White);
        assert_eq!(pattern.to_move(), Color::White);
        assert_eq!(
            pattern.all(),
            &[
                Term::Placement {
                    piece: white(PieceKind::Queen),
                    square: sq("h5")
                },
                Term::Placement {
                    piece: white(PieceKind::Bishop),
                    square: sq("c4")
                },
                Term::Targets {
                    attacker: white(PieceKind::Queen),
                    target: Piece::new(PieceKind::Pawn, Color::Black),
                    square: sq("f7")
                },
                Term::Controls {
                    attacker: white(PieceKind::Bishop),
                    square: sq("f7")
                },
            ]
        );
        assert_eq!(pattern.any().len(), 1);
        assert_eq!(pattern.any()[0][1].to_string(), "nc6");
    }

    #[test]
    fn test_keywords_ignore_case() {
        let pattern = Pattern::parse("EMPTY(e4), Taboo(F7), StructB(a7b6)\n1...").unwrap();
        assert_eq!(pattern.to_move(), Color::Black);
        let text: Vec<String> = pattern.all().iter().map(Term::to_string).collect();
        assert_eq!(text, vec!["empty(e4)", "taboo(f7)", "pa7", "pb6"]);
    }

    #[test]
    fn test_display_parses_back() {
        let pattern = Pattern::parse(ATTACK_ON_F7).unwrap();
        let text = pattern.to_string();
        assert_eq!(text, "Qh5, Bc4, Q(pf7), B(f7), Nc3; nc6\n1.");
        assert_eq!(text.parse::<Pattern>().unwrap(), pattern);
    }

    #[test]
    fn test_pattern_matches_after_defender_moves() {
        let pattern = Pattern::parse(ATTACK_ON_F7).unwrap();
        // holds once 3... Nf6 is played, White to move
        assert_eq!(matching_plies(&pattern, &SCHOLARS_MATE), vec![6]);
    }

    #[test]
    fn test_pattern_without_match() {
        let pattern = Pattern::parse("Qh5, Bc4, empty(f6)\n1.").unwrap();
        assert!(matching_plies(&pattern, &SCHOLARS_MATE).is_empty());

        // holds after 3... Nf6, but with White to move
        let pattern = Pattern::parse("Qh5, Bc4, Q(pf7), nf6\n1...").unwrap();
        assert!(matching_plies(&pattern, &SCHOLARS_MATE).is_empty());
    }

    #[test]
    fn test_either_or_group_needs_one_term() {
        let pattern = Pattern::parse("Ke1, Rd1; Rd2, 1.").unwrap();
        let mut board = Board::with_kings(sq("e1"), sq("e8"));
        assert!(!pattern.matches(&board, Color::Black));
        board
            .place(Piece::new(PieceKind::Rook, Color::White), sq("d2"))
            .unwrap();
        assert!(pattern.matches(&board, Color::Black));
        assert!(!pattern.matches(&board, Color::White));
    }

    #[test]
    fn test_taboo_belongs_to_defending_king() {
        let mut board = Board::with_kings(sq("e1"), sq("e8"));
        board
            .place(Piece::new(PieceKind::Rook, Color::White), sq("d1"))
            .unwrap();
        board
            .place(Piece::new(PieceKind::Pawn, Color::Black), sq("f7"))
            .unwrap();

        let flights_taken = Pattern::parse("taboo(d8), taboo(d7), taboo(f7)\n1.").unwrap();
        assert!(flights_taken.matches(&board, Color::Black));
        let open_flight = Pattern::parse("taboo(d8), taboo(e7)\n1.").unwrap();
        assert!(!open_flight.matches(&board, Color::Black));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Pattern::parse("Ke1, Kg1"), Err(PatternError::MissingSideToMove));
        assert!(matches!(
            Pattern::parse("Pe4, empty(e4)\n1."),
            Err(PatternError::Conflict { .. })
        ));
        assert!(matches!(
            Pattern::parse("structw(a2b3); Pe4\n1."),
            Err(PatternError::StructureInGroup(_))
        ));
        assert!(matches!(
            Pattern::parse("Xe4\n1."),
            Err(PatternError::InvalidPiece { letter: 'X', .. })
        ));
        assert!(matches!(
            Pattern::parse("Pe9\n1."),
            Err(PatternError::InvalidSquare { .. })
        ));
        assert!(matches!(
            Pattern::parse("Q(e4\n1."),
            Err(PatternError::Malformed(_))
        ));

        let groups: Vec<String> = (0..9).map(|_| "Pe4; Pd4".to_string()).collect();
        let text = format!("{}\n1.", groups.join(", "));
        assert_eq!(Pattern::parse(&text), Err(PatternError::TooManyGroups));
    }

    #[test]
    fn test_same_requirement_twice_is_fine() {
        let pattern = Pattern::parse("Pe4, Q(Pe4)\n1...").unwrap();
        assert_eq!(pattern.all().len(), 2);
        // either-or groups are not checked against each other
        assert!(Pattern::parse("Pe4; empty(e4)\n1.").is_ok());
    }

    #[test]
    fn test_compiled_layout() {
        let pattern = Pattern::parse("Kg1, Q(ke8); taboo(f7)\n1...").unwrap();
        let bytes = pattern.to_bytes();
        assert_eq!(bytes.len(), 875);
        assert_eq!(&bytes[0..3], &[0x08, 1, 1]);
        assert_eq!(&bytes[3..6], &[0, 6, 62]);
        assert!(bytes[6..99].iter().all(|b| *b == 0));
        assert_eq!(&bytes[99..106], &[2, 5, 0x0E, 4, 0, 7, 13]);
        assert_eq!(Pattern::from_bytes(&bytes).unwrap(), pattern);
    }

    #[test]
    fn test_compiled_pattern_is_checked() {
        let bytes = Pattern::parse("Kg1\n1.").unwrap().to_bytes();
        assert_eq!(
            Pattern::from_bytes(&bytes[..100]),
            Err(PatternError::BadLength(100))
        );

        let mut bad_color = bytes;
        bad_color[0] = 3;
        assert!(matches!(Pattern::from_bytes(&bad_color), Err(PatternError::Corrupt(_))));

        let mut bad_piece = bytes;
        bad_piece[4] = 0x07;
        bad_piece[3] = 0x02;
        assert!(matches!(Pattern::from_bytes(&bad_piece), Err(PatternError::Corrupt(_))));

        let mut too_many = bytes;
        too_many[2] = 33;
        assert_eq!(Pattern::from_bytes(&too_many), Err(PatternError::TooManyTerms));
    }
}
