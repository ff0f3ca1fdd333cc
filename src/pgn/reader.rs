use std::io::{self, BufRead};

use tracing::{debug, warn};

use crate::board::Color;
use crate::record::GameResult;

/// One game as found in the PGN stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PgnGame {
    /// 1-based position of the game in the stream.
    pub index: u32,
    pub headers: Vec<(String, String)>,
    /// Movetext lines joined by newlines, comments still in place.
    pub movetext: String,
}

impl PgnGame {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn white_elo(&self) -> Option<u16> {
        self.rating("WhiteElo")
    }

    pub fn black_elo(&self) -> Option<u16> {
        self.rating("BlackElo")
    }

    fn rating(&self, name: &str) -> Option<u16> {
        let value = self.header(name)?.trim();
        if value.is_empty() || value == "?" || value == "-" {
            return None;
        }
        match value.parse() {
            Ok(rating) => Some(rating),
            Err(err) => {
                debug!(game = self.index, header = name, value, error = %err, "ignoring rating");
                None
            }
        }
    }

    /// Mean of both ratings, a missing one counting as 0.
    pub fn average_rating(&self) -> u16 {
        let white = self.white_elo().unwrap_or(0) as u32;
        let black = self.black_elo().unwrap_or(0) as u32;
        ((white + black) / 2) as u16
    }

    pub fn result(&self) -> GameResult {
        self.header("Result")
            .map(GameResult::from_pgn)
            .unwrap_or_default()
    }

    /// A `Termination` tag mentioning "normal".
    pub fn normal_termination(&self) -> bool {
        self.header("Termination")
            .is_some_and(|value| value.to_ascii_lowercase().contains("normal"))
    }

    /// SAN tokens of the main line with their move numbers and movers.
    pub fn tokens(&self) -> Vec<MovetextToken> {
        tokenize_movetext(&strip_movetext(&self.movetext))
    }
}

/// Splits a PGN stream into games.
///
/// A game starts at a line beginning with `[Event `. Tag pair lines become
/// headers, every other non-empty line is movetext. Lines are decoded
/// lossily so a stray Latin-1 name does not end the run.
pub struct PgnReader<R> {
    input: R,
    buffer: Vec<u8>,
    pending: Option<String>,
    games: u32,
    finished: bool,
}

impl<R: BufRead> PgnReader<R> {
    pub fn new(input: R) -> Self {
        PgnReader {
            input,
            buffer: Vec::new(),
            pending: None,
            games: 0,
            finished: false,
        }
    }

    /// Games returned so far.
    pub fn games(&self) -> u32 {
        self.games
    }

    fn next_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        self.buffer.clear();
        if self.input.read_until(b'\n', &mut self.buffer)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.buffer);
        Ok(Some(line.trim_start_matches('\u{feff}').trim().to_string()))
    }

    fn read_game(&mut self) -> io::Result<Option<PgnGame>> {
        let mut game: Option<PgnGame> = None;
        let mut movetext: Vec<String> = Vec::new();

        while let Some(line) = self.next_line()? {
            if line.starts_with("[Event ") && game.is_some() {
                self.pending = Some(line);
                break;
            }
            // empty lines separate sections, `%` lines are escapes
            if line.is_empty() || line.starts_with('%') {
                continue;
            }
            let current = game.get_or_insert_with(PgnGame::default);
            if line.starts_with('[') {
                match parse_header_line(&line) {
                    Some(header) => current.headers.push(header),
                    None => debug!(line = %line, "skipping malformed tag pair"),
                }
            } else {
                movetext.push(line);
            }
        }

        Ok(game.map(|mut game| {
            self.games += 1;
            game.index = self.games;
            game.movetext = movetext.join("\n");
            game
        }))
    }
}

impl<R: BufRead> Iterator for PgnReader<R> {
    type Item = io::Result<PgnGame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_game() {
            Ok(Some(game)) => Some(Ok(game)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// `[Key "value"]` into its parts.
fn parse_header_line(line: &str) -> Option<(String, String)> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let (key, value) = inner.split_once(char::is_whitespace)?;
    let value = value.trim();
    let value = value.strip_prefix('"')?.strip_suffix('"')?;
    Some((key.to_string(), value.replace("\\\"", "\"")))
}

/// Remove `{}` comments, nested `()` variations, `;` comments and `$n` NAGs.
///
/// Removed spans are replaced by a space so tokens on either side stay apart.
pub fn strip_movetext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut brace_depth = 0usize;
    let mut paren_depth = 0usize;
    let mut line_comment = false;
    let mut nag = false;

    for ch in text.chars() {
        if line_comment {
            if ch == '\n' {
                line_comment = false;
                out.push(' ');
            }
            continue;
        }
        if nag {
            if ch.is_ascii_digit() {
                continue;
            }
            nag = false;
            out.push(' ');
        }
        match ch {
            '{' => brace_depth += 1,
            '}' => {
                brace_depth = brace_depth.saturating_sub(1);
                out.push(' ');
            }
            _ if brace_depth > 0 => {}
            '(' => paren_depth += 1,
            ')' => {
                paren_depth = paren_depth.saturating_sub(1);
                out.push(' ');
            }
            _ if paren_depth > 0 => {}
            ';' => line_comment = true,
            '$' => nag = true,
            _ => out.push(ch),
        }
    }
    out
}

/// A SAN move with the move number and side it was played on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovetextToken {
    pub number: u32,
    pub color: Color,
    pub san: String,
}

pub fn is_result_token(token: &str) -> bool {
    matches!(token, "1-0" | "0-1" | "1/2-1/2" | "*")
}

/// Drop check marks, annotation glyphs and anything else trailing a move.
pub fn trim_annotation_suffix(token: &str) -> &str {
    token.trim_end_matches(|c: char| {
        !(c.is_ascii_digit() || matches!(c, 'K' | 'Q' | 'R' | 'B' | 'N' | 'O'))
    })
}

/// Trim a SAN move for parsing. A promotion keeps `=` and its piece letter,
/// upper-cased, so `e8=q+` reads `e8=Q` and a bad letter is still rejected.
pub fn clean_san(san: &str) -> String {
    match san.split_once('=') {
        Some((head, tail)) => {
            let mut cleaned = format!("{}=", head);
            if let Some(letter) = tail.chars().next() {
                cleaned.push(letter.to_ascii_uppercase());
            }
            cleaned
        }
        None => trim_annotation_suffix(san).to_string(),
    }
}

pub fn is_null_move(san: &str) -> bool {
    matches!(san, "--" | "Z0" | "0000" | "@@@@")
}

/// Split `12.`, `12...` or `12.e4` into the number, the dot count and the rest.
fn split_move_number(word: &str) -> Option<(u32, usize, &str)> {
    let digits = word.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let dots = word[digits..].bytes().take_while(|&b| b == b'.').count();
    if dots == 0 {
        return None;
    }
    let number = word[..digits].parse().ok()?;
    Some((number, dots, &word[digits + dots..]))
}

/// Tokens of stripped movetext, up to the result marker.
///
/// `N.` makes the next move White's and `N...` Black's; without a number
/// the colors alternate.
pub fn tokenize_movetext(text: &str) -> Vec<MovetextToken> {
    let mut tokens = Vec::new();
    let mut number = 1u32;
    let mut color = Color::White;

    for word in text.split_whitespace() {
        if is_result_token(word) {
            break;
        }
        let mut san = word;
        if let Some((n, dots, rest)) = split_move_number(word) {
            number = n;
            color = if dots >= 3 { Color::Black } else { Color::White };
            san = rest;
        }
        if is_result_token(san) {
            break;
        }
        if is_null_move(san) {
            warn!(number, color = %color, "null move, passing the turn");
            if color == Color::Black {
                number += 1;
            }
            color = color.opposite();
            continue;
        }
        let san = clean_san(san);
        if san.is_empty() {
            continue;
        }

        tokens.push(MovetextToken { number, color, san });
        if color == Color::Black {
            number += 1;
        }
        color = color.opposite();
    }
    tokens
}
