//! Fixed binary layout of a converted game.
//!
//! A game record is a 12 byte header followed by `move_count` move records
//! of 4 bytes each, little-endian, without padding:
//!
//! ```text
//! header  0..2   magic 0x55AA
//!         2      reserved, 0
//!         3      flags: bit0 white wins, bit1 black wins, bit2 normal termination
//!         4..6   move count
//!         6..8   average rating
//!         8..12  game index (1-based position in the source stream)
//! move    0      origin piece code
//!         1      destination piece code (differs for promotions)
//!         2      origin square
//!         3      destination square
//! ```
//!
//! Piece codes keep the kind in the low 3 bits (pawn 1 .. king 6) and set
//! bit 3 for Black. The packed form exists only here.

pub mod builder;
pub mod replay;

use std::fmt;
use std::io::{self, Read, Write};

use crate::board::{Color, Piece, PieceKind, ResolvedMove, Square};

pub use builder::{GameRecordBuilder, MAX_MOVES};
pub use replay::{replay, ReplayError, Replayer};

pub const MAGIC: u16 = 0x55AA;
pub const HEADER_LEN: usize = 12;
pub const MOVE_LEN: usize = 4;

const FLAG_WHITE_WINS: u8 = 0x01;
const FLAG_BLACK_WINS: u8 = 0x02;
const FLAG_NORMAL_TERMINATION: u8 = 0x04;
const BLACK_BIT: u8 = 0x08;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("bad record magic 0x{0:04X}")]
    BadMagic(u16),

    #[error("invalid piece code 0x{0:02X}")]
    InvalidPieceCode(u8),

    #[error("invalid square index {0}")]
    InvalidSquare(u8),

    #[error("game exceeds the limit of {limit} moves")]
    MoveLimit { limit: usize },

    #[error("record I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// 4-bit wire code of a piece.
pub fn piece_code(piece: Piece) -> u8 {
    let kind = match piece.kind {
        PieceKind::Pawn => 1,
        PieceKind::Knight => 2,
        PieceKind::Bishop => 3,
        PieceKind::Rook => 4,
        PieceKind::Queen => 5,
        PieceKind::King => 6,
    };
    match piece.color {
        Color::White => kind,
        Color::Black => kind | BLACK_BIT,
    }
}

pub fn piece_from_code(code: u8) -> Result<Piece, RecordError> {
    let kind = match code & 0x07 {
        1 => PieceKind::Pawn,
        2 => PieceKind::Knight,
        3 => PieceKind::Bishop,
        4 => PieceKind::Rook,
        5 => PieceKind::Queen,
        6 => PieceKind::King,
        _ => return Err(RecordError::InvalidPieceCode(code)),
    };
    if code & !(0x07 | BLACK_BIT) != 0 {
        return Err(RecordError::InvalidPieceCode(code));
    }
    let color = if code & BLACK_BIT != 0 {
        Color::Black
    } else {
        Color::White
    };
    Ok(Piece::new(kind, color))
}

fn square_from_byte(byte: u8) -> Result<Square, RecordError> {
    Square::from_index(byte).ok_or(RecordError::InvalidSquare(byte))
}

/// One move as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedMove {
    pub origin_piece: Piece,
    pub dest_piece: Piece,
    pub origin: Square,
    pub destination: Square,
}

impl EncodedMove {
    /// Record of a promotion: the pawn leaves, `promoted` arrives.
    pub fn promotion(mv: ResolvedMove, promoted: Piece) -> Self {
        EncodedMove {
            dest_piece: promoted,
            ..EncodedMove::from(mv)
        }
    }

    pub fn is_promotion(&self) -> bool {
        self.origin_piece != self.dest_piece
    }

    pub fn to_bytes(&self) -> [u8; MOVE_LEN] {
        [
            piece_code(self.origin_piece),
            piece_code(self.dest_piece),
            self.origin.index(),
            self.destination.index(),
        ]
    }

    pub fn from_bytes(bytes: [u8; MOVE_LEN]) -> Result<Self, RecordError> {
        Ok(EncodedMove {
            origin_piece: piece_from_code(bytes[0])?,
            dest_piece: piece_from_code(bytes[1])?,
            origin: square_from_byte(bytes[2])?,
            destination: square_from_byte(bytes[3])?,
        })
    }
}

impl From<ResolvedMove> for EncodedMove {
    fn from(mv: ResolvedMove) -> Self {
        EncodedMove {
            origin_piece: mv.piece,
            dest_piece: mv.piece,
            origin: mv.origin,
            destination: mv.destination,
        }
    }
}

impl fmt::Display for EncodedMove {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}-{}",
            self.origin_piece.symbol(),
            self.origin,
            self.destination
        )?;
        if self.is_promotion() {
            write!(f, "={}", self.dest_piece.symbol())?;
        }
        Ok(())
    }
}

/// Outcome of a game as read from the PGN `Result` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GameResult {
    #[default]
    Unknown,
    WhiteWins,
    BlackWins,
    Draw,
}

impl GameResult {
    /// Parse a PGN result string; `*` and anything unrecognised is `Unknown`.
    pub fn from_pgn(text: &str) -> GameResult {
        match text.trim() {
            "1-0" => GameResult::WhiteWins,
            "0-1" => GameResult::BlackWins,
            "1/2-1/2" => GameResult::Draw,
            _ => GameResult::Unknown,
        }
    }

    /// Winner code used by the store index: 0 unknown, 1 white, 2 black, 3 draw.
    pub fn code(self) -> u8 {
        match self {
            GameResult::Unknown => 0,
            GameResult::WhiteWins => 1,
            GameResult::BlackWins => 2,
            GameResult::Draw => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<GameResult> {
        match code {
            0 => Some(GameResult::Unknown),
            1 => Some(GameResult::WhiteWins),
            2 => Some(GameResult::BlackWins),
            3 => Some(GameResult::Draw),
            _ => None,
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            GameResult::Unknown => "*",
            GameResult::WhiteWins => "1-0",
            GameResult::BlackWins => "0-1",
            GameResult::Draw => "1/2-1/2",
        };
        write!(f, "{}", text)
    }
}

/// Header flag byte. A draw sets both win bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameFlags {
    pub white_wins: bool,
    pub black_wins: bool,
    pub normal_termination: bool,
}

impl GameFlags {
    pub fn new(result: GameResult, normal_termination: bool) -> Self {
        let (white_wins, black_wins) = match result {
            GameResult::WhiteWins => (true, false),
            GameResult::BlackWins => (false, true),
            GameResult::Draw => (true, true),
            GameResult::Unknown => (false, false),
        };
        GameFlags {
            white_wins,
            black_wins,
            normal_termination,
        }
    }

    pub fn result(&self) -> GameResult {
        match (self.white_wins, self.black_wins) {
            (true, false) => GameResult::WhiteWins,
            (false, true) => GameResult::BlackWins,
            (true, true) => GameResult::Draw,
            (false, false) => GameResult::Unknown,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.white_wins {
            byte |= FLAG_WHITE_WINS;
        }
        if self.black_wins {
            byte |= FLAG_BLACK_WINS;
        }
        if self.normal_termination {
            byte |= FLAG_NORMAL_TERMINATION;
        }
        byte
    }

    /// Reserved bits are ignored.
    pub fn from_byte(byte: u8) -> Self {
        GameFlags {
            white_wins: byte & FLAG_WHITE_WINS != 0,
            black_wins: byte & FLAG_BLACK_WINS != 0,
            normal_termination: byte & FLAG_NORMAL_TERMINATION != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameHeader {
    pub flags: GameFlags,
    pub move_count: u16,
    pub average_rating: u16,
    pub game_index: u32,
}

impl GameHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..2].copy_from_slice(&MAGIC.to_le_bytes());
        bytes[2] = 0;
        bytes[3] = self.flags.to_byte();
        bytes[4..6].copy_from_slice(&self.move_count.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.average_rating.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.game_index.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: [u8; HEADER_LEN]) -> Result<Self, RecordError> {
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        if magic != MAGIC {
            return Err(RecordError::BadMagic(magic));
        }
        Ok(GameHeader {
            flags: GameFlags::from_byte(bytes[3]),
            move_count: u16::from_le_bytes([bytes[4], bytes[5]]),
            average_rating: u16::from_le_bytes([bytes[6], bytes[7]]),
            game_index: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        })
    }
}

/// Header plus moves of one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    pub header: GameHeader,
    pub moves: Vec<EncodedMove>,
}

impl GameRecord {
    pub fn result(&self) -> GameResult {
        self.header.flags.result()
    }

    /// Bytes this record takes on disk.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.moves.len() * MOVE_LEN
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.header.to_bytes())?;
        for mv in &self.moves {
            writer.write_all(&mv.to_bytes())?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.extend_from_slice(&self.header.to_bytes());
        for mv in &self.moves {
            bytes.extend_from_slice(&mv.to_bytes());
        }
        bytes
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, RecordError> {
        let mut header = [0u8; HEADER_LEN];
        reader.read_exact(&mut header)?;
        let header = GameHeader::from_bytes(header)?;

        let mut moves = Vec::with_capacity(header.move_count as usize);
        for _ in 0..header.move_count {
            let mut bytes = [0u8; MOVE_LEN];
            reader.read_exact(&mut bytes)?;
            moves.push(EncodedMove::from_bytes(bytes)?);
        }
        Ok(GameRecord { header, moves })
    }
}
