use std::fmt;

/// Board square as an absolute index 0-63.
///
/// The layout follows the binary database, not PGN rank order:
/// ```text
/// index 0  = a8 (rank 0, file 0)
/// index 7  = h8
/// index 56 = a1
/// index 63 = h1 (rank 7, file 7)
/// ```
/// `rank = index / 8` counts down from PGN rank 8, `file = index % 8` counts
/// from the a-file. Stored records depend on this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(pub(crate) u8);

impl Square {
    /// Square from an absolute index, `None` when off the board.
    pub fn from_index(index: u8) -> Option<Square> {
        if index < 64 {
            Some(Square(index))
        } else {
            None
        }
    }

    /// Square from internal file (0 = a) and rank (0 = PGN rank 8).
    pub fn new(file: u8, rank: u8) -> Option<Square> {
        if file >= 8 || rank >= 8 {
            return None;
        }
        Some(Square(rank * 8 + file))
    }

    /// Square from PGN file and rank characters, e.g. `(b'e', b'4')`.
    pub fn from_chars(file: u8, rank: u8) -> Option<Square> {
        let file = pgn_file(file)?;
        let rank = pgn_rank(rank)?;
        Square::new(file, rank)
    }

    /// Parse a two character PGN square such as "e4".
    pub fn from_algebraic(notation: &str) -> Option<Square> {
        match notation.as_bytes() {
            [file, rank] => Square::from_chars(*file, *rank),
            _ => None,
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn file(self) -> u8 {
        self.0 % 8
    }

    pub fn rank(self) -> u8 {
        self.0 / 8
    }

    /// Square displaced by whole files and ranks, `None` when it leaves the board.
    pub fn offset(self, files: i8, ranks: i8) -> Option<Square> {
        let file = self.file() as i8 + files;
        let rank = self.rank() as i8 + ranks;
        if !(0..8).contains(&file) || !(0..8).contains(&rank) {
            return None;
        }
        Square::new(file as u8, rank as u8)
    }

    pub fn to_algebraic(self) -> String {
        let file = (b'a' + self.file()) as char;
        let rank = (b'8' - self.rank()) as char;
        format!("{}{}", file, rank)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}

/// Internal file for a PGN file letter.
pub fn pgn_file(c: u8) -> Option<u8> {
    match c {
        b'a'..=b'h' => Some(c - b'a'),
        _ => None,
    }
}

/// Internal rank for a PGN rank digit. PGN rank 8 is internal rank 0.
pub fn pgn_rank(c: u8) -> Option<u8> {
    match c {
        b'1'..=b'8' => Some(b'8' - c),
        _ => None,
    }
}

pub fn same_rank(a: Square, b: Square) -> bool {
    a.rank() == b.rank()
}

pub fn same_file(a: Square, b: Square) -> bool {
    a.file() == b.file()
}

/// Both squares on one diagonal. A square is not diagonal to itself.
pub fn same_diagonal(a: Square, b: Square) -> bool {
    let (df, dr) = deltas(a, b);
    a != b && df.abs() == dr.abs()
}

pub fn is_knight_distance(a: Square, b: Square) -> bool {
    let (df, dr) = deltas(a, b);
    matches!((df.abs(), dr.abs()), (1, 2) | (2, 1))
}

/// Signed (file, rank) displacement from `a` to `b`.
pub fn deltas(a: Square, b: Square) -> (i8, i8) {
    (
        b.file() as i8 - a.file() as i8,
        b.rank() as i8 - a.rank() as i8,
    )
}

/// Unit step from `from` toward `to` when both share a rank, file or diagonal.
pub fn step_toward(from: Square, to: Square) -> Option<(i8, i8)> {
    if from == to {
        return None;
    }
    let (df, dr) = deltas(from, to);
    if df == 0 || dr == 0 || df.abs() == dr.abs() {
        Some((df.signum(), dr.signum()))
    } else {
        None
    }
}

/// Squares strictly between two aligned squares, walking from `from`.
/// Empty when the squares are adjacent or not aligned.
pub fn squares_between(from: Square, to: Square) -> Vec<Square> {
    let mut path = Vec::new();
    let Some((sf, sr)) = step_toward(from, to) else {
        return path;
    };
    let mut current = from;
    while let Some(next) = current.offset(sf, sr) {
        if next == to {
            break;
        }
        path.push(next);
        current = next;
    }
    path
}

/// Walk from `from` in a fixed direction until the board edge.
pub fn ray(from: Square, step: (i8, i8)) -> impl Iterator<Item = Square> {
    let mut current = Some(from);
    std::iter::from_fn(move || {
        let next = current?.offset(step.0, step.1);
        current = next;
        next
    })
}
