use super::piece::{Color, Piece, PieceKind};
use super::square::Square;
use super::BoardError;

pub const QUEEN_CAPACITY: usize = 9;
pub const ROOK_CAPACITY: usize = 10;
pub const BISHOP_CAPACITY: usize = 10;
pub const KNIGHT_CAPACITY: usize = 10;
pub const PAWN_CAPACITY: usize = 10;

/// Ordered squares of the active pieces of one kind.
///
/// Order is append order (starting position first, then promotions). The
/// origin resolvers scan lists front to back and fall back to the first
/// candidate, so removal must keep the relative order of the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceList {
    squares: Vec<Square>,
    capacity: usize,
}

impl PieceList {
    fn with_capacity(capacity: usize) -> Self {
        PieceList {
            squares: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn squares(&self) -> &[Square] {
        &self.squares
    }

    pub fn len(&self) -> usize {
        self.squares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.squares.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.squares.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, square: Square) -> bool {
        self.squares.contains(&square)
    }

    fn position(&self, square: Square) -> Option<usize> {
        self.squares.iter().position(|&s| s == square)
    }
}

/// Active pieces of one color, kept in lock-step with the board grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceRegistry {
    color: Color,
    king: Square,
    queens: PieceList,
    rooks: PieceList,
    bishops: PieceList,
    knights: PieceList,
    pawns: PieceList,
}

impl PieceRegistry {
    /// Registry holding only a king.
    pub fn new(color: Color, king: Square) -> Self {
        PieceRegistry {
            color,
            king,
            queens: PieceList::with_capacity(QUEEN_CAPACITY),
            rooks: PieceList::with_capacity(ROOK_CAPACITY),
            bishops: PieceList::with_capacity(BISHOP_CAPACITY),
            knights: PieceList::with_capacity(KNIGHT_CAPACITY),
            pawns: PieceList::with_capacity(PAWN_CAPACITY),
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn king(&self) -> Square {
        self.king
    }

    /// List for a non-king kind. Kings have a single square, see [`PieceRegistry::king`].
    pub fn list(&self, kind: PieceKind) -> Option<&PieceList> {
        match kind {
            PieceKind::Queen => Some(&self.queens),
            PieceKind::Rook => Some(&self.rooks),
            PieceKind::Bishop => Some(&self.bishops),
            PieceKind::Knight => Some(&self.knights),
            PieceKind::Pawn => Some(&self.pawns),
            PieceKind::King => None,
        }
    }

    fn list_mut(&mut self, kind: PieceKind) -> Option<&mut PieceList> {
        match kind {
            PieceKind::Queen => Some(&mut self.queens),
            PieceKind::Rook => Some(&mut self.rooks),
            PieceKind::Bishop => Some(&mut self.bishops),
            PieceKind::Knight => Some(&mut self.knights),
            PieceKind::Pawn => Some(&mut self.pawns),
            PieceKind::King => None,
        }
    }

    /// Squares of a kind in registry order; the king yields its single square.
    pub fn squares(&self, kind: PieceKind) -> &[Square] {
        match self.list(kind) {
            Some(list) => list.squares(),
            None => std::slice::from_ref(&self.king),
        }
    }

    pub fn count(&self, kind: PieceKind) -> usize {
        self.squares(kind).len()
    }

    pub fn contains(&self, kind: PieceKind, square: Square) -> bool {
        self.squares(kind).contains(&square)
    }

    fn piece(&self, kind: PieceKind) -> Piece {
        Piece::new(kind, self.color)
    }

    /// Append a piece, e.g. the new piece of a promotion.
    pub fn add(&mut self, kind: PieceKind, square: Square) -> Result<(), BoardError> {
        let piece = self.piece(kind);
        let list = self
            .list_mut(kind)
            .ok_or(BoardError::CannotAddKing { color: piece.color })?;
        if list.is_full() {
            return Err(BoardError::RegistryFull {
                piece,
                capacity: list.capacity(),
            });
        }
        list.squares.push(square);
        Ok(())
    }

    /// Delete the entry at `square`, shifting later entries left.
    pub fn remove(&mut self, kind: PieceKind, square: Square) -> Result<(), BoardError> {
        let piece = self.piece(kind);
        let list = self.list_mut(kind).ok_or(BoardError::CannotRemoveKing {
            color: piece.color,
            square,
        })?;
        let index = list
            .position(square)
            .ok_or(BoardError::NotInRegistry { piece, square })?;
        list.squares.remove(index);
        Ok(())
    }

    /// Move the entry at `from` to `to`, keeping its slot.
    pub fn relocate(&mut self, kind: PieceKind, from: Square, to: Square) -> Result<(), BoardError> {
        let piece = self.piece(kind);
        match self.list_mut(kind) {
            Some(list) => {
                let index = list
                    .position(from)
                    .ok_or(BoardError::NotInRegistry { piece, square: from })?;
                list.squares[index] = to;
            }
            None => {
                if self.king != from {
                    return Err(BoardError::NotInRegistry { piece, square: from });
                }
                self.king = to;
            }
        }
        Ok(())
    }

    /// Every registered piece with its square, king first.
    pub fn iter(&self) -> impl Iterator<Item = (Piece, Square)> + '_ {
        const KINDS: [PieceKind; 6] = [
            PieceKind::King,
            PieceKind::Queen,
            PieceKind::Rook,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Pawn,
        ];
        KINDS.into_iter().flat_map(move |kind| {
            self.squares(kind)
                .iter()
                .map(move |&square| (self.piece(kind), square))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut registry = PieceRegistry::new(Color::White, sq("e1"));
        for s in ["a1", "d4", "h1"] {
            registry.add(PieceKind::Rook, sq(s)).unwrap();
        }
        registry.remove(PieceKind::Rook, sq("d4")).unwrap();
        assert_eq!(registry.squares(PieceKind::Rook), &[sq("a1"), sq("h1")]);
    }

    #[test]
    fn test_remove_missing_square_is_an_error() {
        let mut registry = PieceRegistry::new(Color::Black, sq("e8"));
        registry.add(PieceKind::Knight, sq("b8")).unwrap();
        let err = registry.remove(PieceKind::Knight, sq("c6")).unwrap_err();
        assert_eq!(
            err,
            BoardError::NotInRegistry {
                piece: Piece::new(PieceKind::Knight, Color::Black),
                square: sq("c6"),
            }
        );
        assert_eq!(registry.count(PieceKind::Knight), 1);
    }

    #[test]
    fn test_king_cannot_be_removed() {
        let mut registry = PieceRegistry::new(Color::White, sq("e1"));
        assert!(matches!(
            registry.remove(PieceKind::King, sq("e1")),
            Err(BoardError::CannotRemoveKing { .. })
        ));
        registry.relocate(PieceKind::King, sq("e1"), sq("f1")).unwrap();
        assert_eq!(registry.king(), sq("f1"));
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut registry = PieceRegistry::new(Color::White, sq("e1"));
        for index in 0..QUEEN_CAPACITY as u8 {
            registry
                .add(PieceKind::Queen, Square::from_index(index).unwrap())
                .unwrap();
        }
        let err = registry.add(PieceKind::Queen, sq("a1")).unwrap_err();
        assert!(matches!(err, BoardError::RegistryFull { capacity: 9, .. }));
    }

    #[test]
    fn test_relocate_keeps_slot() {
        let mut registry = PieceRegistry::new(Color::White, sq("e1"));
        registry.add(PieceKind::Knight, sq("b1")).unwrap();
        registry.add(PieceKind::Knight, sq("g1")).unwrap();
        registry.relocate(PieceKind::Knight, sq("b1"), sq("c3")).unwrap();
        assert_eq!(registry.squares(PieceKind::Knight), &[sq("c3"), sq("g1")]);
    }
}
