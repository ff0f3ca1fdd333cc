use tracing::debug;

use super::piece::{Color, Piece, PieceKind};
use super::registry::PieceRegistry;
use super::square::{squares_between, Square};
use super::{BoardError, CastleSide, ResolvedMove};

/// Back rank order from the a-file to the h-file.
const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

/// Fixed squares of a castling move: (rook from, rook to, king from, king to).
fn castling_squares(color: Color, side: CastleSide) -> (Square, Square, Square, Square) {
    let (rook_from, rook_to, king_from, king_to) = match (color, side) {
        (Color::White, CastleSide::Kingside) => (63, 61, 60, 62),
        (Color::White, CastleSide::Queenside) => (56, 59, 60, 58),
        (Color::Black, CastleSide::Kingside) => (7, 5, 4, 6),
        (Color::Black, CastleSide::Queenside) => (0, 3, 4, 2),
    };
    (
        Square(rook_from),
        Square(rook_to),
        Square(king_from),
        Square(king_to),
    )
}

/// What a move did besides relocating the mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveEffect {
    /// Piece taken on the destination square.
    pub captured: Option<Piece>,
    /// Square of a pawn taken en passant.
    pub en_passant: Option<Square>,
}

/// Grid plus per-color registries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    squares: [Option<Piece>; 64],
    white: PieceRegistry,
    black: PieceRegistry,
}

impl Board {
    /// Standard starting position.
    ///
    /// Registry order is a-file to h-file for every kind, which makes the
    /// queen-side rook, knight and bishop the first candidates of their lists.
    pub fn starting_position() -> Self {
        let mut board = Board::with_kings(Square(60), Square(4));
        for (file, kind) in BACK_RANK.iter().enumerate() {
            let file = file as u8;
            if *kind == PieceKind::King {
                continue;
            }
            board.fill(Piece::new(*kind, Color::Black), Square(file));
            board.fill(Piece::new(*kind, Color::White), Square(56 + file));
        }
        for file in 0..8u8 {
            board.fill(Piece::new(PieceKind::Pawn, Color::Black), Square(8 + file));
            board.fill(Piece::new(PieceKind::Pawn, Color::White), Square(48 + file));
        }
        board
    }

    /// Board holding only the two kings.
    pub fn with_kings(white_king: Square, black_king: Square) -> Self {
        let mut squares = [None; 64];
        squares[white_king.index() as usize] = Some(Piece::new(PieceKind::King, Color::White));
        squares[black_king.index() as usize] = Some(Piece::new(PieceKind::King, Color::Black));
        Board {
            squares,
            white: PieceRegistry::new(Color::White, white_king),
            black: PieceRegistry::new(Color::Black, black_king),
        }
    }

    // Setup only, the starting squares are distinct and the lists have room.
    fn fill(&mut self, piece: Piece, square: Square) {
        let added = self.registry_mut(piece.color).add(piece.kind, square);
        debug_assert!(added.is_ok(), "starting {} on {} overflowed its list", piece, square);
        if added.is_ok() {
            self.squares[square.index() as usize] = Some(piece);
        }
    }

    /// Put a piece on an empty square and register it.
    pub fn place(&mut self, piece: Piece, square: Square) -> Result<(), BoardError> {
        if let Some(found) = self.piece_at(square) {
            return Err(BoardError::SquareOccupied { square, found });
        }
        self.registry_mut(piece.color).add(piece.kind, square)?;
        self.squares[square.index() as usize] = Some(piece);
        Ok(())
    }

    pub fn piece_at(&self, square: Square) -> Option<Piece> {
        self.squares[square.index() as usize]
    }

    pub fn is_empty(&self, square: Square) -> bool {
        self.piece_at(square).is_none()
    }

    pub fn registry(&self, color: Color) -> &PieceRegistry {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    fn registry_mut(&mut self, color: Color) -> &mut PieceRegistry {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }

    pub fn king(&self, color: Color) -> Square {
        self.registry(color).king()
    }

    /// No piece on the squares strictly between two aligned squares.
    pub fn path_is_clear(&self, from: Square, to: Square) -> bool {
        squares_between(from, to)
            .into_iter()
            .all(|square| self.is_empty(square))
    }

    fn expect_piece(&self, piece: Piece, square: Square) -> Result<(), BoardError> {
        let found = self.piece_at(square);
        if found != Some(piece) {
            return Err(BoardError::PieceMismatch {
                square,
                expected: piece,
                found,
            });
        }
        if !self.registry(piece.color).contains(piece.kind, square) {
            return Err(BoardError::NotInRegistry { piece, square });
        }
        Ok(())
    }

    /// Move `piece` from `from` to `to`, capturing whatever stands on `to`.
    ///
    /// Everything is checked before the first write, so an error leaves the
    /// board as it was.
    pub fn apply_relocation(
        &mut self,
        piece: Piece,
        from: Square,
        to: Square,
    ) -> Result<Option<Piece>, BoardError> {
        self.expect_piece(piece, from)?;
        let captured = self.piece_at(to);
        if let Some(target) = captured {
            if target.color == piece.color {
                return Err(BoardError::SquareOccupied {
                    square: to,
                    found: target,
                });
            }
            if target.kind == PieceKind::King {
                return Err(BoardError::CannotRemoveKing {
                    color: target.color,
                    square: to,
                });
            }
            self.expect_piece(target, to)?;
            self.registry_mut(target.color).remove(target.kind, to)?;
        }
        self.registry_mut(piece.color).relocate(piece.kind, from, to)?;
        self.squares[from.index() as usize] = None;
        self.squares[to.index() as usize] = Some(piece);
        Ok(captured)
    }

    /// Apply a resolved move, including an en passant capture.
    ///
    /// A pawn that lands on an empty square by anything other than a straight
    /// one or two square advance captured en passant: the enemy pawn stands
    /// on the mover's side of the destination.
    pub fn apply_move(&mut self, mv: ResolvedMove) -> Result<MoveEffect, BoardError> {
        let mut victim = None;
        if mv.piece.kind == PieceKind::Pawn && self.is_empty(mv.destination) {
            let distance = (mv.destination.index() as i16 - mv.origin.index() as i16).abs();
            if distance != 8 && distance != 16 {
                victim = self.en_passant_victim(mv);
            }
        }

        let captured = self.apply_relocation(mv.piece, mv.origin, mv.destination)?;

        if let Some((pawn, square)) = victim {
            self.registry_mut(pawn.color).remove(pawn.kind, square)?;
            self.squares[square.index() as usize] = None;
        }

        Ok(MoveEffect {
            captured,
            en_passant: victim.map(|(_, square)| square),
        })
    }

    fn en_passant_victim(&self, mv: ResolvedMove) -> Option<(Piece, Square)> {
        let color = mv.piece.color;
        let pawn = Piece::new(PieceKind::Pawn, color.opposite());
        let square = mv.destination.offset(0, -color.forward())?;
        if self.expect_piece(pawn, square).is_ok() {
            Some((pawn, square))
        } else {
            debug!(
                origin = %mv.origin,
                destination = %mv.destination,
                "pawn capture onto an empty square without an en passant victim"
            );
            None
        }
    }

    /// Castle, returning the rook move and the king move in that order.
    pub fn castle(&mut self, color: Color, side: CastleSide) -> Result<[ResolvedMove; 2], BoardError> {
        let (rook_from, rook_to, king_from, king_to) = castling_squares(color, side);
        let rook = Piece::new(PieceKind::Rook, color);
        let king = Piece::new(PieceKind::King, color);

        self.expect_piece(king, king_from)?;
        self.expect_piece(rook, rook_from)?;
        for square in [rook_to, king_to] {
            if let Some(found) = self.piece_at(square) {
                return Err(BoardError::SquareOccupied { square, found });
            }
        }

        self.apply_relocation(rook, rook_from, rook_to)?;
        self.apply_relocation(king, king_from, king_to)?;
        Ok([
            ResolvedMove::new(rook, rook_from, rook_to),
            ResolvedMove::new(king, king_from, king_to),
        ])
    }

    /// Fails when `color` cannot take on another piece of `kind` by promotion.
    pub fn check_promotion(&self, color: Color, kind: PieceKind) -> Result<(), BoardError> {
        let list = match kind {
            PieceKind::Pawn | PieceKind::King => return Err(BoardError::InvalidPromotion(kind)),
            _ => self.registry(color).list(kind),
        };
        match list {
            Some(list) if list.is_full() => Err(BoardError::RegistryFull {
                piece: Piece::new(kind, color),
                capacity: list.capacity(),
            }),
            Some(_) => Ok(()),
            None => Err(BoardError::InvalidPromotion(kind)),
        }
    }

    /// Replace the `color` pawn on `square` by a piece of `kind`.
    pub fn promote(&mut self, color: Color, square: Square, kind: PieceKind) -> Result<Piece, BoardError> {
        self.check_promotion(color, kind)?;
        self.expect_piece(Piece::new(PieceKind::Pawn, color), square)?;

        let registry = self.registry_mut(color);
        registry.remove(PieceKind::Pawn, square)?;
        registry.add(kind, square)?;
        let promoted = Piece::new(kind, color);
        self.squares[square.index() as usize] = Some(promoted);
        Ok(promoted)
    }

    /// Registries list exactly the occupied squares of the grid.
    pub fn is_consistent(&self) -> bool {
        let registered = self.white.iter().chain(self.black.iter());
        let mut count = 0;
        for (piece, square) in registered {
            if self.piece_at(square) != Some(piece) {
                return false;
            }
            count += 1;
        }
        count == self.squares.iter().filter(|s| s.is_some()).count()
    }

    /// Text diagram, White at the bottom, with PGN ranks and files.
    pub fn display_board(&self) -> String {
        let mut result = String::new();
        result.push_str("  a b c d e f g h\n");
        for rank in 0..8u8 {
            let label = 8 - rank;
            result.push_str(&format!("{} ", label));
            for file in 0..8u8 {
                let symbol = match self.squares[(rank * 8 + file) as usize] {
                    Some(piece) => piece.symbol(),
                    None => '.',
                };
                result.push(symbol);
                result.push(' ');
            }
            result.push_str(&format!(" {}\n", label));
        }
        result.push_str("  a b c d e f g h\n");
        result
    }

    /// Piece placement field of a FEN string.
    pub fn fen_placement(&self) -> String {
        let mut fen = String::new();
        for rank in 0..8u8 {
            let mut empty = 0;
            for file in 0..8u8 {
                match self.squares[(rank * 8 + file) as usize] {
                    Some(piece) => {
                        if empty > 0 {
                            fen.push_str(&empty.to_string());
                            empty = 0;
                        }
                        fen.push(piece.symbol());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push_str(&empty.to_string());
            }
            if rank < 7 {
                fen.push('/');
            }
        }
        fen
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::starting_position()
    }
}
