//! Disambiguation Tests
//!
//! SAN leaves the origin square out. These tests play positions where more
//! than one piece of the mover's kind could reach the destination and check
//! that hints, blocked paths and pins pick the right one.

use pgntobin::board::{Board, Piece, Square};
use pgntobin::movetext::resolve::{resolve_knight, resolve_rook, OriginHint};
use pgntobin::movetext::ResolveError;
use pgntobin::{Color, Game, PieceKind};

fn sq(s: &str) -> Square {
    Square::from_algebraic(s).unwrap()
}

fn play(game: &mut Game, moves: &[&str]) {
    let mut color = Color::White;
    for san in moves {
        game.process_token(san, color)
            .unwrap_or_else(|e| panic!("{} failed: {}", san, e));
        color = color.opposite();
    }
}

fn play_black(game: &mut Game, san: &str) {
    game.process_token(san, Color::Black)
        .unwrap_or_else(|e| panic!("{} failed: {}", san, e));
}

fn rooks_on_a_file(order: [&str; 2]) -> Board {
    let mut board = Board::with_kings(sq("e1"), sq("e8"));
    for square in order {
        board
            .place(Piece::new(PieceKind::Rook, Color::White), sq(square))
            .unwrap();
    }
    board
        .place(Piece::new(PieceKind::Knight, Color::White), sq("a3"))
        .unwrap();
    board
}

/// Square indices run from a8 to h1
#[test]
fn test_square_transform() {
    assert_eq!(Square::from_chars(b'a', b'8').unwrap().index(), 0);
    assert_eq!(Square::from_chars(b'h', b'1').unwrap().index(), 63);
    assert_eq!(Square::from_chars(b'e', b'2').unwrap().index(), 52);
}

/// The unblocked rook is chosen no matter which one the registry lists first
#[test]
fn test_blocked_rook_is_never_chosen() {
    for order in [["a1", "a7"], ["a7", "a1"]] {
        let board = rooks_on_a_file(order);
        let origin = resolve_rook(&board, Color::White, sq("a5"), OriginHint::default());
        assert_eq!(origin.unwrap(), sq("a7"), "registry order {:?}", order);
    }
}

/// With every candidate blocked the move cannot be resolved
#[test]
fn test_all_rooks_blocked() {
    let mut board = rooks_on_a_file(["a1", "a7"]);
    board
        .place(Piece::new(PieceKind::Pawn, Color::Black), sq("a6"))
        .unwrap();
    let err = resolve_rook(&board, Color::White, sq("a5"), OriginHint::default()).unwrap_err();
    assert!(matches!(err, ResolveError::PathBlocked { .. }));
}

/// A rank hint separates two rooks on the same file
#[test]
fn test_rank_hint() {
    let board = rooks_on_a_file(["a1", "a7"]);
    let origin = resolve_rook(&board, Color::White, sq("a2"), OriginHint::rank(7));
    assert_eq!(origin.unwrap(), sq("a1"));
}

/// The pinned knight on c3 is passed over for the free one
#[test]
fn test_pinned_knight_in_play() {
    let mut game = Game::begin();
    play(&mut game, &["d4", "e6", "Nc3", "Bb4", "e3", "Nf6"]);

    // c3 and g1 both reach e2, but c3 shields the king from b4
    let emitted = game.process_token("Ne2", Color::White).unwrap();
    assert_eq!(emitted[0].origin, sq("g1"));

    play_black(&mut game, "O-O");
    let emitted = game.process_token("Ng3", Color::White).unwrap();
    assert_eq!(emitted[0].origin, sq("e2"));

    play_black(&mut game, "d5");
    // c3 is still pinned, so the g3 knight goes to e4
    let emitted = game.process_token("Ne4", Color::White).unwrap();
    assert_eq!(emitted[0].origin, sq("g3"));
    assert_eq!(
        game.board().piece_at(sq("c3")),
        Some(Piece::new(PieceKind::Knight, Color::White))
    );
}

/// A file hint overrides registry order between two free knights
#[test]
fn test_knight_file_hint_in_play() {
    let mut game = Game::begin();
    play(&mut game, &["Nf3", "Nf6", "Nc3", "Nc6", "Nb5", "Nb4"]);
    let emitted = game.process_token("Nfd4", Color::White).unwrap();
    assert_eq!(emitted[0].origin, sq("f3"));

    let board = game.board();
    let origin = resolve_knight(board, Color::Black, sq("d5"), OriginHint::default()).unwrap();
    // b4 is listed first (it started on b8)
    assert_eq!(origin, sq("b4"));
}

/// A pawn capture comes from the hinted file one rank behind
#[test]
fn test_pawn_captures_with_hints() {
    let mut game = Game::begin();
    play(&mut game, &["e4", "d5", "c4", "dxe4"]);
    let last = *game.moves().last().unwrap();
    assert_eq!(last.origin, sq("d5"));
    assert_eq!(last.destination, sq("e4"));
    assert_eq!(game.board().registry(Color::White).count(PieceKind::Pawn), 7);
    assert!(game.board().is_empty(sq("d5")));
}
