//! Conversion Tests
//!
//! End-to-end checks of the PGN to binary pipeline: PGN text is converted
//! into a store directory, read back, and replayed on a fresh board to make
//! sure the recovered origin squares describe the game that was played.

use std::fs;
use std::path::PathBuf;

use pgntobin::pgn::{PgnConverter, PgnReader};
use pgntobin::record::{replay, GameRecord, GameResult, HEADER_LEN};
use pgntobin::store::{GameStore, DATA_FILE};
use pgntobin::record::EncodedMove;
use pgntobin::{Color, Game, Piece, PieceKind, Square};

/// Morphy vs. Duke of Brunswick and Count Isouard, Paris 1858
const OPERA_GAME: &str = r#"[Event "Paris"]
[Site "Paris FRA"]
[Date "1858.??.??"]
[White "Paul Morphy"]
[Black "Duke Karl / Count Isouard"]
[Result "1-0"]

1. e4 e5 2. Nf3 d6 3. d4 Bg4 4. dxe5 Bxf3 5. Qxf3 dxe5 6. Bc4 Nf6 7. Qb3 Qe7
8. Nc3 c6 9. Bg5 b5 10. Nxb5 cxb5 11. Bxb5+ Nbd7 12. O-O-O Rd8 13. Rxd7 Rxd7
14. Rd1 Qe6 15. Bxd7+ Nxd7 16. Qb8+ Nxb8 17. Rd8# 1-0
"#;

const OPERA_FINAL: &str = "1n1Rkb1r/p4ppp/4q3/4p1B1/4P3/8/PPP2PPP/2K5";

const SPECIAL_MOVES: &str = r#"[Event "En passant"]
[WhiteElo "1500"]
[BlackElo "1700"]
[Result "*"]

1. e4 Nf6 2. e5 d5 3. exd6 {en passant} *

[Event "Promotion"]
[WhiteElo "2000"]
[BlackElo "2000"]
[Result "0-1"]
[Termination "Normal"]

1. h4 g5 2. hxg5 Nf6 3. g6 Rg8 4. gxh7 Bg7 5. hxg8=Q+ Bf8 0-1
"#;

fn temp_store(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "pgntobin-it-{}-{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn convert_to_vec(pgn: &str) -> Vec<GameRecord> {
    let mut records = Vec::new();
    PgnConverter::new()
        .convert(pgn.as_bytes(), &mut records)
        .expect("conversion into memory cannot fail");
    records
}

/// The full game resolves every move and replays to the known final position
#[test]
fn test_opera_game_replays_to_final_position() {
    let records = convert_to_vec(OPERA_GAME);
    assert_eq!(records.len(), 1);
    let record = &records[0];

    // 33 plies, castling stores two records
    assert_eq!(record.moves.len(), 34);
    assert_eq!(record.header.move_count, 34);
    assert_eq!(record.result(), GameResult::WhiteWins);
    assert_eq!(record.header.average_rating, 0);
    assert_eq!(record.header.game_index, 1);

    let board = replay(record).expect("stored game replays");
    assert_eq!(board.fen_placement(), OPERA_FINAL);
    assert!(board.is_consistent());
}

/// Converting move by move gives the same board as replaying the stored record
#[test]
fn test_simulator_and_replay_agree() {
    let pgn = PgnReader::new(OPERA_GAME.as_bytes())
        .next()
        .unwrap()
        .unwrap();
    let mut game = Game::begin();
    for token in pgn.tokens() {
        game.process_token(&token.san, token.color)
            .unwrap_or_else(|e| panic!("{} failed: {}", token.san, e));
    }
    let live = game.board().clone();
    let record = game.finalize(0, 1, GameResult::WhiteWins, false);
    assert_eq!(replay(&record).unwrap(), live);
}

/// Castling writes the rook move first, then the king move
#[test]
fn test_opera_game_castling_records() {
    let records = convert_to_vec(OPERA_GAME);
    let moves = &records[0].moves;
    // 11 full moves played before 12. O-O-O
    let rook = moves[22];
    let king = moves[23];
    assert_eq!(rook.origin_piece.kind, PieceKind::Rook);
    assert_eq!((rook.origin.index(), rook.destination.index()), (56, 59));
    assert_eq!(king.origin_piece.kind, PieceKind::King);
    assert_eq!((king.origin.index(), king.destination.index()), (60, 58));
}

fn sq(s: &str) -> Square {
    Square::from_algebraic(s).unwrap()
}

/// Play `moves` from the start, keeping what the last token emitted.
fn play_to_castle(moves: &[&str]) -> (Game, Vec<EncodedMove>) {
    let mut game = Game::begin();
    let mut color = Color::White;
    let mut emitted = Vec::new();
    for san in moves {
        emitted = game
            .process_token(san, color)
            .unwrap_or_else(|e| panic!("{} failed: {}", san, e));
        color = color.opposite();
    }
    (game, emitted)
}

fn squares_of(mv: &EncodedMove) -> (u8, u8) {
    (mv.origin.index(), mv.destination.index())
}

/// Both sides castle short: rook record first, then the king
#[test]
fn test_kingside_castling_both_colors() {
    let white_moves = ["e4", "e5", "Nf3", "Nf6", "Bc4", "Bc5", "O-O"];
    let (game, emitted) = play_to_castle(&white_moves);
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].origin_piece.kind, PieceKind::Rook);
    assert_eq!(squares_of(&emitted[0]), (63, 61));
    assert_eq!(emitted[1].origin_piece.kind, PieceKind::King);
    assert_eq!(squares_of(&emitted[1]), (60, 62));
    let white = game.board().registry(Color::White);
    assert_eq!(white.squares(PieceKind::Rook), &[sq("a1"), sq("f1")]);
    assert_eq!(game.board().king(Color::White), sq("g1"));

    let mut all_moves = white_moves.to_vec();
    all_moves.push("O-O");
    let (game, emitted) = play_to_castle(&all_moves);
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].origin_piece, Piece::new(PieceKind::Rook, Color::Black));
    assert_eq!(squares_of(&emitted[0]), (7, 5));
    assert_eq!(emitted[1].origin_piece, Piece::new(PieceKind::King, Color::Black));
    assert_eq!(squares_of(&emitted[1]), (4, 6));
    let black = game.board().registry(Color::Black);
    assert_eq!(black.squares(PieceKind::Rook), &[sq("a8"), sq("f8")]);
    assert_eq!(game.board().king(Color::Black), sq("g8"));
    assert!(game.board().is_consistent());

    // 7 plies before White castles, 8 before Black does
    let moves = game.moves();
    assert_eq!(moves.len(), 10);
    assert_eq!(squares_of(&moves[6]), (63, 61));
    assert_eq!(squares_of(&moves[7]), (60, 62));
    assert_eq!(squares_of(&moves[8]), (7, 5));
    assert_eq!(squares_of(&moves[9]), (4, 6));
}

/// Black castles long after White does
#[test]
fn test_queenside_castling_black() {
    let (game, emitted) = play_to_castle(&[
        "d4", "d5", "Nc3", "Nc6", "Bf4", "Bf5", "Qd2", "Qd7", "O-O-O", "O-O-O",
    ]);
    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].origin_piece.kind, PieceKind::Rook);
    assert_eq!(emitted[0].origin_piece.color, Color::Black);
    assert_eq!(squares_of(&emitted[0]), (0, 3));
    assert_eq!(emitted[1].origin_piece.kind, PieceKind::King);
    assert_eq!(squares_of(&emitted[1]), (4, 2));

    let board = game.board().clone();
    assert_eq!(board.registry(Color::Black).squares(PieceKind::Rook), &[sq("d8"), sq("h8")]);
    assert_eq!(board.king(Color::Black), sq("c8"));
    assert_eq!(board.registry(Color::White).squares(PieceKind::Rook), &[sq("d1"), sq("h1")]);
    assert_eq!(board.king(Color::White), sq("c1"));
    assert!(board.is_empty(sq("a8")));
    assert!(board.is_empty(sq("e8")));

    let record = game.finalize(0, 1, GameResult::Unknown, false);
    assert_eq!(replay(&record).unwrap(), board);
}

/// En passant and promotion survive the trip through the store
#[test]
fn test_special_moves_through_store() {
    let dir = temp_store("special");
    let mut writer = GameStore::create(&dir, 1, 100, false).unwrap();
    let summary = PgnConverter::new()
        .convert(SPECIAL_MOVES.as_bytes(), &mut writer)
        .unwrap();
    writer.finish().unwrap();
    assert_eq!(summary.games, 2);
    assert_eq!(summary.skipped_moves, 0);

    let store = GameStore::open(&dir).unwrap();
    assert_eq!(store.len(), 2);

    let records: Vec<GameRecord> = store.records().unwrap().map(|r| r.unwrap()).collect();

    let en_passant = &records[0];
    assert_eq!(en_passant.header.average_rating, 1600);
    let board = replay(en_passant).unwrap();
    assert!(board.is_empty(Square::from_algebraic("d5").unwrap()));
    assert_eq!(board.registry(Color::Black).count(PieceKind::Pawn), 7);

    let promotion = &records[1];
    assert!(promotion.header.flags.normal_termination);
    assert_eq!(promotion.result(), GameResult::BlackWins);
    let promoting = promotion.moves[8];
    assert!(promoting.is_promotion());
    assert_eq!(&promoting.to_bytes()[..2], &[0x01, 0x05]);
    let board = replay(promotion).unwrap();
    assert_eq!(board.registry(Color::White).count(PieceKind::Queen), 2);
    assert_eq!(board.registry(Color::White).count(PieceKind::Pawn), 7);

    // both games rate 1600 and 2000; the index lets us pick the stronger one
    let strong = store.find_games(1800, None);
    assert_eq!(strong.len(), 1);
    assert_eq!(store.load_game(strong[0]).unwrap(), *promotion);

    fs::remove_dir_all(&dir).unwrap();
}

/// The first bytes of the data file are the header of the first game
#[test]
fn test_data_file_layout() {
    let dir = temp_store("layout");
    let mut writer = GameStore::create(&dir, 0, 10, false).unwrap();
    PgnConverter::new()
        .convert(OPERA_GAME.as_bytes(), &mut writer)
        .unwrap();
    writer.finish().unwrap();

    let bytes = fs::read(dir.join(DATA_FILE)).unwrap();
    assert_eq!(bytes.len(), HEADER_LEN + 34 * 4);
    assert_eq!(&bytes[0..4], &[0xAA, 0x55, 0x00, 0x01]);
    assert_eq!(&bytes[4..6], &34u16.to_le_bytes());
    assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
    // 1. e4
    assert_eq!(&bytes[12..16], &[0x01, 0x01, 52, 36]);
    // 1... e5
    assert_eq!(&bytes[16..20], &[0x09, 0x09, 12, 28]);

    fs::remove_dir_all(&dir).unwrap();
}

/// A move that cannot be resolved is skipped and the rest of the game kept
#[test]
fn test_unresolvable_move_is_skipped() {
    let pgn = "[Event \"Broken\"]\n\n1. e4 e5 2. Bb3 Nc6 3. Nf3 *\n";
    let mut records = Vec::new();
    let summary = PgnConverter::new()
        .convert(pgn.as_bytes(), &mut records)
        .unwrap();
    assert_eq!(summary.skipped_moves, 1);
    assert_eq!(summary.moves, 4);
    assert!(replay(&records[0]).is_ok());
}
