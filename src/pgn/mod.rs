pub mod converter;
pub mod reader;

pub use converter::{ConversionSummary, ConvertError, ConvertedGame, MoveContext, PgnConverter, RecordSink};
pub use reader::{
    clean_san, is_null_move, strip_movetext, tokenize_movetext, MovetextToken, PgnGame, PgnReader,
};
