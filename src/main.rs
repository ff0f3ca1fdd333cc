use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pgntobin::config::{ConvertConfig, InputSource, FILE_ID_ENV, PARTITION_SIZE_ENV};
use pgntobin::pgn::{ConvertError, PgnConverter};
use pgntobin::pattern::Pattern;
use pgntobin::record::{replay, GameRecord, GameResult};
use pgntobin::search::{PatternSearch, SearchFilter};
use pgntobin::store::{GameStore, DEFAULT_PARTITION_SIZE};

/// Input missing or unreadable, store cannot be created or opened.
const EXIT_STARTUP: i32 = 2;
/// Writing the store failed part way.
const EXIT_WRITE: i32 = 4;

/// PGN to binary game database converter
///
/// `convert` plays every game of a PGN file on a virtual board to recover
/// the origin square of each SAN move, and stores the games as fixed-size
/// binary records with a rating/result index. `show` reads a store back,
/// `pattern` compiles a position pattern and `search` finds the games that
/// reach a position matching it.
///
/// ## Usage Examples:
/// ```bash
/// # Convert a PGN file into the store directory `db`
/// ./pgntobin convert games.pgn -o db
///
/// # Convert the first 100 games from standard input
/// cat games.pgn | ./pgntobin convert - -o db --max-games 100
///
/// # Replay game 3 of a store and print the final position
/// ./pgntobin show db --game 3 --replay
///
/// # Add a second PGN file to the same store
/// ./pgntobin convert more.pgn -o db --append --file-id 1
///
/// # List the games rated 2200+ that reach the position in mate.pat
/// ./pgntobin search db mate.pat --min-rating 2200
/// ```
#[derive(Parser)]
#[command(name = "pgntobin")]
#[command(about = "Convert PGN chess games to an indexed binary database")]
#[command(version)]
struct Cli {
    /// Log debug details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert PGN games into a store directory
    Convert(ConvertArgs),
    /// Print the contents of a store directory
    Show(ShowArgs),
    /// Compile a text pattern into its binary form
    Pattern(PatternArgs),
    /// Find the stored games that reach a position matching a pattern
    Search(SearchArgs),
}

#[derive(Args)]
struct ConvertArgs {
    /// PGN file to read, `-` for standard input
    #[arg(value_name = "INPUT")]
    input: String,

    /// Store directory to write
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Source file number recorded in the partition index
    #[arg(long, env = FILE_ID_ENV, default_value_t = 0)]
    file_id: u16,

    /// Games per index partition
    #[arg(long, env = PARTITION_SIZE_ENV, default_value_t = DEFAULT_PARTITION_SIZE)]
    partition_size: u32,

    /// Maximum number of games to convert (0 = all games)
    #[arg(long, default_value = "0")]
    max_games: usize,

    /// Force overwrite of an existing store
    #[arg(short, long)]
    force: bool,

    /// Add the games to an existing store
    #[arg(short, long, conflicts_with = "force")]
    append: bool,
}

impl From<ConvertArgs> for ConvertConfig {
    fn from(args: ConvertArgs) -> Self {
        ConvertConfig {
            input: InputSource::parse(&args.input),
            output_dir: args.output,
            file_id: args.file_id,
            partition_size: args.partition_size,
            max_games: (args.max_games > 0).then_some(args.max_games),
            force: args.force,
            append: args.append,
        }
    }
}

#[derive(Args)]
struct ShowArgs {
    /// Store directory to read
    #[arg(value_name = "DIR")]
    store: PathBuf,

    /// Print the moves of the game with this index
    #[arg(long, value_name = "N")]
    game: Option<u32>,

    /// Replay the selected game and print the final position
    #[arg(long, requires = "game")]
    replay: bool,
}

#[derive(Args)]
struct PatternArgs {
    /// Pattern text file, `-` for standard input
    #[arg(value_name = "PATTERN")]
    input: String,

    /// File to write the compiled pattern to
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct SearchArgs {
    /// Store directory to search
    #[arg(value_name = "DIR")]
    store: PathBuf,

    /// Pattern file, text unless --compiled is given
    #[arg(value_name = "PATTERN")]
    pattern: PathBuf,

    /// The pattern file holds a compiled pattern
    #[arg(long)]
    compiled: bool,

    /// Skip games with a lower average rating
    #[arg(long, default_value_t = 0)]
    min_rating: u16,

    /// Skip games with a higher average rating
    #[arg(long)]
    max_rating: Option<u16>,

    /// Only games with this result: 1-0, 0-1, 1/2-1/2 or *
    #[arg(long, value_parser = parse_result)]
    result: Option<GameResult>,
}

fn parse_result(text: &str) -> Result<GameResult, String> {
    match text {
        "1-0" | "0-1" | "1/2-1/2" | "*" => Ok(GameResult::from_pgn(text)),
        _ => Err(format!("'{}' is not a PGN result", text)),
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "pgntobin=debug"
    } else {
        "pgntobin=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let code = match cli.command {
        Command::Convert(args) => convert(args.into()),
        Command::Show(args) => show(args),
        Command::Pattern(args) => compile_pattern(args),
        Command::Search(args) => search(args),
    };
    process::exit(code);
}

fn convert(config: ConvertConfig) -> i32 {
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return EXIT_STARTUP;
    }

    let input = match config.input.open() {
        Ok(input) => input,
        Err(e) => {
            error!("Error opening '{}': {}", config.input.describe(), e);
            return EXIT_STARTUP;
        }
    };

    let writer = if config.append {
        GameStore::open_for_append(&config.output_dir, config.file_id, config.partition_size)
    } else {
        GameStore::create(
            &config.output_dir,
            config.file_id,
            config.partition_size,
            config.force,
        )
    };
    let mut writer = match writer {
        Ok(writer) => writer,
        Err(e) => {
            error!("Error opening store for writing: {}", e);
            return EXIT_STARTUP;
        }
    };

    info!(
        "Converting '{}' into '{}'...",
        config.input.describe(),
        config.output_dir.display()
    );

    let mut converter = PgnConverter::new();
    if let Some(max) = config.max_games {
        converter = converter.with_max_games(max);
    }

    let summary = match converter.convert(input, &mut writer) {
        Ok(summary) => summary,
        Err(e @ ConvertError::Read(_)) => {
            error!("{}", e);
            return EXIT_STARTUP;
        }
        Err(e @ ConvertError::Store { .. }) => {
            error!("{}", e);
            return EXIT_WRITE;
        }
    };

    if let Err(e) = writer.finish() {
        error!("Error finishing store: {}", e);
        return EXIT_WRITE;
    }

    println!(
        "Converted {} games ({} moves, {} skipped moves, {} dropped games) into '{}'",
        summary.games,
        summary.moves,
        summary.skipped_moves,
        summary.dropped_games,
        config.output_dir.display()
    );
    0
}

fn show(args: ShowArgs) -> i32 {
    let store = match GameStore::open(&args.store) {
        Ok(store) => store,
        Err(e) => {
            error!("Error opening store: {}", e);
            return EXIT_STARTUP;
        }
    };

    let records = match store.records() {
        Ok(records) => records,
        Err(e) => {
            error!("Error reading store: {}", e);
            return EXIT_STARTUP;
        }
    };

    match args.game {
        None => {
            println!(
                "{} games in {} partitions",
                store.len(),
                store.partitions().len()
            );
            for partition in store.partitions() {
                println!(
                    "  partition {} (file {}): {} games",
                    partition.partition,
                    partition.file_id,
                    partition.games()
                );
            }
            for record in records {
                match record {
                    Ok(record) => println!(
                        "game {:>6}  rating {:>4}  result {:<7}  moves {}",
                        record.header.game_index,
                        record.header.average_rating,
                        record.result().to_string(),
                        record.moves.len()
                    ),
                    Err(e) => {
                        error!("Error reading store: {}", e);
                        return EXIT_STARTUP;
                    }
                }
            }
            0
        }
        Some(index) => {
            let mut found = None;
            for record in records {
                match record {
                    Ok(record) if record.header.game_index == index => {
                        found = Some(record);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Error reading store: {}", e);
                        return EXIT_STARTUP;
                    }
                }
            }
            match found {
                Some(record) => print_game(&record, args.replay),
                None => {
                    error!("Game {} is not in the store", index);
                    EXIT_STARTUP
                }
            }
        }
    }
}

fn print_game(record: &GameRecord, with_replay: bool) -> i32 {
    let header = &record.header;
    println!(
        "game {}  rating {}  result {}  normal termination {}",
        header.game_index,
        header.average_rating,
        record.result(),
        header.flags.normal_termination
    );
    for (ply, mv) in record.moves.iter().enumerate() {
        println!("{:>4}  {}", ply + 1, mv);
    }

    if with_replay {
        match replay(record) {
            Ok(board) => {
                println!();
                print!("{}", board.display_board());
                println!("{}", board.fen_placement());
            }
            Err(e) => {
                error!("Replay failed: {}", e);
                return EXIT_STARTUP;
            }
        }
    }
    0
}

fn compile_pattern(args: PatternArgs) -> i32 {
    let text = match InputSource::parse(&args.input).open() {
        Ok(mut input) => {
            let mut text = String::new();
            match input.read_to_string(&mut text) {
                Ok(_) => text,
                Err(e) => {
                    error!("Error reading '{}': {}", args.input, e);
                    return EXIT_STARTUP;
                }
            }
        }
        Err(e) => {
            error!("Error opening '{}': {}", args.input, e);
            return EXIT_STARTUP;
        }
    };

    let pattern = match Pattern::parse(&text) {
        Ok(pattern) => pattern,
        Err(e) => {
            error!("Invalid pattern: {}", e);
            return EXIT_STARTUP;
        }
    };
    println!("{}", pattern);

    if let Some(output) = &args.output {
        if let Err(e) = fs::write(output, pattern.to_bytes()) {
            error!("Error writing '{}': {}", output.display(), e);
            return EXIT_WRITE;
        }
        info!("Compiled pattern written to '{}'", output.display());
    }
    0
}

fn load_pattern(path: &Path, compiled: bool) -> Result<Pattern, String> {
    let describe = |e: &dyn std::fmt::Display| format!("'{}': {}", path.display(), e);
    if compiled {
        let bytes = fs::read(path).map_err(|e| describe(&e))?;
        Pattern::from_bytes(&bytes).map_err(|e| describe(&e))
    } else {
        let text = fs::read_to_string(path).map_err(|e| describe(&e))?;
        Pattern::parse(&text).map_err(|e| describe(&e))
    }
}

fn search(args: SearchArgs) -> i32 {
    let pattern = match load_pattern(&args.pattern, args.compiled) {
        Ok(pattern) => pattern,
        Err(e) => {
            error!("Error loading pattern {}", e);
            return EXIT_STARTUP;
        }
    };
    let store = match GameStore::open(&args.store) {
        Ok(store) => store,
        Err(e) => {
            error!("Error opening store: {}", e);
            return EXIT_STARTUP;
        }
    };

    let filter = SearchFilter {
        min_rating: args.min_rating,
        max_rating: args.max_rating,
        result: args.result,
    };
    let summary = match PatternSearch::new(&pattern)
        .with_filter(filter)
        .run(&store, |found| println!("{}", found))
    {
        Ok(summary) => summary,
        Err(e) => {
            error!("Error reading store: {}", e);
            return EXIT_STARTUP;
        }
    };

    println!(
        "{} of {} searched games match ({} games in store, {} could not be replayed)",
        summary.matched, summary.searched, summary.games, summary.failed
    );
    0
}
