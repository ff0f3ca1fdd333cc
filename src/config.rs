use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use crate::store::DEFAULT_PARTITION_SIZE;

/// Environment fallback for `--partition-size`.
pub const PARTITION_SIZE_ENV: &str = "PGNTOBIN_PARTITION_SIZE";
/// Environment fallback for `--file-id`.
pub const FILE_ID_ENV: &str = "PGNTOBIN_FILE_ID";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("partition size must be at least 1")]
    ZeroPartitionSize,

    #[error("input file {} does not exist", .0.display())]
    MissingInput(PathBuf),

    #[error("--append and --force cannot be combined")]
    AppendWithForce,
}

/// Where PGN text is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `-` is standard input, anything else a file path.
    pub fn parse(arg: &str) -> Self {
        if arg == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(PathBuf::from(arg))
        }
    }

    pub fn open(&self) -> io::Result<Box<dyn BufRead>> {
        match self {
            InputSource::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
            InputSource::File(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            InputSource::Stdin => "<stdin>".to_string(),
            InputSource::File(path) => path.display().to_string(),
        }
    }
}

/// Settings of a `convert` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertConfig {
    pub input: InputSource,
    pub output_dir: PathBuf,
    /// Source file number written into every partition entry.
    pub file_id: u16,
    /// Games per index partition.
    pub partition_size: u32,
    /// Stop after this many games; `None` converts everything.
    pub max_games: Option<usize>,
    /// Replace an existing store.
    pub force: bool,
    /// Add the games to an existing store.
    pub append: bool,
}

impl ConvertConfig {
    pub fn new(input: InputSource, output_dir: PathBuf) -> Self {
        ConvertConfig {
            input,
            output_dir,
            ..ConvertConfig::default()
        }
    }

    /// Reject settings that would only fail later.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partition_size == 0 {
            return Err(ConfigError::ZeroPartitionSize);
        }
        if self.append && self.force {
            return Err(ConfigError::AppendWithForce);
        }
        if let InputSource::File(path) = &self.input {
            if !path.exists() {
                return Err(ConfigError::MissingInput(path.clone()));
            }
        }
        Ok(())
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            input: InputSource::Stdin,
            output_dir: PathBuf::from("games"),
            file_id: 0,
            partition_size: DEFAULT_PARTITION_SIZE,
            max_games: None,
            force: false,
            append: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ConvertConfig::default();
        assert_eq!(config.input, InputSource::Stdin);
        assert_eq!(config.partition_size, 1_000_000);
        assert_eq!(config.file_id, 0);
        assert_eq!(config.max_games, None);
        assert!(!config.force);
        assert!(!config.append);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn input_source_parse() {
        assert_eq!(InputSource::parse("-"), InputSource::Stdin);
        assert_eq!(
            InputSource::parse("games.pgn"),
            InputSource::File(PathBuf::from("games.pgn"))
        );
        assert_eq!(InputSource::Stdin.describe(), "<stdin>");
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let mut config = ConvertConfig::new(InputSource::Stdin, PathBuf::from("out"));
        config.partition_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroPartitionSize)));

        let mut config = ConvertConfig::new(InputSource::Stdin, PathBuf::from("out"));
        config.append = true;
        assert!(config.validate().is_ok());
        config.force = true;
        assert!(matches!(config.validate(), Err(ConfigError::AppendWithForce)));

        let missing = std::env::temp_dir().join("pgntobin-no-such-input.pgn");
        let config = ConvertConfig::new(InputSource::File(missing), PathBuf::from("out"));
        assert!(matches!(config.validate(), Err(ConfigError::MissingInput(_))));
    }
}
