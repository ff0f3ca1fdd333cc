//! Indexed on-disk store of converted games.
//!
//! A store is a directory holding three files:
//!
//! - `data.bin`: game records back to back, in input order;
//! - `games.idx`: one 12 byte [`IndexEntry`] per game, sorted by
//!   (average rating, winner) within each partition;
//! - `partitions.idx`: one 16 byte [`PartitionEntry`] per partition, giving
//!   the slice of `games.idx` it covers.
//!
//! All integers are little-endian.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::record::{GameRecord, GameResult, RecordError};

pub const DATA_FILE: &str = "data.bin";
pub const GAMES_INDEX_FILE: &str = "games.idx";
pub const PARTITIONS_FILE: &str = "partitions.idx";

pub const INDEX_ENTRY_LEN: usize = 12;
pub const PARTITION_ENTRY_LEN: usize = 16;

pub const DEFAULT_PARTITION_SIZE: u32 = 1_000_000;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} already exists, use --force to overwrite", .0.display())]
    Exists(PathBuf),

    #[error("partition size must be at least 1")]
    InvalidPartitionSize,

    #[error("too many partitions for a single store")]
    TooManyPartitions,

    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("game at offset {offset}: {source}")]
    Record {
        offset: u64,
        #[source]
        source: RecordError,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Position and search keys of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub average_rating: u16,
    pub result: GameResult,
    /// Reserved, always 0.
    pub flags: u8,
    /// Byte offset of the record in `data.bin`.
    pub offset: u64,
}

impl IndexEntry {
    pub fn to_bytes(&self) -> [u8; INDEX_ENTRY_LEN] {
        let mut bytes = [0u8; INDEX_ENTRY_LEN];
        bytes[0..2].copy_from_slice(&self.average_rating.to_le_bytes());
        bytes[2] = self.result.code();
        bytes[3] = self.flags;
        bytes[4..12].copy_from_slice(&self.offset.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; INDEX_ENTRY_LEN]) -> Result<Self, StoreError> {
        let result = GameResult::from_code(bytes[2])
            .ok_or_else(|| StoreError::Corrupt(format!("unknown winner code {}", bytes[2])))?;
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&bytes[4..12]);
        Ok(IndexEntry {
            average_rating: u16::from_le_bytes([bytes[0], bytes[1]]),
            result,
            flags: bytes[3],
            offset: u64::from_le_bytes(offset),
        })
    }

    fn sort_key(&self) -> (u16, u8) {
        (self.average_rating, self.result.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionEntry {
    pub file_id: u16,
    pub partition: u16,
    /// Bytes of `games.idx` covered.
    pub len: u32,
    /// Start of the covered bytes in `games.idx`.
    pub offset: u64,
}

impl PartitionEntry {
    pub fn to_bytes(&self) -> [u8; PARTITION_ENTRY_LEN] {
        let mut bytes = [0u8; PARTITION_ENTRY_LEN];
        bytes[0..2].copy_from_slice(&self.file_id.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.partition.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.len.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.offset.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8; PARTITION_ENTRY_LEN]) -> Self {
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&bytes[8..16]);
        PartitionEntry {
            file_id: u16::from_le_bytes([bytes[0], bytes[1]]),
            partition: u16::from_le_bytes([bytes[2], bytes[3]]),
            len: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            offset: u64::from_le_bytes(offset),
        }
    }

    pub fn games(&self) -> usize {
        self.len as usize / INDEX_ENTRY_LEN
    }
}

/// Counters reported when a store is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreSummary {
    pub games: u64,
    pub partitions: u16,
    pub data_bytes: u64,
}

struct StoreFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl StoreFile {
    fn create(path: PathBuf) -> Result<Self, StoreError> {
        let file = File::create(&path).map_err(io_error(&path))?;
        Ok(StoreFile {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Open for writing after the current end of the file.
    fn append(path: PathBuf) -> Result<(Self, u64), StoreError> {
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(io_error(&path))?;
        let len = file.metadata().map_err(io_error(&path))?.len();
        Ok((
            StoreFile {
                path,
                writer: BufWriter::new(file),
            },
            len,
        ))
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        self.writer.write_all(bytes).map_err(io_error(&self.path))
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.writer.flush().map_err(io_error(&self.path))
    }
}

/// Writing side of a store.
pub struct StoreWriter {
    dir: PathBuf,
    file_id: u16,
    partition_size: usize,
    data: StoreFile,
    games_index: StoreFile,
    partitions: StoreFile,
    data_offset: u64,
    index_offset: u64,
    pending: Vec<IndexEntry>,
    next_partition: u16,
    games: u64,
}

impl StoreWriter {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn games(&self) -> u64 {
        self.games
    }

    /// Append one game; a full partition is sorted and written out.
    pub fn append(&mut self, record: &GameRecord) -> Result<(), StoreError> {
        let closes_partition = self.pending.len() + 1 >= self.partition_size;
        if closes_partition {
            self.following_partition()?;
        }

        let entry = IndexEntry {
            average_rating: record.header.average_rating,
            result: record.result(),
            flags: 0,
            offset: self.data_offset,
        };
        self.data.write_all(&record.to_bytes())?;
        self.data_offset += record.encoded_len() as u64;
        self.pending.push(entry);
        self.games += 1;

        if self.pending.len() >= self.partition_size {
            self.close_partition()?;
        }
        Ok(())
    }

    /// Number of the partition after the open one.
    fn following_partition(&self) -> Result<u16, StoreError> {
        self.next_partition
            .checked_add(1)
            .ok_or(StoreError::TooManyPartitions)
    }

    fn close_partition(&mut self) -> Result<(), StoreError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let following = self.following_partition()?;
        // stable: equal keys keep input order
        self.pending.sort_by_key(IndexEntry::sort_key);

        let len = self.pending.len() * INDEX_ENTRY_LEN;
        let len = u32::try_from(len).map_err(|_| {
            StoreError::Corrupt(format!("partition of {} bytes does not fit the index", len))
        })?;
        for entry in &self.pending {
            self.games_index.write_all(&entry.to_bytes())?;
        }

        let partition = PartitionEntry {
            file_id: self.file_id,
            partition: self.next_partition,
            len,
            offset: self.index_offset,
        };
        self.partitions.write_all(&partition.to_bytes())?;
        debug!(
            partition = partition.partition,
            games = self.pending.len(),
            "closed partition"
        );

        self.index_offset += len as u64;
        self.next_partition = following;
        self.pending.clear();
        Ok(())
    }

    /// Close the last partition and flush every file.
    pub fn finish(mut self) -> Result<StoreSummary, StoreError> {
        self.close_partition()?;
        self.data.flush()?;
        self.games_index.flush()?;
        self.partitions.flush()?;
        let summary = StoreSummary {
            games: self.games,
            partitions: self.next_partition,
            data_bytes: self.data_offset,
        };
        info!(
            dir = %self.dir.display(),
            games = summary.games,
            partitions = summary.partitions,
            "store written"
        );
        Ok(summary)
    }
}

/// Reading side of a store: partitions and index entries are held in memory,
/// game records are read from `data.bin` on demand.
#[derive(Debug, Clone)]
pub struct GameStore {
    dir: PathBuf,
    partitions: Vec<PartitionEntry>,
    entries: Vec<IndexEntry>,
}

impl GameStore {
    /// Create a store directory for writing.
    ///
    /// Existing store files are only replaced when `force` is set.
    pub fn create<P: AsRef<Path>>(
        dir: P,
        file_id: u16,
        partition_size: u32,
        force: bool,
    ) -> Result<StoreWriter, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        if partition_size == 0 {
            return Err(StoreError::InvalidPartitionSize);
        }
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        if !force {
            for name in [DATA_FILE, GAMES_INDEX_FILE, PARTITIONS_FILE] {
                let path = dir.join(name);
                if path.exists() {
                    return Err(StoreError::Exists(path));
                }
            }
        }

        Ok(StoreWriter {
            data: StoreFile::create(dir.join(DATA_FILE))?,
            games_index: StoreFile::create(dir.join(GAMES_INDEX_FILE))?,
            partitions: StoreFile::create(dir.join(PARTITIONS_FILE))?,
            dir,
            file_id,
            partition_size: partition_size as usize,
            data_offset: 0,
            index_offset: 0,
            pending: Vec::new(),
            next_partition: 0,
            games: 0,
        })
    }

    /// Reopen an existing store to add games after the ones it holds.
    ///
    /// New games start a fresh partition numbered after the last one.
    pub fn open_for_append<P: AsRef<Path>>(
        dir: P,
        file_id: u16,
        partition_size: u32,
    ) -> Result<StoreWriter, StoreError> {
        if partition_size == 0 {
            return Err(StoreError::InvalidPartitionSize);
        }
        let existing = GameStore::open(&dir)?;
        let next_partition =
            u16::try_from(existing.partitions.len()).map_err(|_| StoreError::TooManyPartitions)?;
        let dir = existing.dir;

        let (data, data_offset) = StoreFile::append(dir.join(DATA_FILE))?;
        let (games_index, index_offset) = StoreFile::append(dir.join(GAMES_INDEX_FILE))?;
        let (partitions, _) = StoreFile::append(dir.join(PARTITIONS_FILE))?;
        info!(
            dir = %dir.display(),
            games = existing.entries.len(),
            partitions = next_partition,
            "appending to store"
        );

        Ok(StoreWriter {
            data,
            games_index,
            partitions,
            dir,
            file_id,
            partition_size: partition_size as usize,
            data_offset,
            index_offset,
            pending: Vec::new(),
            next_partition,
            games: 0,
        })
    }

    /// Load the partition table and the game index of an existing store.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();

        let partitions = read_entries(&dir.join(PARTITIONS_FILE), |bytes: &[u8; PARTITION_ENTRY_LEN]| {
            Ok(PartitionEntry::from_bytes(bytes))
        })?;
        let entries = read_entries(&dir.join(GAMES_INDEX_FILE), IndexEntry::from_bytes)?;

        let mut expected_offset = 0u64;
        for partition in &partitions {
            if partition.offset != expected_offset || partition.len as usize % INDEX_ENTRY_LEN != 0 {
                return Err(StoreError::Corrupt(format!(
                    "partition {} covers bytes {}+{} of the game index",
                    partition.partition, partition.offset, partition.len
                )));
            }
            expected_offset += partition.len as u64;
        }
        if expected_offset != (entries.len() * INDEX_ENTRY_LEN) as u64 {
            return Err(StoreError::Corrupt(format!(
                "partitions cover {} index bytes, the index holds {}",
                expected_offset,
                entries.len() * INDEX_ENTRY_LEN
            )));
        }

        debug!(
            dir = %dir.display(),
            partitions = partitions.len(),
            games = entries.len(),
            "opened store"
        );
        Ok(GameStore {
            dir,
            partitions,
            entries,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn partitions(&self) -> &[PartitionEntry] {
        &self.partitions
    }

    /// Every index entry, partition by partition.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Index entries of one partition.
    pub fn partition_entries(&self, partition: &PartitionEntry) -> &[IndexEntry] {
        let start = partition.offset as usize / INDEX_ENTRY_LEN;
        let end = start + partition.games();
        self.entries.get(start..end).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries rated at least `min_rating`, optionally with a given outcome.
    pub fn find_games(&self, min_rating: u16, result: Option<GameResult>) -> Vec<&IndexEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.average_rating >= min_rating)
            .filter(|entry| result.map_or(true, |result| entry.result == result))
            .collect()
    }

    pub fn load_game(&self, entry: &IndexEntry) -> Result<GameRecord, StoreError> {
        let path = self.dir.join(DATA_FILE);
        let mut file = File::open(&path).map_err(io_error(&path))?;
        file.seek(SeekFrom::Start(entry.offset))
            .map_err(io_error(&path))?;
        let mut reader = BufReader::new(file);
        GameRecord::read_from(&mut reader).map_err(|source| StoreError::Record {
            offset: entry.offset,
            source,
        })
    }

    /// Every stored game in input order.
    pub fn records(&self) -> Result<Records, StoreError> {
        let path = self.dir.join(DATA_FILE);
        let file = File::open(&path).map_err(io_error(&path))?;
        Ok(Records {
            path,
            reader: BufReader::new(file),
            offset: 0,
            failed: false,
        })
    }
}

/// Sequential reader over `data.bin`.
pub struct Records {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    failed: bool,
}

impl Iterator for Records {
    type Item = Result<GameRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.reader.fill_buf() {
            Ok(buf) if buf.is_empty() => return None,
            Ok(_) => {}
            Err(source) => {
                self.failed = true;
                return Some(Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                }));
            }
        }
        let offset = self.offset;
        match GameRecord::read_from(&mut self.reader) {
            Ok(record) => {
                self.offset += record.encoded_len() as u64;
                Some(Ok(record))
            }
            Err(source) => {
                self.failed = true;
                Some(Err(StoreError::Record { offset, source }))
            }
        }
    }
}

fn read_entries<T, const N: usize>(
    path: &Path,
    decode: impl Fn(&[u8; N]) -> Result<T, StoreError>,
) -> Result<Vec<T>, StoreError> {
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut bytes))
        .map_err(io_error(path))?;
    if bytes.len() % N != 0 {
        return Err(StoreError::Corrupt(format!(
            "{} is {} bytes, not a multiple of {}",
            path.display(),
            bytes.len(),
            N
        )));
    }
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut entry = [0u8; N];
            entry.copy_from_slice(chunk);
            decode(&entry)
        })
        .collect()
}
