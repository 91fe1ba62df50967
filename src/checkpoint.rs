//! Binary save and restore of a running world.
//!
//! File layout: the four magic bytes `EVOS` followed by a bincode-encoded
//! [`Checkpoint`]. The embedded version is checked on load.

use crate::config::Config;
use crate::food::{FoodField, FoodSpawner};
use crate::population::PopulationRegistry;
use crate::stats::{Stats, StatsAggregator};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"EVOS";
const FILE_PREFIX: &str = "checkpoint_";

/// Everything needed to resume a world exactly where it stopped
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Checkpoint {
    pub version: u32,
    /// Steps taken
    pub time: u64,
    /// Simulated seconds elapsed
    pub elapsed: f32,
    pub time_scale: f32,
    pub config: Config,
    pub population: PopulationRegistry,
    pub food: FoodField,
    pub spawner: FoodSpawner,
    pub aggregator: StatsAggregator,
    pub stats: Stats,
    pub next_agent_id: u64,
    pub seed: u64,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const VERSION: u32 = 1;

    /// Write the checkpoint to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a checkpoint back, rejecting foreign files and other versions
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(CheckpointError::InvalidFormat(format!(
                "expected magic {:?}, found {:?}",
                String::from_utf8_lossy(MAGIC),
                String::from_utf8_lossy(&magic)
            )));
        }

        let checkpoint: Checkpoint = bincode::deserialize_from(&mut reader)?;
        if checkpoint.version != Self::VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: Self::VERSION,
                found: checkpoint.version,
            });
        }

        Ok(checkpoint)
    }

    /// Encoded size in bytes, excluding the magic prefix
    pub fn size_bytes(&self) -> Result<u64, CheckpointError> {
        Ok(bincode::serialized_size(self)?)
    }
}

/// Errors raised while saving or loading checkpoints
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint encoding failed: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("not a checkpoint file: {0}")]
    InvalidFormat(String),

    #[error("checkpoint version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Periodic checkpoint writer keeping the newest `max_checkpoints` files
pub struct CheckpointManager {
    base_dir: PathBuf,
    interval: u64,
    max_checkpoints: usize,
    last_saved: Option<u64>,
}

impl CheckpointManager {
    /// Create the manager, creating `base_dir` if needed
    pub fn new<P: Into<PathBuf>>(
        base_dir: P,
        interval: u64,
        max_checkpoints: usize,
    ) -> Result<Self, CheckpointError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            interval: interval.max(1),
            max_checkpoints: max_checkpoints.max(1),
            last_saved: None,
        })
    }

    /// Whether a checkpoint is due at step `time`
    pub fn should_save(&self, time: u64) -> bool {
        time > 0 && time % self.interval == 0 && self.last_saved != Some(time)
    }

    pub fn checkpoint_path(&self, time: u64) -> PathBuf {
        self.base_dir.join(format!("{FILE_PREFIX}{time:010}.bin"))
    }

    /// Save and prune old files; returns the written path
    pub fn save(&mut self, checkpoint: &Checkpoint) -> Result<PathBuf, CheckpointError> {
        let path = self.checkpoint_path(checkpoint.time);
        checkpoint.save(&path)?;
        self.last_saved = Some(checkpoint.time);
        self.prune()?;
        Ok(path)
    }

    fn checkpoint_files(&self) -> Result<Vec<PathBuf>, CheckpointError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.base_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(FILE_PREFIX))
            .map(|entry| entry.path())
            .collect();
        // zero-padded step numbers sort chronologically
        files.sort();
        Ok(files)
    }

    fn prune(&self) -> Result<(), CheckpointError> {
        let files = self.checkpoint_files()?;
        let excess = files.len().saturating_sub(self.max_checkpoints);
        for path in files.into_iter().take(excess) {
            log::trace!("removing old checkpoint {}", path.display());
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Newest checkpoint in the directory, if any
    pub fn find_latest(&self) -> Option<PathBuf> {
        self.checkpoint_files().ok()?.pop()
    }
}
