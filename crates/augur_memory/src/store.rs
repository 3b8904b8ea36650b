//! JSON persistence for engine state.
//!
//! One file per concern under a data directory. Reads never fail: a missing
//! file is a first run and a corrupt one is logged and replaced by defaults
//! on the next save.
//!
//! Saving the whole engine is a small journal so the six files always move
//! together:
//! 1. stage: every file is written and synced as `<name>.tmp`
//! 2. commit: `commit.json` is renamed into place
//! 3. apply: staged files are renamed over their targets, then the marker
//!    is removed
//!
//! A load that finds the marker finishes step 3 (or reads the staged copies
//! if it cannot). A load without it discards stray staged files.

use augur_core::EmotionState;
use augur_limbic::{DominantStreak, RollingAverages};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::prophecy::{ProphecyLedger, ProphecyStats};
use crate::weights::StrategyWeights;

pub const EMOTION_STATE_FILE: &str = "emotion_state.json";
pub const ROLLING_AVERAGES_FILE: &str = "rolling_averages.json";
pub const STRATEGY_WEIGHTS_FILE: &str = "strategy_weights.json";
pub const PROPHECY_SNAPSHOTS_FILE: &str = "prophecy_snapshots.json";
pub const PROPHECY_STATS_FILE: &str = "prophecy_stats.json";
pub const CYCLE_META_FILE: &str = "cycle_meta.json";

/// Present while a staged save is committed but not fully renamed into place.
pub const COMMIT_MARKER: &str = "commit.json";

pub const ALL_FILES: [&str; 6] = [
    EMOTION_STATE_FILE,
    ROLLING_AVERAGES_FILE,
    STRATEGY_WEIGHTS_FILE,
    PROPHECY_SNAPSHOTS_FILE,
    PROPHECY_STATS_FILE,
    CYCLE_META_FILE,
];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize {file}: {source}")]
    Serialize {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Cycle bookkeeping carried between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleMeta {
    /// Number of completed cycles.
    pub cycle: u64,
    pub streak: DominantStreak,
    /// Unix seconds of the last completed cycle.
    pub last_cycle_at: Option<i64>,
    /// Key of the input the last cycle consumed, if it came from a file.
    pub last_input: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CommitMarker {
    cycle: u64,
}

/// Everything the engine persists.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub emotion: EmotionState,
    pub averages: RollingAverages,
    pub weights: StrategyWeights,
    pub ledger: ProphecyLedger,
    pub stats: ProphecyStats,
    pub meta: CycleMeta,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn staged_path(&self, file: &str) -> PathBuf {
        self.dir.join(format!("{}.tmp", file))
    }

    /// Load one file, falling back to `T::default()`.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, file: &str) -> T {
        read_or_default(&self.path(file))
    }

    /// Write one file atomically. A failed write leaves no temp file behind.
    pub fn save<T: Serialize>(&self, file: &'static str, value: &T) -> Result<(), StoreError> {
        let path = self.path(file);
        let json = encode(file, value)?;
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let tmp = self.staged_path(file);
        write_synced(&tmp, &json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&tmp, &path) {
            remove_quietly(&tmp);
            return Err(StoreError::Io { path, source });
        }
        Ok(())
    }

    pub fn load_engine(&self) -> EngineState {
        let committed = self.has_pending_commit();
        if committed {
            match self.apply_staged() {
                Ok(()) => tracing::info!("Finished an interrupted save in {}", self.dir.display()),
                Err(e) => tracing::warn!("Could not finish interrupted save: {}. Reading staged files", e),
            }
        } else {
            self.discard_staged();
        }

        EngineState {
            emotion: self.load_latest(EMOTION_STATE_FILE, committed),
            averages: self.load_latest(ROLLING_AVERAGES_FILE, committed),
            weights: self.load_latest(STRATEGY_WEIGHTS_FILE, committed),
            ledger: self.load_latest(PROPHECY_SNAPSHOTS_FILE, committed),
            stats: self.load_latest(PROPHECY_STATS_FILE, committed),
            meta: self.load_latest(CYCLE_META_FILE, committed),
        }
    }

    /// Persist every file as one unit: either the whole engine lands or the
    /// previous one stays readable.
    ///
    /// Returns an error only when nothing new was committed. A commit whose
    /// renames fail is finished by the next load or save.
    pub fn save_engine(&self, engine: &EngineState) -> Result<(), StoreError> {
        if self.has_pending_commit() {
            // Staging over a committed set would mix two cycles.
            self.apply_staged()?;
        }
        self.stage(engine)?;
        let marker = CommitMarker {
            cycle: engine.meta.cycle,
        };
        if let Err(e) = self.save(COMMIT_MARKER, &marker) {
            self.discard_staged();
            return Err(e);
        }
        if let Err(e) = self.apply_staged() {
            tracing::warn!(
                "Cycle {} committed but not yet in place: {}",
                engine.meta.cycle,
                e
            );
        }
        Ok(())
    }

    /// Remove every persisted file. Returns how many state files existed.
    pub fn clear(&self) -> Result<usize, StoreError> {
        remove_if_exists(&self.path(COMMIT_MARKER))?;
        self.discard_staged();
        let mut removed = 0;
        for file in ALL_FILES {
            if remove_if_exists(&self.path(file))? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn has_pending_commit(&self) -> bool {
        self.path(COMMIT_MARKER).is_file()
    }

    fn load_latest<T: DeserializeOwned + Default>(&self, file: &str, committed: bool) -> T {
        let staged = self.staged_path(file);
        if committed && staged.is_file() {
            read_or_default(&staged)
        } else {
            self.load_or_default(file)
        }
    }

    /// Write every file to its staged path. On failure nothing staged is kept.
    fn stage(&self, engine: &EngineState) -> Result<(), StoreError> {
        let files = [
            (EMOTION_STATE_FILE, encode(EMOTION_STATE_FILE, &engine.emotion)?),
            (ROLLING_AVERAGES_FILE, encode(ROLLING_AVERAGES_FILE, &engine.averages)?),
            (STRATEGY_WEIGHTS_FILE, encode(STRATEGY_WEIGHTS_FILE, &engine.weights)?),
            (PROPHECY_SNAPSHOTS_FILE, encode(PROPHECY_SNAPSHOTS_FILE, &engine.ledger)?),
            (PROPHECY_STATS_FILE, encode(PROPHECY_STATS_FILE, &engine.stats)?),
            (CYCLE_META_FILE, encode(CYCLE_META_FILE, &engine.meta)?),
        ];
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        for (file, json) in &files {
            let tmp = self.staged_path(file);
            if let Err(source) = write_synced(&tmp, json) {
                self.discard_staged();
                return Err(StoreError::Io { path: tmp, source });
            }
        }
        Ok(())
    }

    /// Rename staged files over their targets, then drop the marker.
    fn apply_staged(&self) -> Result<(), StoreError> {
        for file in ALL_FILES {
            let tmp = self.staged_path(file);
            if !tmp.is_file() {
                continue;
            }
            let path = self.path(file);
            fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })?;
        }
        remove_if_exists(&self.path(COMMIT_MARKER))?;
        Ok(())
    }

    fn discard_staged(&self) {
        for file in ALL_FILES.into_iter().chain([COMMIT_MARKER]) {
            remove_quietly(&self.staged_path(file));
        }
    }
}

fn encode<T: Serialize>(file: &'static str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize { file, source })
}

fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("{} not found, starting from defaults", path.display());
            return T::default();
        }
        Err(e) => {
            tracing::warn!("Failed to read {}: {}. Using defaults", path.display(), e);
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Corrupt {}: {}. Using defaults", path.display(), e);
            T::default()
        }
    }
}

/// Create `path`, write `json` and sync it. A partial file is removed.
fn write_synced(path: &Path, json: &str) -> io::Result<()> {
    let result = File::create(path).and_then(|mut f| {
        f.write_all(json.as_bytes())?;
        f.sync_all()
    });
    if result.is_err() {
        remove_quietly(path);
    }
    result
}

fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!("Could not remove {}: {}", path.display(), e),
    }
}
