use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::board::Board;

pub const BOARD_FILE_NAME: &str = "tasks.json";

/// Key-value persistence for the single board record.
pub trait BoardStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> anyhow::Result<Option<Board>>;

    /// Replaces the stored record wholesale.
    fn save(&self, board: &Board) -> anyhow::Result<()>;
}

#[derive(Debug)]
pub struct JsonFileStore {
    pub data_dir: PathBuf,
    pub board_path: PathBuf,
}

impl JsonFileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let board_path = data_dir.join(BOARD_FILE_NAME);

        info!(
            data_dir = %data_dir.display(),
            board = %board_path.display(),
            "opened board datastore"
        );

        Ok(Self {
            data_dir,
            board_path,
        })
    }
}

impl BoardStore for JsonFileStore {
    #[tracing::instrument(skip(self))]
    fn load(&self) -> anyhow::Result<Option<Board>> {
        if !self.board_path.exists() {
            debug!(file = %self.board_path.display(), "no saved board");
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.board_path)
            .with_context(|| format!("failed reading {}", self.board_path.display()))?;
        decode_board(&raw)
            .with_context(|| format!("failed parsing {}", self.board_path.display()))
    }

    #[tracing::instrument(skip(self, board))]
    fn save(&self, board: &Board) -> anyhow::Result<()> {
        save_json_atomic(&self.board_path, board).context("failed to save tasks.json")
    }
}

/// In-process store holding the serialized record, for tests and throwaway
/// sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<String>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with raw text, valid or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(raw.into())),
            saves: Mutex::new(0),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.record.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }
}

impl BoardStore for MemoryStore {
    fn load(&self) -> anyhow::Result<Option<Board>> {
        match self.record.lock().as_deref() {
            Some(raw) => decode_board(raw),
            None => Ok(None),
        }
    }

    fn save(&self, board: &Board) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(board)?;
        *self.record.lock() = Some(serialized);
        *self.saves.lock() += 1;
        Ok(())
    }
}

fn decode_board(raw: &str) -> anyhow::Result<Option<Board>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let board: Board = serde_json::from_str(trimmed)?;
    Ok(Some(board))
}

#[tracing::instrument(skip(path, board))]
fn save_json_atomic(path: &Path, board: &Board) -> anyhow::Result<()> {
    debug!(
        file = %path.display(),
        count = board.all().len(),
        "saving board atomically"
    );

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer(&mut temp, board)?;
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
