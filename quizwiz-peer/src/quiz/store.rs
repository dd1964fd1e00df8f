//! Quiz Store
//!
//! A persisted, ordered list of quizzes keyed by id. Saving validates first,
//! so nothing incomplete ever reaches storage.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::quiz::model::{Quiz, QuizError};

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O error: {0}")]
    Io(#[from] io::Error),

    /// Backing file is not a JSON quiz list.
    #[error("store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// Quiz failed validation and was not saved.
    #[error("{0}")]
    Invalid(#[from] QuizError),
}

/// CRUD over stored quizzes.
pub trait QuizStore {
    /// All quizzes in insertion order.
    fn list(&self) -> Result<Vec<Quiz>, StoreError>;

    /// Insert, or replace the quiz with the same id in place.
    fn save(&mut self, quiz: Quiz) -> Result<(), StoreError>;

    /// Remove by id. Returns whether a quiz was removed.
    fn delete(&mut self, id: &str) -> Result<bool, StoreError>;

    /// Look up by id.
    fn get(&self, id: &str) -> Result<Option<Quiz>, StoreError> {
        Ok(self.list()?.into_iter().find(|q| q.id == id))
    }
}

fn upsert(quizzes: &mut Vec<Quiz>, quiz: Quiz) {
    match quizzes.iter_mut().find(|q| q.id == quiz.id) {
        Some(existing) => *existing = quiz,
        None => quizzes.push(quiz),
    }
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    quizzes: Vec<Quiz>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuizStore for MemoryStore {
    fn list(&self) -> Result<Vec<Quiz>, StoreError> {
        Ok(self.quizzes.clone())
    }

    fn save(&mut self, quiz: Quiz) -> Result<(), StoreError> {
        quiz.validate()?;
        upsert(&mut self.quizzes, quiz);
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.quizzes.len();
        self.quizzes.retain(|q| q.id != id);
        Ok(self.quizzes.len() != before)
    }
}

/// Store backed by a JSON array on disk.
///
/// When the file does not exist yet it is created holding the demo quiz.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open the store at `path`, seeding it if missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        if !store.path.exists() {
            info!("Seeding quiz store at {}", store.path.display());
            store.write(&[Quiz::demo()])?;
        }
        Ok(store)
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<Quiz>, StoreError> {
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write(&self, quizzes: &[Quiz]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(quizzes)?;
        // Replace the list atomically.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Wrote {} quizzes to {}", quizzes.len(), self.path.display());
        Ok(())
    }
}

impl QuizStore for JsonFileStore {
    fn list(&self) -> Result<Vec<Quiz>, StoreError> {
        self.read()
    }

    fn save(&mut self, quiz: Quiz) -> Result<(), StoreError> {
        quiz.validate()?;
        let mut quizzes = self.read()?;
        upsert(&mut quizzes, quiz);
        self.write(&quizzes)
    }

    fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let mut quizzes = self.read()?;
        let before = quizzes.len();
        quizzes.retain(|q| q.id != id);
        let removed = quizzes.len() != before;
        if removed {
            self.write(&quizzes)?;
        }
        Ok(removed)
    }
}
