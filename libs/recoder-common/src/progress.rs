// Streak and completion tracking
//
// The date arithmetic is pure; persistence goes through `ProgressStore`.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("progress storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("progress record is malformed: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("progress record kept changing; gave up after {0} attempts")]
    Contention(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    #[serde(default)]
    pub last_completed_date: Option<NaiveDate>,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default, alias = "completedChallenges")]
    pub completed_challenge_ids: BTreeSet<String>,
}

impl ProgressRecord {
    /// Apply a completion of `challenge_id` on `today`
    ///
    /// - first completion ever: streak = 1
    /// - day after the last completion: streak + 1
    /// - any later day: streak resets to 1
    /// - same day: streak unchanged
    /// - `today` before the last completion (clock skew): record unchanged
    pub fn record_completion(&self, challenge_id: &str, today: NaiveDate) -> ProgressRecord {
        let current_streak = match self.last_completed_date {
            None => 1,
            Some(last) => match (today - last).num_days() {
                days if days < 0 => return self.clone(),
                0 => self.current_streak,
                1 => self.current_streak.saturating_add(1),
                _ => 1,
            },
        };

        let mut completed_challenge_ids = self.completed_challenge_ids.clone();
        completed_challenge_ids.insert(challenge_id.to_string());

        ProgressRecord {
            last_completed_date: Some(today),
            current_streak,
            completed_challenge_ids,
        }
    }

    pub fn is_completed_on(&self, today: NaiveDate) -> bool {
        self.last_completed_date == Some(today)
    }

    /// Streak as it stands today: a streak whose last day is older than
    /// yesterday is already broken.
    pub fn effective_streak(&self, today: NaiveDate) -> u32 {
        match self.last_completed_date {
            Some(last) if matches!((today - last).num_days(), 0 | 1) => self.current_streak,
            _ => 0,
        }
    }

    pub fn has_completed(&self, challenge_id: &str) -> bool {
        self.completed_challenge_ids.contains(challenge_id)
    }
}

/// Injected persistence for a single player's record
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Missing records load as `ProgressRecord::default()`
    async fn load(&self) -> Result<ProgressRecord, ProgressError>;

    async fn save(&self, record: &ProgressRecord) -> Result<(), ProgressError>;

    /// Read, apply `change` and write back as one step, returning the
    /// record as stored. Stores shared between writers override this; the
    /// default is only safe with a single writer.
    async fn update(
        &self,
        change: &(dyn for<'a> Fn(&'a ProgressRecord) -> ProgressRecord + Send + Sync),
    ) -> Result<ProgressRecord, ProgressError> {
        let current = self.load().await?;
        let updated = change(&current);
        if updated != current {
            self.save(&updated).await?;
        }
        Ok(updated)
    }
}

/// Consumes validation outcomes and updates the store
pub struct ProgressTracker<S> {
    store: S,
}

impl<S: ProgressStore> ProgressTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn progress(&self) -> Result<ProgressRecord, ProgressError> {
        self.store.load().await
    }

    /// Record a validation outcome. Only successful runs change anything;
    /// returns the updated record when one was written.
    pub async fn record_result(
        &self,
        challenge_id: &str,
        success: bool,
        today: NaiveDate,
    ) -> Result<Option<ProgressRecord>, ProgressError> {
        if !success {
            return Ok(None);
        }

        let updated = self
            .store
            .update(&|current: &ProgressRecord| current.record_completion(challenge_id, today))
            .await?;
        Ok(Some(updated))
    }

    pub async fn is_completed_on(&self, today: NaiveDate) -> Result<bool, ProgressError> {
        Ok(self.store.load().await?.is_completed_on(today))
    }
}

#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    record: Mutex<ProgressRecord>,
}

impl MemoryProgressStore {
    pub fn new(record: ProgressRecord) -> Self {
        Self {
            record: Mutex::new(record),
        }
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn load(&self) -> Result<ProgressRecord, ProgressError> {
        Ok(self.record.lock().await.clone())
    }

    async fn save(&self, record: &ProgressRecord) -> Result<(), ProgressError> {
        *self.record.lock().await = record.clone();
        Ok(())
    }

    async fn update(
        &self,
        change: &(dyn for<'a> Fn(&'a ProgressRecord) -> ProgressRecord + Send + Sync),
    ) -> Result<ProgressRecord, ProgressError> {
        let mut record = self.record.lock().await;
        *record = change(&*record);
        Ok(record.clone())
    }
}

/// JSON file on disk, used by the CLI
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    path: PathBuf,
}

impl FileProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl ProgressStore for FileProgressStore {
    async fn load(&self) -> Result<ProgressRecord, ProgressError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProgressRecord::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, record: &ProgressRecord) -> Result<(), ProgressError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}
