// Challenge catalog and day-indexed selection
use crate::types::Challenge;
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../data/challenges.json");

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("catalog contains no challenges")]
    Empty,

    #[error("duplicate challenge id '{0}'")]
    DuplicateId(String),

    #[error("challenge '{0}' has no test cases")]
    NoTestCases(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    challenges: Vec<Challenge>,
}

/// Static, validated list of puzzles
#[derive(Debug, Clone)]
pub struct ChallengeCatalog {
    challenges: Vec<Challenge>,
}

impl ChallengeCatalog {
    /// The catalog compiled into the binary
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Load a catalog from a JSON file shaped like `data/challenges.json`
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load from `path` when given, otherwise fall back to the built-in catalog
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(content)?;
        Self::new(file.challenges)
    }

    pub fn new(challenges: Vec<Challenge>) -> Result<Self, CatalogError> {
        if challenges.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for challenge in &challenges {
            if !seen.insert(challenge.id.as_str()) {
                return Err(CatalogError::DuplicateId(challenge.id.clone()));
            }
            // A zero-case challenge would trivially validate as solved
            if challenge.test_cases.is_empty() {
                return Err(CatalogError::NoTestCases(challenge.id.clone()));
            }
        }

        Ok(Self { challenges })
    }

    pub fn get(&self, id: &str) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.id == id)
    }

    pub fn all(&self) -> &[Challenge] {
        &self.challenges
    }

    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }

    /// Challenge for `date`: day-of-year modulo catalog size
    pub fn daily(&self, date: NaiveDate) -> &Challenge {
        let index = date.ordinal() as usize % self.challenges.len();
        &self.challenges[index]
    }

    pub fn today(&self) -> &Challenge {
        self.daily(today())
    }

    pub fn is_daily(&self, id: &str, date: NaiveDate) -> bool {
        self.daily(date).id == id
    }
}

/// Current calendar day in UTC. Progress dates use the same clock.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Puzzle number shown to players
pub fn day_number(date: NaiveDate) -> u32 {
    date.ordinal()
}
