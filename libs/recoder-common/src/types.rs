use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single input/output pair. `input` holds the positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: Vec<Value>,
    pub expected_output: Value,
}

impl TestCase {
    pub fn new(input: Vec<Value>, expected_output: Value) -> Self {
        Self {
            input,
            expected_output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub description: String,
    pub buggy_code: String,
    pub test_cases: Vec<TestCase>,
    /// Reference solution used to self-check the catalog. Never shown to players.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,
}

/// Per-case classification, ordered the way a judge reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    WrongAnswer,
    RuntimeError,
    TimeLimitExceeded,
    NotRun,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Passed => "passed",
            CaseStatus::WrongAnswer => "wrong_answer",
            CaseStatus::RuntimeError => "runtime_error",
            CaseStatus::TimeLimitExceeded => "time_limit_exceeded",
            CaseStatus::NotRun => "not_run",
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub passed: bool,
    pub status: CaseStatus,
    pub input: Vec<Value>,
    pub expected: Value,
    /// `Some(Value::Null)` is a function that returned `null`; `None` means
    /// the return value had no JSON projection (or the case errored).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub actual: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub success: bool,
    pub passed_count: usize,
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Vec<CaseResult>,
}

impl ValidationResult {
    /// Whole-run failure: nothing was evaluated.
    pub fn failed(total_count: usize, error: impl Into<String>) -> Self {
        Self {
            success: false,
            passed_count: 0,
            total_count,
            error: Some(error.into()),
            results: Vec::new(),
        }
    }

    pub fn is_whole_run_error(&self) -> bool {
        self.error.is_some()
    }

    /// Index of the first failing case, if any
    pub fn first_failure(&self) -> Option<usize> {
        self.results.iter().position(|r| !r.passed)
    }
}

/// Deserialize a field that is present (even as `null`) into `Some`.
/// Missing fields fall back to `#[serde(default)]`.
pub fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
