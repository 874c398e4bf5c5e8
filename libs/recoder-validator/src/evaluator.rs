/// Test Evaluator - Comparison and Aggregation
///
/// **Core Responsibility:**
/// Turn raw invocation outcomes into per-case results and a run summary.
///
/// **Critical Properties:**
/// - Knows nothing about interpreters, threads or worker processes
/// - Pure function: (outcome, test case) → case result
///
/// **Comparison Rules:**
/// - Values are compared by their JSON projection, never by identity
/// - Arrays: same length, element-wise equal, order matters
/// - Objects: same key set, value-wise equal, key order ignored
/// - Numbers: compared numerically (`5` equals `5.0`)
/// - A return value with no JSON projection (`undefined`) never matches

use crate::engine::EngineError;
use recoder_common::types::{CaseResult, CaseStatus, TestCase, ValidationResult};
use serde_json::Value;

/// What happened when one case was run
#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    /// The function returned; `None` when the value has no JSON projection
    Returned(Option<Value>),
    /// The function (or the engine on its behalf) failed
    Failed(EngineError),
    /// Skipped because an earlier case left the engine unusable
    NotRun(String),
}

impl From<Result<Option<Value>, EngineError>> for CaseOutcome {
    fn from(result: Result<Option<Value>, EngineError>) -> Self {
        match result {
            Ok(value) => CaseOutcome::Returned(value),
            Err(error) => CaseOutcome::Failed(error),
        }
    }
}

/// Deep structural equality over JSON values
pub fn json_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).map_or(false, |y| json_equal(x, y)))
        }
        _ => actual == expected,
    }
}

/// Evaluate a single case
///
/// Priority: engine failure > skipped > output comparison
pub fn evaluate_case(outcome: CaseOutcome, test_case: &TestCase) -> CaseResult {
    let (status, actual, error) = match outcome {
        CaseOutcome::Returned(actual) => {
            let passed = actual
                .as_ref()
                .map_or(false, |value| json_equal(value, &test_case.expected_output));
            let status = if passed {
                CaseStatus::Passed
            } else {
                CaseStatus::WrongAnswer
            };
            (status, actual, None)
        }
        CaseOutcome::Failed(error) => {
            let status = if error.is_time_limit() {
                CaseStatus::TimeLimitExceeded
            } else {
                CaseStatus::RuntimeError
            };
            (status, None, Some(error.to_string()))
        }
        CaseOutcome::NotRun(reason) => (CaseStatus::NotRun, None, Some(reason)),
    };

    CaseResult {
        passed: status == CaseStatus::Passed,
        status,
        input: test_case.input.clone(),
        expected: test_case.expected_output.clone(),
        actual,
        error,
    }
}

/// Aggregate per-case results into the run summary
///
/// `success` requires every case to pass and at least one case to exist.
pub fn aggregate_results(results: Vec<CaseResult>) -> ValidationResult {
    let total_count = results.len();
    let passed_count = results.iter().filter(|r| r.passed).count();

    ValidationResult {
        success: total_count > 0 && passed_count == total_count,
        passed_count,
        total_count,
        error: None,
        results,
    }
}
