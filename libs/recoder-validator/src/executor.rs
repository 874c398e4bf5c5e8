/// Validation Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Coordinate extraction, the execution engine and the evaluator to turn
/// one submission plus one challenge's test cases into a ValidationResult.
///
/// **Pipeline:**
/// 1. Guardrails and entry-point extraction (whole-run failures)
/// 2. Compile once through the configured engine (whole-run failure)
/// 3. Invoke per case, in order; case failures stay local
/// 4. After a fatal engine error the remaining cases are marked not run
/// 5. Aggregate
///
/// This module is the glue layer - it knows nothing about:
/// - How code executes (engine's job)
/// - How outputs are compared (evaluator's job)

use crate::config::ValidatorConfig;
use crate::engine::{EngineError, ExecutionEngine};
use crate::evaluator::{self, CaseOutcome};
use crate::extractor;
use recoder_common::types::{TestCase, ValidationResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct Validator {
    engine: Arc<dyn ExecutionEngine>,
    case_timeout: Duration,
    max_source_bytes: usize,
}

impl Validator {
    pub fn new(engine: Arc<dyn ExecutionEngine>, config: &ValidatorConfig) -> Self {
        Self {
            engine,
            case_timeout: config.case_timeout,
            max_source_bytes: config.max_source_bytes,
        }
    }

    /// Validator with the backend named in `config`
    pub fn from_config(config: &ValidatorConfig) -> Self {
        Self::new(config.build_engine(), config)
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Run `source` against `test_cases`
    ///
    /// Never fails: every problem is reported inside the ValidationResult,
    /// either as a whole-run `error` or as a per-case error.
    #[instrument(
        skip_all,
        fields(
            run_id = %uuid::Uuid::new_v4(),
            engine = self.engine.name(),
            cases = test_cases.len(),
        )
    )]
    pub async fn validate(&self, source: &str, test_cases: &[TestCase]) -> ValidationResult {
        let total = test_cases.len();
        let start = Instant::now();

        // Whole-run failures: nothing is evaluated
        if source.len() > self.max_source_bytes {
            return ValidationResult::failed(
                total,
                format!(
                    "Source code exceeds maximum size of {} bytes",
                    self.max_source_bytes
                ),
            );
        }

        let entry = match extractor::entry_point(source) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("No entry point found");
                return ValidationResult::failed(total, e.to_string());
            }
        };

        let mut program = match self.engine.compile(source, &entry).await {
            Ok(program) => program,
            Err(e) => {
                debug!(entry = %entry, error = %e, "Compilation failed");
                return ValidationResult::failed(total, e.to_string());
            }
        };

        let mut results = Vec::with_capacity(total);
        let mut halted: Option<EngineError> = None;

        for (idx, test_case) in test_cases.iter().enumerate() {
            let outcome = match halted.as_ref().map(not_run_reason) {
                Some(reason) => CaseOutcome::NotRun(reason),
                None => {
                    let case_start = Instant::now();
                    let outcome = program.invoke(&test_case.input, self.case_timeout).await;

                    debug!(
                        case = idx + 1,
                        ok = outcome.is_ok(),
                        execution_ms = case_start.elapsed().as_millis() as u64,
                        "Case executed"
                    );

                    if let Err(e) = &outcome {
                        if e.is_fatal() {
                            halted = Some(e.clone());
                        }
                    }
                    CaseOutcome::from(outcome)
                }
            };

            results.push(evaluator::evaluate_case(outcome, test_case));
        }

        let result = evaluator::aggregate_results(results);

        debug!(
            entry = %entry,
            passed = result.passed_count,
            total = result.total_count,
            execution_ms = start.elapsed().as_millis() as u64,
            "Validation complete"
        );

        result
    }
}

fn not_run_reason(cause: &EngineError) -> String {
    match cause {
        EngineError::TimeLimitExceeded => {
            "not run: an earlier case exceeded the time limit".to_string()
        }
        other => format!("not run: execution stopped after an earlier failure ({})", other),
    }
}
