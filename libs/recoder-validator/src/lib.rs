pub mod config;
pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod extractor;
pub mod harness;
pub mod process;
pub mod protocol;
pub mod sandbox;

mod validator_tests;

pub use config::{Backend, ValidatorConfig};
pub use engine::{CompiledProgram, EngineError, EngineLimits, ExecutionEngine};
pub use executor::Validator;

use recoder_common::types::{TestCase, ValidationResult};

/// Validate with the default embedded engine
pub async fn validate(source: &str, test_cases: &[TestCase]) -> ValidationResult {
    Validator::from_config(&ValidatorConfig::default())
        .validate(source, test_cases)
        .await
}
