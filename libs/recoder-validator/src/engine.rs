/// Execution Engine - Abstraction for Code Execution
///
/// **Core Responsibility:**
/// Compile a submission once, then invoke its entry function with
/// positional arguments and hand back the raw return value.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute (embedded interpreter, worker process)
/// - Engine does NOT know expected outputs
/// - Engine does NOT decide pass/fail
/// - Engine returns raw values for the Evaluator to judge
///
/// Return values cross the boundary as their JSON projection: `None` is a
/// value JSON cannot represent (`undefined`, a function).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Failure taxonomy shared by every backend and by the worker protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum EngineError {
    /// Source could not be evaluated at all (syntax error)
    #[error("{0}")]
    Compile(String),

    /// The submission threw; carries the exception message
    #[error("{0}")]
    Runtime(String),

    /// Instruction budget (loop iterations, recursion depth) exhausted.
    /// The program is still usable for later cases.
    #[error("time limit exceeded: {0}")]
    ResourceLimit(String),

    /// Wall-clock budget exhausted; the program has been abandoned
    #[error("time limit exceeded")]
    TimeLimitExceeded,

    #[error("failed to marshal values: {0}")]
    Marshal(String),

    #[error("execution backend crashed: {0}")]
    Crashed(String),

    #[error("execution backend unavailable: {0}")]
    Unavailable(String),

    #[error("execution backend protocol error: {0}")]
    Protocol(String),
}

impl EngineError {
    /// After a fatal error the compiled program cannot run further cases
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::TimeLimitExceeded | EngineError::Crashed(_) | EngineError::Protocol(_)
        )
    }

    pub fn is_time_limit(&self) -> bool {
        matches!(
            self,
            EngineError::TimeLimitExceeded | EngineError::ResourceLimit(_)
        )
    }
}

/// Interpreter budgets applied inside the sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineLimits {
    /// Iterations a single loop may run before it is aborted
    pub loop_iteration_limit: u64,
    /// Maximum call depth
    pub recursion_limit: usize,
    /// Interpreter value-stack slots shared by all frames
    pub value_stack_limit: usize,
    /// Native stack for the sandbox thread
    pub stack_size_bytes: usize,
    /// Wall-clock budget for building the callable
    pub compile_timeout_ms: u64,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            loop_iteration_limit: 25_000_000,
            recursion_limit: 10_000,
            value_stack_limit: 1 << 20,
            stack_size_bytes: 64 * 1024 * 1024,
            compile_timeout_ms: 5_000,
        }
    }
}

impl EngineLimits {
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_millis(self.compile_timeout_ms)
    }
}

/// A pluggable execution backend
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Short backend name for logs and metrics
    fn name(&self) -> &'static str;

    /// Build a callable for `entry` out of `source`. Parsing cost is paid
    /// here, once per validation run.
    async fn compile(
        &self,
        source: &str,
        entry: &str,
    ) -> Result<Box<dyn CompiledProgram>, EngineError>;
}

/// A submission ready to be called repeatedly
#[async_trait]
pub trait CompiledProgram: Send {
    /// Call the entry function with `args` bound positionally. Each call
    /// starts from a fresh function scope and a private copy of `args`.
    async fn invoke(
        &mut self,
        args: &[Value],
        timeout: Duration,
    ) -> Result<Option<Value>, EngineError>;
}
