/// Embedded execution engine backed by the Boa JavaScript interpreter
///
/// **Execution Rules:**
/// 1. Each compiled program owns one dedicated sandbox thread and one Boa
///    `Context`; nothing is shared between validation runs
/// 2. The context has no network, storage or timer capabilities
/// 3. Loop iterations and recursion depth are capped inside the interpreter;
///    a blown call stack is an ordinary runtime error, a blown loop budget
///    counts against the time limit
/// 4. Every invocation is awaited with a hard wall-clock timeout
/// 5. On timeout the thread is abandoned: the request channel is dropped so
///    the thread exits as soon as the interpreter gives control back
///
/// Boa contexts are not `Send`, so the context never leaves its thread.
/// Requests travel over a channel; replies come back on oneshot channels.

use crate::engine::{CompiledProgram, EngineError, EngineLimits, ExecutionEngine};
use crate::harness;
use async_trait::async_trait;
use boa_engine::error::JsNativeErrorKind;
use boa_engine::{Context, JsError, JsObject, JsString, JsValue, Source};
use serde_json::Value;
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Reply = oneshot::Sender<Result<Option<Value>, EngineError>>;

struct InvokeRequest {
    args_json: String,
    reply: Reply,
}

#[derive(Debug, Clone, Default)]
pub struct EmbeddedEngine {
    limits: EngineLimits,
}

impl EmbeddedEngine {
    pub fn new(limits: EngineLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }
}

#[async_trait]
impl ExecutionEngine for EmbeddedEngine {
    fn name(&self) -> &'static str {
        "embedded"
    }

    async fn compile(
        &self,
        source: &str,
        entry: &str,
    ) -> Result<Box<dyn CompiledProgram>, EngineError> {
        let script = harness::build(source, entry);
        let limits = self.limits.clone();
        let (requests_tx, requests_rx) = mpsc::channel::<InvokeRequest>();
        let (ready_tx, ready_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("recoder-sandbox".to_string())
            .stack_size(limits.stack_size_bytes)
            .spawn(move || sandbox_main(script, limits, ready_tx, requests_rx))
            .map_err(|e| EngineError::Unavailable(format!("failed to start sandbox thread: {}", e)))?;

        match tokio::time::timeout(self.limits.compile_timeout(), ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(Box::new(SandboxProgram {
                requests: Some(requests_tx),
            })),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(EngineError::Crashed(
                "sandbox thread exited while compiling".to_string(),
            )),
            Err(_) => {
                warn!(
                    timeout_ms = self.limits.compile_timeout_ms,
                    "Compilation exceeded time limit"
                );
                Err(EngineError::Compile(format!(
                    "compilation exceeded {}ms",
                    self.limits.compile_timeout_ms
                )))
            }
        }
    }
}

/// Handle to a running sandbox thread
struct SandboxProgram {
    /// `None` once the thread has been abandoned
    requests: Option<mpsc::Sender<InvokeRequest>>,
}

#[async_trait]
impl CompiledProgram for SandboxProgram {
    async fn invoke(
        &mut self,
        args: &[Value],
        timeout: Duration,
    ) -> Result<Option<Value>, EngineError> {
        let requests = self.requests.as_ref().ok_or_else(|| {
            EngineError::Crashed("sandbox was stopped by an earlier failure".to_string())
        })?;

        // Serialized here, re-parsed inside the interpreter: the submission
        // only ever sees its own copy of the arguments
        let args_json = serde_json::to_string(args).map_err(|e| EngineError::Marshal(e.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        if requests
            .send(InvokeRequest {
                args_json,
                reply: reply_tx,
            })
            .is_err()
        {
            self.requests = None;
            return Err(EngineError::Crashed("sandbox thread is gone".to_string()));
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                self.requests = None;
                Err(EngineError::Crashed(
                    "sandbox thread exited during invocation".to_string(),
                ))
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Invocation exceeded wall-clock limit; abandoning sandbox"
                );
                self.requests = None;
                Err(EngineError::TimeLimitExceeded)
            }
        }
    }
}

/// Body of the sandbox thread
fn sandbox_main(
    script: String,
    limits: EngineLimits,
    ready: oneshot::Sender<Result<(), EngineError>>,
    requests: mpsc::Receiver<InvokeRequest>,
) {
    let mut context = Context::default();
    context
        .runtime_limits_mut()
        .set_loop_iteration_limit(limits.loop_iteration_limit);
    context
        .runtime_limits_mut()
        .set_recursion_limit(limits.recursion_limit);
    context
        .runtime_limits_mut()
        .set_stack_size_limit(limits.value_stack_limit);

    let callable = match build_callable(&script, &mut context) {
        Ok(callable) => callable,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok(())).is_err() {
        // Caller gave up waiting
        return;
    }

    while let Ok(request) = requests.recv() {
        let outcome = call(&callable, &request.args_json, &mut context);
        // A dropped receiver means the caller timed out; keep serving until
        // the request channel closes
        let _ = request.reply.send(outcome);
    }

    debug!("Sandbox thread exiting");
}

fn build_callable(script: &str, context: &mut Context) -> Result<JsObject, EngineError> {
    let value = context
        .eval(Source::from_bytes(script.as_bytes()))
        .map_err(|e| EngineError::Compile(describe(&e)))?;

    value
        .as_callable()
        .cloned()
        .ok_or_else(|| EngineError::Compile("submission did not produce a callable".to_string()))
}

fn call(callable: &JsObject, args_json: &str, context: &mut Context) -> Result<Option<Value>, EngineError> {
    let arg = JsValue::from(JsString::from(args_json));

    match callable.call(&JsValue::undefined(), &[arg], context) {
        Ok(envelope) => match envelope.as_string() {
            Some(text) => harness::decode(&text.to_std_string_escaped()),
            None => Err(EngineError::Marshal(
                "sandbox returned a non-string envelope".to_string(),
            )),
        },
        // Only errors the harness cannot catch arrive here
        Err(e) => Err(classify(&e)),
    }
}

pub(crate) const STACK_OVERFLOW: &str = "Maximum call stack size exceeded";

/// Loop budgets stand in for CPU time; depth and value-stack limits are
/// what a browser reports as a stack overflow.
fn classify(error: &JsError) -> EngineError {
    let Some(native) = error.as_native() else {
        return EngineError::Runtime(describe(error));
    };
    if !matches!(native.kind, JsNativeErrorKind::RuntimeLimit) {
        return EngineError::Runtime(describe(error));
    }
    if native.message().contains("loop iteration") {
        EngineError::ResourceLimit(describe(error))
    } else {
        EngineError::Runtime(STACK_OVERFLOW.to_string())
    }
}

fn describe(error: &JsError) -> String {
    let message = error
        .as_native()
        .map(|native| native.message().to_string())
        .unwrap_or_default();
    if message.is_empty() {
        error.to_string()
    } else {
        message
    }
}
