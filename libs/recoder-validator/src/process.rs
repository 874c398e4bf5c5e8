/// Out-of-process execution engine
///
/// Runs each submission inside its own `recoder-worker` process, which hosts
/// an embedded engine and speaks the JSON-lines protocol in `protocol.rs`.
///
/// **Isolation Rules:**
/// - The worker starts with a cleared environment (only `RUST_LOG` is passed on)
/// - The worker's stdin/stdout carry the protocol, stderr carries its logs
/// - Every round trip has a hard deadline; on expiry the worker is killed
/// - `kill_on_drop` guarantees no worker outlives its program handle

use crate::engine::{CompiledProgram, EngineError, EngineLimits, ExecutionEngine};
use crate::protocol::{decode_line, encode_line, WorkerRequest, WorkerResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// Extra time granted to the worker to report its own timeout before it is killed
const KILL_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ProcessEngine {
    worker_path: PathBuf,
    limits: EngineLimits,
}

impl ProcessEngine {
    pub fn new(worker_path: impl Into<PathBuf>, limits: EngineLimits) -> Self {
        Self {
            worker_path: worker_path.into(),
            limits,
        }
    }

    pub fn worker_path(&self) -> &std::path::Path {
        &self.worker_path
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.worker_path);
        command
            .env_clear()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Ok(filter) = std::env::var("RUST_LOG") {
            command.env("RUST_LOG", filter);
        }
        command
    }
}

#[async_trait]
impl ExecutionEngine for ProcessEngine {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn compile(
        &self,
        source: &str,
        entry: &str,
    ) -> Result<Box<dyn CompiledProgram>, EngineError> {
        let program = self.spawn(source, entry).await?;
        Ok(Box::new(program))
    }
}

impl ProcessEngine {
    /// Start a worker and compile `source` inside it
    pub async fn spawn(&self, source: &str, entry: &str) -> Result<WorkerProgram, EngineError> {
        let mut child = self.command().spawn().map_err(|e| {
            EngineError::Unavailable(format!(
                "failed to spawn worker {}: {}",
                self.worker_path.display(),
                e
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Unavailable("worker stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Unavailable("worker stdout not captured".to_string()))?;

        debug!(pid = child.id(), "Worker spawned");

        let mut program = WorkerProgram {
            child,
            stdin,
            responses: BufReader::new(stdout).lines(),
            halted: false,
        };

        let request = WorkerRequest::Compile {
            source: source.to_string(),
            entry: entry.to_string(),
            limits: self.limits.clone(),
        };
        let deadline = self.limits.compile_timeout() + KILL_GRACE;

        match program.round_trip(&request, deadline).await {
            Ok(WorkerResponse::Compiled) => Ok(program),
            Ok(WorkerResponse::Failed { error }) => Err(error),
            Ok(other) => Err(EngineError::Protocol(format!(
                "unexpected response to compile: {:?}",
                other
            ))),
            // A compile that never answers is reported as a build failure
            Err(EngineError::TimeLimitExceeded) => Err(EngineError::Compile(format!(
                "compilation exceeded {}ms",
                self.limits.compile_timeout_ms
            ))),
            Err(e) => Err(e),
        }
    }
}

/// A compiled submission living in its own worker process
pub struct WorkerProgram {
    child: Child,
    stdin: ChildStdin,
    responses: Lines<BufReader<ChildStdout>>,
    halted: bool,
}

impl WorkerProgram {
    /// OS pid of the worker, `None` once it has been killed and reaped
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn round_trip(
        &mut self,
        request: &WorkerRequest,
        deadline: Duration,
    ) -> Result<WorkerResponse, EngineError> {
        if self.halted {
            return Err(EngineError::Crashed(
                "worker was stopped by an earlier failure".to_string(),
            ));
        }

        let line = encode_line(request)?;
        if let Err(e) = self.write(&line).await {
            self.halt().await;
            return Err(EngineError::Crashed(format!("failed to write to worker: {}", e)));
        }

        let response = match tokio::time::timeout(deadline, self.responses.next_line()).await {
            Ok(Ok(Some(line))) => decode_line::<WorkerResponse>(&line),
            Ok(Ok(None)) => Err(EngineError::Crashed("worker exited unexpectedly".to_string())),
            Ok(Err(e)) => Err(EngineError::Crashed(format!("failed to read from worker: {}", e))),
            Err(_) => {
                warn!(
                    pid = self.child.id(),
                    deadline_ms = deadline.as_millis() as u64,
                    "Worker missed its deadline; killing"
                );
                Err(EngineError::TimeLimitExceeded)
            }
        };

        match &response {
            Err(e) if e.is_fatal() => self.halt().await,
            Ok(r) if r.is_terminal() => self.halt().await,
            _ => {}
        }

        response
    }

    async fn write(&mut self, line: &str) -> std::io::Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await
    }

    async fn halt(&mut self) {
        self.halted = true;
        if let Err(e) = self.child.kill().await {
            // Already exited is the common case here
            debug!(error = %e, "Worker kill returned an error");
        }
    }
}

#[async_trait]
impl CompiledProgram for WorkerProgram {
    async fn invoke(
        &mut self,
        args: &[Value],
        timeout: Duration,
    ) -> Result<Option<Value>, EngineError> {
        let request = WorkerRequest::Invoke {
            args: args.to_vec(),
            timeout_ms: timeout.as_millis() as u64,
        };

        match self.round_trip(&request, timeout + KILL_GRACE).await? {
            WorkerResponse::Returned { value } => Ok(value),
            WorkerResponse::Failed { error } => Err(error),
            WorkerResponse::Compiled => {
                self.halt().await;
                Err(EngineError::Protocol(
                    "unexpected compile acknowledgement".to_string(),
                ))
            }
        }
    }
}
