// Sandbox worker: hosts one submission per process
//
// Reads protocol requests from stdin, answers on stdout, logs to stderr.
// Spawned by the process backend with a cleared environment.

use recoder_validator::engine::{CompiledProgram, EngineError, ExecutionEngine};
use recoder_validator::protocol::{decode_line, encode_line, WorkerRequest, WorkerResponse};
use recoder_validator::sandbox::EmbeddedEngine;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout belongs to the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    debug!(pid = std::process::id(), "Worker booting");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut program: Option<Box<dyn CompiledProgram>> = None;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match decode_line::<WorkerRequest>(&line) {
            Ok(request) => handle(request, &mut program).await,
            Err(e) => WorkerResponse::Failed { error: e },
        };

        let terminal = response.is_terminal();
        respond(&mut stdout, &response).await?;

        if terminal {
            info!("Worker stopping after fatal failure");
            break;
        }
    }

    debug!("Worker exiting");
    // Abandoned sandbox threads may still be spinning; do not wait for them
    std::process::exit(0);
}

async fn handle(
    request: WorkerRequest,
    program: &mut Option<Box<dyn CompiledProgram>>,
) -> WorkerResponse {
    match request {
        WorkerRequest::Compile {
            source,
            entry,
            limits,
        } => {
            if program.is_some() {
                return WorkerResponse::Failed {
                    error: EngineError::Protocol("worker already holds a program".to_string()),
                };
            }

            match EmbeddedEngine::new(limits).compile(&source, &entry).await {
                Ok(compiled) => {
                    debug!(entry = %entry, "Compiled");
                    *program = Some(compiled);
                    WorkerResponse::Compiled
                }
                Err(error) => WorkerResponse::Failed { error },
            }
        }
        WorkerRequest::Invoke { args, timeout_ms } => match program.as_mut() {
            Some(compiled) => {
                let outcome = compiled
                    .invoke(&args, Duration::from_millis(timeout_ms))
                    .await;
                if let Err(e) = &outcome {
                    if e.is_fatal() {
                        warn!(error = %e, "Invocation failed fatally");
                    }
                }
                WorkerResponse::from_invocation(outcome)
            }
            None => WorkerResponse::Failed {
                error: EngineError::Protocol("invoke before compile".to_string()),
            },
        },
    }
}

async fn respond(stdout: &mut Stdout, response: &WorkerResponse) -> anyhow::Result<()> {
    let line = encode_line(response)?;
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
