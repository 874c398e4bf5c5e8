// Validator configuration, read from the environment at start-up
use crate::engine::{EngineLimits, ExecutionEngine};
use crate::process::ProcessEngine;
use crate::sandbox::EmbeddedEngine;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub const WORKER_BINARY: &str = "recoder-worker";

/// Which execution backend runs submissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Interpreter thread inside the calling process
    Embedded,
    /// One `recoder-worker` process per validation run
    Process { worker_path: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub backend: Backend,
    /// Wall-clock budget per test case
    pub case_timeout: Duration,
    /// Submissions larger than this are rejected before compilation
    pub max_source_bytes: usize,
    pub limits: EngineLimits,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Embedded,
            case_timeout: Duration::from_millis(2_000),
            max_source_bytes: 64 * 1024,
            limits: EngineLimits::default(),
        }
    }
}

impl ValidatorConfig {
    /// Local tooling: embedded unless `RECODER_BACKEND` says otherwise
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Long-running servers: process-backed unless `RECODER_BACKEND` says
    /// otherwise. An abandoned sandbox thread keeps its CPU; a worker is killed.
    pub fn server_from_env() -> Result<Self> {
        Self::server_from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::resolve(lookup, "embedded")
    }

    pub fn server_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::resolve(lookup, "process")
    }

    fn resolve(lookup: impl Fn(&str) -> Option<String>, default_backend: &str) -> Result<Self> {
        let defaults = Self::default();

        let name = lookup("RECODER_BACKEND")
            .map(|name| name.to_lowercase())
            .unwrap_or_else(|| default_backend.to_string());
        let backend = match name.as_str() {
            "embedded" => Backend::Embedded,
            "process" => Backend::Process {
                worker_path: match lookup("RECODER_WORKER_PATH") {
                    Some(path) => PathBuf::from(path),
                    None => default_worker_path()?,
                },
            },
            other => bail!(
                "Invalid RECODER_BACKEND '{}'. Valid options: embedded, process",
                other
            ),
        };

        let case_timeout_ms = parse_or(&lookup, "RECODER_CASE_TIMEOUT_MS", defaults.case_timeout.as_millis() as u64)?;
        if case_timeout_ms == 0 {
            bail!("RECODER_CASE_TIMEOUT_MS must be greater than zero");
        }

        Ok(Self {
            backend,
            case_timeout: Duration::from_millis(case_timeout_ms),
            max_source_bytes: parse_or(&lookup, "RECODER_MAX_SOURCE_BYTES", defaults.max_source_bytes)?,
            limits: EngineLimits {
                loop_iteration_limit: parse_or(
                    &lookup,
                    "RECODER_LOOP_LIMIT",
                    defaults.limits.loop_iteration_limit,
                )?,
                recursion_limit: parse_or(
                    &lookup,
                    "RECODER_RECURSION_LIMIT",
                    defaults.limits.recursion_limit,
                )?,
                value_stack_limit: parse_or(
                    &lookup,
                    "RECODER_VALUE_STACK_LIMIT",
                    defaults.limits.value_stack_limit,
                )?,
                compile_timeout_ms: parse_or(
                    &lookup,
                    "RECODER_COMPILE_TIMEOUT_MS",
                    defaults.limits.compile_timeout_ms,
                )?,
                ..defaults.limits
            },
        })
    }

    /// Instantiate the configured backend
    pub fn build_engine(&self) -> Arc<dyn ExecutionEngine> {
        match &self.backend {
            Backend::Embedded => Arc::new(EmbeddedEngine::new(self.limits.clone())),
            Backend::Process { worker_path } => {
                Arc::new(ProcessEngine::new(worker_path.clone(), self.limits.clone()))
            }
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

/// `recoder-worker` next to the running executable
fn default_worker_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate current executable")?;
    let dir = exe
        .parent()
        .context("Current executable has no parent directory")?;
    Ok(dir.join(format!("{}{}", WORKER_BINARY, std::env::consts::EXE_SUFFIX)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.backend, Backend::Embedded);
        assert_eq!(config.case_timeout, Duration::from_millis(2_000));
        assert_eq!(config.limits, EngineLimits::default());
    }

    #[test]
    fn test_process_backend_with_path() {
        let config = ValidatorConfig::from_lookup(lookup_from(&[
            ("RECODER_BACKEND", "Process"),
            ("RECODER_WORKER_PATH", "/opt/recoder/recoder-worker"),
            ("RECODER_CASE_TIMEOUT_MS", "750"),
            ("RECODER_LOOP_LIMIT", "1000"),
        ]))
        .unwrap();

        assert_eq!(
            config.backend,
            Backend::Process {
                worker_path: PathBuf::from("/opt/recoder/recoder-worker")
            }
        );
        assert_eq!(config.case_timeout, Duration::from_millis(750));
        assert_eq!(config.limits.loop_iteration_limit, 1000);
        assert_eq!(config.build_engine().name(), "process");
    }

    #[test]
    fn test_process_backend_default_path() {
        let config = ValidatorConfig::from_lookup(lookup_from(&[("RECODER_BACKEND", "process")])).unwrap();
        match config.backend {
            Backend::Process { worker_path } => {
                assert!(worker_path
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .starts_with(WORKER_BINARY));
            }
            other => panic!("unexpected backend {:?}", other),
        }
    }

    #[test]
    fn test_server_defaults_to_process_backend() {
        let config = ValidatorConfig::server_from_lookup(lookup_from(&[(
            "RECODER_WORKER_PATH",
            "/opt/recoder/recoder-worker",
        )]))
        .unwrap();
        assert_eq!(
            config.backend,
            Backend::Process {
                worker_path: PathBuf::from("/opt/recoder/recoder-worker")
            }
        );
        assert_eq!(config.build_engine().name(), "process");

        let embedded =
            ValidatorConfig::server_from_lookup(lookup_from(&[("RECODER_BACKEND", "embedded")])).unwrap();
        assert_eq!(embedded.backend, Backend::Embedded);
    }

    #[test]
    fn test_stack_limits_from_env() {
        let config = ValidatorConfig::from_lookup(lookup_from(&[
            ("RECODER_RECURSION_LIMIT", "2000"),
            ("RECODER_VALUE_STACK_LIMIT", "65536"),
        ]))
        .unwrap();
        assert_eq!(config.limits.recursion_limit, 2000);
        assert_eq!(config.limits.value_stack_limit, 65536);
    }

    #[test]
    fn test_rejects_unknown_backend() {
        let err = ValidatorConfig::from_lookup(lookup_from(&[("RECODER_BACKEND", "docker")])).unwrap_err();
        assert!(err.to_string().contains("docker"));
    }

    #[test]
    fn test_rejects_bad_numbers() {
        assert!(ValidatorConfig::from_lookup(lookup_from(&[("RECODER_LOOP_LIMIT", "lots")])).is_err());
        assert!(ValidatorConfig::from_lookup(lookup_from(&[("RECODER_CASE_TIMEOUT_MS", "0")])).is_err());
    }
}
