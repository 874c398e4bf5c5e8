// Worker protocol: one JSON object per line on the worker's stdin/stdout
//
// compile  -> compiled | failed
// invoke   -> returned | failed
//
// A worker that answers `failed` with `time_limit_exceeded` exits right
// after writing the response.

use crate::engine::{EngineError, EngineLimits};
use recoder_common::types::present;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    Compile {
        source: String,
        entry: String,
        limits: EngineLimits,
    },
    #[serde(rename_all = "camelCase")]
    Invoke { args: Vec<Value>, timeout_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    Compiled,
    Returned {
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "present"
        )]
        value: Option<Value>,
    },
    Failed {
        error: EngineError,
    },
}

impl WorkerResponse {
    pub fn from_invocation(outcome: Result<Option<Value>, EngineError>) -> Self {
        match outcome {
            Ok(value) => WorkerResponse::Returned { value },
            Err(error) => WorkerResponse::Failed { error },
        }
    }

    /// The worker stops serving after writing this response
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerResponse::Failed { error } if error.is_fatal())
    }
}

/// Encode as a single protocol line, newline included
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, EngineError> {
    let mut line = serde_json::to_string(message).map_err(|e| EngineError::Marshal(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T, EngineError> {
    serde_json::from_str(line.trim_end()).map_err(|e| EngineError::Protocol(e.to_string()))
}
