// Process-level settings shared by the API and CLI

use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Progress persistence is disabled when unset
    pub redis_url: Option<String>,
    pub bind_addr: String,
    /// Custom catalog file; the built-in catalog is used when unset
    pub catalog_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let log_format = match lookup("RECODER_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            bind_addr: lookup("RECODER_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            catalog_path: lookup("RECODER_CATALOG").map(PathBuf::from),
            log_format,
        }
    }
}
