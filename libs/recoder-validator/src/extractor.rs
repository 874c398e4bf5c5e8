/// Function Extractor
///
/// Locates the entry point of a submission: the first
/// `function <identifier>(` declaration in the source text. Later
/// declarations are allowed (helpers) but only the first name is invoked.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DECLARATION: Regex =
        Regex::new(r"function\s+([a-zA-Z0-9_]+)\s*\(").expect("declaration pattern is valid");
    static ref SIGNATURE: Regex = Regex::new(r"function\s+[a-zA-Z0-9_]+\s*\(([^)]*)\)")
        .expect("signature pattern is valid");
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("Could not find a valid function declaration in the code.")]
    NoFunctionDeclaration,
}

/// Name of the function the validator will call
pub fn entry_point(source: &str) -> Result<String, ExtractError> {
    DECLARATION
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
        .ok_or(ExtractError::NoFunctionDeclaration)
}

/// Declared parameter names of the entry function, used to label inputs
pub fn parameter_names(source: &str) -> Vec<String> {
    SIGNATURE
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|params| {
            params
                .as_str()
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Label for the input at `index`: the parameter name when known,
/// otherwise `param<N>` (1-based)
pub fn input_label(parameter_names: &[String], index: usize) -> String {
    parameter_names
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("param{}", index + 1))
}
