//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// Every variant is fatal for the import that raised it. Nothing in the
/// engine retries or rolls back.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a CLI operation as printed with `--json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Attach a context entry
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.success);
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_from_result() {
        let err: Result<i32> = Err(Error::validation("Duplicate CSV headers"));
        let result: OperationResult<i32> = err.into();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Validation error"));
    }

    #[test]
    fn test_with_context() {
        let result = OperationResult::ok(1).with_context("file", serde_json::json!("a.csv"));
        let context = result.context.unwrap();
        assert_eq!(context["file"], serde_json::json!("a.csv"));
    }
}
