//! Error types for the event engine.
//!
//! Only build-time and setup failures are errors. Anything that happens while
//! an operation runs against a particular event is reported through
//! [`OperationResult::Failure`](crate::helper::OperationResult) instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Structured error raised while turning rule text into operations.
///
/// Every variant is fatal for the rule set being loaded: it is not activated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Malformed helper invocation '{text}': {reason}")]
    MalformedInvocation { text: String, reason: String },

    #[error("Unknown operation: {name}")]
    UnknownOperation { name: String },

    #[error("Operation '{operation}' expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Operation '{operation}' argument {index} must be {expected}")]
    ArgumentKind {
        operation: String,
        index: usize,
        expected: &'static str,
    },

    #[error("Operation '{operation}' has an invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        operation: String,
        pattern: String,
        reason: String,
    },

    #[error("Invalid field path '{path}': {reason}")]
    InvalidFieldPath { path: String, reason: String },

    #[error("Invalid asset '{asset}': {reason}")]
    InvalidAsset { asset: String, reason: String },

    #[error("Invalid expression graph: {0}")]
    Graph(String),
}

impl BuildError {
    /// Name of the operation the error refers to, if any.
    pub fn operation(&self) -> Option<&str> {
        match self {
            BuildError::UnknownOperation { name } => Some(name),
            BuildError::ArityMismatch { operation, .. }
            | BuildError::ArgumentKind { operation, .. }
            | BuildError::InvalidPattern { operation, .. } => Some(operation),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Queue error: {0}")]
    Queue(String),
}

impl EngineError {
    /// Whether this error was produced while building rules.
    pub fn is_build_error(&self) -> bool {
        matches!(self, EngineError::Build(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_arity_message_carries_counts() {
        let err = BuildError::ArityMismatch {
            operation: "r_ext".to_string(),
            expected: 2,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Operation 'r_ext' expects 2 argument(s), got 3"
        );
        assert_eq!(err.operation(), Some("r_ext"));
    }

    #[test]
    fn test_argument_kind_message() {
        let err = BuildError::ArgumentKind {
            operation: "ef_append".to_string(),
            index: 0,
            expected: "a field reference",
        };
        assert_eq!(
            err.to_string(),
            "Operation 'ef_append' argument 0 must be a field reference"
        );
    }

    #[test]
    fn test_unknown_operation() {
        let err = BuildError::UnknownOperation {
            name: "nope".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown operation: nope");
        assert_eq!(err.operation(), Some("nope"));
    }

    #[test]
    fn test_graph_error_has_no_operation() {
        let err = BuildError::Graph("cycle".to_string());
        assert!(err.operation().is_none());
    }

    #[test]
    fn test_engine_error_from_build_error() {
        let err: EngineError = BuildError::UnknownOperation {
            name: "x".to_string(),
        }
        .into();
        assert!(err.is_build_error());
        assert!(err.to_string().starts_with("Build error: "));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EngineError = io_error.into();
        match err {
            EngineError::Io(inner) => assert!(inner.to_string().contains("file not found")),
            _ => panic!("Expected Io variant"),
        }
    }

    #[test]
    fn test_from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("invalid: yaml: [").unwrap_err();
        let err: EngineError = yaml_err.into();
        assert!(matches!(err, EngineError::Yaml(_)));
        assert!(!err.is_build_error());
    }

    #[test]
    fn test_result_type_alias() {
        fn test_function() -> Result<i32> {
            Err(EngineError::Config("workers must be positive".to_string()))
        }

        match test_function().unwrap_err() {
            EngineError::Config(msg) => assert_eq!(msg, "workers must be positive"),
            _ => panic!("Expected Config error"),
        }
    }
}
