//! Error Handling Module
//!
//! Defines the error taxonomy of the classifier.
//! Startup failures (labels, model, class-count mismatch) stop the process before it
//! serves anything; `Decode` and `Inference` are per-request failures.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for classifier operations
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Uploaded bytes are not a valid or recognized image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The inference engine failed or returned unusable scores
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model artifact could not be loaded
    #[error("Failed to load model at '{path}': {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// Class label listing is invalid
    #[error("Label error: {0}")]
    Labels(String),

    /// Model output length does not match the class registry
    #[error("Model produces {actual} scores but {expected} class labels are registered")]
    ClassCountMismatch { expected: usize, actual: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl ClassifierError {
    /// Whether the error was caused by the request payload rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, ClassifierError::Decode(_))
    }

    /// Whether the error can only occur while loading the model and labels
    pub fn is_startup_failure(&self) -> bool {
        matches!(
            self,
            ClassifierError::ModelLoad { .. }
                | ClassifierError::Labels(_)
                | ClassifierError::ClassCountMismatch { .. }
                | ClassifierError::Config(_)
                | ClassifierError::PathNotFound(_)
        )
    }
}

impl From<image::ImageError> for ClassifierError {
    fn from(err: image::ImageError) -> Self {
        ClassifierError::Decode(err.to_string())
    }
}

/// Convenience Result type for classifier operations
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Extension trait for turning foreign errors into inference failures with context
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| ClassifierError::Inference(format!("{}: {:?}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| ClassifierError::Inference(format!("{}: {:?}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| ClassifierError::Inference(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| ClassifierError::Inference(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClassifierError::Labels("duplicate label 'cat'".to_string());
        assert_eq!(format!("{}", err), "Label error: duplicate label 'cat'");
    }

    #[test]
    fn test_model_load_error_mentions_path() {
        let err = ClassifierError::ModelLoad {
            path: PathBuf::from("/models/tl_model.mpk"),
            reason: "file not found".to_string(),
        };
        assert!(format!("{}", err).contains("tl_model.mpk"));
        assert!(err.is_startup_failure());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_decode_is_client_error() {
        let err = ClassifierError::Decode("unsupported format".to_string());
        assert!(err.is_client_error());
        assert!(!err.is_startup_failure());
    }

    #[test]
    fn test_class_count_mismatch_display() {
        let err = ClassifierError::ClassCountMismatch {
            expected: 10,
            actual: 38,
        };
        assert_eq!(
            format!("{}", err),
            "Model produces 38 scores but 10 class labels are registered"
        );
    }

    #[test]
    fn test_result_context() {
        let result: std::result::Result<i32, std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"));

        let with_context = result.context("Forward pass failed");
        assert!(matches!(with_context, Err(ClassifierError::Inference(_))));
    }

    #[test]
    fn test_option_context() {
        let opt: Option<i32> = None;
        let with_context = opt.with_context(|| "Empty output".to_string());
        assert!(with_context.is_err());
    }
}
