//! Utilities module for error handling and logging
//!
//! This module provides:
//! - The classifier error taxonomy
//! - Structured logging with tracing

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{ClassifierError, Result};
pub use logging::init_logging;
