//! Error types for the wave-field core.

use thiserror::Error;

/// Result type for wave-field operations.
pub type Result<T> = std::result::Result<T, FieldError>;

/// Errors raised by the field buffers, the source injector and the step kernel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    /// Invalid resolution or simulation parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Cell access outside the grid.
    #[error("Cell ({x}, {y}) is outside the {resolution}x{resolution} grid")]
    Index {
        x: usize,
        y: usize,
        resolution: usize,
    },

    /// Rejected source impulse.
    #[error("Impulse rejected: {0}")]
    Impulse(String),

    /// Buffers handed to the kernel do not share one shape.
    #[error("Buffer shape mismatch: expected {expected}x{expected}, found {rows}x{cols}")]
    Shape {
        expected: usize,
        rows: usize,
        cols: usize,
    },
}

impl FieldError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an impulse error.
    pub fn impulse(msg: impl Into<String>) -> Self {
        Self::Impulse(msg.into())
    }
}
