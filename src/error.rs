use std::fmt;

/// Result type for convnd operations
pub type Result<T> = std::result::Result<T, ConvError>;

/// Main error type for the convnd library.
///
/// The propagation, region-mapping and learning engines report absent inputs
/// with `None`; this type covers the construction and configuration surface.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvError {
    /// Invalid dimensions for operations
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// IO errors (file operations)
    IoError(String),

    /// Malformed or unreadable configuration
    ConfigError(String),

    /// Numerical computation errors
    NumericalError(String),

    /// A chain index that does not address a layer
    MissingLayer(usize),
}

impl fmt::Display for ConvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            ConvError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            ConvError::IoError(msg) => write!(f, "IO error: {}", msg),
            ConvError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ConvError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            ConvError::MissingLayer(index) => write!(f, "No layer at chain index {}", index),
        }
    }
}

impl std::error::Error for ConvError {}

// Conversion from std::io::Error
impl From<std::io::Error> for ConvError {
    fn from(err: std::io::Error) -> Self {
        ConvError::IoError(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ConvError {
    fn from(err: serde_json::Error) -> Self {
        ConvError::ConfigError(err.to_string())
    }
}

// Helper functions for common error patterns
impl ConvError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        ConvError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        ConvError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
