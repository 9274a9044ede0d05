use std::fmt;

/// Result type for quadrl operations
pub type Result<T> = std::result::Result<T, RlError>;

/// Main error type for the learning core
#[derive(Debug, Clone, PartialEq)]
pub enum RlError {
    /// A constructor or config value is outside its valid range
    Configuration {
        name: String,
        reason: String,
    },

    /// A call argument could not be interpreted
    InvalidArgument {
        name: String,
        reason: String,
    },

    /// Fewer transitions stored than a strict caller requested
    InsufficientData {
        requested: usize,
        available: usize,
    },

    /// Invalid dimensions for operations
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// IO errors (file operations)
    IoError(String),

    /// Serialization/deserialization errors
    SerializationError(String),

    /// Numerical computation errors
    NumericalError(String),
}

impl fmt::Display for RlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RlError::Configuration { name, reason } => {
                write!(f, "Invalid configuration '{}': {}", name, reason)
            }
            RlError::InvalidArgument { name, reason } => {
                write!(f, "Invalid argument '{}': {}", name, reason)
            }
            RlError::InsufficientData { requested, available } => {
                write!(f, "Insufficient data: requested {}, only {} available", requested, available)
            }
            RlError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            RlError::IoError(msg) => write!(f, "IO error: {}", msg),
            RlError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            RlError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
        }
    }
}

impl std::error::Error for RlError {}

impl From<std::io::Error> for RlError {
    fn from(err: std::io::Error) -> Self {
        RlError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for RlError {
    fn from(err: bincode::Error) -> Self {
        RlError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for RlError {
    fn from(err: serde_json::Error) -> Self {
        RlError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for RlError {
    fn from(err: ndarray::ShapeError) -> Self {
        RlError::DimensionMismatch {
            expected: "consistent array shapes".to_string(),
            actual: err.to_string(),
        }
    }
}

// Helper functions for common error patterns
impl RlError {
    pub fn configuration<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        RlError::Configuration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_argument<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        RlError::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn dimension_mismatch<E: Into<String>, A: Into<String>>(expected: E, actual: A) -> Self {
        RlError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
