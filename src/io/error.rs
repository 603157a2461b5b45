//! Error types and context management for shattering and convergence operations

use std::fmt;
use std::path::PathBuf;

/// Main error type for all shattering and convergence operations
#[derive(Debug)]
pub enum ShatterError {
    /// Failed to load an image from the filesystem
    ImageLoad {
        /// Path to the image file
        path: PathBuf,
        /// Underlying image loading error
        source: image::ImageError,
    },

    /// Failed to save an image to disk
    ImageExport {
        /// Path where export was attempted
        path: PathBuf,
        /// Underlying image export error
        source: image::ImageError,
    },

    /// General file system operation failure
    FileSystem {
        /// Path involved in the operation
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Width or height is zero
    InvalidDimensions {
        /// Requested width in pixels
        width: usize,
        /// Requested height in pixels
        height: usize,
    },

    /// Piece count must be at least one
    InvalidPieceCount {
        /// Requested number of pieces
        num_pieces: usize,
    },

    /// A pattern was applied to an image of a different size
    ///
    /// Patterns are never resized to fit; callers must request a pattern
    /// built for the image's exact dimensions.
    PatternDimensionMismatch {
        /// Pattern dimensions (width, height)
        pattern: (usize, usize),
        /// Image dimensions (width, height)
        image: (usize, usize),
    },

    /// A stored pattern could not be decoded or failed its integrity checks
    CacheCorruption {
        /// Cache file that failed validation
        path: PathBuf,
        /// What was wrong with the stored bytes
        reason: String,
    },

    /// Parameter validation failed
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// Two images that must share a shape do not
    ShapeMismatch {
        /// Operation that required matching shapes
        operation: &'static str,
        /// Expected (rows, cols, channels)
        expected: (usize, usize, usize),
        /// Actual (rows, cols, channels)
        actual: (usize, usize, usize),
    },

    /// Numerical computation produced invalid result
    Computation {
        /// Name of the computation that failed
        operation: &'static str,
        /// Description of the failure
        reason: String,
    },
}

impl fmt::Display for ShatterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageLoad { path, source } => {
                write!(f, "Failed to load image '{}': {source}", path.display())
            }
            Self::ImageExport { path, source } => {
                write!(
                    f,
                    "Failed to export image to '{}': {source}",
                    path.display()
                )
            }
            Self::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "File system error during {operation} on '{}': {source}",
                    path.display()
                )
            }
            Self::InvalidDimensions { width, height } => {
                write!(
                    f,
                    "Invalid dimensions {width}x{height}: both must be non-zero"
                )
            }
            Self::InvalidPieceCount { num_pieces } => {
                write!(f, "Invalid piece count {num_pieces}: must be at least 1")
            }
            Self::PatternDimensionMismatch { pattern, image } => {
                write!(
                    f,
                    "Pattern dimensions ({}x{}) don't match image ({}x{})",
                    pattern.0, pattern.1, image.0, image.1
                )
            }
            Self::CacheCorruption { path, reason } => {
                write!(
                    f,
                    "Corrupt pattern cache entry '{}': {reason}",
                    path.display()
                )
            }
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::ShapeMismatch {
                operation,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Shape mismatch in {operation}: expected {}x{}x{}, got {}x{}x{}",
                    expected.0, expected.1, expected.2, actual.0, actual.1, actual.2
                )
            }
            Self::Computation { operation, reason } => {
                write!(f, "Computation error in {operation}: {reason}")
            }
        }
    }
}

impl std::error::Error for ShatterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ImageLoad { source, .. } | Self::ImageExport { source, .. } => Some(source),
            Self::FileSystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for shattering results
pub type Result<T> = std::result::Result<T, ShatterError>;

impl From<image::ImageError> for ShatterError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageLoad {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl From<std::io::Error> for ShatterError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: "unknown",
            source: err,
        }
    }
}

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> ShatterError {
    ShatterError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Create a computation error
pub fn computation_error(operation: &'static str, reason: &impl ToString) -> ShatterError {
    ShatterError::Computation {
        operation,
        reason: reason.to_string(),
    }
}

/// Create a file system error for the given path and operation
pub fn file_system_error(
    path: impl Into<PathBuf>,
    operation: &'static str,
    source: std::io::Error,
) -> ShatterError {
    ShatterError::FileSystem {
        path: path.into(),
        operation,
        source,
    }
}
