//! Error type shared by loading, building and querying.

use thiserror::Error;

/// Errors raised by the point index.
///
/// Every error is local and final: nothing is retried or recovered silently.
#[derive(Debug, Error)]
pub enum Error {
    /// The raw byte buffer does not hold a whole number of records.
    #[error("malformed point data: {len} bytes is not a multiple of the {record}-byte record size")]
    Format { len: usize, record: usize },

    /// A coordinate is NaN or infinite.
    #[error("non-finite coordinate for point {index} on axis {axis}")]
    NonFinite { index: usize, axis: usize },

    /// A point or node index is out of range.
    #[error("index {index} out of range for {len} entries")]
    Index { index: usize, len: usize },

    /// Invalid build or query parameters.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Trees cannot be built over zero points.
    #[error("cannot build an index over zero points")]
    EmptyInput,

    /// The two operands were built over point sets of different dimension.
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// The traversal was cancelled through its `CancelToken`.
    #[error("traversal cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
