//! Unified error types for siemview.
//!
//! Store-facing failures are [`DatabaseError`]; everything the service layer
//! can return is a [`SiemError`]. Both propagate cleanly via the `?` operator.

/// Failure talking to the remote store.
///
/// Each variant carries the operation that failed (collection and filter) so
/// a log line is actionable on its own.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// The store could not be reached after every connection attempt.
    #[error("Connection failed: {message}. Operation: {operation}")]
    ConnectionFailed {
        /// Description of the operation being attempted.
        operation: String,
        /// Last underlying error, with host/port and attempt count.
        message: String,
    },

    /// Protocol or decode error, store-reported error status, or the
    /// connection dropped mid-response.
    #[error("Query failed: {message}. Operation: {operation}")]
    QueryFailed {
        /// Description of the operation being attempted.
        operation: String,
        /// What went wrong.
        message: String,
    },

    /// Request or response larger than the frame limit.
    #[error("Size exceeded: {message}. Operation: {operation}")]
    SizeExceeded {
        /// Description of the operation being attempted.
        operation: String,
        /// Which side overflowed and by how much.
        message: String,
    },

    /// A single attempt ran past its deadline.
    #[error("Timed out after {timeout_secs:.1}s. Operation: {operation}")]
    TimedOut {
        /// Description of the operation being attempted.
        operation: String,
        /// The per-attempt timeout that elapsed.
        timeout_secs: f64,
    },
}

impl DatabaseError {
    /// Whether the retry loop should try again after this error.
    ///
    /// `ConnectionFailed` has already exhausted its own attempts and
    /// `SizeExceeded` is a property of the payload, so neither is retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QueryFailed { .. } | Self::TimedOut { .. })
    }

    /// The operation description attached to this error.
    pub fn operation(&self) -> &str {
        match self {
            Self::ConnectionFailed { operation, .. }
            | Self::QueryFailed { operation, .. }
            | Self::SizeExceeded { operation, .. }
            | Self::TimedOut { operation, .. } => operation,
        }
    }
}

/// Build a [`DatabaseError::QueryFailed`] for the given operation.
pub fn query_failed(operation: &str, message: impl Into<String>) -> DatabaseError {
    DatabaseError::QueryFailed {
        operation: operation.to_owned(),
        message: message.into(),
    }
}

/// Build a [`DatabaseError::SizeExceeded`] for the given operation.
pub fn size_exceeded(operation: &str, message: impl Into<String>) -> DatabaseError {
    DatabaseError::SizeExceeded {
        operation: operation.to_owned(),
        message: message.into(),
    }
}

/// Crate-level error returned by the service layer and the binary.
#[derive(Debug, thiserror::Error)]
pub enum SiemError {
    /// The remote store failed; see [`DatabaseError`].
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// An export was requested in a format other than `json` or `csv`.
    #[error("Invalid export format: {0}. Supported formats: json, csv")]
    InvalidFormat(String),

    /// A caller-supplied filter value was rejected. Malformed dates never
    /// raise this; they disable their bound instead.
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Environment configuration is missing or malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rendering an export (CSV or JSON) failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// Catch-all for I/O errors (export file writes, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SiemError {
    /// `true` when the failure came from the remote store rather than from
    /// the caller's request, so a boundary layer can pick
    /// upstream-unavailable over bad-request.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SiemError>;
