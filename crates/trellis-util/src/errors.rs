use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for Trellis infrastructure (I/O, configuration, caches).
///
/// Resolution failures have their own richer type in `trellis-resolver`.
#[derive(Debug, Error, Diagnostic)]
pub enum TrellisError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or malformed configuration or module descriptor file.
    #[error("Configuration error: {message}")]
    #[diagnostic(help("Check the TOML file for syntax errors"))]
    Config { message: String },

    /// A persistent cache could not be read or written.
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// An exclusive file lock could not be acquired.
    #[error("Lock error: {message}")]
    #[diagnostic(help("Another process may be holding the lock; retry once it finishes"))]
    Lock { message: String },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type TrellisResult<T> = miette::Result<T>;
