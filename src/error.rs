//! Error types for Trueno-Journal
//!
//! Only conditions that make reconstruction impossible surface here.
//! Record-level failures are collected as [`ParseError`](crate::journal::ParseError)
//! values alongside the reconstructed studies instead.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-Journal error types
#[derive(Error, Debug)]
pub enum Error {
    /// Buffer holds no UTF-8 record at all
    #[error("Journal is not text: none of {records} record(s) is valid UTF-8\nIs this a journal file?")]
    NotText {
        /// Number of records the buffer was split into
        records: usize,
    },

    /// Invalid reader configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
