//! # Trueno-Journal: Optuna Journal Storage Reader
//!
//! **Version**: 0.1.0
//!
//! Trueno-Journal reconstructs Optuna studies and trials from a journal log:
//! the newline-delimited JSON operation log that Optuna workers append to.
//! The result feeds a dashboard backend that lists studies, shows their
//! trials and search spaces, and reports the records it could not use.
//!
//! ## Design Principles
//!
//! - **Fault isolation**: a bad record costs exactly one error entry, never the parse
//! - **Validate before mutate**: a rejected operation leaves no partial state
//! - **Owned results**: a parse returns plain data with no global registry
//!
//! ## Example Usage
//!
//! ```rust
//! use trueno_journal::parse_journal;
//!
//! let journal = concat!(
//!     r#"{"op_code": 0, "worker_id": "w0", "study_name": "lr-sweep", "directions": [1]}"#, "\n",
//!     r#"{"op_code": 0, "worker_id": "w0", "study_name": "broken", "directions": "#, "\n",
//! );
//!
//! let store = parse_journal(journal.as_bytes())?;
//! assert_eq!(store.summaries()[0].name, "lr-sweep");
//! assert_eq!(store.errors().len(), 1);
//! # Ok::<(), trueno_journal::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod journal;
pub mod study;

pub use error::{Error, Result};
pub use journal::{JournalReader, JournalReaderBuilder, JournalStore, ParseError, ParseErrorKind};

use tracing_subscriber::EnvFilter;

/// Parse a complete journal buffer with default reader options.
///
/// # Errors
///
/// Returns [`Error::NotText`] if the buffer is non-empty and none of its
/// records is valid UTF-8. Record-level problems are reported through
/// [`JournalStore::errors`] instead.
pub fn parse_journal(buffer: &[u8]) -> Result<JournalStore> {
    JournalReader::default().read(buffer)
}

/// Install a `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// # Errors
///
/// Returns [`Error::Other`] if a global subscriber is already installed
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::Other(e.to_string()))
}
