//! Journal Log - newline-delimited operation log replay
//!
//! A journal is the append-only log Optuna workers write: one JSON object per
//! line, each carrying an integer `op_code` and the operation's fields.
//! Replaying every record in order rebuilds the studies and trials the
//! workers produced.
//!
//! ## Pipeline
//!
//! ```text
//! bytes ──split──> records ──decode──> Operation ──apply──> ReplayEngine ──> JournalStore
//!                     │                    │                     │
//!                     └─────── rejects ────┴──> ErrorCollector ──┘
//! ```
//!
//! A record that fails at any stage becomes one [`ParseError`]; it never
//! stops the records after it.
//!
//! ## Usage
//!
//! ```rust
//! use trueno_journal::journal::JournalReader;
//!
//! let journal = concat!(
//!     r#"{"op_code": 0, "worker_id": "w0", "study_name": "demo", "directions": [1]}"#, "\n",
//!     r#"{"op_code": 5, "worker_id": "w0", "study_id": 0, "datetime_start": "2024-01-01T00:00:00.000000"}"#, "\n",
//!     r#"{"op_code": 7, "worker_id": "w0", "trial_id": 0, "state": 1, "values": [0.5], "datetime_complete": "2024-01-01T00:00:01.000000"}"#, "\n",
//! );
//!
//! let reader = JournalReader::builder().build().unwrap();
//! let store = reader.read(journal.as_bytes()).unwrap();
//!
//! assert_eq!(store.study_count(), 1);
//! let study = store.study(0).unwrap();
//! assert_eq!(study.best_trial().and_then(|t| t.value()), Some(0.5));
//! assert!(store.errors().is_empty());
//! ```

mod collector;
pub mod float_codec;
mod operation;
mod reader;
mod replay;
mod splitter;
mod store;

pub use collector::{ErrorCollector, ParseError, ParseErrorKind, RecordPosition};
pub use operation::{
    decode_record, DecodeError, DecodeOptions, DecodedRecord, OpCode, Operation, TrialPayload,
};
pub use reader::{JournalReader, JournalReaderBuilder};
pub use replay::{ReplayEngine, ReplayError};
pub use splitter::{split_records, RecordSpan, Records, RECORD_DELIMITER};
pub use store::JournalStore;
