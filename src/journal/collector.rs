//! Error collector - record-level failures gathered beside the result

use serde::Serialize;
use std::fmt;

use super::splitter::RecordSpan;

/// Stage that rejected a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// Record could not be decoded into an operation.
    Decode,
    /// Operation decoded but could not be applied to the current state.
    Replay,
    /// Record exceeded the configured size limit and was not decoded.
    Oversized,
}

/// Where a rejected record sits in the journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordPosition {
    /// Zero-based record index
    pub index: usize,
    /// Byte offset of the record's first byte
    pub offset: usize,
}

impl From<&RecordSpan<'_>> for RecordPosition {
    fn from(span: &RecordSpan<'_>) -> Self {
        Self {
            index: span.index(),
            offset: span.offset(),
        }
    }
}

/// A record-level failure.
///
/// `message` is what the dashboard shows to users; for structural JSON
/// failures it is the parser's diagnostic, unaltered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    message: String,
    kind: ParseErrorKind,
    record: Option<RecordPosition>,
}

impl ParseError {
    /// Create an error.
    #[must_use]
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        record: Option<RecordPosition>,
    ) -> Self {
        Self {
            message: message.into(),
            kind,
            record,
        }
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the stage that rejected the record.
    #[must_use]
    pub const fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// Get the record position, if known.
    #[must_use]
    pub const fn record(&self) -> Option<RecordPosition> {
        self.record
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Accumulates [`ParseError`]s in the order they are encountered.
///
/// Collecting never fails and never touches reconstructed state.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<ParseError>,
}

impl ErrorCollector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error.
    pub fn push(&mut self, error: ParseError) {
        tracing::warn!(
            kind = ?error.kind,
            record = error.record.map(|r| r.index),
            message = %error.message,
            "journal record rejected"
        );
        self.errors.push(error);
    }

    /// Record an error for a record, taking the message from any displayable error.
    pub fn reject(
        &mut self,
        kind: ParseErrorKind,
        span: &RecordSpan<'_>,
        error: &impl fmt::Display,
    ) {
        self.push(ParseError::new(kind, error.to_string(), Some(span.into())));
    }

    /// Number of errors collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no error has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collected errors, in order.
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Take the collected errors.
    #[must_use]
    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }
}
