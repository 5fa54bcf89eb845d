//! Journal reader - split, decode and replay a complete journal buffer

use std::path::Path;
use tracing::{debug, info, info_span};

use super::{
    decode_record, split_records, DecodeError, DecodeOptions, ErrorCollector, JournalStore,
    ParseErrorKind, ReplayEngine,
};
use crate::{Error, Result};

/// Reads journal buffers into a [`JournalStore`].
///
/// A reader holds configuration only; every call to [`JournalReader::read`]
/// starts from an empty registry, so one reader can serve many buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalReader {
    decode: DecodeOptions,
    max_record_bytes: Option<usize>,
    skip_blank_records: bool,
}

impl Default for JournalReader {
    fn default() -> Self {
        Self {
            decode: DecodeOptions::default(),
            max_record_bytes: None,
            skip_blank_records: true,
        }
    }
}

impl JournalReader {
    /// Create a new reader builder
    #[must_use]
    pub fn builder() -> JournalReaderBuilder {
        JournalReaderBuilder::default()
    }

    /// Replay a complete journal buffer.
    ///
    /// Record-level problems never fail the call; they are collected in
    /// [`JournalStore::errors`] while every other record is still applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotText`] if the buffer is non-empty and none of its
    /// records is valid UTF-8.
    pub fn read(&self, buffer: &[u8]) -> Result<JournalStore> {
        let span = info_span!("read_journal", bytes = buffer.len());
        let _guard = span.enter();

        let mut engine = ReplayEngine::new();
        let mut collector = ErrorCollector::new();
        let mut records = 0;
        let mut text_records = 0;

        for record in split_records(buffer) {
            records += 1;

            let text = match std::str::from_utf8(record.bytes()) {
                Ok(text) => text,
                Err(e) => {
                    collector.reject(
                        ParseErrorKind::Decode,
                        &record,
                        &DecodeError::NotUtf8(e.to_string()),
                    );
                    continue;
                }
            };
            text_records += 1;

            if self.skip_blank_records && record.is_blank() {
                continue;
            }

            if let Some(limit) = self.max_record_bytes {
                if record.len() > limit {
                    collector.reject(
                        ParseErrorKind::Oversized,
                        &record,
                        &format!(
                            "record of {} bytes exceeds the {limit}-byte limit",
                            record.len()
                        ),
                    );
                    continue;
                }
            }

            match decode_record(text, &self.decode) {
                Ok(decoded) => {
                    debug!(
                        record = record.index(),
                        worker = decoded.worker_id.as_deref().unwrap_or("-"),
                        op = decoded.operation.op_code().name(),
                        "applying operation"
                    );
                    if let Err(e) = engine.apply(decoded.operation) {
                        collector.reject(ParseErrorKind::Replay, &record, &e);
                    }
                }
                Err(e) => collector.reject(ParseErrorKind::Decode, &record, &e),
            }
        }

        if records > 0 && text_records == 0 {
            return Err(Error::NotText { records });
        }

        let created = engine.created_study_count();
        let store = JournalStore::new(engine.finish(), collector.into_errors(), created);
        info!(
            records,
            studies = store.study_count(),
            trials = store.trial_count(),
            errors = store.error_count(),
            "journal replayed"
        );
        Ok(store)
    }

    /// Read a journal file and replay it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`JournalReader::read`].
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<JournalStore> {
        let buffer = std::fs::read(path.as_ref())?;
        self.read(&buffer)
    }
}

/// Journal reader builder
#[derive(Debug, Clone, Copy)]
pub struct JournalReaderBuilder {
    lenient_non_finite: bool,
    max_record_bytes: Option<usize>,
    skip_blank_records: bool,
}

impl Default for JournalReaderBuilder {
    fn default() -> Self {
        Self {
            lenient_non_finite: true,
            max_record_bytes: None,
            skip_blank_records: true,
        }
    }
}

impl JournalReaderBuilder {
    /// Accept bare `Infinity`/`-Infinity`/`NaN` tokens as written by Optuna workers
    /// (default: on)
    #[must_use]
    pub const fn lenient_non_finite(mut self, enabled: bool) -> Self {
        self.lenient_non_finite = enabled;
        self
    }

    /// Reject records longer than `limit` bytes without decoding them
    /// (default: no limit)
    #[must_use]
    pub const fn max_record_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_record_bytes = limit;
        self
    }

    /// Ignore whitespace-only records instead of reporting them (default: on)
    #[must_use]
    pub const fn skip_blank_records(mut self, enabled: bool) -> Self {
        self.skip_blank_records = enabled;
        self
    }

    /// Build the reader
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the record size limit is zero
    pub fn build(self) -> Result<JournalReader> {
        if self.max_record_bytes == Some(0) {
            return Err(Error::InvalidInput(
                "max_record_bytes must be greater than 0".to_string(),
            ));
        }
        Ok(JournalReader {
            decode: DecodeOptions {
                lenient_non_finite: self.lenient_non_finite,
            },
            max_record_bytes: self.max_record_bytes,
            skip_blank_records: self.skip_blank_records,
        })
    }
}
