//! Record splitter - structural newline framing of a journal buffer

/// Record delimiter
pub const RECORD_DELIMITER: u8 = b'\n';

/// One candidate record within a journal buffer.
///
/// The span borrows from the buffer it was split from and keeps its
/// position so errors can point back at the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan<'a> {
    index: usize,
    offset: usize,
    bytes: &'a [u8],
}

impl<'a> RecordSpan<'a> {
    /// Zero-based position of the record in the journal.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Byte offset of the first byte of the record.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Raw record bytes, without the delimiter.
    #[must_use]
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Record length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the record has no bytes at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the record holds only ASCII whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.bytes.iter().all(u8::is_ascii_whitespace)
    }
}

/// Lazy iterator over the records of a buffer.
///
/// A clone walks the same buffer independently from the clone's position.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    buffer: &'a [u8],
    cursor: usize,
    index: usize,
}

impl<'a> Iterator for Records<'a> {
    type Item = RecordSpan<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.buffer.len() {
            return None;
        }

        let rest = &self.buffer[self.cursor..];
        let (bytes, consumed) = match rest.iter().position(|&b| b == RECORD_DELIMITER) {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };

        let span = RecordSpan {
            index: self.index,
            offset: self.cursor,
            bytes,
        };
        self.cursor += consumed;
        self.index += 1;
        Some(span)
    }
}

impl std::iter::FusedIterator for Records<'_> {}

/// Split a journal buffer into newline-delimited record spans.
///
/// Order and byte offsets are preserved. Content after the last delimiter is
/// a record only if it is non-empty. Splitting never inspects record content.
///
/// ```rust
/// use trueno_journal::journal::split_records;
///
/// let spans: Vec<_> = split_records(b"{\"a\":1}\n{\"b\":2}\n").collect();
/// assert_eq!(spans.len(), 2);
/// assert_eq!(spans[1].offset(), 8);
/// ```
#[must_use]
pub const fn split_records(buffer: &[u8]) -> Records<'_> {
    Records {
        buffer,
        cursor: 0,
        index: 0,
    }
}
