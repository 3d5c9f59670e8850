//! Result pages and the envelopes that carry them to the consumer.

use crate::error::StreamError;
use crate::types::Row;

/// A contiguous run of rows from a result stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage {
    /// Rows delivered so far, including the rows of this page.
    pub offset: u64,
    /// Whether this is the last page of the stream.
    pub done: bool,
    pub rows: Vec<Row>,
}

impl ResultPage {
    pub fn new(offset: u64, done: bool, rows: Vec<Row>) -> Self {
        Self { offset, done, rows }
    }

    /// Empty terminal page.
    pub fn empty_done(offset: u64) -> Self {
        Self::new(offset, true, Vec::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What a producer hands to the consumer: a page, or the stream's single failure.
#[derive(Debug)]
pub enum ResultEnvelope {
    Page(ResultPage),
    Failure(StreamError),
}

impl ResultEnvelope {
    /// Whether nothing may follow this envelope.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            ResultEnvelope::Page(page) => page.done,
            ResultEnvelope::Failure(_) => true,
        }
    }

    /// Unwrap into the page, or the failure as an error.
    ///
    /// # Errors
    ///
    /// Returns the carried `StreamError` for a failure envelope.
    pub fn into_result(self) -> Result<ResultPage, StreamError> {
        match self {
            ResultEnvelope::Page(page) => Ok(page),
            ResultEnvelope::Failure(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::types::Value;

    #[test]
    fn test_terminal_envelopes() {
        let page = ResultPage::new(1, false, vec![Row::Scalar(Value::Int(1))]);
        assert!(!ResultEnvelope::Page(page).is_terminal());
        assert!(ResultEnvelope::Page(ResultPage::empty_done(3)).is_terminal());
        assert!(
            ResultEnvelope::Failure(StreamError::Decode(DecodeError::NestedArray)).is_terminal()
        );
    }

    #[test]
    fn test_into_result() {
        let envelope = ResultEnvelope::Failure(StreamError::ProducerGone);
        assert!(matches!(
            envelope.into_result(),
            Err(StreamError::ProducerGone)
        ));
        let page = ResultEnvelope::Page(ResultPage::empty_done(0))
            .into_result()
            .unwrap();
        assert!(page.is_empty());
        assert!(page.done);
    }
}
