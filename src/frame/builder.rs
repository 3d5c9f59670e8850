//! Server-side framing of an in-memory row source.
//!
//! [`FrameBuilder`] cuts an iterator of rows into pages under a
//! [`FrameLimiter`], the way a server answers a fetch request: each call to
//! [`FrameBuilder::next_page`] produces one page, and the last page carries
//! `done = true`.

use std::iter::Peekable;
use std::sync::Arc;

use tracing::debug;

use super::limiter::FrameLimiter;
use super::page::ResultPage;
use crate::types::Row;

/// Pages a row iterator under a limiter.
pub struct FrameBuilder<I: Iterator<Item = Row>> {
    rows: Peekable<I>,
    limiter: Arc<dyn FrameLimiter>,
    offset: u64,
    finished: bool,
}

impl<I: Iterator<Item = Row>> FrameBuilder<I> {
    /// Create a builder over `rows`.
    ///
    /// # Arguments
    ///
    /// * `rows` - Row source, consumed lazily
    /// * `limiter` - Policy bounding each page
    pub fn new(rows: I, limiter: Arc<dyn FrameLimiter>) -> Self {
        Self {
            rows: rows.peekable(),
            limiter,
            offset: 0,
            finished: false,
        }
    }

    /// Rows handed out so far.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the terminal page has been produced.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Produce the next page, or `None` after the terminal page.
    pub fn next_page(&mut self) -> Option<ResultPage> {
        if self.finished {
            return None;
        }

        let mut ctx = self.limiter.start();
        let mut rows = Vec::new();
        while !ctx.limit_reached() {
            match self.rows.next() {
                Some(row) => {
                    ctx.add_row(&row);
                    rows.push(row);
                    self.offset += 1;
                }
                None => break,
            }
        }

        let done = self.rows.peek().is_none();
        self.finished = done;
        debug!(offset = self.offset, rows = rows.len(), done, "Built frame");
        Some(ResultPage::new(self.offset, done, rows))
    }
}

impl<I: Iterator<Item = Row>> Iterator for FrameBuilder<I> {
    type Item = ResultPage;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_page()
    }
}
