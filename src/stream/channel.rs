//! Bounded page handoff between a producer and a consumer.
//!
//! The producer side ([`FrameSender`]) blocks once `capacity` envelopes are
//! waiting, which throttles decoding to the pace of the consumer. The consumer
//! side ([`ResultStream`]) sees envelopes in publish order and stops after the
//! first terminal one. Dropping the [`ResultStream`] closes the channel; the
//! producer observes this through [`FrameSender::is_closed`].

use tokio::sync::mpsc;

use crate::error::StreamError;
use crate::frame::{ResultEnvelope, ResultPage};

/// Number of pages buffered ahead of the consumer by default.
pub const DEFAULT_PREFETCH_PAGES: usize = 8;

/// Constructor for connected sender/stream pairs.
pub struct ResultChannel;

impl ResultChannel {
    /// Create a channel buffering at most `capacity` envelopes.
    ///
    /// A capacity of zero is raised to one.
    pub fn bounded(capacity: usize) -> (FrameSender, ResultStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            FrameSender { tx },
            ResultStream {
                rx,
                finished: false,
            },
        )
    }
}

/// Producer half of a result channel.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<ResultEnvelope>,
}

impl FrameSender {
    /// Publish an envelope, blocking while the channel is full.
    ///
    /// Must not be called from within an async context. Returns false if the
    /// consumer has gone away.
    pub fn publish(&self, envelope: ResultEnvelope) -> bool {
        self.tx.blocking_send(envelope).is_ok()
    }

    /// Publish an envelope from async code, waiting while the channel is full.
    ///
    /// Returns false if the consumer has gone away.
    pub async fn publish_async(&self, envelope: ResultEnvelope) -> bool {
        self.tx.send(envelope).await.is_ok()
    }

    /// Whether the consumer dropped or closed its stream.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half of a result channel.
#[derive(Debug)]
pub struct ResultStream {
    rx: mpsc::Receiver<ResultEnvelope>,
    finished: bool,
}

impl ResultStream {
    /// Wait for the next envelope.
    ///
    /// Returns `None` once a terminal envelope has been handed out. If the
    /// producer disappears without a terminal envelope, a single
    /// `StreamError::ProducerGone` failure is returned instead.
    pub async fn next_envelope(&mut self) -> Option<ResultEnvelope> {
        if self.finished {
            return None;
        }
        let received = self.rx.recv().await;
        Some(self.accept(received))
    }

    /// Blocking variant of [`ResultStream::next_envelope`] for synchronous callers.
    ///
    /// Must not be called from within an async context.
    pub fn blocking_next_envelope(&mut self) -> Option<ResultEnvelope> {
        if self.finished {
            return None;
        }
        let received = self.rx.blocking_recv();
        Some(self.accept(received))
    }

    /// Wait for the next page.
    ///
    /// Returns `Ok(None)` after the done page.
    ///
    /// # Errors
    ///
    /// Returns the stream's failure exactly once; later calls return `Ok(None)`.
    pub async fn next_page(&mut self) -> Result<Option<ResultPage>, StreamError> {
        match self.next_envelope().await {
            Some(envelope) => envelope.into_result().map(Some),
            None => Ok(None),
        }
    }

    /// Whether the terminal envelope has been handed out.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop accepting envelopes. The producer will observe the closed channel.
    pub fn close(&mut self) {
        self.rx.close();
        self.finished = true;
    }

    fn accept(&mut self, received: Option<ResultEnvelope>) -> ResultEnvelope {
        let envelope = received.unwrap_or(ResultEnvelope::Failure(StreamError::ProducerGone));
        if envelope.is_terminal() {
            self.finished = true;
        }
        envelope
    }
}
