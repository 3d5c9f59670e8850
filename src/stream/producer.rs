//! Background production of result streams.
//!
//! A producer opens the backend response on the async runtime, then moves the
//! decode loop onto a blocking task so that parsing never stalls async
//! workers. Each stream gets exactly one producer and exactly one terminal
//! envelope: the done page or a single failure.

use std::io::Read;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::channel::{FrameSender, ResultChannel, ResultStream};
use super::decoder::ResponseDecoder;
use crate::error::StreamError;
use crate::frame::{FrameLimiter, ResultEnvelope};
use crate::query::QueryBackend;
use crate::types::Signature;

/// Decode `reader` into pages and publish them until the stream ends.
///
/// Runs on the calling thread and blocks whenever the channel is full. Stops
/// early, without publishing anything further, once the consumer drops its
/// stream.
///
/// # Returns
///
/// The number of rows in pages the channel accepted. Rows decoded into a page
/// that was never delivered are not counted.
pub fn produce<R: Read>(
    reader: R,
    signature: Arc<Signature>,
    limiter: Arc<dyn FrameLimiter>,
    sender: &FrameSender,
) -> u64 {
    let watcher = sender.clone();
    let mut decoder = ResponseDecoder::new(reader, signature, limiter)
        .with_cancellation(Box::new(move || watcher.is_closed()));

    let mut published = 0;
    loop {
        match decoder.next_page() {
            Ok(Some(page)) => {
                let offset = page.offset;
                if !sender.publish(ResultEnvelope::Page(page)) {
                    debug!(offset, published, "Consumer closed result stream");
                    break;
                }
                published = offset;
            }
            Ok(None) => break,
            Err(e) => {
                warn!(offset = decoder.offset(), error = %e, "Result stream decoding failed");
                sender.publish(ResultEnvelope::Failure(StreamError::Decode(e)));
                break;
            }
        }
    }
    published
}

/// Start producing the result of `query_id` in the background.
///
/// # Arguments
///
/// * `backend` - Collaborator serving the raw response
/// * `query_id` - Backend token of the query to stream
/// * `signature` - Column schema of the query
/// * `limiter` - Policy bounding each page
/// * `prefetch_pages` - Pages buffered ahead of the consumer
///
/// # Returns
///
/// The consumer stream, and the handle of the producer task which resolves to
/// the number of rows published.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn spawn_producer(
    backend: Arc<dyn QueryBackend>,
    query_id: String,
    signature: Arc<Signature>,
    limiter: Arc<dyn FrameLimiter>,
    prefetch_pages: usize,
) -> (ResultStream, JoinHandle<u64>) {
    let (sender, stream) = ResultChannel::bounded(prefetch_pages);

    let handle = tokio::spawn(async move {
        let reader = match backend.open_result_stream(&query_id).await {
            Ok(reader) => reader,
            Err(e) => {
                warn!(query_id = %query_id, error = %e, "Failed to open result stream");
                sender
                    .publish_async(ResultEnvelope::Failure(StreamError::Backend(e)))
                    .await;
                return 0;
            }
        };

        debug!(query_id = %query_id, "Result stream opened");
        let decode = tokio::task::spawn_blocking(move || {
            produce(reader, signature, limiter, &sender)
        });

        match decode.await {
            Ok(rows) => {
                debug!(query_id = %query_id, rows, "Result stream finished");
                rows
            }
            Err(e) => {
                warn!(query_id = %query_id, error = %e, "Result stream producer panicked");
                0
            }
        }
    });

    (stream, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameLimiters;
    use crate::types::{ColumnMetaData, Rep};

    fn long_signature() -> Arc<Signature> {
        Arc::new(Signature::new(vec![ColumnMetaData::of_rep(0, Rep::Long)]))
    }

    #[tokio::test]
    async fn test_produce_publishes_all_pages() {
        let json = r#"{"rows": [{"a": {"value": 1}}, {"a": {"value": 2}}, {"a": {"value": 3}}]}"#;
        let (sender, mut stream) = ResultChannel::bounded(8);
        let rows = tokio::task::spawn_blocking(move || {
            produce(
                json.as_bytes(),
                long_signature(),
                FrameLimiters::row_count_limited(2).unwrap(),
                &sender,
            )
        })
        .await
        .unwrap();
        assert_eq!(rows, 3);

        let first = stream.next_page().await.unwrap().unwrap();
        let second = stream.next_page().await.unwrap().unwrap();
        assert_eq!((first.offset, first.done), (2, false));
        assert_eq!((second.offset, second.done), (3, true));
        assert!(stream.next_page().await.unwrap().is_none());
    }

    /// Hands out one chunk per read and drops the consumer stream before the second.
    struct ClosingReader {
        chunks: Vec<&'static [u8]>,
        stream: Option<ResultStream>,
    }

    impl Read for ClosingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.is_empty() {
                return Ok(0);
            }
            if self.chunks.len() == 1 {
                self.stream = None;
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[tokio::test]
    async fn test_produce_counts_only_delivered_rows() {
        let (sender, stream) = ResultChannel::bounded(8);
        let reader = ClosingReader {
            chunks: vec![
                &br#"{"rows": [{"a": {"value": 1}}"#[..],
                &br#", {"a": {"value": 2}}]}"#[..],
            ],
            stream: Some(stream),
        };
        let rows = tokio::task::spawn_blocking(move || {
            produce(
                reader,
                long_signature(),
                FrameLimiters::row_count_limited(1).unwrap(),
                &sender,
            )
        })
        .await
        .unwrap();
        assert_eq!(rows, 0, "The first page was decoded after the consumer left");
    }

    #[tokio::test]
    async fn test_produce_publishes_single_failure() {
        let json = r#"{"rows": [{"a": {"value": 1}}, {"a": {"value": "#;
        let (sender, mut stream) = ResultChannel::bounded(8);
        tokio::task::spawn_blocking(move || {
            produce(
                json.as_bytes(),
                long_signature(),
                FrameLimiters::unlimited(),
                &sender,
            )
        })
        .await
        .unwrap();

        let err = stream.next_page().await.unwrap_err();
        assert!(err.to_string().contains("Unexpected end-of-input"));
        assert!(stream.next_page().await.unwrap().is_none());
    }
}
