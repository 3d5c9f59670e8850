//! Integration tests for streamed result delivery.
//!
//! These run a full query path against an in-memory backend: prepare,
//! background decoding, paging through the bounded channel, and reading
//! through the cursor.
//!
//! ```bash
//! cargo test --test streaming_tests
//! ```

mod common;

use common::{
    id_name_rows, init_tracing, StubBackend, ID_NAME_SIGNATURE, INT_ARRAY_SIGNATURE,
    SINGLE_LONG_SIGNATURE,
};
use framestream::stream::spawn_producer;
use framestream::{
    Connection, ConnectionConfig, DecodeError, FrameLimiters, FrameStreamError, Signature,
    StreamError, Value,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Helper Functions
// ============================================================================

fn connect(backend: StubBackend, fetch_size: Option<usize>) -> Connection {
    init_tracing();
    let config = ConnectionConfig::default()
        .url("http://stub:8765")
        .fetch_size(fetch_size);
    Connection::with_backend("http://stub:8765", config, Arc::new(backend))
        .expect("Connection should open")
}

// ============================================================================
// Section 1: Paging
// ============================================================================

#[tokio::test]
async fn test_five_rows_in_pages_of_two() {
    let backend = StubBackend::new().with_query("q", ID_NAME_SIGNATURE, id_name_rows(5));
    let connection = connect(backend, Some(2));

    let handle = connection.prepare("q").await.expect("Prepare should succeed");
    let mut response = connection
        .execute_with_limiter(handle.id, FrameLimiters::row_count_limited(2).unwrap())
        .expect("Execute should succeed");

    let mut pages = Vec::new();
    while let Some(page) = response.stream.next_page().await.expect("Page should decode") {
        pages.push(page);
    }

    assert_eq!(pages.len(), 3, "5 rows in pages of 2 should give 3 pages");
    assert_eq!(
        pages.iter().map(|p| p.len()).collect::<Vec<_>>(),
        vec![2, 2, 1]
    );
    assert_eq!(
        pages.iter().map(|p| p.offset).collect::<Vec<_>>(),
        vec![2, 4, 5]
    );
    assert_eq!(
        pages.iter().map(|p| p.done).collect::<Vec<_>>(),
        vec![false, false, true]
    );
}

#[tokio::test]
async fn test_exact_multiple_ends_with_done_page() {
    let backend = StubBackend::new().with_query("q", ID_NAME_SIGNATURE, id_name_rows(4));
    let connection = connect(backend, Some(2));

    let handle = connection.prepare("q").await.unwrap();
    let mut response = connection
        .execute_with_limiter(handle.id, FrameLimiters::row_count_limited(2).unwrap())
        .unwrap();

    let mut pages = Vec::new();
    while let Some(page) = response.stream.next_page().await.unwrap() {
        pages.push(page);
    }
    assert_eq!(pages.len(), 2);
    assert!(pages[1].done);
    assert_eq!(pages[1].offset, 4);
}

#[tokio::test]
async fn test_cursor_reads_rows_in_order_across_pages() {
    let backend = StubBackend::new().with_query("q", ID_NAME_SIGNATURE, id_name_rows(25));
    let connection = connect(backend, Some(3));

    let mut cursor = connection.query("q").await.expect("Query should succeed");
    let mut ids = Vec::new();
    while cursor.next().await.expect("Row should decode") {
        ids.push(cursor.get_i32(0).unwrap());
        assert_eq!(
            cursor.get_string(1).unwrap(),
            Some(format!("row{}", ids.len()))
        );
    }

    assert_eq!(ids, (1..=25).collect::<Vec<_>>());
    assert_eq!(cursor.row_number(), 25);
    assert!(!cursor.next().await.unwrap(), "Exhausted cursor stays exhausted");
}

#[tokio::test]
async fn test_empty_result() {
    let backend = StubBackend::new().with_query("q", ID_NAME_SIGNATURE, r#"{"rows": []}"#);
    let connection = connect(backend, Some(10));

    let mut cursor = connection.query("q").await.unwrap();
    assert!(!cursor.next().await.unwrap());
    assert_eq!(cursor.row_number(), 0);
}

#[tokio::test]
async fn test_response_without_rows_field() {
    let backend =
        StubBackend::new().with_query("q", ID_NAME_SIGNATURE, r#"{"columns": ["id", "name"]}"#);
    let connection = connect(backend, None);

    let mut cursor = connection.query("q").await.unwrap();
    assert!(!cursor.next().await.unwrap());
}

#[tokio::test]
async fn test_unbounded_fetch_size_gives_single_page() {
    let backend = StubBackend::new().with_query("q", ID_NAME_SIGNATURE, id_name_rows(250));
    let connection = connect(backend, None);

    let handle = connection.prepare("q").await.unwrap();
    let mut response = connection
        .execute_with_limiter(handle.id, FrameLimiters::unlimited())
        .unwrap();

    let page = response.stream.next_page().await.unwrap().unwrap();
    assert_eq!(page.len(), 250);
    assert!(page.done);
    assert!(response.stream.next_page().await.unwrap().is_none());
}

// ============================================================================
// Section 2: Value Decoding
// ============================================================================

#[tokio::test]
async fn test_single_column_rows_and_nulls() {
    let body = r#"{"rows": [{"n": {"value": 7}}, {"n": {"value": null}}, {"n": {"value": "9"}}]}"#;
    let backend = StubBackend::new().with_query("q", SINGLE_LONG_SIGNATURE, body);
    let connection = connect(backend, Some(100));

    let mut cursor = connection.query("q").await.unwrap();

    assert!(cursor.next().await.unwrap());
    assert_eq!(cursor.get_i64(0).unwrap(), 7);
    assert!(!cursor.was_null());
    assert_eq!(cursor.get_value(0).unwrap(), Value::Long(7));

    assert!(cursor.next().await.unwrap());
    assert_eq!(cursor.get_i64(0).unwrap(), 0);
    assert!(cursor.was_null());

    assert!(cursor.next().await.unwrap());
    assert_eq!(cursor.get_i64(0).unwrap(), 9);
    assert!(!cursor.was_null());

    assert!(cursor.get_value(1).is_err(), "Only one column exists");
    assert!(!cursor.next().await.unwrap());
}

#[tokio::test]
async fn test_cursor_style_does_not_change_decoded_rows() {
    let list_single = r#"{"columns": [
        {"columnName": "n", "type": {"id": -5, "name": "BIGINT", "rep": "LONG"}}
    ], "cursorFactory": {"style": "LIST", "clazz": null, "fieldNames": null}}"#;
    let map_pair = r#"{"columns": [
        {"columnName": "id", "type": {"id": 4, "name": "INTEGER", "rep": "INTEGER"}},
        {"columnName": "name", "type": {"id": 12, "name": "VARCHAR", "rep": "STRING"}}
    ], "cursorFactory": {"style": "MAP", "fieldNames": ["id", "name"]}}"#;
    let backend = StubBackend::new()
        .with_query("single", list_single, r#"{"rows": [{"n": {"value": 7}}]}"#)
        .with_query("pair", map_pair, id_name_rows(2));
    let connection = connect(backend, Some(100));

    let mut cursor = connection.query("single").await.unwrap();
    assert!(cursor.next().await.unwrap());
    assert_eq!(cursor.get_i64(0).unwrap(), 7);
    assert!(!cursor.next().await.unwrap());

    let mut cursor = connection.query("pair").await.unwrap();
    assert!(cursor.next().await.unwrap());
    assert_eq!(cursor.get_i32(0).unwrap(), 1);
    assert_eq!(cursor.get_string(1).unwrap(), Some("row1".to_string()));
}

#[tokio::test]
async fn test_primitive_array_column() {
    let body = r#"{"rows": [{"xs": {"value": [1, 2, 3]}}, {"xs": {"value": []}}]}"#;
    let backend = StubBackend::new().with_query("q", INT_ARRAY_SIGNATURE, body);
    let connection = connect(backend, Some(100));

    let mut cursor = connection.query("q").await.unwrap();
    assert!(cursor.next().await.unwrap());
    assert_eq!(
        cursor.get_array(0).unwrap(),
        Some(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert!(cursor.next().await.unwrap());
    assert_eq!(cursor.get_array(0).unwrap(), Some(Vec::new()));
}

#[tokio::test]
async fn test_null_in_primitive_array_fails_stream() {
    let body = r#"{"rows": [{"xs": {"value": [1, null, 3]}}]}"#;
    let backend = StubBackend::new().with_query("q", INT_ARRAY_SIGNATURE, body);
    let connection = connect(backend, Some(100));

    let mut cursor = connection.query("q").await.unwrap();
    let err = cursor.next().await.unwrap_err();
    assert!(matches!(
        err,
        StreamError::Decode(DecodeError::NullInPrimitiveArray)
    ));
    assert!(err
        .to_string()
        .contains("Primitive array cannot contain null values"));
    assert!(!cursor.next().await.unwrap(), "Failure is delivered once");
}

// ============================================================================
// Section 3: Failures
// ============================================================================

#[tokio::test]
async fn test_truncated_response_fails_after_complete_pages() {
    let body = r#"{"rows": [{"id": {"value": 1}, "name": {"value": "a"}},
                            {"id": {"value": 2}, "name": {"value": "b"}},
                            {"id": {"value": 3}, "name": {"value": "c""#;
    let backend = StubBackend::new().with_query("q", ID_NAME_SIGNATURE, body);
    let connection = connect(backend, Some(1));

    let mut cursor = connection.query("q").await.unwrap();
    assert!(cursor.next().await.unwrap());
    assert_eq!(cursor.get_i32(0).unwrap(), 1);
    assert!(cursor.next().await.unwrap());
    assert_eq!(cursor.get_i32(0).unwrap(), 2);

    let err = cursor.next().await.unwrap_err();
    assert!(matches!(err, StreamError::Decode(_)), "got {err:?}");
    assert!(
        err.to_string().contains("Unexpected end-of-input"),
        "got {err}"
    );
}

#[tokio::test]
async fn test_unsupported_column_kind_names_the_kind() {
    let signature = r#"{"columns": [
        {"columnName": "t", "type": {"id": 93, "name": "TIMESTAMP", "rep": "JAVA_SQL_TIMESTAMP"}}
    ]}"#;
    let body = r#"{"rows": [{"t": {"value": 1700000000000}}]}"#;
    let backend = StubBackend::new().with_query("q", signature, body);
    let connection = connect(backend, Some(100));

    let mut cursor = connection.query("q").await.unwrap();
    let err = cursor.next().await.unwrap_err();
    assert!(
        err.to_string()
            .contains("Unable to parse JAVA_SQL_TIMESTAMP from stream!"),
        "got {err}"
    );
}

#[tokio::test]
async fn test_open_failure_is_delivered_through_stream() {
    let backend =
        StubBackend::new().with_failing_query("q", ID_NAME_SIGNATURE, "result expired");
    let connection = connect(backend, Some(100));

    let mut cursor = connection
        .query("q")
        .await
        .expect("Execution starts before the result is opened");
    let err = cursor.next().await.unwrap_err();
    assert!(matches!(err, StreamError::Backend(_)));
    assert!(err.to_string().contains("result expired"));
}

#[tokio::test]
async fn test_unknown_query_fails_at_prepare() {
    let connection = connect(StubBackend::new(), Some(100));
    let err = connection.query("nope").await.unwrap_err();
    assert!(matches!(err, FrameStreamError::Statement(_)), "got {err:?}");
}

// ============================================================================
// Section 4: Backpressure and Cancellation
// ============================================================================

#[tokio::test]
async fn test_producer_stops_when_consumer_drops_stream() {
    init_tracing();
    const TOTAL: u64 = 1_000_000;

    let backend = StubBackend::new();
    let served = backend.with_generated_query("big", TOTAL);
    let signature = Arc::new(Signature::from_json(SINGLE_LONG_SIGNATURE).unwrap());

    let (mut stream, handle) = spawn_producer(
        Arc::new(backend),
        "big".to_string(),
        signature,
        FrameLimiters::row_count_limited(10).unwrap(),
        1,
    );

    let first = stream.next_page().await.unwrap().unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(first.rows[0], framestream::Row::Scalar(Value::Long(0)));
    drop(stream);

    let published = tokio::time::timeout(Duration::from_secs(30), handle)
        .await
        .expect("Producer should stop once the stream is dropped")
        .expect("Producer task should not panic");

    assert!((10..TOTAL).contains(&published), "published {published} rows");
    assert!(served.load(Ordering::SeqCst) < TOTAL);
}

#[tokio::test]
async fn test_closing_cursor_releases_producer() {
    init_tracing();
    let backend = StubBackend::new();
    let served = backend.with_generated_query("big", 500_000);
    let connection = Connection::with_backend(
        "http://stub:8765",
        ConnectionConfig::default()
            .url("http://stub:8765")
            .fetch_size(Some(5))
            .prefetch_pages(1),
        Arc::new(backend),
    )
    .unwrap();

    let mut cursor = connection.query("big").await.unwrap();
    for expected in 0..12 {
        assert!(cursor.next().await.unwrap());
        assert_eq!(cursor.get_i64(0).unwrap(), expected);
    }
    cursor.close();
    assert!(!cursor.next().await.unwrap());

    tokio::time::sleep(Duration::from_millis(200)).await;
    let after_close = served.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(served.load(Ordering::SeqCst), after_close);
    assert!(after_close < 500_000);
}

#[tokio::test]
async fn test_concurrent_queries_on_one_connection() {
    let backend = StubBackend::new()
        .with_query("a", ID_NAME_SIGNATURE, id_name_rows(40))
        .with_query("b", ID_NAME_SIGNATURE, id_name_rows(60));
    let connection = Arc::new(connect(backend, Some(7)));

    let mut tasks = Vec::new();
    for sql in ["a", "b", "a", "b"] {
        let connection = Arc::clone(&connection);
        tasks.push(tokio::spawn(async move {
            let mut cursor = connection.query(sql).await.unwrap();
            let mut sum = 0i64;
            while cursor.next().await.unwrap() {
                sum += cursor.get_i64(0).unwrap();
            }
            sum
        }));
    }

    let mut sums = Vec::new();
    for task in tasks {
        sums.push(task.await.unwrap());
    }
    assert_eq!(sums, vec![820, 1830, 820, 1830]);
}
