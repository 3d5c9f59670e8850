//! Shared helpers for integration tests.
//!
//! Provides an in-memory query backend that serves canned responses, a
//! generated response body for large results, and a connector that records the
//! endpoints it was asked to reach.

#![allow(dead_code)]

use async_trait::async_trait;
use framestream::{
    BackendConnector, BackendError, BackendQuery, ConnectionConfig, QueryBackend,
};
use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static TRACING: Once = Once::new();

/// Install a test subscriber once per test binary.
///
/// Honors `RUST_LOG`; output is captured by the test harness.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// Signatures and Responses
// ============================================================================

/// Signature JSON with an INTEGER `id` column and a STRING `name` column.
pub const ID_NAME_SIGNATURE: &str = r#"{"columns": [
    {"ordinal": 0, "columnName": "id", "type": {"id": 4, "name": "INTEGER", "rep": "INTEGER"}},
    {"ordinal": 1, "columnName": "name", "type": {"id": 12, "name": "VARCHAR", "rep": "STRING"}}
]}"#;

/// Signature JSON with a single LONG column `n`.
pub const SINGLE_LONG_SIGNATURE: &str = r#"{"columns": [
    {"ordinal": 0, "columnName": "n", "type": {"id": -5, "name": "BIGINT", "rep": "LONG"}}
]}"#;

/// Signature JSON with one array column whose elements are primitive ints.
pub const INT_ARRAY_SIGNATURE: &str = r#"{"columns": [
    {"ordinal": 0, "columnName": "xs", "type": {"id": 2003, "name": "INTEGER ARRAY", "rep": "PRIMITIVE_INT"}}
]}"#;

/// Response body for the `id`/`name` signature with rows `(1, "row1") .. (n, "rown")`.
pub fn id_name_rows(n: usize) -> String {
    let rows: Vec<String> = (1..=n)
        .map(|i| format!(r#"{{"id": {{"value": {i}}}, "name": {{"value": "row{i}"}}}}"#))
        .collect();
    format!(r#"{{"columns": ["id", "name"], "rows": [{}]}}"#, rows.join(", "))
}

// ============================================================================
// Stub Backend
// ============================================================================

struct CannedQuery {
    signature: String,
    body: Body,
}

enum Body {
    Fixed(String),
    Generated { rows: u64, served: Arc<AtomicU64> },
    OpenFails(String),
}

/// In-memory backend serving canned responses keyed by SQL text.
#[derive(Default)]
pub struct StubBackend {
    queries: Mutex<HashMap<String, CannedQuery>>,
    created: AtomicUsize,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `sql`.
    pub fn with_query(self, sql: &str, signature: &str, body: impl Into<String>) -> Self {
        self.insert(sql, signature, Body::Fixed(body.into()));
        self
    }

    /// Serve `rows` generated single-column rows for `sql`.
    ///
    /// The returned counter tracks how many rows the reader has produced.
    pub fn with_generated_query(&self, sql: &str, rows: u64) -> Arc<AtomicU64> {
        let served = Arc::new(AtomicU64::new(0));
        self.insert(
            sql,
            SINGLE_LONG_SIGNATURE,
            Body::Generated {
                rows,
                served: Arc::clone(&served),
            },
        );
        served
    }

    /// Accept `sql` at prepare time but fail to open its result.
    pub fn with_failing_query(self, sql: &str, signature: &str, message: &str) -> Self {
        self.insert(sql, signature, Body::OpenFails(message.to_string()));
        self
    }

    /// Number of queries created so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn insert(&self, sql: &str, signature: &str, body: Body) {
        self.queries.lock().unwrap().insert(
            sql.to_string(),
            CannedQuery {
                signature: signature.to_string(),
                body,
            },
        );
    }
}

#[async_trait]
impl QueryBackend for StubBackend {
    async fn create_query(&self, sql: &str) -> Result<BackendQuery, BackendError> {
        let queries = self.queries.lock().unwrap();
        let query = queries
            .get(sql)
            .ok_or_else(|| BackendError::new(format!("Unknown query: {sql}")))?;
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(BackendQuery::new(sql, query.signature.clone()))
    }

    async fn open_result_stream(
        &self,
        query_id: &str,
    ) -> Result<Box<dyn Read + Send>, BackendError> {
        let queries = self.queries.lock().unwrap();
        let query = queries
            .get(query_id)
            .ok_or_else(|| BackendError::new(format!("Unknown query id: {query_id}")))?;
        match &query.body {
            Body::Fixed(body) => Ok(Box::new(Cursor::new(body.clone().into_bytes()))),
            Body::Generated { rows, served } => {
                Ok(Box::new(GeneratedRows::new(*rows, Arc::clone(served))))
            }
            Body::OpenFails(message) => Err(BackendError::new(message.clone())),
        }
    }
}

// ============================================================================
// Generated Response Body
// ============================================================================

/// Reader that produces `{"rows": [{"n": {"value": 0}}, ...]}` lazily.
pub struct GeneratedRows {
    total: u64,
    next: u64,
    served: Arc<AtomicU64>,
    buffer: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl GeneratedRows {
    pub fn new(total: u64, served: Arc<AtomicU64>) -> Self {
        Self {
            total,
            next: 0,
            served,
            buffer: br#"{"rows": ["#.to_vec(),
            pos: 0,
            finished: false,
        }
    }

    fn refill(&mut self) {
        self.buffer.clear();
        self.pos = 0;
        if self.next < self.total {
            let sep = if self.next == 0 { "" } else { ", " };
            self.buffer
                .extend_from_slice(format!(r#"{sep}{{"n": {{"value": {}}}}}"#, self.next).as_bytes());
            self.next += 1;
            self.served.store(self.next, Ordering::SeqCst);
        } else if !self.finished {
            self.buffer.extend_from_slice(b"]}");
            self.finished = true;
        }
    }
}

impl Read for GeneratedRows {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.buffer.len() {
            self.refill();
        }
        let available = &self.buffer[self.pos..];
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Connector handing out one shared backend and recording requested endpoints.
pub struct RecordingConnector {
    backend: Arc<StubBackend>,
    pub urls: Mutex<Vec<String>>,
    refuse: Mutex<Vec<String>>,
}

impl RecordingConnector {
    pub fn new(backend: Arc<StubBackend>) -> Self {
        Self {
            backend,
            urls: Mutex::new(Vec::new()),
            refuse: Mutex::new(Vec::new()),
        }
    }

    /// Fail every connection attempt to `url`.
    pub fn refuse(&self, url: &str) {
        self.refuse.lock().unwrap().push(url.to_string());
    }

    pub fn requested(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendConnector for RecordingConnector {
    async fn connect(
        &self,
        url: &str,
        _config: &ConnectionConfig,
    ) -> Result<Arc<dyn QueryBackend>, BackendError> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.refuse.lock().unwrap().iter().any(|u| u == url) {
            return Err(BackendError::new(format!("Connection refused: {url}")));
        }
        Ok(Arc::clone(&self.backend) as Arc<dyn QueryBackend>)
    }
}
