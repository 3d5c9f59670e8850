//! # framestream-rs
//!
//! Client library for remote SQL query services that stream results back as a
//! sequence of bounded pages.
//!
//! A query is prepared against a backend, which returns a token and the column
//! signature. Executing it opens the backend's JSON response and decodes it
//! incrementally on a background task. Decoded rows are cut into pages by a
//! frame limiter and handed to the caller's cursor through a bounded channel,
//! so memory stays flat no matter how large the result is.
//!
//! ## Features
//!
//! - **Streaming decode**: Rows are parsed token by token, never materializing the response
//! - **Frame limits**: Pages bounded by row count, elapsed time, or both
//! - **Backpressure**: Decoding pauses while the consumer is behind
//! - **Row accessors**: Columns read uniformly from sequence, scalar, record and map rows
//! - **Statement lifecycle**: Concurrent-safe statement ids and prepared statement tracking
//! - **Client-side load balancing**: Round-robin, shuffled round-robin and random endpoint selection
//!
//! ## Query Example
//!
//! ```no_run
//! use framestream::*;
//! use std::sync::Arc;
//!
//! # async fn example(backend: Arc<dyn QueryBackend>) -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectionConfig::parse("url=http://localhost:8765;fetch_size=1000")?;
//! let connection = Connection::with_backend("http://localhost:8765", config, backend)?;
//!
//! let mut cursor = connection.query("SELECT id, name FROM users").await?;
//! while cursor.next().await? {
//!     let id = cursor.get_i64(0)?;
//!     let name = cursor.get_string(1)?;
//!     println!("{id}: {name:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Paging Example
//!
//! ```
//! use framestream::{FrameBuilder, FrameLimiters, Row, Value};
//!
//! let limiter = FrameLimiters::row_count_limited(2).unwrap();
//! let rows = (0..5).map(|i| Row::Scalar(Value::Int(i)));
//! let pages: Vec<_> = FrameBuilder::new(rows, limiter).collect();
//!
//! assert_eq!(pages.len(), 3);
//! assert!(pages[2].done);
//! assert_eq!(pages[2].offset, 5);
//! ```

// Module declarations
pub mod connection;
pub mod cursor;
pub mod error;
pub mod frame;
pub mod ha;
pub mod query;
pub mod stream;
pub mod types;

// =============================================================================
// Connection
// =============================================================================

/// Re-export the connection facade and its configuration.
pub use connection::{Connection, ConnectionConfig};

// =============================================================================
// Error Types
// =============================================================================

/// Re-export error types for convenient error handling.
pub use error::{
    AccessError, BackendError, ConfigError, DecodeError, FrameStreamError, Result,
    StatementError, StreamError,
};

// =============================================================================
// Type System
// =============================================================================

pub use types::{
    sql_type, ColumnMetaData, ColumnType, CursorFactory, CursorStyle, FieldDescriptor, Record,
    Rep, Row, Signature, Value,
};

// =============================================================================
// Frames
// =============================================================================

/// Page limits and result pages.
pub use frame::{
    Clock, FrameBuilder, FrameLimiter, FrameLimiters, LimitContext, ManualClock, ResultEnvelope,
    ResultPage, SystemClock,
};

// =============================================================================
// Streaming
// =============================================================================

pub use stream::{FrameSender, ResponseDecoder, ResultChannel, ResultStream};

// =============================================================================
// Cursors
// =============================================================================

pub use cursor::{Accessor, Getter, PositionedCursor, ResultCursor, RowShape};

// =============================================================================
// Query Execution Types
// =============================================================================

/// Statement lifecycle and the backend boundary.
pub use query::{
    BackendConnector, BackendQuery, ExecuteResponse, FetchOptions, QueryBackend,
    StatementHandle, StatementId, StatementManager,
};

// =============================================================================
// Load Balancing
// =============================================================================

pub use ha::{EndpointRegistry, LbStrategy};
