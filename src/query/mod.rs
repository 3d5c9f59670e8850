//! Query preparation, execution and statement lifecycle.
//!
//! The query module is organized into:
//! - `backend` - Traits implemented by the remote query service
//! - `manager` - Statement id allocation and prepared statement tracking
//!

pub mod backend;
pub mod manager;

use std::sync::Arc;

pub use backend::{BackendConnector, BackendQuery, QueryBackend};
pub use manager::StatementManager;

use crate::cursor::ResultCursor;
use crate::error::AccessError;
use crate::stream::{ResultStream, DEFAULT_PREFETCH_PAGES};
use crate::types::Signature;

/// Per-connection statement identifier.
pub type StatementId = u32;

/// Reference to a statement of a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementHandle {
    pub connection_id: String,
    pub id: StatementId,
    /// Present once the statement has been prepared.
    pub signature: Option<Arc<Signature>>,
}

impl StatementHandle {
    pub fn new(
        connection_id: impl Into<String>,
        id: StatementId,
        signature: Option<Arc<Signature>>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            id,
            signature,
        }
    }
}

/// A backend query bound to a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    /// Backend token used to run the query.
    pub query_id: String,
    pub signature: Arc<Signature>,
}

/// Fetch tuning shared by every execution of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Pages decoded ahead of the consumer.
    pub prefetch_pages: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            prefetch_pages: DEFAULT_PREFETCH_PAGES,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn prefetch_pages(mut self, pages: usize) -> Self {
        self.prefetch_pages = pages;
        self
    }
}

/// Result of starting an execution.
#[derive(Debug)]
pub struct ExecuteResponse {
    pub connection_id: String,
    pub statement_id: StatementId,
    pub signature: Arc<Signature>,
    /// Pages of the result, produced in the background.
    pub stream: ResultStream,
}

impl ExecuteResponse {
    /// Wrap the stream in a cursor reading the decoder's row shape.
    ///
    /// # Errors
    ///
    /// Returns `AccessError::InvalidAccessor` if the columns cannot be addressed.
    pub fn into_cursor(self) -> Result<ResultCursor, AccessError> {
        ResultCursor::new(self.stream, self.signature)
    }
}
