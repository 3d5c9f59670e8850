//! Boundary to the remote query service.
//!
//! The transport that talks to the service (HTTP, authentication, retries) is
//! not part of this crate. It plugs in through [`QueryBackend`], and
//! [`BackendConnector`] builds one for a selected endpoint.

use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::ConnectionConfig;
use crate::error::BackendError;

/// A query registered with the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendQuery {
    /// Backend token used to run the query.
    pub id: String,
    /// Column schema of the query, serialized as JSON.
    pub signature_json: String,
}

impl BackendQuery {
    pub fn new(id: impl Into<String>, signature_json: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            signature_json: signature_json.into(),
        }
    }
}

/// Remote service that prepares queries and streams their results.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Register `sql` and return its token and signature.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the service rejects the query or cannot be reached.
    async fn create_query(&self, sql: &str) -> Result<BackendQuery, BackendError>;

    /// Run a registered query and return its raw JSON response.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query cannot be started.
    async fn open_result_stream(&self, query_id: &str)
        -> Result<Box<dyn Read + Send>, BackendError>;
}

/// Builds a backend for an endpoint.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    /// Connect to `url`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the connection or authentication fails.
    async fn connect(
        &self,
        url: &str,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn QueryBackend>, BackendError>;
}
