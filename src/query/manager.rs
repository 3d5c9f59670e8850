//! Statement lifecycle for one connection.
//!
//! Statement ids are allocated locally because the backend does not track
//! statements. Prepared statements map to the backend query they run, so that
//! several statements may run the same backend query.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::backend::QueryBackend;
use super::{ExecuteResponse, FetchOptions, PreparedQuery, StatementHandle, StatementId};
use crate::error::StatementError;
use crate::frame::FrameLimiter;
use crate::stream::spawn_producer;
use crate::types::Signature;

/// Allocates statement ids and tracks prepared statements.
///
/// All methods take `&self` and may be called concurrently.
pub struct StatementManager {
    connection_id: String,
    backend: Arc<dyn QueryBackend>,
    options: FetchOptions,
    statement_counter: AtomicU32,
    prepared: DashMap<StatementId, Arc<PreparedQuery>>,
}

impl std::fmt::Debug for StatementManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementManager")
            .field("connection_id", &self.connection_id)
            .field("options", &self.options)
            .field("prepared", &self.prepared.len())
            .finish()
    }
}

impl StatementManager {
    /// Create a manager for the given connection.
    ///
    /// # Arguments
    ///
    /// * `connection_id` - Identifier of the owning connection
    /// * `backend` - Service that prepares and runs queries
    /// * `options` - Fetch tuning applied to every execution
    pub fn new(
        connection_id: impl Into<String>,
        backend: Arc<dyn QueryBackend>,
        options: FetchOptions,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            backend,
            options,
            statement_counter: AtomicU32::new(0),
            prepared: DashMap::new(),
        }
    }

    #[must_use]
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    #[must_use]
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    fn next_id(&self) -> StatementId {
        self.statement_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Allocate a new statement id. Nothing else is recorded.
    pub fn create_statement(&self) -> StatementHandle {
        let id = self.next_id();
        debug!(connection_id = %self.connection_id, statement_id = id, "Created statement");
        StatementHandle::new(self.connection_id.clone(), id, None)
    }

    /// Prepare `sql` under a new statement id.
    ///
    /// # Errors
    ///
    /// Returns `StatementError::Backend` if the backend rejects the query and
    /// `StatementError::InvalidSignature` if its signature cannot be parsed.
    /// The id is consumed either way.
    pub async fn prepare(&self, sql: &str) -> Result<StatementHandle, StatementError> {
        let id = self.next_id();
        let prepared = Arc::new(self.prepare_query(sql).await?);
        let handle = StatementHandle::new(
            self.connection_id.clone(),
            id,
            Some(Arc::clone(&prepared.signature)),
        );
        self.prepared.insert(id, prepared);
        debug!(connection_id = %self.connection_id, statement_id = id, "Prepared statement");
        Ok(handle)
    }

    /// Execute a prepared statement.
    ///
    /// Returns as soon as the producer is started; rows arrive through the
    /// response's stream.
    ///
    /// # Errors
    ///
    /// Returns `StatementError::StatementNotFound` if `id` is not prepared on this manager,
    /// and `StatementError::NoRuntime` if called outside a Tokio runtime.
    pub fn execute(
        &self,
        id: StatementId,
        limiter: Arc<dyn FrameLimiter>,
    ) -> Result<ExecuteResponse, StatementError> {
        let prepared = self
            .prepared
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StatementError::StatementNotFound(id))?;
        self.start(id, &prepared, limiter)
    }

    /// Prepare `sql` and execute it immediately for the caller's statement `id`.
    ///
    /// The prepared query is not retained, so `id` cannot be executed again.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`StatementManager::prepare`].
    pub async fn prepare_and_execute(
        &self,
        id: StatementId,
        sql: &str,
        limiter: Arc<dyn FrameLimiter>,
    ) -> Result<ExecuteResponse, StatementError> {
        let prepared = self.prepare_query(sql).await?;
        self.start(id, &prepared, limiter)
    }

    /// Forget a statement. Closing an unknown or already closed id is a no-op.
    pub fn close_statement(&self, id: StatementId) {
        if self.prepared.remove(&id).is_some() {
            debug!(connection_id = %self.connection_id, statement_id = id, "Closed statement");
        }
    }

    /// Forget every prepared statement.
    pub fn close_all(&self) {
        let count = self.prepared.len();
        self.prepared.clear();
        info!(connection_id = %self.connection_id, count, "Closed all statements");
    }

    /// Number of statements currently prepared.
    #[must_use]
    pub fn prepared_count(&self) -> usize {
        self.prepared.len()
    }

    /// Signature of a prepared statement.
    #[must_use]
    pub fn signature(&self, id: StatementId) -> Option<Arc<Signature>> {
        self.prepared
            .get(&id)
            .map(|entry| Arc::clone(&entry.value().signature))
    }

    async fn prepare_query(&self, sql: &str) -> Result<PreparedQuery, StatementError> {
        let query = self.backend.create_query(sql).await?;
        let signature = Signature::from_json(&query.signature_json)?;
        Ok(PreparedQuery {
            query_id: query.id,
            signature: Arc::new(signature),
        })
    }

    fn start(
        &self,
        id: StatementId,
        prepared: &PreparedQuery,
        limiter: Arc<dyn FrameLimiter>,
    ) -> Result<ExecuteResponse, StatementError> {
        if Handle::try_current().is_err() {
            return Err(StatementError::NoRuntime);
        }
        debug!(
            connection_id = %self.connection_id,
            statement_id = id,
            query_id = %prepared.query_id,
            "Executing statement"
        );
        let (stream, _producer) = spawn_producer(
            Arc::clone(&self.backend),
            prepared.query_id.clone(),
            Arc::clone(&prepared.signature),
            limiter,
            self.options.prefetch_pages,
        );
        Ok(ExecuteResponse {
            connection_id: self.connection_id.clone(),
            statement_id: id,
            signature: Arc::clone(&prepared.signature),
            stream,
        })
    }
}
