//! Connection facade.
//!
//! A [`Connection`] owns the backend selected for it, the statement manager
//! scoped to it, and the page limiter derived from its configuration. Queries
//! are executed through the connection and read through a [`ResultCursor`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use super::config::ConnectionConfig;
use crate::cursor::ResultCursor;
use crate::error::Result;
use crate::frame::FrameLimiter;
use crate::ha::EndpointRegistry;
use crate::query::{
    BackendConnector, ExecuteResponse, QueryBackend, StatementHandle, StatementId,
    StatementManager,
};

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_connection_id() -> String {
    format!("conn-{}", CONNECTION_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// An open connection to a query service endpoint.
///
/// # Example
///
/// ```no_run
/// use framestream::*;
///
/// # async fn example(connector: &dyn BackendConnector) -> std::result::Result<(), Box<dyn std::error::Error>> {
/// let registry = EndpointRegistry::new();
/// let config = ConnectionConfig::parse(
///     "use_client_side_lb=true;lb_urls=http://a:8765,http://b:8765;fetch_size=500",
/// )?;
/// let connection = Connection::open(config, connector, &registry).await?;
///
/// let mut cursor = connection.query("SELECT id, name FROM users").await?;
/// while cursor.next().await? {
///     println!("{} {:?}", cursor.get_i64(0)?, cursor.get_string(1)?);
/// }
///
/// connection.close();
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    url: String,
    config: ConnectionConfig,
    statements: StatementManager,
    limiter: Arc<dyn FrameLimiter>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("url", &self.url)
            .field("statements", &self.statements)
            .finish()
    }
}

impl Connection {
    /// Open a connection.
    ///
    /// The endpoint is resolved from the configuration (through `registry`
    /// when client-side load balancing is on) and handed to `connector`.
    ///
    /// # Arguments
    ///
    /// * `config` - Connection settings
    /// * `connector` - Builds the backend for the selected endpoint
    /// * `registry` - Shared load-balancing rotation state
    ///
    /// # Errors
    ///
    /// Returns `FrameStreamError::Config` for invalid settings and
    /// `FrameStreamError::Backend` if the connector fails.
    pub async fn open(
        config: ConnectionConfig,
        connector: &dyn BackendConnector,
        registry: &EndpointRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let url = config.resolve_url(registry)?;
        let backend = connector.connect(&url, &config).await?;
        Self::with_backend(url, config, backend)
    }

    /// Wrap an already connected backend.
    ///
    /// # Errors
    ///
    /// Returns `FrameStreamError::Config` if the configured page bounds are invalid.
    pub fn with_backend(
        url: impl Into<String>,
        config: ConnectionConfig,
        backend: Arc<dyn QueryBackend>,
    ) -> Result<Self> {
        let url = url.into();
        let limiter = config.frame_limiter()?;
        let id = next_connection_id();
        info!(connection_id = %id, url = %url, "Opened connection");
        let statements = StatementManager::new(id, backend, config.fetch_options());
        Ok(Self {
            url,
            config,
            statements,
            limiter,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        self.statements.connection_id()
    }

    /// Endpoint this connection talks to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Statement manager of this connection.
    #[must_use]
    pub fn statements(&self) -> &StatementManager {
        &self.statements
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Allocate a statement id.
    pub fn create_statement(&self) -> StatementHandle {
        self.statements.create_statement()
    }

    /// Prepare `sql` for later execution.
    ///
    /// # Errors
    ///
    /// Returns `FrameStreamError::Statement` if the backend rejects the query.
    pub async fn prepare(&self, sql: &str) -> Result<StatementHandle> {
        Ok(self.statements.prepare(sql).await?)
    }

    /// Execute a prepared statement and return a cursor over its rows.
    ///
    /// # Errors
    ///
    /// Returns `FrameStreamError::Statement` if `id` is not prepared or the call
    /// is made outside a Tokio runtime.
    pub fn execute(&self, id: StatementId) -> Result<ResultCursor> {
        let response = self.statements.execute(id, Arc::clone(&self.limiter))?;
        Ok(response.into_cursor()?)
    }

    /// Execute a prepared statement with a page limiter other than the configured one.
    ///
    /// # Errors
    ///
    /// Returns `FrameStreamError::Statement` if `id` is not prepared or the call
    /// is made outside a Tokio runtime.
    pub fn execute_with_limiter(
        &self,
        id: StatementId,
        limiter: Arc<dyn FrameLimiter>,
    ) -> Result<ExecuteResponse> {
        Ok(self.statements.execute(id, limiter)?)
    }

    /// Run `sql` once and return a cursor over its rows.
    ///
    /// # Errors
    ///
    /// Returns `FrameStreamError::Statement` if the backend rejects the query.
    pub async fn query(&self, sql: &str) -> Result<ResultCursor> {
        let handle = self.statements.create_statement();
        let response = self
            .statements
            .prepare_and_execute(handle.id, sql, Arc::clone(&self.limiter))
            .await?;
        Ok(response.into_cursor()?)
    }

    /// Close a statement. Unknown ids are ignored.
    pub fn close_statement(&self, id: StatementId) {
        self.statements.close_statement(id);
    }

    /// Close the connection and forget its prepared statements.
    ///
    /// Result streams already handed out keep their producers until they are dropped.
    pub fn close(self) {
        self.statements.close_all();
        info!(connection_id = %self.id(), "Closed connection");
    }
}
