//! Search-service client: the transport seam consumed by query sets,
//! index managers, and the sync engine.

use crate::{
    config::ClientConfig,
    error::{Error, Result},
};
use async_trait::async_trait;
use log::{debug, info};
use once_cell::sync::OnceCell;
use opensearch::{
    OpenSearch,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Refresh behavior requested for a write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Refresh the affected shards immediately.
    Immediate,
    /// Wait until the next scheduled refresh makes the write visible.
    WaitFor,
    /// Do not refresh (the service's default).
    Disabled,
}

impl From<RefreshPolicy> for opensearch::params::Refresh {
    fn from(policy: RefreshPolicy) -> Self {
        match policy {
            RefreshPolicy::Immediate => opensearch::params::Refresh::True,
            RefreshPolicy::WaitFor => opensearch::params::Refresh::WaitFor,
            RefreshPolicy::Disabled => opensearch::params::Refresh::False,
        }
    }
}

/// Extra per-call parameters forwarded to the service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallParams {
    /// Refresh behavior for write calls.
    pub refresh: Option<RefreshPolicy>,
    /// Shard routing value, forwarded on search, count, bulk, and
    /// single-document writes.
    pub routing: Option<String>,
    /// Per-request timeout string (e.g. `"30s"`), applied where the
    /// service call supports one.
    pub timeout: Option<String>,
}

impl CallParams {
    /// Create empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the refresh policy.
    pub fn with_refresh(mut self, policy: RefreshPolicy) -> Self {
        self.refresh = Some(policy);
        self
    }

    /// Set the shard routing value.
    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }
}

/// Operations the core requires from the search service.
///
/// [`OpenSearchClient`] is the production implementation; tests substitute
/// an in-memory double. Every call is request/response: it blocks the
/// caller until the service answers, and a failed call yields no partial
/// results.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Execute a search request and return the raw response envelope.
    async fn search(&self, index: &str, body: Value, params: &CallParams) -> Result<Value>;

    /// Fetch a single document by id; the response carries a `found` flag.
    async fn get(&self, index: &str, id: &str) -> Result<Value>;

    /// Delete a single document by id and return the acknowledgment.
    async fn delete(&self, index: &str, id: &str) -> Result<Value>;

    /// Count documents matching a query body.
    async fn count(&self, index: &str, body: Value, params: &CallParams) -> Result<Value>;

    /// Submit pre-built bulk request lines scoped to one index.
    async fn bulk(&self, index: &str, lines: Vec<Value>, params: &CallParams) -> Result<Value>;

    /// Upsert one document by id.
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: Value,
        params: &CallParams,
    ) -> Result<Value>;

    /// Create an index from a creation payload. Fails with
    /// [`Error::IndexExists`] when the index is already present.
    async fn create_index(&self, index: &str, body: Value) -> Result<()>;

    /// Delete an index. With `ignore_not_found`, a missing index is a
    /// successful no-op.
    async fn delete_index(&self, index: &str, ignore_not_found: bool) -> Result<()>;

    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Refresh an index to make recent writes searchable.
    async fn refresh_index(&self, index: &str) -> Result<()>;
}

/// OpenSearch-backed implementation of [`SearchService`].
#[derive(Clone)]
pub struct OpenSearchClient {
    client: Arc<OpenSearch>,
    config: Arc<ClientConfig>,
}

impl OpenSearchClient {
    /// Create a new client from configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        info!("Initializing OpenSearch client for: {:?}", config.urls);

        let url = config
            .urls
            .first()
            .ok_or_else(|| Error::Validation("No URLs provided".to_string()))?;

        let url = opensearch::http::Url::parse(url)
            .map_err(|e| Error::Validation(format!("Invalid URL: {}", e)))?;

        let conn_pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(conn_pool);

        builder = builder.timeout(config.request_timeout).disable_proxy();

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder =
                builder.auth(opensearch::auth::Credentials::Basic(user.clone(), pass.clone()));
        }

        let transport = builder
            .build()
            .map_err(|e| Error::Service(format!("transport build failed: {}", e)))?;

        let client = OpenSearch::new(transport);

        debug!("OpenSearch client initialized");

        Ok(Self {
            client: Arc::new(client),
            config: Arc::new(config),
        })
    }

    /// Get the underlying OpenSearch client.
    pub fn inner(&self) -> &OpenSearch {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

fn error_reason(body: &Value) -> String {
    body.get("error")
        .and_then(|e| e.get("reason"))
        .and_then(|r| r.as_str())
        .unwrap_or("Unknown error")
        .to_string()
}

#[async_trait]
impl SearchService for OpenSearchClient {
    async fn search(&self, index: &str, body: Value, params: &CallParams) -> Result<Value> {
        let started = Instant::now();

        let indices = [index];
        let mut request = self
            .client
            .search(opensearch::SearchParts::Index(&indices))
            .body(body);
        let routing;
        if let Some(value) = &params.routing {
            routing = [value.as_str()];
            request = request.routing(&routing);
        }
        if let Some(timeout) = &params.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status_code();
        let result: Value = response.json().await?;

        if !status.is_success() {
            return Err(Error::Service(error_reason(&result)));
        }

        debug!(
            "search on {}: took {}ms",
            index,
            started.elapsed().as_millis()
        );
        Ok(result)
    }

    async fn get(&self, index: &str, id: &str) -> Result<Value> {
        debug!("Getting document {} from index {}", id, index);

        let response = self
            .client
            .get(opensearch::GetParts::IndexId(index, id))
            .send()
            .await?;

        let status = response.status_code();
        let result: Value = response.json().await?;

        if !status.is_success() && status != opensearch::http::StatusCode::NOT_FOUND {
            return Err(Error::Service(error_reason(&result)));
        }

        Ok(result)
    }

    async fn delete(&self, index: &str, id: &str) -> Result<Value> {
        debug!("Deleting document {} from index {}", id, index);

        let response = self
            .client
            .delete(opensearch::DeleteParts::IndexId(index, id))
            .send()
            .await?;

        let status = response.status_code();
        let result: Value = response.json().await?;

        if !status.is_success() && status != opensearch::http::StatusCode::NOT_FOUND {
            return Err(Error::Service(error_reason(&result)));
        }

        Ok(result)
    }

    // The count API accepts routing but exposes no per-request timeout;
    // only the transport-level request timeout applies here.
    async fn count(&self, index: &str, body: Value, params: &CallParams) -> Result<Value> {
        let started = Instant::now();

        let indices = [index];
        let mut request = self
            .client
            .count(opensearch::CountParts::Index(&indices))
            .body(body);
        let routing;
        if let Some(value) = &params.routing {
            routing = [value.as_str()];
            request = request.routing(&routing);
        }

        let response = request.send().await?;

        let status = response.status_code();
        let result: Value = response.json().await?;

        if !status.is_success() {
            return Err(Error::Service(error_reason(&result)));
        }

        debug!(
            "count on {}: took {}ms",
            index,
            started.elapsed().as_millis()
        );
        Ok(result)
    }

    async fn bulk(&self, index: &str, lines: Vec<Value>, params: &CallParams) -> Result<Value> {
        debug!("Bulk request with {} lines on index {}", lines.len(), index);

        let body: Vec<opensearch::http::request::JsonBody<Value>> =
            lines.into_iter().map(Into::into).collect();

        let mut request = self
            .client
            .bulk(opensearch::BulkParts::Index(index))
            .body(body);
        if let Some(refresh) = params.refresh {
            request = request.refresh(refresh.into());
        }
        if let Some(routing) = &params.routing {
            request = request.routing(routing);
        }
        if let Some(timeout) = &params.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status_code();
        let result: Value = response.json().await?;

        if !status.is_success() {
            return Err(Error::Service(error_reason(&result)));
        }

        Ok(result)
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: Value,
        params: &CallParams,
    ) -> Result<Value> {
        debug!("Indexing document {} in index {}", id, index);

        let mut request = self
            .client
            .index(opensearch::IndexParts::IndexId(index, id))
            .body(document);
        if let Some(refresh) = params.refresh {
            request = request.refresh(refresh.into());
        }
        if let Some(routing) = &params.routing {
            request = request.routing(routing);
        }
        if let Some(timeout) = &params.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status_code();
        let result: Value = response.json().await?;

        if !status.is_success() {
            return Err(Error::Service(error_reason(&result)));
        }

        Ok(result)
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<()> {
        info!("Creating index: {}", index);

        let response = self
            .client
            .indices()
            .create(opensearch::indices::IndicesCreateParts::Index(index))
            .body(body)
            .send()
            .await?;

        let status = response.status_code();

        if status == opensearch::http::StatusCode::BAD_REQUEST {
            let body: Value = response.json().await?;
            let error_type = body["error"]["type"].as_str().unwrap_or("");

            if error_type == "resource_already_exists_exception" {
                return Err(Error::IndexExists(index.to_string()));
            }

            return Err(Error::Service(error_reason(&body)));
        }

        if !status.is_success() {
            let body: Value = response.json().await?;
            return Err(Error::Service(error_reason(&body)));
        }

        Ok(())
    }

    async fn delete_index(&self, index: &str, ignore_not_found: bool) -> Result<()> {
        info!("Deleting index: {}", index);

        let response = self
            .client
            .indices()
            .delete(opensearch::indices::IndicesDeleteParts::Index(&[index]))
            .send()
            .await?;

        let status = response.status_code();

        if status == opensearch::http::StatusCode::NOT_FOUND {
            if ignore_not_found {
                return Ok(());
            }
            return Err(Error::IndexNotFound(index.to_string()));
        }

        if !status.is_success() {
            let body: Value = response.json().await?;
            return Err(Error::Service(error_reason(&body)));
        }

        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        debug!("Checking if index exists: {}", index);

        let response = self
            .client
            .indices()
            .exists(opensearch::indices::IndicesExistsParts::Index(&[index]))
            .send()
            .await?;

        Ok(response.status_code().is_success())
    }

    async fn refresh_index(&self, index: &str) -> Result<()> {
        debug!("Refreshing index: {}", index);

        self.client
            .indices()
            .refresh(opensearch::indices::IndicesRefreshParts::Index(&[index]))
            .send()
            .await?;

        Ok(())
    }
}

impl std::fmt::Debug for OpenSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchClient")
            .field("urls", &self.config.urls)
            .finish()
    }
}

static GLOBAL_CLIENT: OnceCell<Arc<OpenSearchClient>> = OnceCell::new();

/// Initialize the process-wide client, constructing it on first call.
///
/// The client is global, process-scoped state with no teardown besides
/// process exit. A second call with a different configuration returns the
/// already-initialized client unchanged.
pub fn init_global_client(config: ClientConfig) -> Result<Arc<OpenSearchClient>> {
    if let Some(existing) = GLOBAL_CLIENT.get() {
        return Ok(existing.clone());
    }
    let client = Arc::new(OpenSearchClient::new(config)?);
    let stored = GLOBAL_CLIENT.get_or_init(|| client);
    Ok(stored.clone())
}

/// Get the process-wide client initialized by [`init_global_client`].
pub fn global_client() -> Result<Arc<OpenSearchClient>> {
    GLOBAL_CLIENT
        .get()
        .cloned()
        .ok_or_else(|| Error::Validation("global search client is not initialized".to_string()))
}
