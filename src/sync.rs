//! Bulk synchronization of source records into an index.

use crate::{
    bulk::{BulkOperation, BulkResponse},
    client::{CallParams, SearchService},
    error::{Error, Result},
    schema::Schema,
};
use log::{debug, info};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

/// Default number of buffered bulk entries before a flush.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Options controlling a [`SyncEngine::rebuild`] run.
pub struct RebuildOptions<R> {
    /// Cap on the number of records indexed, applied after filtering and
    /// the offset.
    pub limit: Option<usize>,
    /// Number of filtered records to skip before indexing begins.
    pub offset: Option<usize>,
    /// Predicate selecting which source records participate at all.
    pub filter: Option<Box<dyn Fn(&R) -> bool + Send + Sync>>,
    /// Bulk buffer threshold, counted in request entries (an indexed record
    /// contributes two: its action line and its body). `None` or zero
    /// disables batching and indexes records one call at a time.
    pub batch_size: Option<usize>,
    /// Per-call parameters forwarded to the service.
    pub params: CallParams,
}

impl<R> Default for RebuildOptions<R> {
    fn default() -> Self {
        Self {
            limit: None,
            offset: None,
            filter: None,
            batch_size: Some(DEFAULT_BATCH_SIZE),
            params: CallParams::default(),
        }
    }
}

impl<R> RebuildOptions<R> {
    /// Options with batching at [`DEFAULT_BATCH_SIZE`] and no windowing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of records indexed.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip this many filtered records before indexing.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Only index records the predicate accepts.
    pub fn with_filter(mut self, filter: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Set the bulk buffer threshold, in entries.
    pub fn with_batch_size(mut self, entries: usize) -> Self {
        self.batch_size = Some(entries);
        self
    }

    /// Index records one request at a time instead of in bulk.
    pub fn without_batching(mut self) -> Self {
        self.batch_size = None;
        self
    }

    /// Attach per-call parameters.
    pub fn with_params(mut self, params: CallParams) -> Self {
        self.params = params;
        self
    }
}

impl<R> std::fmt::Debug for RebuildOptions<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebuildOptions")
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("filtered", &self.filter.is_some())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

/// Counters reported by a [`SyncEngine::rebuild`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildStats {
    /// Records transformed and sent to the service.
    pub records: usize,
    /// Service requests issued (bulk flushes or single-document calls).
    pub requests: usize,
}

/// Pushes source records through a schema's transformation pipeline and
/// into its index, in bulk batches or one document at a time.
pub struct SyncEngine<S: Schema> {
    service: Arc<dyn SearchService>,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema> SyncEngine<S> {
    /// Create a sync engine for this schema's index.
    pub fn new(service: Arc<dyn SearchService>) -> Self {
        Self {
            service,
            _schema: PhantomData,
        }
    }

    /// Transform one source record into its indexable document body.
    pub fn transform_record(record: &S::Record) -> Result<Map<String, Value>> {
        S::fields().transform(record)
    }

    /// Rebuild the index contents from a record source.
    ///
    /// Records are filtered first, then windowed by offset and limit, then
    /// transformed and indexed. In batched mode buffered entries are
    /// flushed once the buffer grows past `batch_size`, with one final
    /// flush for the remainder. Transformation errors abort the run; a
    /// flush whose response reports item failures aborts with
    /// [`Error::Bulk`].
    pub async fn rebuild<I>(&self, source: I, options: RebuildOptions<S::Record>) -> Result<RebuildStats>
    where
        I: IntoIterator<Item = S::Record>,
    {
        let offset = options.offset.unwrap_or(0);
        let mut stats = RebuildStats::default();
        let mut buffer: Vec<Value> = Vec::new();
        let mut rank = 0usize;

        for record in source {
            if let Some(filter) = options.filter.as_ref() {
                if !filter(&record) {
                    continue;
                }
            }
            let position = rank;
            rank += 1;
            if position < offset {
                continue;
            }
            if let Some(limit) = options.limit {
                if position >= offset + limit {
                    break;
                }
            }

            let id = S::document_id(&record);
            let doc = Self::transform_record(&record)?;
            stats.records += 1;

            match options.batch_size {
                None | Some(0) => {
                    debug!("indexing document {} into {}", id, S::index_name());
                    self.service
                        .index_document(S::index_name(), &id, Value::Object(doc), &options.params)
                        .await?;
                    stats.requests += 1;
                }
                Some(batch_size) => {
                    buffer.extend(
                        BulkOperation::Index {
                            id,
                            doc: Value::Object(doc),
                        }
                        .to_lines(),
                    );
                    // Flush once the buffer grows past the threshold, not
                    // when it reaches it.
                    if buffer.len() > batch_size {
                        self.flush(&mut buffer, &options.params, &mut stats).await?;
                    }
                }
            }
        }

        if !buffer.is_empty() {
            self.flush(&mut buffer, &options.params, &mut stats).await?;
        }

        info!(
            "rebuilt {}: {} records in {} requests",
            S::index_name(),
            stats.records,
            stats.requests
        );
        Ok(stats)
    }

    async fn flush(
        &self,
        buffer: &mut Vec<Value>,
        params: &CallParams,
        stats: &mut RebuildStats,
    ) -> Result<()> {
        debug!(
            "flushing {} bulk entries to {}",
            buffer.len(),
            S::index_name()
        );
        let lines = std::mem::take(buffer);
        let ack = self.service.bulk(S::index_name(), lines, params).await?;
        stats.requests += 1;
        check_bulk_ack(&ack)
    }

    /// Transform and index one record.
    pub async fn rebuild_record(&self, record: &S::Record, params: &CallParams) -> Result<Value> {
        let id = S::document_id(record);
        let doc = Self::transform_record(record)?;
        self.update(&id, Value::Object(doc), params).await
    }

    /// Index a pre-built document body under an explicit id.
    pub async fn update(&self, id: &str, document: Value, params: &CallParams) -> Result<Value> {
        self.service
            .index_document(S::index_name(), id, document, params)
            .await
    }

    /// Send pre-built bulk request lines and fail on any item error.
    pub async fn update_bulk(&self, lines: Vec<Value>, params: &CallParams) -> Result<Value> {
        let ack = self.service.bulk(S::index_name(), lines, params).await?;
        check_bulk_ack(&ack)?;
        Ok(ack)
    }
}

impl<S: Schema> std::fmt::Debug for SyncEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("index", &S::index_name())
            .finish()
    }
}

fn check_bulk_ack(ack: &Value) -> Result<()> {
    if !ack["errors"].as_bool().unwrap_or(false) {
        return Ok(());
    }
    let response: BulkResponse = serde_json::from_value(ack.clone())?;
    let errors = response.failures();
    let failed = errors.len();
    Err(Error::Bulk {
        succeeded: response.items.len().saturating_sub(failed),
        failed,
        errors,
    })
}
