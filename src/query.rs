//! Chainable query construction with deferred, once-only execution.

use crate::{
    client::{CallParams, SearchService},
    document::HydratedDocument,
    error::{Error, Result},
    schema::Schema,
};
use log::debug;
use serde_json::{Map, Value, json};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;

struct Materialized {
    docs: Vec<HydratedDocument>,
    total: u64,
    raw: Value,
}

/// An immutable query specification paired with a lazily-materialized
/// result list.
///
/// Every chain method returns a new `QuerySet`; the receiver is never
/// mutated and never shares the new set's result cache. Results are
/// fetched on first observation ([`fetch`](Self::fetch), indexing,
/// slicing) and cached for the life of that `QuerySet`; repeat reads
/// reuse the cache without further service calls.
pub struct QuerySet<S: Schema> {
    service: Arc<dyn SearchService>,
    body: Map<String, Value>,
    params: CallParams,
    cache: OnceCell<Materialized>,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema> QuerySet<S> {
    /// Create a query set matching all documents in the schema's index.
    pub fn new(service: Arc<dyn SearchService>) -> Self {
        let mut body = Map::new();
        body.insert("query".to_string(), json!({"match_all": {}}));
        Self {
            service,
            body,
            params: CallParams::default(),
            cache: OnceCell::new(),
            _schema: PhantomData,
        }
    }

    fn chain(&self) -> Self {
        Self {
            service: self.service.clone(),
            body: self.body.clone(),
            params: self.params.clone(),
            cache: OnceCell::new(),
            _schema: PhantomData,
        }
    }

    /// A fresh, unmaterialized copy of this query set.
    pub fn all(&self) -> Self {
        self.chain()
    }

    /// Replace the query clause wholesale.
    pub fn query(&self, clause: Value) -> Self {
        let mut qs = self.chain();
        qs.body.insert("query".to_string(), clause);
        qs
    }

    /// Replace the entire request body, bypassing the clause, paging, and
    /// sort helpers.
    pub fn set_body(&self, body: Map<String, Value>) -> Self {
        let mut qs = self.chain();
        qs.body = body;
        qs
    }

    /// Set the result-size cap, or remove it with `None`.
    pub fn limit(&self, limit: Option<usize>) -> Self {
        let mut qs = self.chain();
        match limit {
            Some(limit) => {
                qs.body.insert("size".to_string(), json!(limit));
            }
            None => {
                qs.body.remove("size");
            }
        }
        qs
    }

    /// Set the starting position, or remove it with `None`.
    pub fn offset(&self, offset: Option<usize>) -> Self {
        let mut qs = self.chain();
        match offset {
            Some(offset) => {
                qs.body.insert("from".to_string(), json!(offset));
            }
            None => {
                qs.body.remove("from");
            }
        }
        qs
    }

    /// Set the sort specification: a single field name, a field-to-direction
    /// map, or an ordered list of either.
    pub fn order_by(&self, spec: Value) -> Self {
        let mut qs = self.chain();
        qs.body.insert("sort".to_string(), spec);
        qs
    }

    /// Attach extra per-call parameters.
    pub fn with_params(&self, params: CallParams) -> Self {
        let mut qs = self.chain();
        qs.params = params;
        qs
    }

    /// The current request body.
    pub fn body(&self) -> &Map<String, Value> {
        &self.body
    }

    /// Whether results have been materialized.
    pub fn is_materialized(&self) -> bool {
        self.cache.initialized()
    }

    /// The cached result list, when already materialized.
    pub fn results(&self) -> Option<&[HydratedDocument]> {
        self.cache.get().map(|m| m.docs.as_slice())
    }

    /// The service-reported total for the last materialization.
    pub fn total_count(&self) -> Option<u64> {
        self.cache.get().map(|m| m.total)
    }

    /// The raw response envelope for the last materialization.
    pub fn raw_response(&self) -> Option<&Value> {
        self.cache.get().map(|m| &m.raw)
    }

    /// Materialize and return the result list. Runs the search at most
    /// once per query set; later calls reuse the cache.
    pub async fn fetch(&self) -> Result<&[HydratedDocument]> {
        let materialized = self.cache.get_or_try_init(|| self.execute()).await?;
        Ok(&materialized.docs)
    }

    async fn execute(&self) -> Result<Materialized> {
        let started = Instant::now();
        let body = Value::Object(self.body.clone());
        let response = self
            .service
            .search(S::index_name(), body, &self.params)
            .await?;

        let total = total_hits(&response);
        let hits = response["hits"]["hits"].as_array().cloned().unwrap_or_default();
        let mut docs = Vec::with_capacity(hits.len());
        for hit in hits {
            docs.push(HydratedDocument::from_hit::<S>(hit)?);
        }

        debug!(
            "query on {}: {} hits of {} total, took {}ms",
            S::index_name(),
            docs.len(),
            total,
            started.elapsed().as_millis()
        );

        Ok(Materialized {
            docs,
            total,
            raw: response,
        })
    }

    /// Return exactly one document at rank `k`. Before materialization this
    /// runs a narrowed `limit(1).offset(k)` query; afterwards it reads the
    /// cached list.
    pub async fn get_index(&self, k: usize) -> Result<HydratedDocument> {
        if let Some(materialized) = self.cache.get() {
            return materialized
                .docs
                .get(k)
                .cloned()
                .ok_or_else(|| not_found::<S>(format!("result #{k}")));
        }

        let narrowed = self.limit(Some(1)).offset(Some(k));
        let docs = narrowed.fetch().await?;
        docs.first()
            .cloned()
            .ok_or_else(|| not_found::<S>(format!("result #{k}")))
    }

    /// Return the documents in `[start, stop)`, taking every `step`-th one.
    /// Before materialization the range is translated to
    /// `offset(start).limit(stop - start)` server-side; afterwards it is
    /// served from the cached list.
    pub async fn slice(
        &self,
        start: Option<usize>,
        stop: Option<usize>,
        step: Option<usize>,
    ) -> Result<Vec<HydratedDocument>> {
        if step == Some(0) {
            return Err(Error::Validation("slice step must be at least 1".to_string()));
        }
        let stride = step.unwrap_or(1);

        if let Some(materialized) = self.cache.get() {
            let len = materialized.docs.len();
            let begin = start.unwrap_or(0).min(len);
            let end = stop.unwrap_or(len).min(len);
            if end <= begin {
                return Ok(Vec::new());
            }
            return Ok(materialized.docs[begin..end]
                .iter()
                .step_by(stride)
                .cloned()
                .collect());
        }

        let begin = start.unwrap_or(0);
        let mut narrowed = self.chain();
        if start.is_some() {
            narrowed = narrowed.offset(start);
        }
        if let Some(stop) = stop {
            let limit = stop.checked_sub(begin).ok_or_else(|| {
                Error::Validation("slice stop must not precede start".to_string())
            })?;
            narrowed = narrowed.limit(Some(limit));
        }
        let docs = narrowed.fetch().await?;
        Ok(docs.iter().step_by(stride).cloned().collect())
    }

    /// Fetch a single document matching a clause: `query(clause).limit(1)`.
    /// Zero matches is an error; when the clause matches more than one
    /// document, the first is returned silently.
    pub async fn get(&self, clause: Value) -> Result<HydratedDocument> {
        let key = clause.to_string();
        let narrowed = self.query(clause).limit(Some(1));
        let docs = narrowed.fetch().await?;
        docs.first().cloned().ok_or_else(|| not_found::<S>(key))
    }

    /// Count matching documents. Uses the cached list's length once
    /// materialized; otherwise issues a count request with any sort clause
    /// stripped, without materializing the full result list.
    pub async fn count(&self) -> Result<u64> {
        if let Some(materialized) = self.cache.get() {
            return Ok(materialized.docs.len() as u64);
        }

        let mut body = self.body.clone();
        body.remove("sort");

        let response = self
            .service
            .count(S::index_name(), Value::Object(body), &self.params)
            .await?;
        Ok(response["count"].as_u64().unwrap_or(0))
    }

    /// Fetch one document by its service-side id, bypassing the query
    /// clause.
    pub async fn get_by_id(&self, id: &str) -> Result<HydratedDocument> {
        let result = self.service.get(S::index_name(), id).await?;
        if !result["found"].as_bool().unwrap_or(false) {
            return Err(not_found::<S>(id.to_string()));
        }
        HydratedDocument::from_hit::<S>(result)
    }

    /// Delete one document by its service-side id and return the
    /// acknowledgment.
    pub async fn delete_by_id(&self, id: &str) -> Result<Value> {
        self.service.delete(S::index_name(), id).await
    }

    /// Forward pre-built bulk request lines to this schema's index.
    pub async fn bulk(&self, lines: Vec<Value>) -> Result<Value> {
        self.service.bulk(S::index_name(), lines, &self.params).await
    }
}

impl<S: Schema> std::fmt::Debug for QuerySet<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuerySet")
            .field("index", &S::index_name())
            .field("body", &self.body)
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

fn not_found<S: Schema>(key: String) -> Error {
    Error::DocumentNotFound {
        index: S::index_name().to_string(),
        key,
    }
}

fn total_hits(response: &Value) -> u64 {
    // Accept both wire shapes: a bare integer and the {"value": n} object.
    let total = &response["hits"]["total"];
    total.as_u64().or_else(|| total["value"].as_u64()).unwrap_or(0)
}
