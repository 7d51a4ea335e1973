//! Shared fixtures: an in-memory search service double plus a small
//! document schema used across the integration tests.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use opensearch_odm::{
    CallParams, Error, FieldDescriptor, FieldRegistry, Result, Schema, SearchService, SourceRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub key: String,
    pub value: String,
}

impl SourceRecord for Book {
    fn primary_id(&self) -> String {
        self.key.clone()
    }
}

pub struct BookDoc;

impl Schema for BookDoc {
    type Record = Book;

    fn index_name() -> &'static str {
        "books"
    }

    fn fields() -> &'static FieldRegistry<Book> {
        static FIELDS: OnceCell<FieldRegistry<Book>> = OnceCell::new();
        FIELDS.get_or_init(|| {
            FieldRegistry::builder()
                .field("key", FieldDescriptor::new(json!({"type": "keyword"})))
                .field("value", FieldDescriptor::new(json!({"type": "text"})))
                .build()
        })
    }
}

/// Schema declaring a field the source record does not carry.
pub struct BrokenDoc;

impl Schema for BrokenDoc {
    type Record = Book;

    fn index_name() -> &'static str {
        "books"
    }

    fn fields() -> &'static FieldRegistry<Book> {
        static FIELDS: OnceCell<FieldRegistry<Book>> = OnceCell::new();
        FIELDS.get_or_init(|| {
            FieldRegistry::builder()
                .field("key", FieldDescriptor::new(json!({"type": "keyword"})))
                .field("missing", FieldDescriptor::new(json!({"type": "text"})))
                .build()
        })
    }
}

pub fn sample_books() -> Vec<Book> {
    vec![
        Book {
            key: "jumps".to_string(),
            value: "jumps over the lazy dog".to_string(),
        },
        Book {
            key: "quick".to_string(),
            value: "turns over the engine".to_string(),
        },
        Book {
            key: "lazy".to_string(),
            value: "sleeps all day".to_string(),
        },
    ]
}

/// In-memory [`SearchService`] double.
///
/// Documents live in a per-index ordered map, so unsorted queries return
/// hits in document-id order. Query support covers what the tests issue:
/// `match_all`, `match` (all terms present), `term` equality, and `bool`
/// with must/should/must_not. Call counters let tests assert how many
/// round trips the lazy layers actually made.
#[derive(Default)]
pub struct InMemoryService {
    state: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    search_calls: AtomicUsize,
    count_calls: AtomicUsize,
    bulk_calls: AtomicUsize,
    index_calls: AtomicUsize,
    last_count_body: Mutex<Option<Value>>,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(index: &str) -> Self {
        let service = Self::default();
        service
            .state
            .lock()
            .unwrap()
            .insert(index.to_string(), BTreeMap::new());
        service
    }

    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .get(index)
            .and_then(|docs| docs.get(id).cloned())
    }

    /// Store a document directly, bypassing the transformation pipeline.
    pub fn insert_document(&self, index: &str, id: &str, doc: Value) {
        self.state
            .lock()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), doc);
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn counts(&self) -> usize {
        self.count_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn bulks(&self) -> usize {
        self.bulk_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn single_indexings(&self) -> usize {
        self.index_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn last_count_body(&self) -> Option<Value> {
        self.last_count_body.lock().unwrap().clone()
    }

    fn matching_docs(&self, index: &str, body: &Value) -> Vec<(String, Value)> {
        let state = self.state.lock().unwrap();
        let query = body.get("query").cloned().unwrap_or(json!({"match_all": {}}));
        let mut hits: Vec<(String, Value)> = state
            .get(index)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| matches_query(&query, doc))
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default();

        if let Some(sort) = body.get("sort") {
            sort_hits(&mut hits, sort);
        }
        hits
    }
}

#[async_trait]
impl SearchService for InMemoryService {
    async fn search(&self, index: &str, body: Value, _params: &CallParams) -> Result<Value> {
        self.search_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let hits = self.matching_docs(index, &body);
        let total = hits.len();

        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body
            .get("size")
            .and_then(Value::as_u64)
            .map(|s| s as usize)
            .unwrap_or(usize::MAX);
        let page: Vec<Value> = hits
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(id, doc)| {
                json!({
                    "_index": index,
                    "_id": id,
                    "_score": 1.0,
                    "_source": doc
                })
            })
            .collect();

        Ok(json!({
            "took": 1,
            "timed_out": false,
            "hits": {
                "total": {"value": total, "relation": "eq"},
                "max_score": 1.0,
                "hits": page
            }
        }))
    }

    async fn get(&self, index: &str, id: &str) -> Result<Value> {
        match self.document(index, id) {
            Some(doc) => Ok(json!({
                "_index": index,
                "_id": id,
                "found": true,
                "_source": doc
            })),
            None => Ok(json!({"_index": index, "_id": id, "found": false})),
        }
    }

    async fn delete(&self, index: &str, id: &str) -> Result<Value> {
        let removed = self
            .state
            .lock()
            .unwrap()
            .get_mut(index)
            .and_then(|docs| docs.remove(id))
            .is_some();
        Ok(json!({
            "_index": index,
            "_id": id,
            "result": if removed { "deleted" } else { "not_found" }
        }))
    }

    async fn count(&self, index: &str, body: Value, _params: &CallParams) -> Result<Value> {
        self.count_calls.fetch_add(1, AtomicOrdering::SeqCst);
        *self.last_count_body.lock().unwrap() = Some(body.clone());
        let total = self.matching_docs(index, &body).len();
        Ok(json!({"count": total}))
    }

    async fn bulk(&self, index: &str, lines: Vec<Value>, _params: &CallParams) -> Result<Value> {
        self.bulk_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let docs = state.entry(index.to_string()).or_default();

        let mut cursor = lines.into_iter();
        while let Some(action) = cursor.next() {
            let action = action
                .as_object()
                .ok_or_else(|| Error::Service("malformed bulk action line".to_string()))?;
            if let Some(meta) = action.get("index").or_else(|| action.get("create")) {
                let id = meta["_id"].as_str().unwrap_or_default().to_string();
                let body = cursor
                    .next()
                    .ok_or_else(|| Error::Service("bulk action missing body".to_string()))?;
                docs.insert(id, body);
            } else if let Some(meta) = action.get("update") {
                let id = meta["_id"].as_str().unwrap_or_default().to_string();
                let body = cursor
                    .next()
                    .ok_or_else(|| Error::Service("bulk action missing body".to_string()))?;
                if let (Some(existing), Some(partial)) = (
                    docs.get_mut(&id).and_then(Value::as_object_mut),
                    body["doc"].as_object(),
                ) {
                    for (key, value) in partial {
                        existing.insert(key.clone(), value.clone());
                    }
                }
            } else if let Some(meta) = action.get("delete") {
                let id = meta["_id"].as_str().unwrap_or_default();
                docs.remove(id);
            } else {
                return Err(Error::Service("unknown bulk action".to_string()));
            }
        }

        Ok(json!({"took": 0, "errors": false, "items": []}))
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        document: Value,
        _params: &CallParams,
    ) -> Result<Value> {
        self.index_calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.insert_document(index, id, document);
        Ok(json!({"_index": index, "_id": id, "result": "created"}))
    }

    async fn create_index(&self, index: &str, _body: Value) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.contains_key(index) {
            return Err(Error::IndexExists(index.to_string()));
        }
        state.insert(index.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn delete_index(&self, index: &str, ignore_not_found: bool) -> Result<()> {
        let removed = self.state.lock().unwrap().remove(index).is_some();
        if !removed && !ignore_not_found {
            return Err(Error::IndexNotFound(index.to_string()));
        }
        Ok(())
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().contains_key(index))
    }

    async fn refresh_index(&self, _index: &str) -> Result<()> {
        Ok(())
    }
}

fn matches_query(query: &Value, doc: &Value) -> bool {
    if query.get("match_all").is_some() {
        return true;
    }
    if let Some(clauses) = query.get("match").and_then(Value::as_object) {
        return clauses.iter().all(|(field, expected)| {
            let text = doc[field.as_str()].as_str().unwrap_or("").to_lowercase();
            let tokens: Vec<&str> = text.split_whitespace().collect();
            let wanted = match expected.as_str() {
                Some(s) => s.to_lowercase(),
                None => expected.to_string(),
            };
            wanted.split_whitespace().all(|term| tokens.contains(&term))
        });
    }
    if let Some(clauses) = query.get("term").and_then(Value::as_object) {
        return clauses
            .iter()
            .all(|(field, expected)| &doc[field.as_str()] == expected);
    }
    if let Some(compound) = query.get("bool").and_then(Value::as_object) {
        let clause_list = |key: &str| -> Vec<Value> {
            match compound.get(key) {
                Some(Value::Array(items)) => items.clone(),
                Some(single) => vec![single.clone()],
                None => Vec::new(),
            }
        };
        let must = clause_list("must").iter().all(|c| matches_query(c, doc));
        let must_not = clause_list("must_not").iter().all(|c| !matches_query(c, doc));
        let should_clauses = clause_list("should");
        let should =
            should_clauses.is_empty() || should_clauses.iter().any(|c| matches_query(c, doc));
        return must && must_not && should;
    }
    false
}

fn sort_hits(hits: &mut [(String, Value)], spec: &Value) {
    let keys = sort_keys(spec);
    hits.sort_by(|(_, a), (_, b)| {
        for (field, descending) in &keys {
            let ordering = compare_values(&a[field.as_str()], &b[field.as_str()]);
            let ordering = if *descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn sort_keys(spec: &Value) -> Vec<(String, bool)> {
    match spec {
        Value::String(field) => vec![(field.clone(), false)],
        Value::Object(map) => map.iter().map(entry_to_key).collect(),
        Value::Array(items) => items.iter().flat_map(sort_keys).collect(),
        _ => Vec::new(),
    }
}

fn entry_to_key((field, direction): (&String, &Value)) -> (String, bool) {
    let descending = match direction {
        Value::String(dir) => dir == "desc",
        Value::Object(opts) => opts["order"].as_str() == Some("desc"),
        _ => false,
    };
    (field.clone(), descending)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a
            .as_str()
            .unwrap_or_default()
            .cmp(b.as_str().unwrap_or_default()),
    }
}

/// Helper assembling a `Map` request body from a JSON object literal.
pub fn body_of(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
