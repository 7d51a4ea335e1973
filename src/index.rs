//! Index lifecycle management and mapping-payload compilation.

use crate::{
    client::SearchService,
    error::{Error, Result},
    schema::Schema,
};
use log::info;
use serde_json::{Map, Value, json};
use std::marker::PhantomData;
use std::sync::Arc;

/// Compiles a schema into index-creation payloads and manages the backing
/// index's lifecycle.
pub struct IndexManager<S: Schema> {
    service: Arc<dyn SearchService>,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema> IndexManager<S> {
    /// Create a manager for this schema's index.
    pub fn new(service: Arc<dyn SearchService>) -> Self {
        Self {
            service,
            _schema: PhantomData,
        }
    }

    /// Field name to mapping fragment, in declaration order, each fragment
    /// passed through unmodified.
    pub fn mapping_properties(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        for field in S::fields().iter() {
            properties.insert(field.name().to_string(), field.mapping().clone());
        }
        properties
    }

    /// The mapping payload: `{doc_type: {"properties": {...}}}`.
    pub fn mappings(&self) -> Value {
        json!({
            S::doc_type(): {
                "properties": self.mapping_properties()
            }
        })
    }

    /// The full index-creation payload: mappings plus either the schema's
    /// verbatim settings override or, when the analyzer flag is set, the
    /// default language-analysis block. The two paths are mutually
    /// exclusive and are never merged.
    pub fn create_body(&self) -> Result<Value> {
        let mut body = Map::new();
        body.insert("mappings".to_string(), self.mappings());

        match (S::index_settings(), S::allow_analyzer()) {
            (Some(_), true) => {
                return Err(Error::Validation(format!(
                    "schema for index {} sets both index_settings and allow_analyzer",
                    S::index_name()
                )));
            }
            (Some(settings), false) => {
                body.insert("settings".to_string(), settings);
            }
            (None, true) => {
                body.insert("settings".to_string(), analysis_settings());
            }
            (None, false) => {}
        }

        Ok(Value::Object(body))
    }

    /// Create the index. Fails with [`Error::IndexExists`] when it already
    /// exists; callers wanting idempotence check [`exists`](Self::exists)
    /// first.
    pub async fn create(&self) -> Result<()> {
        info!("Creating index {}", S::index_name());
        let body = self.create_body()?;
        self.service.create_index(S::index_name(), body).await
    }

    /// Delete the index. A missing index is a successful no-op.
    pub async fn delete(&self) -> Result<()> {
        info!("Deleting index {}", S::index_name());
        self.service.delete_index(S::index_name(), true).await
    }

    /// Check whether the index exists.
    pub async fn exists(&self) -> Result<bool> {
        self.service.index_exists(S::index_name()).await
    }

    /// Refresh the index so recent writes become searchable. The core never
    /// waits for refresh on its own; callers needing read-after-write
    /// semantics invoke this explicitly.
    pub async fn refresh(&self) -> Result<()> {
        self.service.refresh_index(S::index_name()).await
    }
}

impl<S: Schema> std::fmt::Debug for IndexManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexManager")
            .field("index", &S::index_name())
            .finish()
    }
}

// Tokenizer plus a custom analyzer built on it, attached when a schema
// opts in via allow_analyzer.
fn analysis_settings() -> Value {
    json!({
        "index": {
            "analysis": {
                "tokenizer": {
                    "kuromoji": {
                        "type": "kuromoji_tokenizer"
                    }
                },
                "analyzer": {
                    "analyzer": {
                        "type": "custom",
                        "tokenizer": "kuromoji"
                    }
                }
            }
        }
    })
}
