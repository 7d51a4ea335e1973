//! Object-document mapping over a remote search index.
//!
//! This crate maps application records onto search-index documents with:
//! - Declarative schemas pairing source records with field descriptors
//! - A chainable, lazily-executed query set with once-only materialization
//! - Mapping compilation and index lifecycle management
//! - Bulk synchronization of record collections into an index
//!
//! # Example
//!
//! ```rust,no_run
//! use opensearch_odm::prelude::*;
//! use once_cell::sync::OnceCell;
//! use serde::Serialize;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Serialize)]
//! struct Article {
//!     slug: String,
//!     title: String,
//! }
//!
//! impl SourceRecord for Article {
//!     fn primary_id(&self) -> String {
//!         self.slug.clone()
//!     }
//! }
//!
//! struct ArticleDoc;
//!
//! impl Schema for ArticleDoc {
//!     type Record = Article;
//!
//!     fn index_name() -> &'static str {
//!         "articles"
//!     }
//!
//!     fn fields() -> &'static FieldRegistry<Article> {
//!         static FIELDS: OnceCell<FieldRegistry<Article>> = OnceCell::new();
//!         FIELDS.get_or_init(|| {
//!             FieldRegistry::builder()
//!                 .field("slug", FieldDescriptor::new(json!({"type": "keyword"})))
//!                 .field("title", FieldDescriptor::new(json!({"type": "text"})))
//!                 .build()
//!         })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("http://localhost:9200");
//!     let client = Arc::new(OpenSearchClient::new(config)?);
//!
//!     index_manager_for::<ArticleDoc>(client.clone()).create().await?;
//!
//!     let records = vec![Article {
//!         slug: "hello".to_string(),
//!         title: "Hello search".to_string(),
//!     }];
//!     sync_engine_for::<ArticleDoc>(client.clone())
//!         .rebuild(records, RebuildOptions::new())
//!         .await?;
//!
//!     let doc = queryset_for::<ArticleDoc>(client)
//!         .get(json!({"match": {"title": "hello"}}))
//!         .await?;
//!     println!("{}", doc.id());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod bulk;
mod client;
mod config;
mod document;
mod error;
mod index;
mod query;
mod schema;
mod sync;

#[cfg(test)]
mod test_support;

pub use bulk::{BulkItem, BulkItemError, BulkItemResult, BulkItemStatus, BulkOperation, BulkResponse};
pub use client::{
    CallParams, OpenSearchClient, RefreshPolicy, SearchService, global_client, init_global_client,
};
pub use config::ClientConfig;
pub use document::HydratedDocument;
pub use error::{Error, Result};
pub use index::IndexManager;
pub use query::QuerySet;
pub use schema::{FieldDescriptor, FieldRegistry, FieldRegistryBuilder, Schema, SourceRecord};
pub use sync::{DEFAULT_BATCH_SIZE, RebuildOptions, RebuildStats, SyncEngine};

use std::sync::Arc;

/// A query set over this schema's index.
pub fn queryset_for<S: Schema>(service: Arc<dyn SearchService>) -> QuerySet<S> {
    QuerySet::new(service)
}

/// An index lifecycle manager for this schema's index.
pub fn index_manager_for<S: Schema>(service: Arc<dyn SearchService>) -> IndexManager<S> {
    IndexManager::new(service)
}

/// A bulk synchronization engine for this schema's index.
pub fn sync_engine_for<S: Schema>(service: Arc<dyn SearchService>) -> SyncEngine<S> {
    SyncEngine::new(service)
}

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        CallParams, ClientConfig, Error, FieldDescriptor, FieldRegistry, HydratedDocument,
        IndexManager, OpenSearchClient, QuerySet, RebuildOptions, RefreshPolicy, Result, Schema,
        SearchService, SourceRecord, SyncEngine, index_manager_for, queryset_for, sync_engine_for,
    };
}
