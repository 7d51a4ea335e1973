//! Shared fixtures for unit tests.

use crate::client::{CallParams, SearchService};
use crate::error::Result;
use crate::schema::{FieldDescriptor, FieldRegistry, Schema, SourceRecord};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BookRecord {
    pub key: String,
    pub value: String,
}

impl SourceRecord for BookRecord {
    fn primary_id(&self) -> String {
        self.key.clone()
    }
}

pub(crate) struct BookDoc;

impl Schema for BookDoc {
    type Record = BookRecord;

    fn index_name() -> &'static str {
        "books"
    }

    fn fields() -> &'static FieldRegistry<BookRecord> {
        static FIELDS: OnceCell<FieldRegistry<BookRecord>> = OnceCell::new();
        FIELDS.get_or_init(|| {
            FieldRegistry::builder()
                .field("key", FieldDescriptor::new(json!({"type": "keyword"})))
                .field("value", FieldDescriptor::new(json!({"type": "text"})))
                .build()
        })
    }
}

/// A service double for tests that never reach the transport.
pub(crate) struct NullService;

#[async_trait]
impl SearchService for NullService {
    async fn search(&self, _: &str, _: Value, _: &CallParams) -> Result<Value> {
        unimplemented!("NullService performs no calls")
    }

    async fn get(&self, _: &str, _: &str) -> Result<Value> {
        unimplemented!("NullService performs no calls")
    }

    async fn delete(&self, _: &str, _: &str) -> Result<Value> {
        unimplemented!("NullService performs no calls")
    }

    async fn count(&self, _: &str, _: Value, _: &CallParams) -> Result<Value> {
        unimplemented!("NullService performs no calls")
    }

    async fn bulk(&self, _: &str, _: Vec<Value>, _: &CallParams) -> Result<Value> {
        unimplemented!("NullService performs no calls")
    }

    async fn index_document(&self, _: &str, _: &str, _: Value, _: &CallParams) -> Result<Value> {
        unimplemented!("NullService performs no calls")
    }

    async fn create_index(&self, _: &str, _: Value) -> Result<()> {
        unimplemented!("NullService performs no calls")
    }

    async fn delete_index(&self, _: &str, _: bool) -> Result<()> {
        unimplemented!("NullService performs no calls")
    }

    async fn index_exists(&self, _: &str) -> Result<bool> {
        unimplemented!("NullService performs no calls")
    }

    async fn refresh_index(&self, _: &str) -> Result<()> {
        unimplemented!("NullService performs no calls")
    }
}
