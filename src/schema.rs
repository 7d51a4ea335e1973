//! Declarative document schemas: field descriptors, the field registry,
//! and the [`Schema`] trait binding them to an index.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Closure deriving a field value straight from a source record.
pub type ValueGetter<R> = Arc<dyn Fn(&R) -> Value + Send + Sync>;

/// Closure decoding a raw index value into its application-facing form.
pub type ValueDecoder = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A record in the system-of-record with a stable primary identifier.
pub trait SourceRecord: Serialize + Send + Sync {
    /// Stable primary identifier, used as the default document id.
    fn primary_id(&self) -> String;
}

/// Declares one document attribute: its index mapping fragment and how its
/// value is derived from a source record.
///
/// Exactly one derivation path applies: a custom getter when configured,
/// otherwise attribute lookup by `source_attr` (or the field's own name).
/// A failed lookup with no getter is a hard error, never a default.
pub struct FieldDescriptor<R> {
    name: String,
    mapping: Value,
    source_attr: Option<String>,
    getter: Option<ValueGetter<R>>,
    decoder: Option<ValueDecoder>,
}

impl<R> FieldDescriptor<R> {
    /// Create a descriptor with a mapping fragment, passed through verbatim
    /// to the index-creation payload.
    pub fn new(mapping: Value) -> Self {
        Self {
            name: String::new(),
            mapping,
            source_attr: None,
            getter: None,
            decoder: None,
        }
    }

    /// Read the value from a differently-named source attribute.
    pub fn with_source_attr(mut self, attr: impl Into<String>) -> Self {
        self.source_attr = Some(attr.into());
        self
    }

    /// Derive the value with a custom getter instead of attribute lookup.
    pub fn with_getter(mut self, getter: impl Fn(&R) -> Value + Send + Sync + 'static) -> Self {
        self.getter = Some(Arc::new(getter));
        self
    }

    /// Decode raw index values with a custom transform (identity by
    /// default; results already carry native scalar/array types).
    pub fn with_decoder(mut self, decoder: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    /// Field name, bound at registration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The mapping fragment.
    pub fn mapping(&self) -> &Value {
        &self.mapping
    }

    /// Decode a raw value from a search result's source payload.
    pub fn decode(&self, raw: Value) -> Value {
        match &self.decoder {
            Some(decoder) => decoder(raw),
            None => raw,
        }
    }

    fn bind(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

impl<R: Serialize> FieldDescriptor<R> {
    /// Derive this field's index value from a source record.
    pub fn derive_value(&self, record: &R) -> Result<Value> {
        if let Some(getter) = &self.getter {
            return Ok(getter(record));
        }
        let attrs = record_attributes(record)?;
        self.lookup_attr(&attrs)
    }

    fn lookup_attr(&self, attrs: &Map<String, Value>) -> Result<Value> {
        let attr = self.source_attr.as_deref().unwrap_or(&self.name);
        attrs.get(attr).cloned().ok_or_else(|| Error::Schema {
            field: attr.to_string(),
        })
    }
}

impl<R> Clone for FieldDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            mapping: self.mapping.clone(),
            source_attr: self.source_attr.clone(),
            getter: self.getter.clone(),
            decoder: self.decoder.clone(),
        }
    }
}

impl<R> std::fmt::Debug for FieldDescriptor<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("mapping", &self.mapping)
            .field("source_attr", &self.source_attr)
            .field("has_getter", &self.getter.is_some())
            .field("has_decoder", &self.decoder.is_some())
            .finish()
    }
}

/// Ordered set of field descriptors for one document type.
///
/// Insertion order is preserved; registering a name twice replaces the
/// earlier descriptor in place, which is how derived schemas override
/// inherited fields.
#[derive(Debug, Clone)]
pub struct FieldRegistry<R> {
    fields: Vec<FieldDescriptor<R>>,
}

impl<R> FieldRegistry<R> {
    /// Start building a registry.
    pub fn builder() -> FieldRegistryBuilder<R> {
        FieldRegistryBuilder { fields: Vec::new() }
    }

    /// Look up a descriptor by field name.
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<R>> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterate descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor<R>> {
        self.fields.iter()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Number of declared fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are declared.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<R: Serialize> FieldRegistry<R> {
    /// Transform a source record into its index document: every field's
    /// derived value keyed by field name. Any underivable field propagates
    /// [`Error::Schema`].
    pub fn transform(&self, record: &R) -> Result<Map<String, Value>> {
        let attrs = record_attributes(record)?;
        let mut document = Map::new();
        for field in &self.fields {
            let value = match &field.getter {
                Some(getter) => getter(record),
                None => field.lookup_attr(&attrs)?,
            };
            document.insert(field.name.clone(), value);
        }
        Ok(document)
    }
}

/// Builder for [`FieldRegistry`].
pub struct FieldRegistryBuilder<R> {
    fields: Vec<FieldDescriptor<R>>,
}

impl<R> FieldRegistryBuilder<R> {
    /// Copy every field from a base registry, before this schema's own
    /// declarations. A later [`field`](Self::field) call with the same name
    /// overrides the inherited descriptor in place.
    pub fn inherit(mut self, base: &FieldRegistry<R>) -> Self {
        for descriptor in &base.fields {
            self = self.insert(descriptor.clone());
        }
        self
    }

    /// Register a field, binding the descriptor to its name.
    pub fn field(self, name: impl AsRef<str>, descriptor: FieldDescriptor<R>) -> Self {
        let bound = descriptor.bind(name.as_ref());
        self.insert(bound)
    }

    fn insert(mut self, descriptor: FieldDescriptor<R>) -> Self {
        match self.fields.iter_mut().find(|f| f.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => self.fields.push(descriptor),
        }
        self
    }

    /// Finish building.
    pub fn build(self) -> FieldRegistry<R> {
        FieldRegistry {
            fields: self.fields,
        }
    }
}

/// A declared document type: its index, its fields, and how records from
/// the system-of-record map onto it.
///
/// Implementors build their [`FieldRegistry`] once inside a static
/// `OnceCell`; the registry is derived purely from static declarations and
/// lives for the process.
///
/// # Example
///
/// ```rust
/// use once_cell::sync::OnceCell;
/// use opensearch_odm::{FieldDescriptor, FieldRegistry, Schema, SourceRecord};
/// use serde::Serialize;
/// use serde_json::json;
///
/// #[derive(Serialize)]
/// struct Article {
///     id: String,
///     title: String,
/// }
///
/// impl SourceRecord for Article {
///     fn primary_id(&self) -> String {
///         self.id.clone()
///     }
/// }
///
/// struct ArticleDoc;
///
/// impl Schema for ArticleDoc {
///     type Record = Article;
///
///     fn index_name() -> &'static str {
///         "articles"
///     }
///
///     fn fields() -> &'static FieldRegistry<Article> {
///         static FIELDS: OnceCell<FieldRegistry<Article>> = OnceCell::new();
///         FIELDS.get_or_init(|| {
///             FieldRegistry::builder()
///                 .field("id", FieldDescriptor::new(json!({"type": "keyword"})))
///                 .field("title", FieldDescriptor::new(json!({"type": "text"})))
///                 .build()
///         })
///     }
/// }
/// ```
pub trait Schema: Send + Sync + 'static {
    /// Source record type feeding this schema.
    type Record: SourceRecord;

    /// Name of the backing index.
    fn index_name() -> &'static str;

    /// Document type name used in the mapping payload.
    fn doc_type() -> &'static str {
        "_doc"
    }

    /// The schema's field registry, built once per process.
    fn fields() -> &'static FieldRegistry<Self::Record>;

    /// Attach the default language-analysis settings on index creation.
    /// Mutually exclusive with [`index_settings`](Self::index_settings).
    fn allow_analyzer() -> bool {
        false
    }

    /// Explicit index settings, used verbatim in the creation payload.
    /// Mutually exclusive with [`allow_analyzer`](Self::allow_analyzer).
    fn index_settings() -> Option<Value> {
        None
    }

    /// Document id for a source record. Defaults to the record's primary
    /// identifier.
    fn document_id(record: &Self::Record) -> String {
        record.primary_id()
    }
}

pub(crate) fn record_attributes<R: Serialize>(record: &R) -> Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Validation(
            "source record must serialize to an object".to_string(),
        )),
    }
}
