//! Hydrated query-result documents.

use crate::{
    error::{Error, Result},
    schema::Schema,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A read-only document hydrated from one search hit.
///
/// Carries the service-side id and relevance score, the raw result
/// envelope, and one decoded value per declared field. Every declared
/// field must be present in the hit's `_source`, or hydration fails.
#[derive(Debug, Clone)]
pub struct HydratedDocument {
    id: String,
    score: Option<f64>,
    raw: Value,
    values: Map<String, Value>,
}

impl HydratedDocument {
    /// Hydrate a search hit (or a get-by-id result) against a schema.
    pub fn from_hit<S: Schema>(hit: Value) -> Result<Self> {
        let id = hit["_id"]
            .as_str()
            .ok_or_else(|| Error::Service("search hit missing _id".to_string()))?
            .to_string();
        let score = hit["_score"].as_f64();

        let source = hit
            .get("_source")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::Service("search hit missing _source".to_string()))?;

        let mut values = Map::new();
        for field in S::fields().iter() {
            let raw_value = source.get(field.name()).ok_or_else(|| Error::Hydration {
                field: field.name().to_string(),
            })?;
            values.insert(field.name().to_string(), field.decode(raw_value.clone()));
        }

        Ok(Self {
            id,
            score,
            raw: hit,
            values,
        })
    }

    /// Service-side document id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Relevance score, when the service reported one.
    pub fn score(&self) -> Option<f64> {
        self.score
    }

    /// The raw result envelope the document was hydrated from.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Decoded value of one declared field.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Decoded value of one declared field, failing on an undeclared name.
    pub fn require(&self, field: &str) -> Result<&Value> {
        self.values.get(field).ok_or_else(|| Error::Hydration {
            field: field.to_string(),
        })
    }

    /// All decoded field values, keyed by field name.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Deserialize the decoded field values into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.values.clone()))?)
    }
}
