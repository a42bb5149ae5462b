use std::collections::HashMap;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::core::Result;
use crate::orm::{Collection, Model, Schema};
use super::config::SerializerConfig;
use super::document::Document;
use super::json_api::JsonApiWalker;

/// What a serializer renders: one resource or a list of them.
#[derive(Debug, Clone)]
pub enum Payload {
    Model(Model),
    Collection(Collection),
}

impl From<Model> for Payload {
    fn from(model: Model) -> Self {
        Self::Model(model)
    }
}

impl From<&Model> for Payload {
    fn from(model: &Model) -> Self {
        Self::Model(model.clone())
    }
}

impl From<Collection> for Payload {
    fn from(collection: Collection) -> Self {
        Self::Collection(collection)
    }
}

impl From<&Collection> for Payload {
    fn from(collection: &Collection) -> Self {
        Self::Collection(collection.clone())
    }
}

/// Serializer configuration per model type, with an application-wide fallback.
///
/// A type without its own entry uses the application config; without either
/// the defaults apply.
pub struct SerializerRegistry {
    schema: Schema,
    application: SerializerConfig,
    per_type: HashMap<String, SerializerConfig>,
}

impl SerializerRegistry {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            application: SerializerConfig::default(),
            per_type: HashMap::new(),
        }
    }

    pub fn application(mut self, config: SerializerConfig) -> Self {
        self.application = config;
        self
    }

    /// Configuration for resources of `model_name`.
    pub fn serializer(mut self, model_name: &str, config: SerializerConfig) -> Self {
        self.per_type.insert(model_name.to_string(), config);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config_for(&self, model_name: &str) -> &SerializerConfig {
        self.per_type.get(model_name).unwrap_or(&self.application)
    }

    pub fn serialize(&self, payload: impl Into<Payload>) -> Result<Document> {
        let document = JsonApiWalker::new(self).serialize(payload.into())?;
        debug!(included = document.included.len(), "document serialized");
        Ok(document)
    }

    pub fn serialize_json(&self, payload: impl Into<Payload>) -> Result<JsonValue> {
        self.serialize(payload)?.to_json()
    }
}
