use std::collections::{BTreeMap, HashSet};
use serde_json::Map;
use tracing::trace;

use crate::core::{DbError, ID_KEY, Result};
use crate::orm::{Association, AssociationKind, Model};
use super::document::{
    Document, Linkage, PrimaryData, Relationship, ResourceIdentifier, ResourceObject,
};
use super::registry::{Payload, SerializerRegistry};

/// One serialization pass: tracks which resources the document already holds.
pub(crate) struct JsonApiWalker<'a> {
    registry: &'a SerializerRegistry,
    seen: HashSet<ResourceIdentifier>,
    included: Vec<ResourceObject>,
}

impl<'a> JsonApiWalker<'a> {
    pub(crate) fn new(registry: &'a SerializerRegistry) -> Self {
        Self {
            registry,
            seen: HashSet::new(),
            included: Vec::new(),
        }
    }

    pub(crate) fn serialize(mut self, payload: Payload) -> Result<Document> {
        let (primaries, many) = match payload {
            Payload::Model(model) => (vec![model], false),
            Payload::Collection(collection) => (collection.into_models(), true),
        };

        for model in &primaries {
            let identifier = self.identifier(model)?;
            self.seen.insert(identifier);
        }

        let mut data = Vec::with_capacity(primaries.len());
        for model in &primaries {
            data.push(self.resource_object(model)?);
            self.include_related(model)?;
        }

        let data = if many {
            PrimaryData::Many(data)
        } else {
            let resource = data
                .pop()
                .ok_or_else(|| DbError::SerializationError("nothing to serialize".to_string()))?;
            PrimaryData::Single(resource)
        };
        Ok(Document {
            data,
            included: self.included,
        })
    }

    fn resource_object(&self, model: &Model) -> Result<ResourceObject> {
        let model_name = model.model_name();
        let config = self.registry.config_for(&model_name);
        let associations = self.registry.schema().registry().associations_for(&model_name)?;
        self.check_includes(&model_name, &associations)?;

        let owned: Vec<&str> = associations.iter().flat_map(|a| a.owned_keys()).collect();
        let mut attributes = Map::new();
        for (attr, value) in model.attrs() {
            if attr == ID_KEY || owned.contains(&attr.as_str()) || !config.exposes(&attr) {
                continue;
            }
            attributes.insert(config.key_for(&attr), value.to_json());
        }

        let mut relationships = BTreeMap::new();
        for assoc in &associations {
            if !config.wants_linkage(assoc.key(), model) {
                continue;
            }
            let data = self.linkage(model, assoc)?;
            relationships.insert(config.key_for(assoc.key()), Relationship { data });
        }

        let identifier = self.identifier(model)?;
        Ok(ResourceObject {
            resource_type: identifier.resource_type,
            id: identifier.id,
            attributes,
            relationships: (!relationships.is_empty()).then_some(relationships),
        })
    }

    fn linkage(&self, model: &Model, assoc: &Association) -> Result<Linkage> {
        let related = self.related(model, assoc)?;
        let identifiers = related
            .iter()
            .map(|m| self.identifier(m))
            .collect::<Result<Vec<_>>>()?;
        Ok(match assoc.kind() {
            AssociationKind::BelongsTo => Linkage::One(identifiers.into_iter().next()),
            AssociationKind::HasMany => Linkage::Many(identifiers),
        })
    }

    /// Side-loads included relationships depth-first, in declaration order.
    fn include_related(&mut self, model: &Model) -> Result<()> {
        let registry = self.registry;
        let model_name = model.model_name();
        let config = registry.config_for(&model_name);
        let associations = registry.schema().registry().associations_for(&model_name)?;

        for assoc in associations.into_iter().filter(|a| config.includes(a.key())) {
            for related in self.related(model, assoc)? {
                let identifier = self.identifier(&related)?;
                if !self.seen.insert(identifier) {
                    trace!(resource = %related, "already in document");
                    continue;
                }
                trace!(resource = %related, via = %assoc.key(), "included");
                let resource = self.resource_object(&related)?;
                self.included.push(resource);
                self.include_related(&related)?;
            }
        }
        Ok(())
    }

    fn related(&self, model: &Model, assoc: &Association) -> Result<Vec<Model>> {
        match assoc.kind() {
            AssociationKind::BelongsTo => Ok(model.belongs_to(assoc.key())?.get()?.into_iter().collect()),
            AssociationKind::HasMany => Ok(model.has_many(assoc.key())?.get()?.into_models()),
        }
    }

    fn identifier(&self, model: &Model) -> Result<ResourceIdentifier> {
        let model_name = model.model_name();
        let id = model
            .id()
            .filter(|_| !model.is_new())
            .ok_or_else(|| DbError::ModelNotSaved(model.to_string()))?;
        Ok(ResourceIdentifier {
            resource_type: self.registry.config_for(&model_name).type_for(&model_name),
            id,
        })
    }

    fn check_includes(&self, model_name: &str, associations: &[&Association]) -> Result<()> {
        let config = self.registry.config_for(model_name);
        for name in config.included() {
            if !associations.iter().any(|a| a.key() == name.as_str()) {
                return Err(DbError::UndefinedRelationship(format!(
                    "cannot include '{}': the {} model has no such association",
                    name, model_name
                )));
            }
        }
        Ok(())
    }
}
