use crate::core::{DbError, ModelKey, Result, Value};
use super::association::{Association, KeyStorage};
use super::attrs::{Attrs, Field};
use super::collection::Collection;
use super::model::Model;

/// Accessor for one has-many association of one model.
#[derive(Debug, Clone)]
pub struct HasMany {
    owner: Model,
    association: Association,
}

impl HasMany {
    pub(crate) fn new(owner: Model, association: Association) -> Self {
        Self { owner, association }
    }

    pub fn association(&self) -> &Association {
        &self.association
    }

    /// Every current member: stored ones first, then unsaved ones in the order added.
    pub fn get(&self) -> Result<Collection> {
        let models = self.owner.members(&self.association)?;
        Ok(Collection::new(
            self.association.model_name().map(str::to_string),
            models,
        ))
    }

    /// Keys of the saved members.
    pub fn keys(&self) -> Result<Vec<ModelKey>> {
        match self.association.storage {
            KeyStorage::OwnerList => self.association.refs_in(&self.owner.attrs()),
            KeyStorage::ChildKey => Ok(self.get()?.keys()),
        }
    }

    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self.keys()?.into_iter().map(|key| key.id).collect())
    }

    pub fn includes(&self, model: &Model) -> Result<bool> {
        Ok(self.get()?.includes(model))
    }

    /// Replaces the membership. Records dropped from it lose their side of the link on save.
    pub fn set(&self, members: &[Model]) -> Result<()> {
        self.owner.ensure_live()?;
        self.owner.set_members(&self.association, members)
    }

    /// Replaces the membership by id: plain ids, or `{type, id}` pairs when polymorphic.
    pub fn set_ids(&self, ids: impl Into<Value>) -> Result<()> {
        let ids = ids.into();
        match self.association.storage {
            KeyStorage::OwnerList => self
                .owner
                .set(&self.association.foreign_key, Field::Value(ids)),
            KeyStorage::ChildKey => {
                let items = match ids {
                    Value::Null => Vec::new(),
                    Value::Array(items) => items,
                    other => {
                        return Err(DbError::TypeMismatch(format!(
                            "ids for '{}' must be a list, got {}",
                            self.association.key,
                            other.type_name()
                        )));
                    }
                };
                let target = self.association.model_name().unwrap_or_default();
                let schema = self.owner.schema();
                let mut members = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(id) = item.to_id()? {
                        members.push(schema.find_key(&ModelKey::new(target, id))?);
                    }
                }
                self.set(&members)
            }
        }
    }

    pub fn add(&self, member: &Model) -> Result<()> {
        self.owner.ensure_live()?;
        self.owner.add_member(&self.association, member)
    }

    pub fn remove(&self, member: &Model) -> Result<()> {
        self.owner.ensure_live()?;
        self.owner.remove_member(&self.association, member)
    }

    /// Builds an unsaved member and adds it. Polymorphic associations need `model_name`.
    pub fn new_model(&self, model_name: Option<&str>, attrs: Attrs) -> Result<Model> {
        self.owner.ensure_live()?;
        let model_name = self.target(model_name)?;
        let member = self.owner.schema().new_model(&model_name, attrs)?;
        self.add(&member)?;
        Ok(member)
    }

    /// Builds a member, saves it and then saves the owner.
    pub fn create(&self, model_name: Option<&str>, attrs: Attrs) -> Result<Model> {
        let member = self.new_model(model_name, attrs)?;
        member.save()?;
        self.owner.save()?;
        Ok(member)
    }

    fn target(&self, requested: Option<&str>) -> Result<String> {
        match (self.association.model_name(), requested) {
            (Some(declared), None) => Ok(declared.to_string()),
            (Some(declared), Some(requested)) if declared == requested => Ok(declared.to_string()),
            (_, Some(requested)) if self.association.accepts(requested) => {
                Ok(requested.to_string())
            }
            (_, Some(requested)) => Err(DbError::UndefinedRelationship(format!(
                "'{}' on {} does not relate to {}",
                self.association.key, self.association.owner, requested
            ))),
            (None, None) => Err(DbError::TypeMismatch(format!(
                "'{}' is polymorphic; name the model to build",
                self.association.key
            ))),
        }
    }
}
