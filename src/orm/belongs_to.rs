use crate::core::{DbError, Result, Value};
use super::association::Association;
use super::attrs::{Attrs, Field};
use super::model::Model;

/// Accessor for one belongs-to association of one model.
#[derive(Debug, Clone)]
pub struct BelongsTo {
    owner: Model,
    association: Association,
}

impl BelongsTo {
    pub(crate) fn new(owner: Model, association: Association) -> Self {
        Self { owner, association }
    }

    pub fn association(&self) -> &Association {
        &self.association
    }

    /// The related model, or `None` when the foreign key is unset.
    ///
    /// A foreign key naming a missing record is a lookup failure.
    pub fn get(&self) -> Result<Option<Model>> {
        let assoc = &self.association;
        let refs = assoc.refs_in(&self.owner.attrs())?;

        if let Some(parent) = self.owner.parent_slot(&assoc.key) {
            if parent.is_destroyed() {
                self.owner.clear_parent(assoc);
                return Ok(None);
            }
            match parent.key() {
                None => return Ok(Some(parent)),
                Some(key) if refs.first() == Some(&key) => return Ok(Some(parent)),
                Some(_) => {}
            }
        }

        let Some(key) = refs.into_iter().next() else {
            return Ok(None);
        };
        let parent = self.owner.schema().find_key(&key)?;
        self.owner.cache_parent(assoc, &parent);
        Ok(Some(parent))
    }

    /// The stored foreign key.
    pub fn id(&self) -> Option<String> {
        self.owner.get(&self.association.foreign_key).to_id().ok().flatten()
    }

    pub fn set(&self, target: Option<&Model>) -> Result<()> {
        self.owner.ensure_live()?;
        self.owner.set_parent(&self.association, target)
    }

    /// Points the association at `id` without loading the related model.
    pub fn set_id(&self, id: impl Into<Value>) -> Result<()> {
        if self.association.is_polymorphic() {
            return Err(DbError::TypeMismatch(format!(
                "'{}' is polymorphic; assign a model or set '{}' as well",
                self.association.key,
                self.association.type_key().unwrap_or_default()
            )));
        }
        self.owner
            .set(&self.association.foreign_key, Field::Value(id.into()))
    }

    /// Builds an unsaved target and assigns it.
    pub fn new_model(&self, attrs: Attrs) -> Result<Model> {
        let model_name = self.declared_target()?;
        self.new_model_as(&model_name, attrs)
    }

    /// Like [`BelongsTo::new_model`], choosing the target type of a polymorphic association.
    pub fn new_model_as(&self, model_name: &str, attrs: Attrs) -> Result<Model> {
        self.check_target(model_name)?;
        let parent = self.owner.schema().new_model(model_name, attrs)?;
        self.set(Some(&parent))?;
        Ok(parent)
    }

    /// Creates the target, assigns it and saves the owner.
    pub fn create(&self, attrs: Attrs) -> Result<Model> {
        let model_name = self.declared_target()?;
        self.create_as(&model_name, attrs)
    }

    pub fn create_as(&self, model_name: &str, attrs: Attrs) -> Result<Model> {
        self.check_target(model_name)?;
        self.owner.ensure_live()?;
        let parent = self.owner.schema().create(model_name, attrs)?;
        self.set(Some(&parent))?;
        self.owner.save()?;
        Ok(parent)
    }

    fn declared_target(&self) -> Result<String> {
        self.association
            .model_name()
            .map(str::to_string)
            .ok_or_else(|| {
                DbError::TypeMismatch(format!(
                    "'{}' is polymorphic; name the model to build",
                    self.association.key
                ))
            })
    }

    fn check_target(&self, model_name: &str) -> Result<()> {
        if !self.association.accepts(model_name) {
            return Err(DbError::UndefinedRelationship(format!(
                "'{}' on {} does not relate to {}",
                self.association.key, self.association.owner, model_name
            )));
        }
        Ok(())
    }
}
