//! Persisting models and keeping both sides of every association in step.
//!
//! A save writes the owner's record, then diffs each owner-stored key list
//! against what the store held before and applies the difference to the
//! inverse side of every added or removed record. Destroying a record first
//! strips every stored reference to it.

use std::collections::HashMap;
use tracing::{debug, trace};

use crate::core::{DbError, ModelKey, Record, Result};
use super::association::{Association, AssociationId, KeyStorage};
use super::model::{Members, Model};
use super::schema::Schema;

impl Model {
    /// Writes the model and its unsaved related models to the store.
    pub fn save(&self) -> Result<()> {
        self.ensure_live()?;
        if self.state().saving {
            return Ok(());
        }
        self.state_mut().saving = true;
        let result = self.persist();
        self.state_mut().saving = false;
        result
    }

    fn persist(&self) -> Result<()> {
        let schema = self.schema().clone();
        let registry = schema.registry();
        let model_name = self.model_name();
        let associations = registry.associations_for(&model_name)?;
        let collection = registry.collection_name(&model_name)?.to_string();
        let mut linked: Vec<(&Association, Model)> = Vec::new();

        for &assoc in associations.iter().filter(|a| a.is_belongs_to()) {
            let Some(parent) = self.parent_slot(&assoc.key) else {
                continue;
            };
            if parent.is_destroyed() {
                self.clear_parent(assoc);
                continue;
            }
            if parent.is_new() {
                parent.save()?;
            }
            if let Some(key) = parent.key() {
                self.with_attrs(|attrs| assoc.write_refs(attrs, &[key]));
            }
            linked.push((assoc, parent));
        }

        let attrs = self.attrs();
        let mut referenced = Vec::new();
        for assoc in &associations {
            referenced.extend(assoc.refs_in(&attrs)?);
            if assoc.is_has_many() && assoc.storage == KeyStorage::ChildKey {
                let children = self
                    .member_slots(Members::Children, &assoc.key)
                    .unwrap_or_default();
                referenced.extend(
                    children
                        .iter()
                        .filter(|m| !m.is_new() && !m.is_destroyed())
                        .filter_map(Model::key),
                );
            }
        }
        for key in referenced {
            if !schema.contains(&key)? {
                return Err(DbError::RecordNotFound {
                    collection: registry.collection_name(&key.model_name)?.to_string(),
                    id: key.id,
                });
            }
        }

        let before = match self.key() {
            Some(key) => schema.record(&key)?,
            None => {
                let stored = schema.with_db(|db| db.create_record(&collection, attrs))?;
                self.mark_persisted(stored);
                Record::new()
            }
        };
        let owner = self
            .key()
            .ok_or_else(|| DbError::ModelNotSaved(self.to_string()))?;

        let mut child_before: HashMap<AssociationId, Vec<ModelKey>> = HashMap::new();
        for &assoc in associations.iter().filter(|a| a.is_has_many()) {
            let members = match assoc.storage {
                KeyStorage::OwnerList => self
                    .member_slots(Members::Pending, &assoc.key)
                    .unwrap_or_default(),
                KeyStorage::ChildKey => {
                    let Some(members) = self.member_slots(Members::Children, &assoc.key) else {
                        continue;
                    };
                    child_before.insert(assoc.id, schema.child_keys(assoc, &owner)?);
                    members
                }
            };
            for member in members {
                if member.is_destroyed() {
                    continue;
                }
                if member.is_new() {
                    if let Some(inverse) = registry.inverse_of(assoc, &member.model_name()) {
                        member.link_local(inverse, self)?;
                    }
                    member.save()?;
                }
                if let Some(key) = member.key()
                    && assoc.stores_on_owner()
                {
                    self.with_attrs(|attrs| assoc.add_ref(attrs, &key))?;
                }
                linked.push((assoc, member));
            }
        }

        let after = self.attrs();
        schema.with_db(|db| db.update(&collection, &owner.id, &after))?;

        for &assoc in &associations {
            let (old, new) = match assoc.storage {
                KeyStorage::OwnerList => (assoc.refs_in(&before)?, assoc.refs_in(&after)?),
                KeyStorage::ChildKey => {
                    let Some(old) = child_before.remove(&assoc.id) else {
                        continue;
                    };
                    let new = self
                        .member_slots(Members::Children, &assoc.key)
                        .unwrap_or_default()
                        .iter()
                        .filter(|m| !m.is_destroyed())
                        .filter_map(Model::key)
                        .collect::<Vec<_>>();
                    (old, new)
                }
            };
            schema.sync_links(assoc, &owner, &old, &new)?;
        }

        for (assoc, related) in linked {
            if related.is_destroyed() {
                continue;
            }
            if let Some(inverse) = registry.inverse_of(assoc, &related.model_name()) {
                related.link_local(inverse, self)?;
            }
        }
        self.retain_members(Members::Pending, |m| m.is_new() && !m.is_destroyed());
        self.clear_members(Members::Children);

        debug!(model = %self, "model saved");
        Ok(())
    }
}

impl Schema {
    /// Applies a change in `owner`'s keys for `assoc` to the related records.
    pub(crate) fn sync_links(
        &self,
        assoc: &Association,
        owner: &ModelKey,
        before: &[ModelKey],
        after: &[ModelKey],
    ) -> Result<()> {
        let registry = self.registry();
        for removed in before.iter().filter(|k| !after.contains(k)) {
            if let Some(inverse) = registry.inverse_of(assoc, &removed.model_name) {
                self.unlink_stored(removed, inverse, owner)?;
            }
        }
        for added in after.iter().filter(|k| !before.contains(k)) {
            if let Some(inverse) = registry.inverse_of(assoc, &added.model_name) {
                self.link_stored(added, inverse, owner)?;
            }
        }
        Ok(())
    }

    fn link_stored(&self, target: &ModelKey, inverse: &Association, owner: &ModelKey) -> Result<()> {
        if !inverse.stores_on_owner() {
            return Ok(());
        }

        if inverse.is_belongs_to() {
            let record = self.record(target)?;
            let previous = inverse.refs_in(&record)?.into_iter().next();
            if previous.as_ref() == Some(owner) {
                return Ok(());
            }
            // The target moves away from its previous owner.
            if let Some(previous) = previous
                && let Some(back) = self.registry().inverse_of(inverse, &previous.model_name)
            {
                self.unlink_stored(&previous, back, target)?;
            }
        }

        let mut record = self.record(target)?;
        if inverse.is_belongs_to() {
            inverse.write_refs(&mut record, std::slice::from_ref(owner));
        } else if !inverse.add_ref(&mut record, owner)? {
            return Ok(());
        }
        self.write_record(target, &record)?;
        trace!(%target, association = %inverse.key, %owner, "stored link added");
        Ok(())
    }

    fn unlink_stored(&self, target: &ModelKey, inverse: &Association, owner: &ModelKey) -> Result<()> {
        if !inverse.stores_on_owner() || !self.contains(target)? {
            return Ok(());
        }
        let mut record = self.record(target)?;
        if inverse.remove_ref(&mut record, owner)? {
            self.write_record(target, &record)?;
            trace!(%target, association = %inverse.key, %owner, "stored link removed");
        }
        Ok(())
    }

    /// Deletes a record after removing every stored reference to it.
    pub(crate) fn remove_record(&self, key: &ModelKey) -> Result<()> {
        let collection = self.registry().collection_name(&key.model_name)?.to_string();
        if !self.contains(key)? {
            return Err(DbError::RecordNotFound {
                collection,
                id: key.id.clone(),
            });
        }

        for dependent in self.registry().dependents_of(&key.model_name) {
            let owners = self.registry().collection_name(&dependent.owner)?.to_string();
            let records = self.with_db(|db| db.all(&owners))?;
            for mut record in records {
                if !dependent.remove_ref(&mut record, key)? {
                    continue;
                }
                let id = record_id(&record)?;
                self.with_db(|db| db.update(&owners, &id, &record))?;
                trace!(%key, association = %dependent.key, owner = %id, "reference cleared");
            }
        }

        self.with_db(|db| db.remove(&collection, &key.id))?;
        debug!(%key, "record removed");
        Ok(())
    }

    /// Keys of the records whose inverse belongs-to points at `owner`.
    pub(crate) fn child_keys(&self, assoc: &Association, owner: &ModelKey) -> Result<Vec<ModelKey>> {
        Ok(self
            .child_records(assoc, owner)?
            .iter()
            .map(record_id)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(|id| ModelKey::new(owner_target(assoc), id))
            .collect())
    }

    pub(crate) fn stored_children(&self, assoc: &Association, owner: &ModelKey) -> Result<Vec<Model>> {
        let target = owner_target(assoc);
        self.child_records(assoc, owner)?
            .into_iter()
            .map(|record| self.hydrate(&target, record))
            .collect()
    }

    fn child_records(&self, assoc: &Association, owner: &ModelKey) -> Result<Vec<Record>> {
        let target = owner_target(assoc);
        let inverse = self.registry().inverse_of(assoc, &target).ok_or_else(|| {
            DbError::ConfigError(format!("'{}' on {} has no inverse key", assoc.key, assoc.owner))
        })?;
        let collection = self.registry().collection_name(&target)?.to_string();
        let mut children = Vec::new();
        for record in self.with_db(|db| db.all(&collection))? {
            if inverse.refs_in(&record)?.first() == Some(owner) {
                children.push(record);
            }
        }
        Ok(children)
    }

    fn write_record(&self, key: &ModelKey, record: &Record) -> Result<()> {
        let collection = self.registry().collection_name(&key.model_name)?.to_string();
        self.with_db(|db| db.update(&collection, &key.id, record))?;
        Ok(())
    }
}

fn owner_target(assoc: &Association) -> String {
    assoc.model_name().unwrap_or_default().to_string()
}

fn record_id(record: &Record) -> Result<String> {
    record
        .get(crate::core::ID_KEY)
        .map(|id| id.to_id())
        .transpose()?
        .flatten()
        .ok_or_else(|| DbError::TypeMismatch("stored record has no id".to_string()))
}
