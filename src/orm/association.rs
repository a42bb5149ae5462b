//! Association declarations and their resolved form.
//!
//! An [`AssociationDef`] is what a caller declares on a [`ModelDef`](super::ModelDef).
//! The registry turns every declaration into an [`Association`] with a fixed
//! target, foreign-key names, and a resolved inverse.

use std::collections::BTreeMap;
use crate::core::{DbError, ModelKey, Record, Result, Value};
use super::inflector::singularize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    BelongsTo,
    HasMany,
}

/// Where a has-many association keeps its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStorage {
    /// The owner stores a list of related ids (`{name}Ids`).
    #[default]
    OwnerList,
    /// Each related record stores the owner's id in its own belongs-to key.
    ChildKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) enum InverseOption {
    #[default]
    Implicit,
    Explicit(String),
    OneWay,
}

/// A declared relationship, before the schema resolves it.
#[derive(Debug, Clone)]
pub struct AssociationDef {
    pub(crate) kind: AssociationKind,
    pub(crate) model_name: Option<String>,
    pub(crate) inverse: InverseOption,
    pub(crate) polymorphic: bool,
    pub(crate) storage: KeyStorage,
}

impl AssociationDef {
    pub fn belongs_to() -> Self {
        Self::new(AssociationKind::BelongsTo)
    }

    pub fn has_many() -> Self {
        Self::new(AssociationKind::HasMany)
    }

    fn new(kind: AssociationKind) -> Self {
        Self {
            kind,
            model_name: None,
            inverse: InverseOption::Implicit,
            polymorphic: false,
            storage: KeyStorage::OwnerList,
        }
    }

    /// Target model. Defaults to the key (belongs-to) or the singular key (has-many).
    pub fn model(mut self, model_name: &str) -> Self {
        self.model_name = Some(model_name.to_string());
        self
    }

    /// Names the reciprocal association on the target model.
    pub fn inverse(mut self, key: &str) -> Self {
        self.inverse = InverseOption::Explicit(key.to_string());
        self
    }

    /// Declares that this association has no inverse.
    pub fn one_way(mut self) -> Self {
        self.inverse = InverseOption::OneWay;
        self
    }

    /// Allows related records of any registered type.
    pub fn polymorphic(mut self) -> Self {
        self.polymorphic = true;
        self
    }

    /// Has-many only: find members through the inverse belongs-to key on each child.
    pub fn keyed_on_child(mut self) -> Self {
        self.storage = KeyStorage::ChildKey;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssociationId(pub(crate) usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Inverse {
    None,
    One(AssociationId),
    /// Polymorphic associations have one inverse per related type.
    ByType(BTreeMap<String, AssociationId>),
}

/// A resolved association owned by one model type.
#[derive(Debug, Clone)]
pub struct Association {
    pub(crate) id: AssociationId,
    pub(crate) key: String,
    pub(crate) owner: String,
    pub(crate) kind: AssociationKind,
    pub(crate) model_name: Option<String>,
    pub(crate) storage: KeyStorage,
    pub(crate) declared_inverse: InverseOption,
    pub(crate) inverse: Inverse,
    pub(crate) foreign_key: String,
    pub(crate) type_key: Option<String>,
}

impl Association {
    pub(crate) fn resolve(id: AssociationId, owner: &str, key: &str, def: &AssociationDef) -> Self {
        let model_name = if def.polymorphic {
            None
        } else {
            Some(def.model_name.clone().unwrap_or_else(|| match def.kind {
                AssociationKind::BelongsTo => key.to_string(),
                AssociationKind::HasMany => singularize(key),
            }))
        };
        let (foreign_key, type_key) = match def.kind {
            AssociationKind::BelongsTo => (
                format!("{}Id", key),
                def.polymorphic.then(|| format!("{}Type", key)),
            ),
            AssociationKind::HasMany => (format!("{}Ids", singularize(key)), None),
        };

        Self {
            id,
            key: key.to_string(),
            owner: owner.to_string(),
            kind: def.kind,
            model_name,
            storage: def.storage,
            declared_inverse: def.inverse.clone(),
            inverse: Inverse::None,
            foreign_key,
            type_key,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    /// The declared target, `None` for polymorphic associations.
    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn storage(&self) -> KeyStorage {
        self.storage
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn type_key(&self) -> Option<&str> {
        self.type_key.as_deref()
    }

    pub fn is_belongs_to(&self) -> bool {
        self.kind == AssociationKind::BelongsTo
    }

    pub fn is_has_many(&self) -> bool {
        self.kind == AssociationKind::HasMany
    }

    pub fn is_polymorphic(&self) -> bool {
        self.model_name.is_none()
    }

    pub fn is_reflexive(&self) -> bool {
        self.model_name.as_deref() == Some(self.owner.as_str())
    }

    pub fn has_inverse(&self) -> bool {
        self.inverse != Inverse::None
    }

    /// Whether a model of `model_name` may be assigned to this association.
    pub fn accepts(&self, model_name: &str) -> bool {
        match &self.model_name {
            Some(target) => target == model_name,
            None => true,
        }
    }

    /// Whether the keys live on the owner's record.
    pub(crate) fn stores_on_owner(&self) -> bool {
        self.storage == KeyStorage::OwnerList
    }

    /// Attribute names this association writes on the owner's record.
    pub(crate) fn owned_keys(&self) -> Vec<&str> {
        if !self.stores_on_owner() {
            return Vec::new();
        }
        let mut keys = vec![self.foreign_key.as_str()];
        keys.extend(self.type_key.as_deref());
        keys
    }

    pub(crate) fn write_defaults(&self, attrs: &mut Record) {
        if !self.stores_on_owner() {
            return;
        }
        let empty = match self.kind {
            AssociationKind::BelongsTo => Value::Null,
            AssociationKind::HasMany => Value::Array(Vec::new()),
        };
        attrs.entry(self.foreign_key.clone()).or_insert(empty);
        if let Some(type_key) = &self.type_key {
            attrs.entry(type_key.clone()).or_insert(Value::Null);
        }
    }

    /// Reads the related keys recorded on an owner record.
    pub(crate) fn refs_in(&self, attrs: &Record) -> Result<Vec<ModelKey>> {
        if !self.stores_on_owner() {
            return Ok(Vec::new());
        }
        let raw = attrs.get(&self.foreign_key).unwrap_or(&Value::Null);
        match self.kind {
            AssociationKind::BelongsTo => {
                let Some(id) = raw.to_id()? else {
                    return Ok(Vec::new());
                };
                Ok(vec![ModelKey::new(self.related_type_in(attrs)?, id)])
            }
            AssociationKind::HasMany => {
                let items = match raw {
                    Value::Null => return Ok(Vec::new()),
                    Value::Array(items) => items,
                    other => {
                        return Err(DbError::TypeMismatch(format!(
                            "'{}' must be a list, got {}",
                            self.foreign_key,
                            other.type_name()
                        )));
                    }
                };
                let mut refs = Vec::with_capacity(items.len());
                for item in items {
                    match &self.model_name {
                        Some(target) => {
                            if let Some(id) = item.to_id()? {
                                refs.push(ModelKey::new(target.clone(), id));
                            }
                        }
                        None => refs.push(ModelKey::from_value(item)?),
                    }
                }
                Ok(refs)
            }
        }
    }

    /// Writes `refs` as this association's keys on an owner record.
    pub(crate) fn write_refs(&self, attrs: &mut Record, refs: &[ModelKey]) {
        if !self.stores_on_owner() {
            return;
        }
        match self.kind {
            AssociationKind::BelongsTo => {
                let first = refs.first();
                attrs.insert(
                    self.foreign_key.clone(),
                    first.map(|r| Value::Text(r.id.clone())).unwrap_or_default(),
                );
                if let Some(type_key) = &self.type_key {
                    attrs.insert(
                        type_key.clone(),
                        first.map(|r| Value::Text(r.model_name.clone())).unwrap_or_default(),
                    );
                }
            }
            AssociationKind::HasMany => {
                let items = refs
                    .iter()
                    .map(|r| {
                        if self.is_polymorphic() {
                            r.to_value()
                        } else {
                            Value::Text(r.id.clone())
                        }
                    })
                    .collect();
                attrs.insert(self.foreign_key.clone(), Value::Array(items));
            }
        }
    }

    /// Adds `key` to the recorded keys; returns whether anything changed.
    pub(crate) fn add_ref(&self, attrs: &mut Record, key: &ModelKey) -> Result<bool> {
        let mut refs = self.refs_in(attrs)?;
        if refs.contains(key) {
            return Ok(false);
        }
        match self.kind {
            AssociationKind::BelongsTo => refs = vec![key.clone()],
            AssociationKind::HasMany => refs.push(key.clone()),
        }
        self.write_refs(attrs, &refs);
        Ok(true)
    }

    /// Removes `key` from the recorded keys; returns whether anything changed.
    pub(crate) fn remove_ref(&self, attrs: &mut Record, key: &ModelKey) -> Result<bool> {
        let mut refs = self.refs_in(attrs)?;
        let before = refs.len();
        refs.retain(|r| r != key);
        if refs.len() == before {
            return Ok(false);
        }
        self.write_refs(attrs, &refs);
        Ok(true)
    }

    /// Canonicalizes a caller-supplied value for one of this association's keys.
    pub(crate) fn normalize_key_value(&self, attr: &str, value: Value) -> Result<Value> {
        if self.type_key.as_deref() == Some(attr) {
            return match value {
                Value::Null | Value::Text(_) => Ok(value),
                other => Err(DbError::TypeMismatch(format!(
                    "'{}' must be a model name, got {}",
                    attr,
                    other.type_name()
                ))),
            };
        }
        match self.kind {
            AssociationKind::BelongsTo => Ok(value.to_id()?.map(Value::Text).unwrap_or_default()),
            AssociationKind::HasMany => {
                let mut scratch = Record::new();
                scratch.insert(self.foreign_key.clone(), value);
                let refs = self.refs_in(&scratch)?;
                self.write_refs(&mut scratch, &refs);
                Ok(scratch.remove(&self.foreign_key).unwrap_or_default())
            }
        }
    }

    fn related_type_in(&self, attrs: &Record) -> Result<String> {
        if let Some(target) = &self.model_name {
            return Ok(target.clone());
        }
        let type_key = self.type_key.as_deref().unwrap_or_default();
        attrs
            .get(type_key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                DbError::TypeMismatch(format!(
                    "'{}' is set but '{}' names no model",
                    self.foreign_key, type_key
                ))
            })
    }
}
