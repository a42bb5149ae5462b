use std::collections::BTreeMap;
use tracing::debug;
use crate::core::{DbError, Result};
use super::association::{
    Association, AssociationDef, AssociationId, AssociationKind, Inverse, InverseOption, KeyStorage,
};
use super::inflector::pluralize;

/// A model type and its association declarations, in declaration order.
#[derive(Debug, Clone)]
pub struct ModelDef {
    name: String,
    associations: Vec<(String, AssociationDef)>,
}

impl ModelDef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            associations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shorthand for a belongs-to whose target is named like the key.
    pub fn belongs_to(self, key: &str) -> Self {
        self.association(key, AssociationDef::belongs_to())
    }

    /// Shorthand for a has-many whose target is the singular key.
    pub fn has_many(self, key: &str) -> Self {
        self.association(key, AssociationDef::has_many())
    }

    pub fn association(mut self, key: &str, def: AssociationDef) -> Self {
        self.associations.push((key.to_string(), def));
        self
    }
}

#[derive(Debug, Clone)]
struct ModelEntry {
    collection: String,
    associations: Vec<AssociationId>,
}

/// Schema metadata: registered model types and their resolved associations.
///
/// Built once; every inverse is resolved (or rejected) during [`Registry::build`].
#[derive(Debug, Clone, Default)]
pub struct Registry {
    models: BTreeMap<String, ModelEntry>,
    order: Vec<String>,
    associations: Vec<Association>,
}

impl Registry {
    pub fn build(defs: Vec<ModelDef>) -> Result<Self> {
        let mut registry = Self::default();

        for def in &defs {
            registry.register_model(&def.name)?;
        }
        for def in &defs {
            for (key, assoc_def) in &def.associations {
                registry.register_association(&def.name, key, assoc_def)?;
            }
        }

        registry.resolve_monomorphic_inverses()?;
        registry.resolve_polymorphic_inverses()?;
        registry.check_symmetry()?;
        registry.resolve_child_keys()?;

        debug!(
            models = registry.order.len(),
            associations = registry.associations.len(),
            "schema registry built"
        );
        Ok(registry)
    }

    pub fn contains(&self, model_name: &str) -> bool {
        self.models.contains_key(model_name)
    }

    /// Registered model names in declaration order.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn collection_name(&self, model_name: &str) -> Result<&str> {
        Ok(self.entry(model_name)?.collection.as_str())
    }

    /// The model whose records live in `collection`.
    pub fn model_for_collection(&self, collection: &str) -> Option<&str> {
        self.model_names()
            .find(|name| self.models.get(*name).is_some_and(|e| e.collection == collection))
    }

    pub fn associations_for(&self, model_name: &str) -> Result<Vec<&Association>> {
        Ok(self
            .entry(model_name)?
            .associations
            .iter()
            .map(|id| self.get(*id))
            .collect())
    }

    pub fn find_association(&self, model_name: &str, key: &str) -> Result<Option<&Association>> {
        Ok(self.associations_for(model_name)?.into_iter().find(|a| a.key == key))
    }

    pub fn association(&self, model_name: &str, key: &str) -> Result<&Association> {
        self.find_association(model_name, key)?.ok_or_else(|| {
            DbError::UndefinedRelationship(format!(
                "the {} model has no association named '{}'",
                model_name, key
            ))
        })
    }

    /// The association whose owner-side keys include `attr`, if any.
    pub fn association_for_key_attr(&self, model_name: &str, attr: &str) -> Result<Option<&Association>> {
        Ok(self
            .associations_for(model_name)?
            .into_iter()
            .find(|a| a.owned_keys().contains(&attr)))
    }

    /// The reciprocal of `assoc` on `related_model`, if one was resolved.
    pub fn inverse_of(&self, assoc: &Association, related_model: &str) -> Option<&Association> {
        match &assoc.inverse {
            Inverse::None => None,
            Inverse::One(id) => Some(self.get(*id)),
            Inverse::ByType(by_type) => by_type.get(related_model).map(|id| self.get(*id)),
        }
    }

    /// Owner-stored associations that may hold a reference to `model_name`.
    pub(crate) fn dependents_of(&self, model_name: &str) -> Vec<&Association> {
        self.associations
            .iter()
            .filter(|a| a.stores_on_owner() && a.accepts(model_name))
            .collect()
    }

    pub(crate) fn get(&self, id: AssociationId) -> &Association {
        &self.associations[id.0]
    }

    fn entry(&self, model_name: &str) -> Result<&ModelEntry> {
        self.models
            .get(model_name)
            .ok_or_else(|| DbError::UnknownModel(model_name.to_string()))
    }

    fn register_model(&mut self, name: &str) -> Result<()> {
        if self.models.contains_key(name) {
            return Err(DbError::ConfigError(format!("model '{}' is registered twice", name)));
        }
        let collection = pluralize(name);
        if let Some(clash) = self.models.iter().find(|(_, e)| e.collection == collection) {
            return Err(DbError::ConfigError(format!(
                "models '{}' and '{}' both map to collection '{}'",
                clash.0, name, collection
            )));
        }
        self.models.insert(
            name.to_string(),
            ModelEntry {
                collection,
                associations: Vec::new(),
            },
        );
        self.order.push(name.to_string());
        Ok(())
    }

    fn register_association(&mut self, owner: &str, key: &str, def: &AssociationDef) -> Result<()> {
        let label = format!("{}.{}", owner, key);
        if self.find_association(owner, key)?.is_some() {
            return Err(DbError::ConfigError(format!("association {} is declared twice", label)));
        }
        if def.polymorphic && def.model_name.is_some() {
            return Err(DbError::ConfigError(format!(
                "polymorphic association {} cannot name a target model",
                label
            )));
        }
        if def.storage == KeyStorage::ChildKey
            && (def.kind == AssociationKind::BelongsTo || def.polymorphic)
        {
            return Err(DbError::ConfigError(format!(
                "association {} cannot keep its keys on the child; only monomorphic has-many can",
                label
            )));
        }

        let id = AssociationId(self.associations.len());
        let assoc = Association::resolve(id, owner, key, def);
        if let Some(target) = assoc.model_name()
            && !self.contains(target)
        {
            return Err(DbError::ConfigError(format!(
                "association {} targets unregistered model '{}'",
                label, target
            )));
        }

        self.associations.push(assoc);
        if let Some(entry) = self.models.get_mut(owner) {
            entry.associations.push(id);
        }
        Ok(())
    }

    fn resolve_monomorphic_inverses(&mut self) -> Result<()> {
        for idx in 0..self.associations.len() {
            let assoc = &self.associations[idx];
            let Some(target) = assoc.model_name.clone() else {
                continue;
            };
            let inverse = match &assoc.declared_inverse {
                InverseOption::OneWay => Inverse::None,
                InverseOption::Explicit(key) => {
                    Inverse::One(self.explicit_inverse(assoc, &target, key)?)
                }
                InverseOption::Implicit => match self.implicit_inverse(assoc, &target)? {
                    Some(id) => Inverse::One(id),
                    None => Inverse::None,
                },
            };
            if let Inverse::One(id) = &inverse {
                let found = self.get(*id);
                debug!(
                    association = %format!("{}.{}", assoc.owner, assoc.key),
                    inverse = %format!("{}.{}", found.owner, found.key),
                    "inverse resolved"
                );
            }
            self.associations[idx].inverse = inverse;
        }
        Ok(())
    }

    fn explicit_inverse(&self, assoc: &Association, target: &str, key: &str) -> Result<AssociationId> {
        let candidate = self.find_association(target, key)?.ok_or_else(|| {
            DbError::ConfigError(format!(
                "{}.{} declares inverse '{}', but {} has no such association",
                assoc.owner, assoc.key, key, target
            ))
        })?;
        let conflicting = match &candidate.declared_inverse {
            InverseOption::OneWay => true,
            InverseOption::Explicit(back) => back != &assoc.key,
            InverseOption::Implicit => false,
        };
        if conflicting || !candidate.accepts(&assoc.owner) {
            return Err(DbError::ConfigError(format!(
                "{}.{} declares inverse {}.{}, which does not point back to it",
                assoc.owner, assoc.key, target, key
            )));
        }
        Ok(candidate.id)
    }

    fn implicit_inverse(&self, assoc: &Association, target: &str) -> Result<Option<AssociationId>> {
        let on_target = self.associations_for(target)?;

        let claimed: Vec<&Association> = on_target
            .iter()
            .copied()
            .filter(|c| {
                c.declared_inverse == InverseOption::Explicit(assoc.key.clone())
                    && c.accepts(&assoc.owner)
            })
            .collect();
        if claimed.len() > 1 {
            return Err(DbError::ConfigError(format!(
                "{}.{} is claimed as inverse by several associations on {}",
                assoc.owner, assoc.key, target
            )));
        }
        if let Some(found) = claimed.first() {
            return Ok(Some(found.id));
        }

        let candidates: Vec<&Association> = on_target
            .into_iter()
            .filter(|c| {
                c.model_name.as_deref() == Some(assoc.owner.as_str())
                    && c.declared_inverse == InverseOption::Implicit
            })
            .collect();
        match candidates.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(only.id)),
            _ => Err(DbError::ConfigError(format!(
                "the {} model has multiple possible inverse associations for {}.{}; declare one explicitly",
                target, assoc.owner, assoc.key
            ))),
        }
    }

    fn resolve_polymorphic_inverses(&mut self) -> Result<()> {
        for idx in 0..self.associations.len() {
            if !self.associations[idx].is_polymorphic() {
                continue;
            }
            let poly_id = AssociationId(idx);
            let owner = self.associations[idx].owner.clone();
            let mut by_type: BTreeMap<String, AssociationId> = BTreeMap::new();

            // Monomorphic associations that already chose this one as their inverse.
            for other in &self.associations {
                if other.inverse == Inverse::One(poly_id) {
                    by_type.insert(other.owner.clone(), other.id);
                }
            }

            if let InverseOption::Explicit(key) = self.associations[idx].declared_inverse.clone() {
                for model in self.order.clone() {
                    let Some(candidate) = self.find_association(&model, &key)? else {
                        continue;
                    };
                    if candidate.model_name.as_deref() != Some(owner.as_str()) {
                        continue;
                    }
                    let candidate_id = candidate.id;
                    match &candidate.inverse {
                        Inverse::One(existing) if *existing != poly_id => {
                            return Err(DbError::ConfigError(format!(
                                "{}.{} cannot be the inverse of both {}.{} and another association",
                                model, key, owner, self.associations[idx].key
                            )));
                        }
                        _ => {}
                    }
                    self.associations[candidate_id.0].inverse = Inverse::One(poly_id);
                    by_type.insert(model, candidate_id);
                }
            }

            self.associations[idx].inverse = if by_type.is_empty() {
                Inverse::None
            } else {
                Inverse::ByType(by_type)
            };
        }
        Ok(())
    }

    fn check_symmetry(&self) -> Result<()> {
        for assoc in &self.associations {
            let targets: Vec<(String, AssociationId)> = match &assoc.inverse {
                Inverse::None => continue,
                Inverse::One(id) => {
                    let related = self.get(*id).owner.clone();
                    vec![(related, *id)]
                }
                Inverse::ByType(by_type) => by_type.iter().map(|(m, id)| (m.clone(), *id)).collect(),
            };
            for (related_model, inverse_id) in targets {
                let inverse = self.get(inverse_id);
                let back = self.inverse_of(inverse, &assoc.owner).map(|a| a.id);
                if back != Some(assoc.id) {
                    return Err(DbError::ConfigError(format!(
                        "{}.{} resolves {}.{} as its inverse, but that association does not resolve back",
                        assoc.owner, assoc.key, related_model, inverse.key
                    )));
                }
            }
        }
        Ok(())
    }

    fn resolve_child_keys(&mut self) -> Result<()> {
        for idx in 0..self.associations.len() {
            let assoc = &self.associations[idx];
            if assoc.storage != KeyStorage::ChildKey {
                continue;
            }
            let child_fk = match &assoc.inverse {
                Inverse::One(id) => {
                    let inverse = self.get(*id);
                    (inverse.is_belongs_to() && !inverse.is_polymorphic())
                        .then(|| inverse.foreign_key.clone())
                }
                _ => None,
            };
            let Some(child_fk) = child_fk else {
                return Err(DbError::ConfigError(format!(
                    "{}.{} keeps its keys on the child, so it needs a monomorphic belongs-to inverse",
                    assoc.owner, assoc.key
                )));
            };
            self.associations[idx].foreign_key = child_fk;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inverse_key(registry: &Registry, model: &str, key: &str, related: &str) -> Option<String> {
        let assoc = registry.association(model, key).unwrap();
        registry.inverse_of(assoc, related).map(|a| a.key().to_string())
    }

    #[test]
    fn test_implicit_one_to_many_inverse() {
        let registry = Registry::build(vec![
            ModelDef::new("user").has_many("posts"),
            ModelDef::new("post").belongs_to("user"),
        ])
        .unwrap();

        assert_eq!(inverse_key(&registry, "user", "posts", "post").as_deref(), Some("user"));
        assert_eq!(inverse_key(&registry, "post", "user", "user").as_deref(), Some("posts"));
        assert_eq!(registry.collection_name("post").unwrap(), "posts");
        assert_eq!(registry.association("user", "posts").unwrap().foreign_key(), "postIds");
    }

    #[test]
    fn test_reflexive_association_is_its_own_inverse() {
        let registry = Registry::build(vec![ModelDef::new("tag").has_many("tags")]).unwrap();
        assert_eq!(inverse_key(&registry, "tag", "tags", "tag").as_deref(), Some("tags"));
        assert!(registry.association("tag", "tags").unwrap().is_reflexive());
    }

    #[test]
    fn test_ambiguous_inverse_is_a_configuration_error() {
        let err = Registry::build(vec![
            ModelDef::new("user")
                .association("bestFriend", AssociationDef::belongs_to().model("user"))
                .association("friends", AssociationDef::has_many().model("user")),
        ])
        .unwrap_err();
        assert!(matches!(err, DbError::ConfigError(_)));
    }

    #[test]
    fn test_explicit_inverse_disambiguates() {
        let registry = Registry::build(vec![
            ModelDef::new("user")
                .association("bestFriend", AssociationDef::belongs_to().model("user").inverse("bestFriend"))
                .association("friends", AssociationDef::has_many().model("user").one_way()),
        ])
        .unwrap();
        assert_eq!(
            inverse_key(&registry, "user", "bestFriend", "user").as_deref(),
            Some("bestFriend")
        );
        assert!(!registry.association("user", "friends").unwrap().has_inverse());
    }

    #[test]
    fn test_unknown_target_and_bad_explicit_inverse() {
        let err = Registry::build(vec![ModelDef::new("post").belongs_to("author")]).unwrap_err();
        assert!(matches!(err, DbError::ConfigError(_)));

        let err = Registry::build(vec![
            ModelDef::new("user").association("posts", AssociationDef::has_many().inverse("writer")),
            ModelDef::new("post").belongs_to("user"),
        ])
        .unwrap_err();
        assert!(matches!(err, DbError::ConfigError(_)));
    }

    #[test]
    fn test_duplicate_model_is_rejected() {
        let err = Registry::build(vec![ModelDef::new("user"), ModelDef::new("user")]).unwrap_err();
        assert!(matches!(err, DbError::ConfigError(_)));
    }

    #[test]
    fn test_polymorphic_inverse_by_type() {
        let registry = Registry::build(vec![
            ModelDef::new("user").association("things", AssociationDef::has_many().polymorphic()),
            ModelDef::new("post").association("user", AssociationDef::belongs_to().inverse("things")),
            ModelDef::new("car"),
        ])
        .unwrap();
        assert_eq!(inverse_key(&registry, "user", "things", "post").as_deref(), Some("user"));
        assert_eq!(inverse_key(&registry, "user", "things", "car"), None);
        assert_eq!(inverse_key(&registry, "post", "user", "user").as_deref(), Some("things"));
    }

    #[test]
    fn test_child_key_uses_inverse_foreign_key() {
        let registry = Registry::build(vec![
            ModelDef::new("author").association("books", AssociationDef::has_many().keyed_on_child()),
            ModelDef::new("book").belongs_to("author"),
        ])
        .unwrap();
        let books = registry.association("author", "books").unwrap();
        assert_eq!(books.foreign_key(), "authorId");
        assert!(books.owned_keys().is_empty());

        let err = Registry::build(vec![
            ModelDef::new("author").association("books", AssociationDef::has_many().keyed_on_child()),
            ModelDef::new("book"),
        ])
        .unwrap_err();
        assert!(matches!(err, DbError::ConfigError(_)));
    }
}
