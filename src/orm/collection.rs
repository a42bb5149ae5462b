use std::cmp::Ordering;
use crate::core::{ModelKey, Result};
use super::model::Model;

/// An ordered snapshot of models.
///
/// Membership is fixed when the collection is produced; later store changes
/// do not add or remove entries. A collection from a polymorphic has-many has
/// no single model name and may mix types.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    model_name: Option<String>,
    models: Vec<Model>,
}

impl Collection {
    pub fn new(model_name: Option<String>, models: Vec<Model>) -> Self {
        Self { model_name, models }
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model_name.as_deref()
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn into_models(self) -> Vec<Model> {
        self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Model> {
        self.models.get(index)
    }

    pub fn first(&self) -> Option<&Model> {
        self.models.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Model> {
        self.models.iter()
    }

    /// Membership by type and id, or by instance for unsaved models.
    pub fn includes(&self, model: &Model) -> bool {
        self.models.iter().any(|m| m.same(model))
    }

    pub fn keys(&self) -> Vec<ModelKey> {
        self.models.iter().filter_map(Model::key).collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.models.iter().filter_map(Model::id).collect()
    }

    pub fn filter<F>(&self, predicate: F) -> Self
    where
        F: Fn(&Model) -> bool,
    {
        self.derive(self.models.iter().filter(|m| predicate(m)).cloned().collect())
    }

    pub fn sort_by<F>(&self, mut compare: F) -> Self
    where
        F: FnMut(&Model, &Model) -> Ordering,
    {
        let mut models = self.models.clone();
        models.sort_by(|a, b| compare(a, b));
        self.derive(models)
    }

    /// Models in `start..end`, clamped to the collection; `None` runs to the end.
    pub fn slice(&self, start: usize, end: Option<usize>) -> Self {
        let end = end.unwrap_or(self.len()).min(self.len());
        let start = start.min(end);
        self.derive(self.models[start..end].to_vec())
    }

    pub fn save(&self) -> Result<()> {
        self.models.iter().try_for_each(Model::save)
    }

    pub fn reload(&self) -> Result<()> {
        self.models.iter().try_for_each(Model::reload)
    }

    pub fn destroy(&self) -> Result<()> {
        self.models.iter().try_for_each(Model::destroy)
    }

    fn derive(&self, models: Vec<Model>) -> Self {
        Self::new(self.model_name.clone(), models)
    }
}

impl IntoIterator for Collection {
    type Item = Model;
    type IntoIter = std::vec::IntoIter<Model>;

    fn into_iter(self) -> Self::IntoIter {
        self.models.into_iter()
    }
}

impl<'a> IntoIterator for &'a Collection {
    type Item = &'a Model;
    type IntoIter = std::slice::Iter<'a, Model>;

    fn into_iter(self) -> Self::IntoIter {
        self.models.iter()
    }
}
