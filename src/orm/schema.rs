use std::cell::{Ref, RefCell};
use std::rc::Rc;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::core::{DbError, ID_KEY, ModelKey, Record, Result, Value};
use crate::storage::Db;
use super::attrs::Attrs;
use super::collection::Collection;
use super::model::Model;
use super::registry::{ModelDef, Registry};

struct SchemaInner {
    registry: Registry,
    db: RefCell<Db>,
}

/// The entry point: a record store plus the model definitions that describe it.
///
/// Cloning is cheap and every clone refers to the same store. Each registered
/// model gets a collection named after its plural (`author` -> `authors`).
#[derive(Clone)]
pub struct Schema {
    inner: Rc<SchemaInner>,
}

impl Schema {
    pub fn new(mut db: Db, models: Vec<ModelDef>) -> Result<Self> {
        let registry = Registry::build(models)?;
        for model_name in registry.model_names() {
            db.create_collection(registry.collection_name(model_name)?);
        }
        debug!(collections = ?db.list_collections(), "schema ready");
        Ok(Self {
            inner: Rc::new(SchemaInner {
                registry,
                db: RefCell::new(db),
            }),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Read access to the underlying store.
    pub fn db(&self) -> Ref<'_, Db> {
        self.inner.db.borrow()
    }

    /// Loads fixtures keyed by collection name.
    pub fn load_json(&self, data: &JsonValue) -> Result<()> {
        self.load_data(Db::parse_fixtures(data)?)
    }

    /// Loads records as-is apart from key normalization: foreign keys of
    /// registered models are stored in their string form.
    pub fn load_data<I>(&self, data: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Vec<Record>)>,
    {
        let mut normalized = Vec::new();
        for (collection, records) in data {
            let records = match self.registry().model_for_collection(&collection) {
                Some(model_name) => records
                    .into_iter()
                    .map(|record| self.normalize_keys(model_name, record))
                    .collect::<Result<Vec<_>>>()?,
                None => records,
            };
            normalized.push((collection, records));
        }
        self.with_db(|db| db.load_data(normalized))
    }

    pub fn dump(&self) -> JsonValue {
        self.db().dump()
    }

    /// Accessor for one registered model type.
    pub fn table(&self, model_name: &str) -> Result<ModelTable<'_>> {
        if !self.registry().contains(model_name) {
            return Err(DbError::UnknownModel(model_name.to_string()));
        }
        Ok(ModelTable {
            schema: self,
            model_name: model_name.to_string(),
        })
    }

    pub fn new_model(&self, model_name: &str, attrs: Attrs) -> Result<Model> {
        self.table(model_name)?.new_model(attrs)
    }

    pub fn create(&self, model_name: &str, attrs: Attrs) -> Result<Model> {
        self.table(model_name)?.create(attrs)
    }

    pub fn find(&self, model_name: &str, id: impl Into<Value>) -> Result<Model> {
        self.table(model_name)?.find(id)
    }

    pub(crate) fn find_key(&self, key: &ModelKey) -> Result<Model> {
        let record = self.record(key)?;
        self.hydrate(&key.model_name, record)
    }

    pub(crate) fn hydrate(&self, model_name: &str, record: Record) -> Result<Model> {
        Model::instantiate(self, model_name, record, true)
    }

    pub(crate) fn record(&self, key: &ModelKey) -> Result<Record> {
        let collection = self.registry().collection_name(&key.model_name)?;
        self.db().find(collection, &key.id)
    }

    pub(crate) fn contains(&self, key: &ModelKey) -> Result<bool> {
        let collection = self.registry().collection_name(&key.model_name)?;
        Ok(self.db().contains(collection, &key.id))
    }

    // Ids and foreign keys compare in their string form.
    pub(crate) fn normalize_keys(&self, model_name: &str, record: Record) -> Result<Record> {
        let mut normalized = Record::new();
        for (attr, value) in record {
            let value = if attr == ID_KEY {
                value.to_id()?.map(Value::Text).unwrap_or_default()
            } else if let Some(assoc) = self.registry().association_for_key_attr(model_name, &attr)? {
                assoc.normalize_key_value(&attr, value)?
            } else {
                value
            };
            normalized.insert(attr, value);
        }
        Ok(normalized)
    }

    pub(crate) fn with_db<R>(&self, f: impl FnOnce(&mut Db) -> R) -> R {
        f(&mut self.inner.db.borrow_mut())
    }
}

/// Table-like accessor for one model type, returned by [`Schema::table`].
pub struct ModelTable<'a> {
    schema: &'a Schema,
    model_name: String,
}

impl ModelTable<'_> {
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn collection_name(&self) -> Result<&str> {
        self.schema.registry().collection_name(&self.model_name)
    }

    /// Builds an unsaved model. Nothing is written to the store.
    pub fn new_model(&self, attrs: Attrs) -> Result<Model> {
        let model = Model::instantiate(self.schema, &self.model_name, Record::new(), false)?;
        model.assign(attrs)?;
        Ok(model)
    }

    pub fn create(&self, attrs: Attrs) -> Result<Model> {
        let model = self.new_model(attrs)?;
        model.save()?;
        Ok(model)
    }

    pub fn all(&self) -> Result<Collection> {
        let records = self.schema.db().all(self.collection_name()?)?;
        self.collect(records)
    }

    /// Looks up one model. A missing id is a lookup failure, not an empty result.
    pub fn find(&self, id: impl Into<Value>) -> Result<Model> {
        let id = self.normalize_id(id.into())?;
        self.schema.find_key(&ModelKey::new(self.model_name.clone(), id))
    }

    /// Looks up several models, in the order requested.
    pub fn find_many<I, V>(&self, ids: I) -> Result<Collection>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let mut models = Vec::new();
        for id in ids {
            models.push(self.find(id)?);
        }
        Ok(self.wrap(models))
    }

    pub fn find_by(&self, query: Record) -> Result<Option<Model>> {
        let query = self.normalize_query(query)?;
        let record = self.schema.db().find_by(self.collection_name()?, &query)?;
        record.map(|r| self.schema.hydrate(&self.model_name, r)).transpose()
    }

    pub fn where_(&self, query: Record) -> Result<Collection> {
        let query = self.normalize_query(query)?;
        let records = self.schema.db().where_(self.collection_name()?, &query)?;
        self.collect(records)
    }

    /// Models whose record satisfies `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Result<Collection>
    where
        F: Fn(&Record) -> bool,
    {
        let records = self
            .schema
            .db()
            .collection(self.collection_name()?)?
            .filter(predicate);
        self.collect(records)
    }

    pub fn first(&self) -> Result<Option<Model>> {
        let record = self.schema.db().collection(self.collection_name()?)?.first();
        record.map(|r| self.schema.hydrate(&self.model_name, r)).transpose()
    }

    pub fn first_or_create(&self, query: Record) -> Result<Model> {
        if let Some(model) = self.find_by(query.clone())? {
            return Ok(model);
        }
        let attrs = query.into_iter().map(|(k, v)| (k, v.into())).collect();
        self.create(attrs)
    }

    /// An empty collection of this type.
    pub fn none(&self) -> Collection {
        self.wrap(Vec::new())
    }

    pub fn len(&self) -> Result<usize> {
        self.schema.db().len(self.collection_name()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn collect(&self, records: Vec<Record>) -> Result<Collection> {
        let models = records
            .into_iter()
            .map(|record| self.schema.hydrate(&self.model_name, record))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.wrap(models))
    }

    fn wrap(&self, models: Vec<Model>) -> Collection {
        Collection::new(Some(self.model_name.clone()), models)
    }

    fn normalize_id(&self, id: Value) -> Result<String> {
        id.to_id()?.ok_or_else(|| {
            DbError::TypeMismatch(format!("cannot look up a {} by a null id", self.model_name))
        })
    }

    fn normalize_query(&self, query: Record) -> Result<Record> {
        self.schema.normalize_keys(&self.model_name, query)
    }
}
