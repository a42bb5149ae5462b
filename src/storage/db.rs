use super::Table;
use crate::core::{DbError, Record, Result, Value};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::debug;

/// The record store: named, ordered collections of plain records.
///
/// All reads hand out clones, so a record obtained from the store is a
/// snapshot and can never be used to mutate it.
#[derive(Debug, Clone, Default)]
pub struct Db {
    tables: BTreeMap<String, Table>,
}

impl Db {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty collection. Existing collections are left untouched.
    pub fn create_collection(&mut self, name: &str) {
        if !self.tables.contains_key(name) {
            debug!(collection = name, "collection created");
            self.tables.insert(name.to_string(), Table::new(name));
        }
    }

    pub fn collection(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::CollectionNotFound(name.to_string()))
    }

    pub fn collection_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::CollectionNotFound(name.to_string()))
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn list_collections(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn create_record(&mut self, collection: &str, attrs: Record) -> Result<Record> {
        self.collection_mut(collection)?.insert(attrs)
    }

    /// Looks up one record by id. A missing id is a lookup failure.
    pub fn find(&self, collection: &str, id: &str) -> Result<Record> {
        self.collection(collection)?
            .find(id)
            .ok_or_else(|| DbError::RecordNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    pub fn find_many(&self, collection: &str, ids: &[String]) -> Result<Vec<Record>> {
        Ok(self.collection(collection)?.find_many(ids))
    }

    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.tables
            .get(collection)
            .is_some_and(|table| table.find(id).is_some())
    }

    pub fn all(&self, collection: &str) -> Result<Vec<Record>> {
        Ok(self.collection(collection)?.all())
    }

    pub fn find_by(&self, collection: &str, query: &Record) -> Result<Option<Record>> {
        Ok(self.collection(collection)?.find_by(query))
    }

    pub fn where_(&self, collection: &str, query: &Record) -> Result<Vec<Record>> {
        Ok(self.collection(collection)?.where_(query))
    }

    pub fn update(&mut self, collection: &str, id: &str, attrs: &Record) -> Result<Record> {
        self.collection_mut(collection)?.update(id, attrs)
    }

    pub fn remove(&mut self, collection: &str, id: &str) -> Result<Record> {
        self.collection_mut(collection)?.remove(id)
    }

    pub fn len(&self, collection: &str) -> Result<usize> {
        Ok(self.collection(collection)?.len())
    }

    /// Bulk-loads fixture records, creating collections as needed.
    ///
    /// Records are inserted in the given order; explicit ids move each
    /// collection's autoincrement watermark before any later create.
    pub fn load_data<I>(&mut self, data: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Vec<Record>)>,
    {
        for (name, records) in data {
            self.create_collection(&name);
            let count = records.len();
            self.collection_mut(&name)?.insert_many(records)?;
            debug!(collection = %name, count, "fixtures loaded");
        }
        Ok(())
    }

    /// Loads fixtures from `{ "collection": [ { ...record } ] }`.
    pub fn load_json(&mut self, data: &JsonValue) -> Result<()> {
        let parsed = Self::parse_fixtures(data)?;
        self.load_data(parsed)
    }

    /// Splits `{ "collection": [ { ...record } ] }` into per-collection records.
    pub fn parse_fixtures(data: &JsonValue) -> Result<Vec<(String, Vec<Record>)>> {
        let object = data.as_object().ok_or_else(|| {
            DbError::TypeMismatch("fixture data must be an object of collections".into())
        })?;

        let mut parsed = Vec::with_capacity(object.len());
        for (name, rows) in object {
            let rows = rows.as_array().ok_or_else(|| {
                DbError::TypeMismatch(format!("fixtures for '{}' must be an array", name))
            })?;
            let mut records = Vec::with_capacity(rows.len());
            for row in rows {
                match Value::from(row.clone()) {
                    Value::Object(record) => records.push(record),
                    other => {
                        return Err(DbError::TypeMismatch(format!(
                            "fixture rows must be objects, got {}",
                            other.type_name()
                        )));
                    }
                }
            }
            parsed.push((name.clone(), records));
        }
        Ok(parsed)
    }

    pub fn dump(&self) -> JsonValue {
        JsonValue::Object(
            self.tables
                .iter()
                .map(|(name, table)| {
                    let rows = table
                        .all()
                        .into_iter()
                        .map(|record| Value::Object(record).to_json())
                        .collect();
                    (name.clone(), JsonValue::Array(rows))
                })
                .collect(),
        )
    }

    /// Removes every record while keeping the collections themselves.
    pub fn empty_data(&mut self) {
        for table in self.tables.values_mut() {
            table.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use serde_json::json;

    #[test]
    fn test_load_data_seeds_autoincrement() {
        let mut db = Db::new();
        db.load_data(vec![(
            "authors".to_string(),
            vec![record! { "id" => 1, "name" => "Zelda" }],
        )])
        .unwrap();

        let created = db.create_record("authors", record! {}).unwrap();
        assert_eq!(created["id"], Value::from("2"));
        assert_eq!(db.len("authors").unwrap(), 2);
    }

    #[test]
    fn test_load_json_and_dump() {
        let mut db = Db::new();
        db.load_json(&json!({ "contacts": [{ "id": "1", "name": "Link" }, { "name": "Zelda" }] }))
            .unwrap();
        assert_eq!(
            db.dump(),
            json!({ "contacts": [{ "id": "1", "name": "Link" }, { "id": "2", "name": "Zelda" }] })
        );
    }

    #[test]
    fn test_unknown_collection() {
        let db = Db::new();
        assert!(matches!(db.all("ghosts"), Err(DbError::CollectionNotFound(_))));
    }

    #[test]
    fn test_find_missing_is_not_found() {
        let mut db = Db::new();
        db.create_collection("contacts");
        assert!(db.find("contacts", "1").unwrap_err().is_not_found());
    }
}
