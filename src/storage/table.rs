use crate::core::{DbError, ID_KEY, Record, Result, Value};
use tracing::trace;

/// One ordered collection of records.
///
/// Insertion order is preserved and observable through [`Table::all`].
/// Ids are strings; records inserted without one receive
/// `max(numeric ids seen) + 1`.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    records: Vec<Record>,
    // None once an id of u64::MAX has been seen
    next_id: Option<u64>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
            next_id: Some(1),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inserts a record, assigning an id when none is supplied.
    pub fn insert(&mut self, mut attrs: Record) -> Result<Record> {
        let explicit = match attrs.get(ID_KEY) {
            Some(value) => value.to_id()?,
            None => None,
        };

        let id = match explicit {
            Some(id) => {
                if self.position(&id).is_some() {
                    return Err(DbError::DuplicateId {
                        collection: self.name.clone(),
                        id,
                    });
                }
                id
            }
            None => {
                let mut candidate = self.next_id.ok_or_else(|| self.exhausted())?;
                while self.position(&candidate.to_string()).is_some() {
                    candidate = candidate.checked_add(1).ok_or_else(|| self.exhausted())?;
                }
                candidate.to_string()
            }
        };

        self.observe_id(&id);
        attrs.insert(ID_KEY.to_string(), Value::Text(id.clone()));
        self.records.push(attrs.clone());
        trace!(collection = %self.name, %id, "record inserted");
        Ok(attrs)
    }

    pub fn insert_many(&mut self, records: Vec<Record>) -> Result<Vec<Record>> {
        records.into_iter().map(|record| self.insert(record)).collect()
    }

    pub fn find(&self, id: &str) -> Option<Record> {
        self.position(id).map(|idx| self.records[idx].clone())
    }

    /// Returns the records for `ids` in the order given, skipping unknown ids.
    pub fn find_many(&self, ids: &[String]) -> Vec<Record> {
        ids.iter().filter_map(|id| self.find(id)).collect()
    }

    pub fn find_by(&self, query: &Record) -> Option<Record> {
        self.records.iter().find(|r| matches_query(r, query)).cloned()
    }

    pub fn where_(&self, query: &Record) -> Vec<Record> {
        self.filter(|record| matches_query(record, query))
    }

    pub fn filter<F>(&self, predicate: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).cloned().collect()
    }

    pub fn first(&self) -> Option<Record> {
        self.records.first().cloned()
    }

    pub fn all(&self) -> Vec<Record> {
        self.records.clone()
    }

    pub fn first_or_create(&mut self, query: &Record, attrs: Record) -> Result<Record> {
        if let Some(found) = self.find_by(query) {
            return Ok(found);
        }
        let mut merged = query.clone();
        merged.extend(attrs);
        self.insert(merged)
    }

    /// Shallow-merges `attrs` into the record with `id`. The id itself is never rewritten.
    pub fn update(&mut self, id: &str, attrs: &Record) -> Result<Record> {
        let idx = self.position(id).ok_or_else(|| self.not_found(id))?;
        let record = &mut self.records[idx];
        for (key, value) in attrs {
            if key != ID_KEY {
                record.insert(key.clone(), value.clone());
            }
        }
        Ok(record.clone())
    }

    pub fn update_where(&mut self, query: &Record, attrs: &Record) -> Vec<Record> {
        let mut updated = Vec::new();
        for record in self.records.iter_mut().filter(|r| matches_query(r, query)) {
            for (key, value) in attrs {
                if key != ID_KEY {
                    record.insert(key.clone(), value.clone());
                }
            }
            updated.push(record.clone());
        }
        updated
    }

    pub fn remove(&mut self, id: &str) -> Result<Record> {
        let idx = self.position(id).ok_or_else(|| self.not_found(id))?;
        trace!(collection = %self.name, %id, "record removed");
        Ok(self.records.remove(idx))
    }

    pub fn remove_where(&mut self, query: &Record) -> Vec<Record> {
        let (removed, kept) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|r| matches_query(r, query));
        self.records = kept;
        removed
    }

    /// Drops every record. The id watermark is kept so ids are never reused.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.get(ID_KEY).and_then(Value::as_str) == Some(id))
    }

    fn observe_id(&mut self, id: &str) {
        if let Ok(numeric) = id.parse::<u64>()
            && let Some(next) = self.next_id
            && numeric >= next
        {
            self.next_id = numeric.checked_add(1);
        }
    }

    fn exhausted(&self) -> DbError {
        DbError::IdSpaceExhausted(self.name.clone())
    }

    fn not_found(&self, id: &str) -> DbError {
        DbError::RecordNotFound {
            collection: self.name.clone(),
            id: id.to_string(),
        }
    }
}

fn matches_query(record: &Record, query: &Record) -> bool {
    query.iter().all(|(key, expected)| {
        let actual = record.get(key).unwrap_or(&Value::Null);
        if key == ID_KEY {
            return actual.to_id().ok().flatten() == expected.to_id().ok().flatten();
        }
        actual == expected
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;

    #[test]
    fn test_auto_ids_follow_highest_numeric_id() {
        let mut table = Table::new("authors");
        table.insert(record! { "id" => 4, "name" => "Link" }).unwrap();
        let next = table.insert(record! { "name" => "Zelda" }).unwrap();
        assert_eq!(next["id"], Value::from("5"));
    }

    #[test]
    fn test_duplicate_explicit_id_is_rejected() {
        let mut table = Table::new("authors");
        table.insert(record! { "name" => "Link" }).unwrap();
        let err = table.insert(record! { "id" => "1" }).unwrap_err();
        assert!(matches!(err, DbError::DuplicateId { .. }));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_update_is_shallow_merge() {
        let mut table = Table::new("authors");
        table.insert(record! { "name" => "Link", "age" => 10 }).unwrap();
        let updated = table.update("1", &record! { "age" => 11, "id" => "9" }).unwrap();
        assert_eq!(updated, record! { "id" => "1", "name" => "Link", "age" => 11 });
    }

    #[test]
    fn test_remove_missing_record_errors() {
        let mut table = Table::new("authors");
        assert!(table.remove("1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_ids_are_not_reused_after_clear() {
        let mut table = Table::new("authors");
        table.insert(record! {}).unwrap();
        table.insert(record! {}).unwrap();
        table.clear();
        let next = table.insert(record! {}).unwrap();
        assert_eq!(next["id"], Value::from("3"));
    }

    #[test]
    fn test_largest_numeric_id_exhausts_generated_ids() {
        let mut table = Table::new("authors");
        let max = u64::MAX.to_string();
        table.insert(record! { "id" => max.as_str() }).unwrap();

        let err = table.insert(record! { "name" => "Link" }).unwrap_err();
        assert!(matches!(err, DbError::IdSpaceExhausted(ref name) if name == "authors"));
        assert_eq!(table.len(), 1);

        // Explicit ids are still accepted
        table.insert(record! { "id" => "7" }).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_where_normalizes_id_query() {
        let mut table = Table::new("authors");
        table.insert(record! { "name" => "Link" }).unwrap();
        table.insert(record! { "name" => "Zelda" }).unwrap();
        let found = table.where_(&record! { "id" => 2 });
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], Value::from("Zelda"));
    }
}
