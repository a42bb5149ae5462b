use std::collections::BTreeMap;
use std::fmt;
use super::{DbError, Result, Value};

/// A stored row: attribute name to value, always carrying an `"id"` once inserted.
pub type Record = BTreeMap<String, Value>;

pub const ID_KEY: &str = "id";

/// Identity of a persisted model: its type plus its normalized id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelKey {
    pub model_name: String,
    pub id: String,
}

impl ModelKey {
    pub fn new(model_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            id: id.into(),
        }
    }

    /// The `{ "type": ..., "id": ... }` form used by polymorphic id lists.
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("type".to_string(), Value::Text(self.model_name.clone()));
        map.insert(ID_KEY.to_string(), Value::Text(self.id.clone()));
        Value::Object(map)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            DbError::TypeMismatch(format!("expected a {{type, id}} pair, got {}", value))
        })?;
        let model_name = map
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| DbError::TypeMismatch(format!("missing type in {}", value)))?;
        let id = map
            .get(ID_KEY)
            .map(Value::to_id)
            .transpose()?
            .flatten()
            .ok_or_else(|| DbError::TypeMismatch(format!("missing id in {}", value)))?;
        Ok(Self::new(model_name, id))
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.model_name, self.id)
    }
}

/// Builds a [`Record`] from `key => value` pairs.
#[macro_export]
macro_rules! record {
    () => {
        $crate::Record::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::Record::new();
        $(record.insert($key.to_string(), $crate::Value::from($value));)+
        record
    }};
}
