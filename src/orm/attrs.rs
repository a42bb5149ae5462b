use crate::core::Value;
use super::{Collection, Model};

/// One caller-supplied attribute: a plain value or an association assignment.
#[derive(Debug, Clone)]
pub enum Field {
    Value(Value),
    One(Option<Model>),
    Many(Vec<Model>),
}

/// Ordered attribute assignments, as accepted by `create`, `new_model` and `update`.
pub type Attrs = Vec<(String, Field)>;

/// Builds [`Attrs`] from `key => value` pairs, where a value may be anything
/// convertible into a [`Field`]: scalars, id lists, models or collections.
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::Attrs::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        vec![$(($key.to_string(), $crate::Field::from($value))),+]
    };
}

macro_rules! field_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Field {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

field_from_value!(
    Value,
    &str,
    String,
    &String,
    i64,
    i32,
    f64,
    bool,
    Vec<Value>,
    Vec<String>,
    Vec<&str>,
    Vec<i64>,
    Option<String>,
    Option<i64>,
    serde_json::Value,
);

impl From<Model> for Field {
    fn from(model: Model) -> Self {
        Self::One(Some(model))
    }
}

impl From<&Model> for Field {
    fn from(model: &Model) -> Self {
        Self::One(Some(model.clone()))
    }
}

impl From<Option<Model>> for Field {
    fn from(model: Option<Model>) -> Self {
        Self::One(model)
    }
}

impl From<Vec<Model>> for Field {
    fn from(models: Vec<Model>) -> Self {
        Self::Many(models)
    }
}

impl From<&[Model]> for Field {
    fn from(models: &[Model]) -> Self {
        Self::Many(models.to_vec())
    }
}

impl From<Collection> for Field {
    fn from(collection: Collection) -> Self {
        Self::Many(collection.into_models())
    }
}

impl From<&Collection> for Field {
    fn from(collection: &Collection) -> Self {
        Self::Many(collection.models().to_vec())
    }
}
