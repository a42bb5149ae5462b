pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, ErrorKind, Result};
pub use types::{ID_KEY, ModelKey, Record};
pub use value::Value;
